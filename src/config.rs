//! Runtime configuration resolved from CLI flags, environment and defaults

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use reqwest::Url;
use thiserror::Error;

use crate::cli::Cli;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// No home directory to derive cache/data directories from
    #[error("Could not determine a cache or data directory; pass --cache-dir and --data-dir")]
    NoProjectDirs,

    /// The backend URL is not an absolute http(s) URL
    #[error("Invalid API URL '{0}': expected an absolute http or https URL")]
    InvalidApiUrl(String),
}

/// Everything the commands need to run
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub timeout: Duration,
    pub cache_dir: PathBuf,
    pub data_dir: PathBuf,
    pub json: bool,
}

impl Config {
    /// Builds the configuration from parsed CLI arguments
    ///
    /// Directories not given on the command line fall back to the platform's
    /// XDG locations (`~/.cache/wxcache`, `~/.local/share/wxcache` on Linux).
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let api_url = validate_api_url(&cli.api_url)?;

        let project_dirs = if cli.cache_dir.is_none() || cli.data_dir.is_none() {
            Some(ProjectDirs::from("", "", "wxcache").ok_or(ConfigError::NoProjectDirs)?)
        } else {
            None
        };

        let cache_dir = match (&cli.cache_dir, &project_dirs) {
            (Some(dir), _) => dir.clone(),
            (None, Some(dirs)) => dirs.cache_dir().to_path_buf(),
            (None, None) => return Err(ConfigError::NoProjectDirs),
        };
        let data_dir = match (&cli.data_dir, &project_dirs) {
            (Some(dir), _) => dir.clone(),
            (None, Some(dirs)) => dirs.data_dir().to_path_buf(),
            (None, None) => return Err(ConfigError::NoProjectDirs),
        };

        Ok(Self {
            api_url,
            timeout: Duration::from_secs(cli.timeout),
            cache_dir,
            data_dir,
            json: cli.json,
        })
    }
}

fn validate_api_url(raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw).map_err(|_| ConfigError::InvalidApiUrl(raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidApiUrl(raw.to_string()));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// Log filter used when `RUST_LOG` is not set
pub fn default_log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}
