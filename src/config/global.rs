//! Global configuration file handling.
//!
//! The file is optional: a missing file yields [`GlobalConfig::default`],
//! and only `repository` has to be provided (in the file or through
//! `RELBIN_REPOSITORY`) before the launcher can run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::constants::{
    DEFAULT_API_URL, DEFAULT_LOCK_STALE_MS, DEFAULT_LOCK_UPDATE_MS, DEFAULT_MAX_REDIRECTS,
    MAX_REFRESH_INTERVAL_MS,
};
use crate::core::RelbinError;
use crate::update::config::UpdateConfig;

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_user_agent() -> String {
    format!("relbin/{}", env!("CARGO_PKG_VERSION"))
}

const fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}

const fn default_stale_ms() -> u64 {
    DEFAULT_LOCK_STALE_MS
}

const fn default_update_ms() -> u64 {
    DEFAULT_LOCK_UPDATE_MS
}

/// Top-level configuration loaded from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// GitHub repository publishing the binary, as `owner/name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Base URL of the GitHub REST API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Prefix of the platform asset name; defaults to the repository name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_name: Option<String>,

    /// Exact asset name, bypassing platform detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_name: Option<String>,

    /// Cache root; `~` is expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,

    /// Token sent to the GitHub API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,

    #[serde(default)]
    pub update: UpdateConfig,

    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            repository: None,
            api_url: default_api_url(),
            binary_name: None,
            asset_name: None,
            cache_dir: None,
            github_token: None,
            update: UpdateConfig::default(),
            lock: LockConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Timings of the lock heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Age after which a marker that is not refreshed counts as abandoned.
    #[serde(default = "default_stale_ms")]
    pub stale_ms: u64,

    /// Interval at which a holder refreshes its marker.
    #[serde(default = "default_update_ms")]
    pub update_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale_ms: default_stale_ms(),
            update_ms: default_update_ms(),
        }
    }
}

impl LockConfig {
    pub fn stale(&self) -> Duration {
        Duration::from_millis(self.stale_ms)
    }

    pub fn update(&self) -> Duration {
        Duration::from_millis(self.update_ms)
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
        }
    }
}

impl GlobalConfig {
    /// Load from the default location, falling back to defaults when the file
    /// does not exist, then apply environment overrides.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` (or the default location), then apply environment
    /// overrides.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };

        let mut config = if path.exists() {
            Self::load_from(&path).await?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a config file without applying environment overrides.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// `RELBIN_CONFIG`, or `config.toml` inside [`super::get_relbin_dir`].
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("RELBIN_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        Ok(super::get_relbin_dir()?.join("config.toml"))
    }

    /// Let `RELBIN_*` and `GITHUB_TOKEN` variables override file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(repository) = std::env::var("RELBIN_REPOSITORY") {
            self.repository = Some(repository);
        }
        if let Ok(dir) = std::env::var("RELBIN_CACHE_DIR") {
            self.cache_dir = Some(dir);
        }
        if let Ok(asset) = std::env::var("RELBIN_ASSET") {
            self.asset_name = Some(asset);
        }
        if let Ok(interval) = std::env::var("RELBIN_REFRESH_INTERVAL_MS") {
            match interval.parse() {
                Ok(ms) => self.update.refresh_interval_ms = ms,
                Err(_) => tracing::warn!(
                    value = %interval,
                    "Ignoring RELBIN_REFRESH_INTERVAL_MS: not a number of milliseconds"
                ),
            }
        }
        if self.github_token.is_none() {
            self.github_token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
        }
    }

    /// Check the settings needed to run the launcher.
    pub fn validate(&self) -> crate::core::Result<()> {
        self.repository_parts()?;

        if self.update.refresh_interval_ms == 0 {
            return Err(RelbinError::config("update.refresh_interval_ms must be greater than 0"));
        }
        if self.update.refresh_interval_ms > MAX_REFRESH_INTERVAL_MS {
            return Err(RelbinError::config(format!(
                "update.refresh_interval_ms must not exceed {MAX_REFRESH_INTERVAL_MS} (10 years)"
            )));
        }
        if self.lock.update_ms == 0 || self.lock.update_ms >= self.lock.stale_ms {
            return Err(RelbinError::config(format!(
                "lock.update_ms ({}) must be non-zero and below lock.stale_ms ({})",
                self.lock.update_ms, self.lock.stale_ms
            )));
        }
        Ok(())
    }

    /// Split `repository` into `(owner, name)`.
    pub fn repository_parts(&self) -> crate::core::Result<(&str, &str)> {
        let repository = self.repository.as_deref().ok_or_else(|| {
            RelbinError::config("no repository configured (set `repository` or RELBIN_REPOSITORY)")
        })?;

        match repository.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok((owner, name))
            }
            _ => Err(RelbinError::config(format!(
                "repository '{repository}' is not of the form owner/name"
            ))),
        }
    }

    /// URL of the latest-release endpoint for the configured repository.
    pub fn release_endpoint(&self) -> crate::core::Result<String> {
        let (owner, name) = self.repository_parts()?;
        Ok(format!(
            "{}/repos/{owner}/{name}/releases/latest",
            self.api_url.trim_end_matches('/')
        ))
    }

    /// Asset prefix used by the platform resolver.
    pub fn binary_name(&self) -> crate::core::Result<String> {
        match &self.binary_name {
            Some(name) => Ok(name.clone()),
            None => Ok(self.repository_parts()?.1.to_string()),
        }
    }

    /// Cache root for this repository.
    pub fn cache_root(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            let expanded = shellexpand::tilde(dir);
            return Ok(PathBuf::from(expanded.as_ref()));
        }

        let (_, name) = self.repository_parts()?;
        Ok(super::get_relbin_dir()?.join("cache").join(name))
    }
}
