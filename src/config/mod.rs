//! Configuration for relbin.
//!
//! Settings come from a single TOML file plus a handful of environment
//! variables that take precedence over it:
//!
//! | Variable | Overrides |
//! |---|---|
//! | `RELBIN_CONFIG` | location of the config file itself |
//! | `RELBIN_REPOSITORY` | `repository` |
//! | `RELBIN_CACHE_DIR` | `cache_dir` |
//! | `RELBIN_ASSET` | `asset_name` |
//! | `RELBIN_REFRESH_INTERVAL_MS` | `update.refresh_interval_ms` |
//! | `GITHUB_TOKEN` | `github_token` |
//!
//! # Example
//!
//! ```toml
//! repository = "acme/widget"
//! binary_name = "widget"
//!
//! [update]
//! refresh_interval_ms = 3600000
//!
//! [lock]
//! stale_ms = 10000
//! update_ms = 5000
//! ```

mod global;

pub use global::{GlobalConfig, HttpConfig, LockConfig};

use anyhow::Result;
use std::path::PathBuf;

/// Default directory holding relbin's config file and caches.
///
/// - Windows: `%LOCALAPPDATA%\relbin`
/// - macOS/Linux: `~/.relbin`
pub fn get_relbin_dir() -> Result<PathBuf> {
    let dir = if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
            .join("relbin")
    } else {
        dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
            .join(".relbin")
    };

    Ok(dir)
}
