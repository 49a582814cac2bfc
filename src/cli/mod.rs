//! Command-line interface for relbin.
//!
//! `relbin` takes no subcommands: everything after its own flags (or after
//! `--`) is handed to the cached release binary.
//!
//! ```bash
//! relbin build --release     # everything after `build` is forwarded
//! relbin -v -- --help        # debug logging, `--help` forwarded
//! relbin --config ./dev.toml build --release
//! ```
//!
//! Log output goes to stderr and defaults to `warn`, so the wrapped tool's
//! own output stays clean.

mod run;

pub use run::run_binary;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::cache::{LockCoordinator, VersionStore};
use crate::config::GlobalConfig;
use crate::download::ResumableDownloader;
use crate::http::HttpFetcher;
use crate::release::ReleaseResolver;
use crate::update::UpdateScheduler;
use crate::utils::platform;

#[derive(Parser, Debug)]
#[command(
    name = "relbin",
    about = "Run the latest release binary of a GitHub repository, kept up to date in the background",
    version
)]
pub struct Cli {
    /// Enable debug logging on stderr.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long)]
    quiet: bool,

    /// Path to the configuration file (default: ~/.relbin/config.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Arguments forwarded to the release binary.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    args: Vec<String>,
}

impl Cli {
    /// Run the launcher and return the exit code to terminate with.
    pub async fn execute(self) -> Result<i32> {
        init_logging(self.log_filter());

        let config = GlobalConfig::load_with_optional(self.config.clone()).await?;
        config.validate()?;

        // Fails for unsupported platforms before touching disk or network.
        let asset = match &config.asset_name {
            Some(asset) => asset.clone(),
            None => platform::asset_name(&config.binary_name()?)?,
        };

        let scheduler = build_scheduler(&config)?;
        let ensured = scheduler
            .ensure_binary(&asset)
            .await
            .with_context(|| format!("Failed to obtain '{asset}'"))?;

        let code = run_binary(&ensured.binary.path, &self.args).await?;

        if let Some(refresh) = ensured.refresh {
            // Let a running background refresh finish publishing.
            let _ = refresh.await;
        }
        Ok(code)
    }

    /// `RUST_LOG` when set, otherwise the level chosen by the flags.
    fn log_filter(&self) -> EnvFilter {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
        let level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        };
        EnvFilter::new(level)
    }
}

/// Wire the update pipeline together from the configuration.
pub fn build_scheduler(config: &GlobalConfig) -> Result<UpdateScheduler> {
    let fetcher = HttpFetcher::new(&config.http)?;
    let resolver =
        ReleaseResolver::new(fetcher.clone(), config.release_endpoint()?, config.github_token.clone());
    let downloader = ResumableDownloader::new(fetcher, LockCoordinator::new(&config.lock));
    let store = VersionStore::new(config.cache_root()?);

    Ok(UpdateScheduler::new(resolver, downloader, store, &config.update))
}

fn init_logging(filter: EnvFilter) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
