//! relbin - run the latest GitHub release of a tool, kept up to date
//!
//! relbin keeps a platform-specific release binary cached on disk, checks
//! for new releases in the background, and executes the cached binary with
//! the arguments it was given. Any number of relbin processes may share one
//! cache: they coordinate only through the filesystem, and a reader never
//! sees a partial or unverified binary.
//!
//! # Architecture Overview
//!
//! ```text
//! cli ─► update::UpdateScheduler ─► release::ReleaseResolver ─► http::HttpFetcher
//!                  │
//!                  ├─► download::ResumableDownloader ─► cache::lock::LockCoordinator
//!                  │                                 └► http::HttpFetcher
//!                  └─► cache::VersionStore
//! ```
//!
//! # Core Modules
//!
//! - [`http`] - GET with redirect limit and byte ranges
//! - [`release`] - Latest-release metadata and asset lookup
//! - [`cache`] - Version store, `latest` pointer, and cross-process locks
//! - [`download`] - Resumable, verified, atomically published downloads
//! - [`update`] - Next-check deadline and blocking/background refresh policy
//!
//! ## Supporting Modules
//! - [`cli`] - Command-line entry point and process-spawn boundary
//! - [`config`] - `~/.relbin/config.toml` and environment overrides
//! - [`core`] - Error taxonomy and user-facing error display
//! - [`constants`] - Cache layout names and default timings
//! - [`utils`] - Atomic writes, symlinks, platform asset names
//!
//! # Cache Layout
//!
//! ```text
//! <root>/<tag>/<asset>        finalized binary
//! <root>/<tag>/<asset>.dl     pending download
//! <root>/<tag>/<asset>.lock   lock marker
//! <root>/latest               pointer to the selected binary
//! <root>/next-check           RFC 3339 deadline of the next refresh
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod download;
pub mod http;
pub mod release;
pub mod update;
pub mod utils;

// test_utils is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
