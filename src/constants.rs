//! Global constants used throughout the relbin codebase.
//!
//! File-name suffixes of the on-disk cache layout, default timings for the
//! lock heartbeat and the refresh schedule, and HTTP limits live here so the
//! cache layout can be read in one place.

/// Suffix of the lock marker that sits next to a destination file.
pub const LOCK_SUFFIX: &str = ".lock";

/// Suffix of the pending (possibly partial) artifact next to its destination.
pub const PENDING_SUFFIX: &str = ".dl";

/// Name of the pointer to the currently selected binary inside the cache root.
pub const LATEST_POINTER: &str = "latest";

/// Name of the persisted next-check deadline inside the cache root.
pub const NEXT_CHECK_FILE: &str = "next-check";

/// Default interval between background refresh attempts (24 hours).
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

/// Upper bound of the refresh interval (10 years).
pub const MAX_REFRESH_INTERVAL_MS: u64 = 10 * 365 * 24 * 60 * 60 * 1000;

/// A lock marker whose mtime is older than this is considered abandoned.
pub const DEFAULT_LOCK_STALE_MS: u64 = 10_000;

/// How often a lease holder refreshes its marker.
pub const DEFAULT_LOCK_UPDATE_MS: u64 = 5_000;

/// Maximum number of redirects followed by the fetcher.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Default GitHub API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Maximum backoff delay in milliseconds for lock polling.
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Starting backoff delay in milliseconds for lock polling.
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Buffer size used when re-reading an artifact for its digest.
pub const DIGEST_BUFFER_SIZE: usize = 64 * 1024;
