//! Error handling for relbin
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** so the update pipeline can decide which
//!    failures are fatal and which are swallowed
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! - **Network**: [`RelbinError::Network`] covers connect, status, redirect
//!   overflow, stream interruption and unparsable JSON answers;
//!   [`RelbinError::RangeNotSatisfiable`] is the 416 answer to a resume
//! - **Integrity**: [`RelbinError::Integrity`] is a digest mismatch after a
//!   complete download; the pending artifact has already been deleted
//! - **Locking**: [`RelbinError::LockCompromised`] means another actor broke
//!   our lock as stale; the pending artifact is kept for resumption
//! - **Platform**: [`RelbinError::UnsupportedPlatform`] and
//!   [`RelbinError::AssetNotFound`] are raised when no asset exists for the
//!   running OS/architecture
//! - **File system**: [`RelbinError::FileSystem`] wraps unexpected I/O errors
//!   together with the operation and path involved
//! - **Configuration**: [`RelbinError::Config`] for invalid settings or
//!   malformed digests
//!
//! Use [`user_friendly_error`] to turn any error into an [`ErrorContext`]
//! that carries a suggestion for the user.

use colored::Colorize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used by the update pipeline.
pub type Result<T> = std::result::Result<T, RelbinError>;

/// The main error type for relbin operations.
#[derive(Error, Debug)]
pub enum RelbinError {
    /// Network error
    #[error("Network error during {operation}: {reason}")]
    Network {
        /// The network operation that failed (e.g. `GET <url>`)
        operation: String,
        /// Reason for the network failure
        reason: String,
    },

    /// The server answered a range request with 416: the offset lies at or
    /// past the end of the resource
    #[error("Network error during GET {url}: range from byte {offset} not satisfiable")]
    RangeNotSatisfiable {
        /// URL that was requested
        url: String,
        /// First byte that was requested
        offset: u64,
    },

    /// Downloaded content does not match its published digest
    #[error("Integrity check failed for '{name}': expected {expected}, got {actual}")]
    Integrity {
        /// Name of the artifact that failed verification
        name: String,
        /// The expected digest
        expected: String,
        /// The digest that was computed
        actual: String,
    },

    /// Our lock was judged stale and broken by another actor
    #[error("Lock on {path} was compromised by another process")]
    LockCompromised {
        /// Path of the lock marker
        path: PathBuf,
    },

    /// No asset is published for this OS/architecture combination
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform {
        /// Operating system reported by the running binary
        os: String,
        /// CPU architecture reported by the running binary
        arch: String,
    },

    /// The release does not contain the requested asset
    #[error("Release {tag} has no asset named '{asset}'")]
    AssetNotFound {
        /// Asset name that was looked up
        asset: String,
        /// Release tag that was searched
        tag: String,
    },

    /// File system error
    #[error("File system error during {operation} on {}: {source}", path.display())]
    FileSystem {
        /// The file system operation that failed
        operation: String,
        /// Path where the error occurred
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },
}

impl RelbinError {
    /// Build a [`RelbinError::Network`] error.
    pub fn network(operation: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Network {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a [`RelbinError::FileSystem`] error.
    pub fn file_system(
        operation: impl Into<String>,
        path: impl AsRef<Path>,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystem {
            operation: operation.into(),
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Build a [`RelbinError::Config`] error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether a later attempt can continue from the bytes already on disk.
    ///
    /// Network failures and lock compromise leave the pending artifact in
    /// place. A refused range only reaches callers once the downloader has
    /// ruled the bytes on disk out.
    #[must_use]
    pub const fn is_resumable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::LockCompromised { .. })
    }
}

/// An error together with optional details and a suggestion for the user.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: anyhow::Error,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestion or details.
    #[must_use]
    pub const fn new(error: anyhow::Error) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: error in red, details in yellow and the
    /// suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {:#}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is
/// known.
///
/// The error chain is searched for a [`RelbinError`] so that context added
/// with `anyhow::Context` does not hide the underlying category.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let category = error.chain().find_map(|cause| cause.downcast_ref::<RelbinError>());

    let (details, suggestion) = match category {
        Some(RelbinError::Network { .. } | RelbinError::RangeNotSatisfiable { .. }) => (
            Some("No cached binary is available, so the release had to be downloaded".to_string()),
            Some("Check your network connection or set GITHUB_TOKEN if you are rate limited"),
        ),
        Some(RelbinError::Integrity { .. }) => (
            Some("The partial download was discarded and will restart from zero".to_string()),
            Some("Run the command again; if it keeps failing the release asset may be corrupt"),
        ),
        Some(RelbinError::LockCompromised { path }) => (
            Some(format!("Lock marker: {}", path.display())),
            Some("Another process took over the download; run the command again"),
        ),
        Some(RelbinError::UnsupportedPlatform { .. }) => (
            None,
            Some("Set `asset_name` in the config file to pick a compatible asset explicitly"),
        ),
        Some(RelbinError::AssetNotFound { .. }) => (
            None,
            Some("Check `binary_name`/`asset_name` against the assets published in the release"),
        ),
        Some(RelbinError::FileSystem { path, .. }) => (
            Some(format!("Path: {}", path.display())),
            Some("Check permissions and free space of the cache directory"),
        ),
        Some(RelbinError::Config { .. }) => (
            None,
            Some("Review ~/.relbin/config.toml and the RELBIN_* environment variables"),
        ),
        None => (None, None),
    };

    let mut context = ErrorContext::new(error);
    if let Some(details) = details {
        context = context.with_details(details);
    }
    if let Some(suggestion) = suggestion {
        context = context.with_suggestion(suggestion);
    }
    context
}
