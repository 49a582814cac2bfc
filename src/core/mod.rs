//! Core types shared by every relbin component.
//!
//! Currently this is the error system: the typed [`RelbinError`] taxonomy the
//! update pipeline matches on, and [`ErrorContext`] / [`user_friendly_error`]
//! for presenting failures on the command line.
//!
//! # Propagation Policy
//!
//! - The blocking path (no cached binary yet) propagates every error: there
//!   is nothing to fall back to.
//! - The background refresh path swallows every error and keeps serving the
//!   cached binary; staleness is always preferred over failure.
//! - There is no in-process retry. The next invocation retries, reusing the
//!   bytes a previous attempt left in the pending artifact.

pub mod error;

pub use error::{ErrorContext, RelbinError, Result, user_friendly_error};
