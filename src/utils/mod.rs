//! Cross-platform utilities
//!
//! - [`fs`] - Atomic writes, executable bits and symlink replacement
//! - [`platform`] - Mapping of the running OS/architecture to an asset name

pub mod fs;
pub mod platform;

pub use fs::{atomic_write, ensure_dir, make_executable, remove_file_if_exists};
