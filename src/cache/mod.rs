//! On-disk version store for downloaded release binaries.
//!
//! # Cache Directory Structure
//!
//! ```text
//! <root>/
//! ├── v1.2.0/
//! │   ├── widget-linux-x64        # finalized, verified binary
//! │   ├── widget-linux-x64.dl     # pending artifact (only while downloading)
//! │   └── widget-linux-x64.lock   # lock marker (only while downloading)
//! ├── latest -> v1.2.0/widget-linux-x64
//! └── next-check                  # RFC 3339 refresh deadline
//! ```
//!
//! # Pointer Discipline
//!
//! `latest` is a relative symbolic link, replaced by renaming a freshly
//! created link over it. On Windows, where creating symlinks needs extra
//! privileges, it is a small text file holding `<tag>/<asset>` and is
//! replaced with an atomic write. Either way a reader sees the old target
//! or the new one.
//!
//! [`VersionStore::publish`] only runs once the binary has been renamed
//! into place, and it deletes the superseded release directory only after
//! the pointer has moved. A reader that followed the old pointer a moment
//! earlier may still see the old binary vanish, but never a pointer to a
//! missing or partial file.
//!
//! Finalized binaries are never modified after publication, so reading
//! them needs no lock.

pub mod lock;

pub use lock::{CancellationSignal, Lease, LockCoordinator};

use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::constants::{LATEST_POINTER, NEXT_CHECK_FILE};
use crate::core::{RelbinError, Result};

/// A published binary and the release it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBinary {
    pub tag: String,
    pub path: PathBuf,
}

/// Layout and pointer management of one cache root.
#[derive(Debug, Clone)]
pub struct VersionStore {
    root: PathBuf,
}

impl VersionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pointer_path(&self) -> PathBuf {
        self.root.join(LATEST_POINTER)
    }

    pub fn next_check_path(&self) -> PathBuf {
        self.root.join(NEXT_CHECK_FILE)
    }

    /// Final location of `asset` for release `tag`.
    ///
    /// Both names must be single, ordinary path components.
    pub fn entry_path(&self, tag: &str, asset: &str) -> Result<PathBuf> {
        validate_component("release tag", tag)?;
        validate_component("asset name", asset)?;
        if tag == LATEST_POINTER || tag == NEXT_CHECK_FILE {
            return Err(RelbinError::config(format!(
                "release tag '{tag}' collides with a reserved cache file"
            )));
        }
        Ok(self.root.join(tag).join(asset))
    }

    /// Whether the finalized binary for `tag` is already on disk.
    ///
    /// Presence alone counts: a file only reaches this path after passing
    /// verification.
    pub fn has_entry(&self, tag: &str, asset: &str) -> bool {
        self.entry_path(tag, asset).map(|path| path.is_file()).unwrap_or(false)
    }

    /// Point `latest` at the finalized binary of `tag`, then remove the
    /// release directory it pointed to before (best effort).
    pub fn publish(&self, tag: &str, asset: &str) -> Result<CachedBinary> {
        let path = self.entry_path(tag, asset)?;
        if !path.is_file() {
            return Err(RelbinError::file_system(
                "publish",
                &path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "binary is not finalized"),
            ));
        }

        let previous = self.read_pointer().map(|(previous_tag, _)| previous_tag);
        self.write_pointer(tag, asset)?;
        debug!(tag, asset, "Repointed latest");

        if let Some(previous) = previous {
            if previous != tag {
                self.remove_release(&previous);
            }
        }

        Ok(CachedBinary {
            tag: tag.to_string(),
            path,
        })
    }

    /// The binary `latest` points to, if the pointer exists and its target
    /// is present. A dangling pointer means "nothing cached".
    pub fn resolve_latest(&self) -> Option<CachedBinary> {
        let (tag, asset) = self.read_pointer()?;
        let path = self.entry_path(&tag, &asset).ok()?;
        if path.is_file() {
            Some(CachedBinary { tag, path })
        } else {
            debug!(pointer = %self.pointer_path().display(), "Pointer target missing");
            None
        }
    }

    fn remove_release(&self, tag: &str) {
        if validate_component("release tag", tag).is_err() {
            return;
        }
        let dir = self.root.join(tag);
        match fs::remove_dir_all(&dir) {
            Ok(()) => debug!(dir = %dir.display(), "Removed superseded release"),
            Err(e) => debug!(dir = %dir.display(), error = %e, "Could not remove superseded release"),
        }
    }

    /// `(tag, asset)` named by the pointer, whether or not the target exists.
    fn read_pointer(&self) -> Option<(String, String)> {
        let target = self.read_pointer_target()?;
        let mut components = target.components();
        let tag = match components.next()? {
            Component::Normal(tag) => tag.to_str()?.to_string(),
            _ => return None,
        };
        let asset = match components.next()? {
            Component::Normal(asset) => asset.to_str()?.to_string(),
            _ => return None,
        };
        if components.next().is_some() {
            return None;
        }
        Some((tag, asset))
    }

    #[cfg(unix)]
    fn read_pointer_target(&self) -> Option<PathBuf> {
        fs::read_link(self.pointer_path()).ok()
    }

    #[cfg(windows)]
    fn read_pointer_target(&self) -> Option<PathBuf> {
        let content = fs::read_to_string(self.pointer_path()).ok()?;
        Some(PathBuf::from(content.trim()))
    }

    #[cfg(unix)]
    fn write_pointer(&self, tag: &str, asset: &str) -> Result<()> {
        crate::utils::fs::replace_symlink(&Path::new(tag).join(asset), &self.pointer_path())
    }

    #[cfg(windows)]
    fn write_pointer(&self, tag: &str, asset: &str) -> Result<()> {
        crate::utils::fs::atomic_write(&self.pointer_path(), format!("{tag}/{asset}").as_bytes())
    }
}

fn validate_component(kind: &str, value: &str) -> Result<()> {
    let mut components = Path::new(value).components();
    let single = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
        && !value.contains(['/', '\\']);
    if single {
        Ok(())
    } else {
        Err(RelbinError::config(format!("{kind} '{value}' is not a plain file name")))
    }
}
