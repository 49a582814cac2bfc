//! File system helpers for the cache layout.
//!
//! Everything here is synchronous; async callers either run these on a
//! blocking thread or accept the short stall for tiny files such as the
//! next-check deadline.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::core::{RelbinError, Result};

/// Create `path` and all of its parents.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| RelbinError::file_system("create directory", path, e))
}

/// Atomically write `content` to `path`.
///
/// The bytes go to a uniquely named temporary file in the same directory,
/// are synced to disk, and the temporary file is renamed over `path`.
/// Readers therefore see either the old content or the new content.
/// Unique temporary names keep concurrent writers from different processes
/// out of each other's way; the last rename wins.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| RelbinError::file_system("create temp file", parent, e))?;
    temp.write_all(content)
        .map_err(|e| RelbinError::file_system("write temp file", temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| RelbinError::file_system("sync temp file", temp.path(), e))?;

    temp.persist(path).map_err(|e| RelbinError::file_system("rename temp file", path, e.error))?;
    Ok(())
}

/// Add the executable bits to `path`. A no-op on Windows, where the file
/// extension decides.
pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)
            .map_err(|e| RelbinError::file_system("read permissions", path, e))?
            .permissions();
        perms.set_mode(perms.mode() | 0o755);
        fs::set_permissions(path, perms)
            .map_err(|e| RelbinError::file_system("set permissions", path, e))?;
    }

    #[cfg(windows)]
    {
        let _ = path;
    }

    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub fn remove_file_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RelbinError::file_system("remove file", path, e)),
    }
}

/// Point the symbolic link at `link` to `target`, replacing any existing link
/// atomically.
///
/// The new link is created under a temporary name next to `link` and then
/// renamed over it, so `link` never stops resolving in between.
#[cfg(unix)]
pub fn replace_symlink(target: &Path, link: &Path) -> Result<()> {
    let parent = link.parent().unwrap_or_else(|| Path::new("."));
    let temp_link = parent.join(format!(".latest-{}", uuid::Uuid::new_v4()));

    std::os::unix::fs::symlink(target, &temp_link)
        .map_err(|e| RelbinError::file_system("create symlink", &temp_link, e))?;

    if let Err(e) = fs::rename(&temp_link, link) {
        let _ = fs::remove_file(&temp_link);
        return Err(RelbinError::file_system("replace symlink", link, e));
    }
    Ok(())
}
