//! Mapping of the running platform to a release asset name.
//!
//! Assets are published as `<binary>-<os>-<arch>` with a `.exe` suffix on
//! Windows, e.g. `widget-linux-x64` or `widget-windows-arm64.exe`.

use crate::core::{RelbinError, Result};

/// Asset name for the running OS and architecture.
pub fn asset_name(binary: &str) -> Result<String> {
    asset_name_for(binary, std::env::consts::OS, std::env::consts::ARCH)
}

/// Asset name for an explicit OS/architecture pair.
///
/// `os` and `arch` use the values of [`std::env::consts::OS`] and
/// [`std::env::consts::ARCH`]. Combinations without a published asset are
/// rejected with [`RelbinError::UnsupportedPlatform`].
pub fn asset_name_for(binary: &str, os: &str, arch: &str) -> Result<String> {
    let unsupported = || RelbinError::UnsupportedPlatform {
        os: os.to_string(),
        arch: arch.to_string(),
    };

    let os_part = match os {
        "linux" => "linux",
        "macos" => "darwin",
        "windows" => "windows",
        _ => return Err(unsupported()),
    };
    let arch_part = match arch {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        _ => return Err(unsupported()),
    };
    let suffix = if os == "windows" { ".exe" } else { "" };

    Ok(format!("{binary}-{os_part}-{arch_part}{suffix}"))
}
