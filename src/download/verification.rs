//! Digest parsing and file verification.
//!
//! Release assets publish their digest as `"<algorithm>:<hex>"`. The
//! downloader parses it up front with [`ExpectedDigest::parse`] and, once
//! the pending artifact is complete, re-reads the file from offset 0 with
//! [`compute_file_digest`].

use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::constants::DIGEST_BUFFER_SIZE;
use crate::core::{RelbinError, Result};

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of the hex encoding of a digest of this algorithm.
    pub const fn hex_len(self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha384 => 96,
            Self::Sha512 => 128,
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = RelbinError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(RelbinError::config(format!("unsupported digest algorithm '{other}'"))),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The digest an artifact must match, with the hex normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDigest {
    pub algorithm: DigestAlgorithm,
    pub hex: String,
}

impl ExpectedDigest {
    pub fn new(algorithm: DigestAlgorithm, hex: impl AsRef<str>) -> Result<Self> {
        let hex = hex.as_ref().trim().to_ascii_lowercase();
        if hex.len() != algorithm.hex_len() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RelbinError::config(format!(
                "'{hex}' is not a valid {algorithm} digest"
            )));
        }
        Ok(Self { algorithm, hex })
    }

    /// Parse the `"<algorithm>:<hex>"` form published with release assets.
    pub fn parse(value: &str) -> Result<Self> {
        let (algorithm, hex) = value.split_once(':').ok_or_else(|| {
            RelbinError::config(format!("digest '{value}' is missing the ':' separator"))
        })?;
        Self::new(algorithm.parse()?, hex)
    }

    /// Whether `actual_hex` equals this digest, ignoring case.
    pub fn matches(&self, actual_hex: &str) -> bool {
        self.hex.eq_ignore_ascii_case(actual_hex)
    }
}

impl fmt::Display for ExpectedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// Hex digest of the full contents of `path`, read from offset 0.
///
/// Blocking; call from a blocking thread.
pub fn compute_file_digest(path: &Path, algorithm: DigestAlgorithm) -> Result<String> {
    let file = File::open(path).map_err(|e| RelbinError::file_system("open for digest", path, e))?;

    match algorithm {
        DigestAlgorithm::Sha256 => hash_reader::<Sha256>(file, path),
        DigestAlgorithm::Sha384 => hash_reader::<Sha384>(file, path),
        DigestAlgorithm::Sha512 => hash_reader::<Sha512>(file, path),
    }
}

fn hash_reader<D: Digest>(mut reader: impl Read, path: &Path) -> Result<String> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; DIGEST_BUFFER_SIZE];
    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|e| RelbinError::file_system("read for digest", path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
