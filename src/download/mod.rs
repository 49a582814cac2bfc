//! Resumable, lock-protected artifact downloads.
//!
//! [`ResumableDownloader::download`] moves through these phases:
//!
//! ```text
//! Idle -> LockAcquired -> Downloading -> Verifying -> Publishing -> Done
//!              \               \              \             \
//!               +---------------+--------------+-------------+--> Failed
//! ```
//!
//! Bytes land in a pending artifact (`<destination>.dl`) that survives
//! failures. The next attempt measures it and asks the server only for the
//! missing range. Each chunk is written at the absolute offset it belongs
//! to. The complete file is re-read from offset 0 and must match the
//! published digest before it is renamed to `destination`.
//!
//! | Failure | Pending artifact |
//! |---|---|
//! | network error | kept, resumable |
//! | lock compromised | kept, resumable |
//! | digest mismatch | deleted, next attempt restarts at 0 |
//!
//! The rename happens while the lease is still held, so no other process
//! can reopen the pending file between verification and publication.

pub mod verification;

use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::cache::lock::{CancellationSignal, Lease, LockCoordinator};
use crate::constants::PENDING_SUFFIX;
use crate::core::{RelbinError, Result};
use crate::http::HttpFetcher;
use crate::utils::fs::{make_executable, remove_file_if_exists};
use verification::{ExpectedDigest, compute_file_digest};

/// Phases of a single download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    LockAcquired,
    Downloading,
    Verifying,
    Publishing,
    Done,
    Failed,
}

impl DownloadPhase {
    /// Whether `self -> next` is a legal transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::LockAcquired)
                | (Self::LockAcquired, Self::Downloading)
                | (Self::Downloading, Self::Verifying)
                | (Self::Verifying, Self::Publishing)
                | (Self::Publishing, Self::Done)
                // Verification alone when a crash left a complete file behind
                | (Self::LockAcquired, Self::Verifying)
                | (
                    Self::LockAcquired
                        | Self::Downloading
                        | Self::Verifying
                        | Self::Publishing,
                    Self::Failed
                )
        )
    }
}

/// Outcome of a successful [`ResumableDownloader::download`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub destination: PathBuf,
    /// Bytes that were already on disk when the transfer started.
    pub resumed_from: u64,
    /// Bytes received over the network by this call.
    pub received: u64,
    /// The destination already existed; nothing was fetched.
    pub reused: bool,
}

impl DownloadReport {
    fn reused(destination: &Path) -> Self {
        Self {
            destination: destination.to_path_buf(),
            resumed_from: 0,
            received: 0,
            reused: true,
        }
    }
}

/// Path of the pending artifact for `destination`.
pub fn pending_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(PENDING_SUFFIX);
    PathBuf::from(name)
}

struct PhaseTracker<'a> {
    destination: &'a Path,
    phase: DownloadPhase,
}

impl<'a> PhaseTracker<'a> {
    const fn new(destination: &'a Path) -> Self {
        Self {
            destination,
            phase: DownloadPhase::Idle,
        }
    }

    fn advance(&mut self, next: DownloadPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal transition {:?} -> {next:?}",
            self.phase
        );
        debug!(
            destination = %self.destination.display(),
            from = ?self.phase,
            to = ?next,
            "Download phase"
        );
        self.phase = next;
    }
}

/// Downloads release assets into the cache.
#[derive(Clone)]
pub struct ResumableDownloader {
    fetcher: HttpFetcher,
    locks: LockCoordinator,
}

impl ResumableDownloader {
    pub fn new(fetcher: HttpFetcher, locks: LockCoordinator) -> Self {
        Self { fetcher, locks }
    }

    /// Download `url` to `destination`, verified against `expected`.
    ///
    /// Returns immediately without any network traffic if `destination`
    /// already exists.
    pub async fn download(
        &self,
        url: &str,
        destination: &Path,
        expected: &ExpectedDigest,
    ) -> Result<DownloadReport> {
        if destination.is_file() {
            debug!(destination = %destination.display(), "Already downloaded");
            return Ok(DownloadReport::reused(destination));
        }

        let mut tracker = PhaseTracker::new(destination);
        let mut lease = self.locks.acquire(destination).await?;
        tracker.advance(DownloadPhase::LockAcquired);

        // Whoever held the lock before us may have finished the job.
        if destination.is_file() {
            lease.release();
            return Ok(DownloadReport::reused(destination));
        }

        match self.download_locked(url, destination, expected, &lease, &mut tracker).await {
            Ok(report) => {
                lease.release();
                tracker.advance(DownloadPhase::Done);
                info!(
                    destination = %destination.display(),
                    resumed_from = report.resumed_from,
                    received = report.received,
                    "Download complete"
                );
                Ok(report)
            }
            Err(e) => {
                tracker.advance(DownloadPhase::Failed);
                lease.release();
                Err(e)
            }
        }
    }

    async fn download_locked(
        &self,
        url: &str,
        destination: &Path,
        expected: &ExpectedDigest,
        lease: &Lease,
        tracker: &mut PhaseTracker<'_>,
    ) -> Result<DownloadReport> {
        let pending = pending_path(destination);
        let mut signal = lease.signal();

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&pending)
            .await
            .map_err(|e| RelbinError::file_system("open pending artifact", &pending, e))?;
        let resumed_from = file
            .metadata()
            .await
            .map_err(|e| RelbinError::file_system("stat pending artifact", &pending, e))?
            .len();

        if resumed_from > 0 {
            debug!(pending = %pending.display(), resumed_from, "Resuming download");
        }

        let fetched = tokio::select! {
            () = signal.cancelled() => return Err(RelbinError::from(lease)),
            fetched = self.fetcher.fetch_range(url, resumed_from, HeaderMap::new()) => fetched,
        };
        let response = match fetched {
            Ok(response) => response,
            Err(e) if resumed_from > 0 => {
                // A crash between the last write and the rename leaves a
                // complete file that servers refuse to extend.
                drop(file);
                tracker.advance(DownloadPhase::Verifying);
                match verify(&pending, expected).await? {
                    Ok(()) => {
                        debug!(pending = %pending.display(), "Pending artifact was already complete");
                        self.publish(&pending, destination, lease, tracker)?;
                        return Ok(DownloadReport {
                            destination: destination.to_path_buf(),
                            resumed_from,
                            received: 0,
                            reused: false,
                        });
                    }
                    // Reaches the end of the asset yet fails verification:
                    // resuming can never repair it.
                    Err(actual) if matches!(e, RelbinError::RangeNotSatisfiable { .. }) => {
                        return Err(discard_corrupt(&pending, destination, expected, actual));
                    }
                    Err(_) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        };

        tracker.advance(DownloadPhase::Downloading);

        let mut offset = resumed_from;
        if resumed_from > 0 && response.status() == StatusCode::OK {
            warn!(url, "Server ignored the range request, restarting from zero");
            file.set_len(0)
                .await
                .map_err(|e| RelbinError::file_system("truncate pending artifact", &pending, e))?;
            offset = 0;
        }
        let start = offset;

        offset = write_stream(response, &mut file, &pending, offset, &mut signal, lease).await?;

        file.flush()
            .await
            .map_err(|e| RelbinError::file_system("flush pending artifact", &pending, e))?;
        file.sync_all()
            .await
            .map_err(|e| RelbinError::file_system("sync pending artifact", &pending, e))?;
        drop(file);

        tracker.advance(DownloadPhase::Verifying);
        if signal.is_cancelled() {
            return Err(RelbinError::from(lease));
        }
        if let Err(actual) = verify(&pending, expected).await? {
            return Err(discard_corrupt(&pending, destination, expected, actual));
        }

        self.publish(&pending, destination, lease, tracker)?;

        Ok(DownloadReport {
            destination: destination.to_path_buf(),
            resumed_from: start,
            received: offset - start,
            reused: false,
        })
    }

    fn publish(
        &self,
        pending: &Path,
        destination: &Path,
        lease: &Lease,
        tracker: &mut PhaseTracker<'_>,
    ) -> Result<()> {
        tracker.advance(DownloadPhase::Publishing);
        if lease.is_compromised() {
            return Err(RelbinError::from(lease));
        }

        make_executable(pending)?;
        std::fs::rename(pending, destination)
            .map_err(|e| RelbinError::file_system("publish download", destination, e))
    }
}

/// Consume the body, writing each chunk at its absolute offset. Returns
/// the offset after the last byte.
async fn write_stream(
    response: crate::http::FetchResponse,
    file: &mut File,
    pending: &Path,
    mut offset: u64,
    signal: &mut CancellationSignal,
    lease: &Lease,
) -> Result<u64> {
    let mut stream = std::pin::pin!(response.into_stream());

    loop {
        let next = tokio::select! {
            biased;
            () = signal.cancelled() => return Err(RelbinError::from(lease)),
            next = stream.next() => next,
        };
        let Some(chunk) = next else {
            return Ok(offset);
        };
        let chunk = chunk?;
        let bytes = chunk.as_ref();

        if signal.is_cancelled() {
            return Err(RelbinError::from(lease));
        }
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| RelbinError::file_system("seek pending artifact", pending, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| RelbinError::file_system("write pending artifact", pending, e))?;
        offset += bytes.len() as u64;
    }
}

/// Digest `path` on a blocking thread. `Ok(Err(actual))` on mismatch.
/// Delete a pending artifact that failed verification so the next attempt
/// starts from zero.
fn discard_corrupt(
    pending: &Path,
    destination: &Path,
    expected: &ExpectedDigest,
    actual: String,
) -> RelbinError {
    if let Err(e) = remove_file_if_exists(pending) {
        warn!(pending = %pending.display(), error = %e, "Failed to delete corrupt download");
    }
    let name = destination.file_name().unwrap_or(destination.as_os_str());
    RelbinError::Integrity {
        name: name.to_string_lossy().into_owned(),
        expected: expected.to_string(),
        actual: format!("{}:{actual}", expected.algorithm),
    }
}

async fn verify(path: &Path, expected: &ExpectedDigest) -> Result<std::result::Result<(), String>> {
    let owned = path.to_path_buf();
    let algorithm = expected.algorithm;
    let actual = tokio::task::spawn_blocking(move || compute_file_digest(&owned, algorithm))
        .await
        .map_err(|e| {
            RelbinError::file_system("verify download", path, std::io::Error::other(e.to_string()))
        })??;

    if expected.matches(&actual) {
        Ok(Ok(()))
    } else {
        Ok(Err(actual))
    }
}
