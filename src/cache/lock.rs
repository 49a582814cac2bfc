//! Cross-process locks keyed by a destination path.
//!
//! A lock is a marker file at `<destination>.lock`, created with
//! `create_new` so exactly one process can own it. The marker holds a
//! [`LockRecord`] identifying the holder. While a [`Lease`] is alive a
//! heartbeat task refreshes the marker's mtime every `update` interval.
//!
//! Waiters poll with exponential backoff and never time out. A marker whose
//! mtime is older than `stale` belongs to a holder that crashed or hung, and
//! the waiter removes it and competes for the lock again.
//!
//! # Compromise
//!
//! The heartbeat checks the marker before each refresh. If it is missing,
//! names another holder, or was left unrefreshed for longer than `stale`,
//! the lease is compromised: its [`CancellationSignal`] flips to `true` and
//! the holder must stop writing immediately.
//!
//! # Async Safety
//!
//! Marker creation and stale checks run inside `spawn_blocking`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, warn};

use crate::config::LockConfig;
use crate::constants::{LOCK_SUFFIX, MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS};
use crate::core::{RelbinError, Result};

/// Contents of a lock marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    pub pid: u32,
    pub token: String,
    pub acquired_at: DateTime<Utc>,
}

/// Path of the lock marker guarding `destination`.
pub fn marker_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

/// Read-only view of a lease's compromise flag.
///
/// Cloned into every piece of code that writes under the lease.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
}

impl CancellationSignal {
    /// Whether the lease has been compromised.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the lease is compromised. Never resolves for a lease
    /// that is released cleanly.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Sender gone without ever flipping: the lease was released.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Acquires [`Lease`]s on destination paths.
#[derive(Debug, Clone)]
pub struct LockCoordinator {
    stale: Duration,
    update: Duration,
}

impl LockCoordinator {
    pub fn new(config: &LockConfig) -> Self {
        Self::with_timings(config.stale(), config.update())
    }

    pub const fn with_timings(stale: Duration, update: Duration) -> Self {
        Self { stale, update }
    }

    /// Block until the lock for `destination` is held.
    ///
    /// There is no timeout: a live holder keeps its marker fresh, and a dead
    /// one stops doing so and is broken after `stale`.
    pub async fn acquire(&self, destination: &Path) -> Result<Lease> {
        let marker = marker_path(destination);
        if let Some(parent) = marker.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RelbinError::file_system("create lock directory", parent, e))?;
        }

        let record = LockRecord {
            pid: std::process::id(),
            token: uuid::Uuid::new_v4().to_string(),
            acquired_at: Utc::now(),
        };

        debug!(marker = %marker.display(), "Waiting for lock");
        let start = Instant::now();

        // 10ms, 100ms, then capped at 500ms
        let mut backoff = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS));

        loop {
            let attempt_marker = marker.clone();
            let attempt_record = record.clone();
            let stale = self.stale;
            let acquired = tokio::task::spawn_blocking(move || {
                try_acquire(&attempt_marker, &attempt_record, stale)
            })
            .await
            .map_err(|e| {
                RelbinError::file_system(
                    "acquire lock",
                    &marker,
                    std::io::Error::other(e.to_string()),
                )
            })??;

            if acquired {
                debug!(
                    marker = %marker.display(),
                    wait_ms = start.elapsed().as_millis(),
                    "Lock acquired"
                );
                return Ok(Lease::start(marker, record.token, self.stale, self.update));
            }

            let delay =
                backoff.next().unwrap_or_else(|| Duration::from_millis(MAX_BACKOFF_DELAY_MS));
            tokio::time::sleep(delay).await;
        }
    }
}

/// One attempt at creating the marker. Breaks a stale marker and reports
/// `false` so the caller retries.
fn try_acquire(marker: &Path, record: &LockRecord, stale: Duration) -> Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(marker) {
        Ok(mut file) => {
            let content = serde_json::to_vec(record).map_err(|e| {
                RelbinError::file_system("write lock marker", marker, std::io::Error::other(e))
            })?;
            file.write_all(&content)
                .and_then(|()| file.sync_all())
                .map_err(|e| RelbinError::file_system("write lock marker", marker, e))?;
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            break_if_stale(marker, stale);
            Ok(false)
        }
        Err(e) => Err(RelbinError::file_system("create lock marker", marker, e)),
    }
}

fn marker_age(marker: &Path) -> Option<Duration> {
    let modified = fs::metadata(marker).and_then(|m| m.modified()).ok()?;
    // An mtime in the future counts as fresh.
    Some(SystemTime::now().duration_since(modified).unwrap_or(Duration::ZERO))
}

fn read_token(marker: &Path) -> Option<String> {
    let content = fs::read(marker).ok()?;
    serde_json::from_slice::<LockRecord>(&content).ok().map(|r| r.token)
}

fn break_if_stale(marker: &Path, stale: Duration) {
    let before = read_token(marker);
    let Some(age) = marker_age(marker) else {
        return;
    };
    if age <= stale {
        return;
    }
    // Only remove the marker we judged stale, not one a faster waiter
    // created in the meantime.
    if read_token(marker) != before {
        return;
    }

    match fs::remove_file(marker) {
        Ok(()) => warn!(
            marker = %marker.display(),
            age_ms = age.as_millis(),
            "Broke stale lock"
        ),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => debug!(marker = %marker.display(), error = %e, "Failed to break stale lock"),
    }
}

/// Why a heartbeat judged the lease compromised.
fn check_ownership(marker: &Path, token: &str, stale: Duration) -> std::result::Result<(), String> {
    let content = match fs::read(marker) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err("marker removed".to_string()),
        Err(e) => return Err(format!("marker unreadable: {e}")),
    };
    match serde_json::from_slice::<LockRecord>(&content) {
        Ok(record) if record.token == token => {}
        Ok(_) => return Err("marker owned by another holder".to_string()),
        Err(_) => return Err("marker overwritten".to_string()),
    }
    if let Some(age) = marker_age(marker) {
        if age > stale {
            return Err(format!("marker not refreshed for {}ms", age.as_millis()));
        }
    }
    Ok(())
}

fn touch(marker: &Path) -> std::io::Result<()> {
    File::options().write(true).open(marker)?.set_modified(SystemTime::now())
}

/// An exclusively held lock.
///
/// Dropping the lease releases it; [`Lease::release`] does the same
/// explicitly and may be called any number of times.
#[derive(Debug)]
pub struct Lease {
    marker: PathBuf,
    token: String,
    signal: CancellationSignal,
    heartbeat: Option<JoinHandle<()>>,
}

impl Lease {
    fn start(marker: PathBuf, token: String, stale: Duration, update: Duration) -> Self {
        let (tx, rx) = watch::channel(false);
        let heartbeat = tokio::spawn(heartbeat(marker.clone(), token.clone(), stale, update, tx));

        Self {
            marker,
            token,
            signal: CancellationSignal { rx },
            heartbeat: Some(heartbeat),
        }
    }

    /// A handle on this lease's compromise flag.
    pub fn signal(&self) -> CancellationSignal {
        self.signal.clone()
    }

    pub fn is_compromised(&self) -> bool {
        self.signal.is_cancelled()
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker
    }

    /// Stop the heartbeat and remove the marker if it is still ours.
    ///
    /// Never fails; problems are logged.
    pub fn release(&mut self) {
        let Some(heartbeat) = self.heartbeat.take() else {
            return;
        };
        heartbeat.abort();

        if read_token(&self.marker).as_deref() != Some(self.token.as_str()) {
            debug!(marker = %self.marker.display(), "Lock marker no longer ours, leaving it");
            return;
        }
        match fs::remove_file(&self.marker) {
            Ok(()) => debug!(marker = %self.marker.display(), "Lock released"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(marker = %self.marker.display(), error = %e, "Failed to remove lock marker")
            }
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.release();
    }
}

async fn heartbeat(
    marker: PathBuf,
    token: String,
    stale: Duration,
    update: Duration,
    tx: watch::Sender<bool>,
) {
    let mut interval = tokio::time::interval(update);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;

        let check_marker = marker.clone();
        let check_token = token.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            check_ownership(&check_marker, &check_token, stale)?;
            touch(&check_marker).map_err(|e| format!("marker refresh failed: {e}"))
        })
        .await
        .unwrap_or_else(|e| Err(format!("heartbeat task failed: {e}")));

        if let Err(reason) = outcome {
            warn!(marker = %marker.display(), %reason, "Lock compromised");
            let _ = tx.send(true);
            return;
        }
    }
}

impl From<&Lease> for RelbinError {
    fn from(lease: &Lease) -> Self {
        Self::LockCompromised {
            path: lease.marker.clone(),
        }
    }
}
