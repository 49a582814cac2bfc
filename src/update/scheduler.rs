//! Deciding when to talk to the release endpoint.
//!
//! [`UpdateScheduler::ensure_binary`] always answers with a usable binary
//! as quickly as it can:
//!
//! | Cache | Deadline | Behavior |
//! |---|---|---|
//! | empty or dangling | any | schedule, then download synchronously; errors propagate |
//! | valid | in the future | return the cache, no network |
//! | valid | reached | schedule, refresh in the background, return the cache |
//!
//! Background refreshes swallow every error. The cached binary stays in
//! use and the next deadline brings another attempt, resuming whatever
//! bytes the failed one left on disk.

use chrono::Utc;
use std::ffi::OsStr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CachedBinary, VersionStore};
use crate::core::{RelbinError, Result};
use crate::download::ResumableDownloader;
use crate::download::verification::ExpectedDigest;
use crate::release::ReleaseResolver;
use crate::update::config::UpdateConfig;
use crate::update::deadline::NextCheckDeadline;

/// The binary to run, plus the background refresh if one was started.
#[derive(Debug)]
pub struct Ensured {
    pub binary: CachedBinary,
    /// Awaiting it is optional; it never fails.
    pub refresh: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct UpdateScheduler {
    resolver: ReleaseResolver,
    downloader: ResumableDownloader,
    store: VersionStore,
    deadline: NextCheckDeadline,
    interval: Duration,
}

impl UpdateScheduler {
    pub fn new(
        resolver: ReleaseResolver,
        downloader: ResumableDownloader,
        store: VersionStore,
        config: &UpdateConfig,
    ) -> Self {
        let deadline = NextCheckDeadline::new(store.next_check_path());
        Self {
            resolver,
            downloader,
            store,
            deadline,
            interval: config.refresh_interval(),
        }
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// Return a usable binary for `asset`, downloading or refreshing as the
    /// cache state and the deadline require.
    pub async fn ensure_binary(&self, asset: &str) -> Result<Ensured> {
        let cached = self
            .store
            .resolve_latest()
            .filter(|cached| cached.path.file_name() == Some(OsStr::new(asset)));

        let Some(cached) = cached else {
            info!(asset, "No cached binary, downloading latest release");
            self.schedule_next()?;
            let binary = self.refresh(asset).await?;
            return Ok(Ensured {
                binary,
                refresh: None,
            });
        };

        if !self.deadline.is_due(Utc::now()) {
            debug!(tag = %cached.tag, "Cache is fresh");
            return Ok(Ensured {
                binary: cached,
                refresh: None,
            });
        }

        if let Err(e) = self.schedule_next() {
            debug!(error = %e, "Failed to persist next check");
        }

        let scheduler = self.clone();
        let asset = asset.to_string();
        let refresh = tokio::spawn(async move {
            match scheduler.refresh(&asset).await {
                Ok(binary) => debug!(tag = %binary.tag, "Background refresh finished"),
                Err(e) => debug!(error = %e, "Background refresh failed"),
            }
        });

        Ok(Ensured {
            binary: cached,
            refresh: Some(refresh),
        })
    }

    /// Resolve the latest release, download its `asset` unless already
    /// cached, and publish it.
    pub async fn refresh(&self, asset: &str) -> Result<CachedBinary> {
        let release = self.resolver.resolve_latest().await?;
        let tag = release.tag.as_str();

        if !self.store.has_entry(tag, asset) {
            let record = release.require_asset(asset)?;
            let digest = record.digest.as_deref().ok_or_else(|| {
                RelbinError::config(format!("asset '{asset}' of release {tag} has no digest"))
            })?;
            let expected = ExpectedDigest::parse(digest)?;
            let destination = self.store.entry_path(tag, asset)?;

            self.downloader.download(&record.download_url, &destination, &expected).await?;
        }

        if let Some(current) = self.store.resolve_latest() {
            if current.tag == tag && current.path.file_name() == Some(OsStr::new(asset)) {
                return Ok(current);
            }
        }

        let binary = self.store.publish(tag, asset)?;
        info!(tag = %binary.tag, "Published release");
        Ok(binary)
    }

    fn schedule_next(&self) -> Result<()> {
        let next = chrono::Duration::from_std(self.interval)
            .ok()
            .and_then(|interval| Utc::now().checked_add_signed(interval))
            .ok_or_else(|| {
                RelbinError::config(format!(
                    "refresh interval of {}ms is out of range",
                    self.interval.as_millis()
                ))
            })?;
        self.deadline.schedule(next)
    }
}
