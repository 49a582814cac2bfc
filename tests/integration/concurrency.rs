use crate::common::{ASSET, ReleaseServer, payload, scheduler};
use relbin_cli::cache::VersionStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::TempDir;

/// Independent schedulers share nothing but the cache directory, like
/// separate relbin processes.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invocations_download_once() {
    let server = ReleaseServer::start().await;
    let body = payload(200_000);
    server.publish("v1", &body).await;
    let temp = TempDir::new().unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let endpoint = server.endpoint();
        let root = temp.path().to_path_buf();
        handles.push(tokio::spawn(async move {
            scheduler(&endpoint, &root).ensure_binary(ASSET).await
        }));
    }

    for handle in handles {
        let ensured = handle.await.unwrap().unwrap();
        assert_eq!(ensured.binary.tag, "v1");
        assert_eq!(std::fs::read(&ensured.binary.path).unwrap(), body);
    }

    assert_eq!(server.requests_to("/download").await.len(), 1);
    assert!(!temp.path().join("v1").join(format!("{ASSET}.dl")).exists());
    assert!(!temp.path().join("v1").join(format!("{ASSET}.lock")).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pointer_only_ever_names_complete_binaries() {
    let server = ReleaseServer::start().await;
    let temp = TempDir::new().unwrap();

    let releases: Vec<(String, Vec<u8>)> =
        (1..=5).map(|i| (format!("v{i}"), payload(10_000 * i + i))).collect();
    let expected: Arc<HashMap<String, Vec<u8>>> = Arc::new(releases.iter().cloned().collect());

    let stop = Arc::new(AtomicBool::new(false));
    let complete_reads = Arc::new(AtomicUsize::new(0));

    let reader = {
        let store = VersionStore::new(temp.path());
        let expected = Arc::clone(&expected);
        let stop = Arc::clone(&stop);
        let complete_reads = Arc::clone(&complete_reads);
        tokio::task::spawn_blocking(move || {
            while !stop.load(Ordering::SeqCst) {
                let Some(latest) = store.resolve_latest() else {
                    continue;
                };
                // The superseded binary may be deleted between resolving
                // and reading; what was read must never be partial.
                if let Ok(bytes) = std::fs::read(&latest.path) {
                    assert_eq!(&bytes, &expected[&latest.tag], "partial read of {}", latest.tag);
                    complete_reads.fetch_add(1, Ordering::SeqCst);
                }
            }
        })
    };

    let scheduler = scheduler(&server.endpoint(), temp.path());
    for (tag, body) in &releases {
        server.publish(tag, body).await;
        let published = scheduler.refresh(ASSET).await.unwrap();
        assert_eq!(&published.tag, tag);
    }

    stop.store(true, Ordering::SeqCst);
    reader.await.unwrap();

    assert!(complete_reads.load(Ordering::SeqCst) > 0);
    let store = VersionStore::new(temp.path());
    assert_eq!(store.resolve_latest().unwrap().tag, "v5");
    for old in ["v1", "v2", "v3", "v4"] {
        assert!(!temp.path().join(old).exists(), "{old} should have been collected");
    }
}
