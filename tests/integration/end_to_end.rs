use crate::common::{ASSET, ReleaseServer, payload, scheduler, sha256_digest};
use relbin_cli::cache::VersionStore;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

#[tokio::test]
async fn test_empty_cache_to_published_binary() {
    relbin_cli::test_utils::init_test_logging(None);

    let server = ReleaseServer::start().await;
    let body = payload(1000);
    server.publish("v1", &body).await;
    let temp = TempDir::new().unwrap();

    let ensured = scheduler(&server.endpoint(), temp.path()).ensure_binary(ASSET).await.unwrap();

    let expected_path = temp.path().join("v1").join(ASSET);
    assert_eq!(ensured.binary.tag, "v1");
    assert_eq!(ensured.binary.path, expected_path);

    let on_disk = std::fs::read(&expected_path).unwrap();
    assert_eq!(on_disk.len(), 1000);
    assert_eq!(format!("sha256:{}", hex::encode(Sha256::digest(&on_disk))), sha256_digest(&body));

    let latest = VersionStore::new(temp.path()).resolve_latest().unwrap();
    assert_eq!(latest.path, expected_path);

    // No leftovers from the download
    assert!(!temp.path().join("v1").join(format!("{ASSET}.dl")).exists());
    assert!(!temp.path().join("v1").join(format!("{ASSET}.lock")).exists());
    assert!(temp.path().join("next-check").exists());
}

#[tokio::test]
async fn test_second_invocation_is_offline() {
    let server = ReleaseServer::start().await;
    server.publish("v1", &payload(1000)).await;
    let temp = TempDir::new().unwrap();

    scheduler(&server.endpoint(), temp.path()).ensure_binary(ASSET).await.unwrap();
    let after_first = server.request_count().await;
    assert_eq!(after_first, 2, "one metadata request and one asset request");

    let ensured = scheduler(&server.endpoint(), temp.path()).ensure_binary(ASSET).await.unwrap();
    assert!(ensured.refresh.is_none());
    assert_eq!(ensured.binary.tag, "v1");
    assert_eq!(server.request_count().await, after_first);
}

#[tokio::test]
async fn test_existing_entry_is_published_without_download() {
    let server = ReleaseServer::start().await;
    server.publish("v3", &payload(64)).await;
    let temp = TempDir::new().unwrap();

    // Finalized by an earlier run that crashed before repointing
    let store = VersionStore::new(temp.path());
    let entry = store.entry_path("v3", ASSET).unwrap();
    std::fs::create_dir_all(entry.parent().unwrap()).unwrap();
    std::fs::write(&entry, payload(64)).unwrap();

    let ensured = scheduler(&server.endpoint(), temp.path()).ensure_binary(ASSET).await.unwrap();
    assert_eq!(ensured.binary.tag, "v3");
    assert!(server.requests_to("/download").await.is_empty());
    assert_eq!(store.resolve_latest().unwrap().tag, "v3");
}

#[tokio::test]
async fn test_digest_without_algorithm_is_rejected() {
    let server = ReleaseServer::start().await;
    server.publish_with_digest("v1", &payload(10), Some("deadbeef")).await;
    let temp = TempDir::new().unwrap();

    let err = scheduler(&server.endpoint(), temp.path()).ensure_binary(ASSET).await.unwrap_err();
    assert!(matches!(err, relbin_cli::core::RelbinError::Config { .. }));
    assert!(server.requests_to("/download").await.is_empty());
    assert!(!temp.path().join("v1").join(format!("{ASSET}.lock")).exists());
}

#[tokio::test]
async fn test_release_without_digest_is_rejected() {
    let server = ReleaseServer::start().await;
    server.publish_with_digest("v1", &payload(10), None).await;
    let temp = TempDir::new().unwrap();

    let err = scheduler(&server.endpoint(), temp.path()).ensure_binary(ASSET).await.unwrap_err();
    match err {
        relbin_cli::core::RelbinError::Config { message } => {
            assert!(message.contains("has no digest"), "unexpected message: {message}");
        }
        other => panic!("expected a configuration error, got {other:?}"),
    }
    assert!(server.requests_to("/download").await.is_empty());
    assert!(!temp.path().join("v1").exists());
}
