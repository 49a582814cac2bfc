use crate::common::{ASSET, ReleaseServer, payload, scheduler};
use relbin_cli::cache::VersionStore;
use relbin_cli::core::RelbinError;
use tempfile::TempDir;

#[tokio::test]
async fn test_corrupt_prefix_is_discarded_and_never_published() {
    let server = ReleaseServer::start().await;
    let body = payload(1000);
    server.publish("v1", &body).await;

    let temp = TempDir::new().unwrap();
    let pending = temp.path().join("v1").join(format!("{ASSET}.dl"));
    std::fs::create_dir_all(pending.parent().unwrap()).unwrap();
    let mut corrupt = body[..500].to_vec();
    corrupt[42] ^= 0xFF;
    std::fs::write(&pending, &corrupt).unwrap();

    let err = scheduler(&server.endpoint(), temp.path()).ensure_binary(ASSET).await.unwrap_err();
    assert!(matches!(err, RelbinError::Integrity { .. }));
    assert!(!err.is_resumable());

    assert!(!pending.exists());
    assert!(!temp.path().join("v1").join(ASSET).exists());
    assert!(VersionStore::new(temp.path()).resolve_latest().is_none());

    // The retry starts over from zero and succeeds
    let ensured = scheduler(&server.endpoint(), temp.path()).ensure_binary(ASSET).await.unwrap();
    assert_eq!(std::fs::read(&ensured.binary.path).unwrap(), body);
    let downloads = server.requests_to("/download").await;
    let range = downloads.last().unwrap().headers.get("range").unwrap();
    assert_eq!(range.to_str().unwrap(), "bytes=0-");
}

#[tokio::test]
async fn test_wrong_published_digest_is_rejected() {
    let server = ReleaseServer::start().await;
    let body = payload(256);
    let wrong = crate::common::sha256_digest(b"something else");
    server.publish_with_digest("v1", &body, Some(&wrong)).await;

    let temp = TempDir::new().unwrap();
    let err = scheduler(&server.endpoint(), temp.path()).ensure_binary(ASSET).await.unwrap_err();

    match err {
        RelbinError::Integrity { expected, .. } => assert_eq!(expected, wrong),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!temp.path().join("v1").join(ASSET).exists());
}
