use crate::common::{ASSET, ReleaseServer, payload, scheduler};
use tempfile::TempDir;

#[tokio::test]
async fn test_resume_from_partial_artifact() {
    let server = ReleaseServer::start().await;
    let body = payload(1000);
    server.publish("v1", &body).await;

    let temp = TempDir::new().unwrap();
    let entry_dir = temp.path().join("v1");
    std::fs::create_dir_all(&entry_dir).unwrap();
    std::fs::write(entry_dir.join(format!("{ASSET}.dl")), &body[..637]).unwrap();

    let ensured = scheduler(&server.endpoint(), temp.path()).ensure_binary(ASSET).await.unwrap();
    assert_eq!(std::fs::read(&ensured.binary.path).unwrap(), body);

    let downloads = server.requests_to("/download").await;
    assert_eq!(downloads.len(), 1);
    let range = downloads[0].headers.get("range").unwrap().to_str().unwrap();
    assert_eq!(range, "bytes=637-");
}

#[tokio::test]
async fn test_failed_attempt_leaves_bytes_for_the_next_one() {
    let server = ReleaseServer::start().await;
    let body = payload(800);
    server.publish("v1", &body).await;

    let temp = TempDir::new().unwrap();
    let pending = temp.path().join("v1").join(format!("{ASSET}.dl"));
    std::fs::create_dir_all(pending.parent().unwrap()).unwrap();
    std::fs::write(&pending, &body[..300]).unwrap();

    // Asset host down: the metadata still resolves, the transfer fails
    server.publish("v1", &body).await;
    wiremock::Mock::given(wiremock::matchers::path(ReleaseServer::asset_path("v1")))
        .respond_with(wiremock::ResponseTemplate::new(502))
        .with_priority(1)
        .mount(&server.server)
        .await;

    let err = scheduler(&server.endpoint(), temp.path()).ensure_binary(ASSET).await.unwrap_err();
    assert!(err.is_resumable());
    assert_eq!(std::fs::read(&pending).unwrap(), &body[..300]);

    // Host back up: the next invocation continues at byte 300
    server.publish("v1", &body).await;
    // The deadline was pushed forward, but with nothing cached the call blocks anyway
    let ensured = scheduler(&server.endpoint(), temp.path()).ensure_binary(ASSET).await.unwrap();
    assert_eq!(std::fs::read(&ensured.binary.path).unwrap(), body);

    let downloads = server.requests_to("/download").await;
    let last = downloads.last().unwrap();
    assert_eq!(last.headers.get("range").unwrap().to_str().unwrap(), "bytes=300-");
}
