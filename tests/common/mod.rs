//! Common test utilities and fixtures for relbin integration tests
//!
//! [`ReleaseServer`] is a wiremock server that answers the GitHub
//! latest-release endpoint and serves asset bodies with byte-range support.

// Allow dead code because these utilities are used across different test files
// and not all utilities are used in every test file
#![allow(dead_code)]

use relbin_cli::cache::{LockCoordinator, VersionStore};
use relbin_cli::config::HttpConfig;
use relbin_cli::download::ResumableDownloader;
use relbin_cli::http::HttpFetcher;
use relbin_cli::release::ReleaseResolver;
use relbin_cli::update::{UpdateConfig, UpdateScheduler};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const OWNER: &str = "acme";
pub const REPO: &str = "widget";
pub const ASSET: &str = "widget-test-asset";

/// Deterministic, non-repeating-looking payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + 7) % 251) as u8).collect()
}

/// `"sha256:<hex>"` of `bytes`.
pub fn sha256_digest(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// Serves a body, honoring `Range: bytes=<offset>-` like a real CDN.
pub struct RangedBody {
    body: Vec<u8>,
}

impl RangedBody {
    pub fn new(body: Vec<u8>) -> Self {
        Self { body }
    }
}

impl Respond for RangedBody {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let offset = request
            .headers
            .get("range")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("bytes="))
            .and_then(|value| value.strip_suffix('-'))
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(0);

        if offset == 0 {
            ResponseTemplate::new(200).set_body_bytes(self.body.clone())
        } else if offset < self.body.len() {
            ResponseTemplate::new(206).set_body_bytes(self.body[offset..].to_vec())
        } else {
            ResponseTemplate::new(416)
        }
    }
}

/// A fake GitHub API plus asset host.
pub struct ReleaseServer {
    pub server: MockServer,
}

impl ReleaseServer {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL to use as `api_url`.
    pub fn api_url(&self) -> String {
        self.server.uri()
    }

    pub fn endpoint(&self) -> String {
        format!("{}/repos/{OWNER}/{REPO}/releases/latest", self.server.uri())
    }

    pub fn asset_path(tag: &str) -> String {
        format!("/download/{tag}/{ASSET}")
    }

    /// Make `tag` the latest release, serving `body` as [`ASSET`].
    pub async fn publish(&self, tag: &str, body: &[u8]) {
        self.publish_with_digest(tag, body, Some(&sha256_digest(body))).await;
    }

    /// Like [`publish`](Self::publish) but with an arbitrary digest field;
    /// `None` is served as JSON `null`.
    pub async fn publish_with_digest(&self, tag: &str, body: &[u8], digest: Option<&str>) {
        self.server.reset().await;

        Mock::given(method("GET"))
            .and(path(format!("/repos/{OWNER}/{REPO}/releases/latest")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tag_name": tag,
                "name": format!("Widget {tag}"),
                "assets": [{
                    "name": ASSET,
                    "browser_download_url": format!("{}{}", self.server.uri(), Self::asset_path(tag)),
                    "digest": digest,
                }]
            })))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path(Self::asset_path(tag)))
            .respond_with(RangedBody::new(body.to_vec()))
            .mount(&self.server)
            .await;
    }

    /// Answer every request with `status`.
    pub async fn fail_with(&self, status: u16) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    pub async fn request_count(&self) -> usize {
        self.requests().await.len()
    }

    /// Requests whose path starts with `prefix`.
    pub async fn requests_to(&self, prefix: &str) -> Vec<Request> {
        self.requests().await.into_iter().filter(|r| r.url.path().starts_with(prefix)).collect()
    }
}

/// A scheduler wired like the CLI does it, with fast lock timings.
pub fn scheduler(endpoint: &str, root: &Path) -> UpdateScheduler {
    let fetcher = HttpFetcher::new(&HttpConfig::default()).expect("HTTP client");
    let resolver = ReleaseResolver::new(fetcher.clone(), endpoint, None);
    let downloader = ResumableDownloader::new(
        fetcher,
        LockCoordinator::with_timings(Duration::from_millis(1_000), Duration::from_millis(100)),
    );
    UpdateScheduler::new(resolver, downloader, VersionStore::new(root), &UpdateConfig::default())
}
