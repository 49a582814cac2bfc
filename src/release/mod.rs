//! Release metadata lookup against the GitHub releases API.
//!
//! The resolver performs one GET against the latest-release endpoint and
//! exposes the raw asset records. Parsing the `digest` field is left to
//! [`crate::download::verification::ExpectedDigest`].

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::debug;

use crate::core::{RelbinError, Result};
use crate::http::HttpFetcher;

/// A published release; fetched fresh on every check and never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseMetadata {
    #[serde(rename = "tag_name")]
    pub tag: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// One downloadable file of a release.
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
    /// `"<algorithm>:<hex>"`, e.g. `"sha256:ab12..."`.
    #[serde(default)]
    pub digest: Option<String>,
}

impl ReleaseMetadata {
    /// Exact-name lookup of an asset.
    pub fn find_asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.name == name)
    }

    /// Like [`find_asset`](Self::find_asset) but fails with
    /// [`RelbinError::AssetNotFound`].
    pub fn require_asset(&self, name: &str) -> Result<&Asset> {
        self.find_asset(name).ok_or_else(|| RelbinError::AssetNotFound {
            asset: name.to_string(),
            tag: self.tag.clone(),
        })
    }
}

/// Queries a fixed latest-release endpoint.
#[derive(Clone)]
pub struct ReleaseResolver {
    fetcher: HttpFetcher,
    endpoint: String,
    token: Option<String>,
}

impl ReleaseResolver {
    pub fn new(fetcher: HttpFetcher, endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            fetcher,
            endpoint: endpoint.into(),
            token,
        }
    }

    /// Fetch the metadata of the latest release.
    pub async fn resolve_latest(&self) -> Result<ReleaseMetadata> {
        let release: ReleaseMetadata =
            self.fetcher.fetch_json(&self.endpoint, self.headers()?).await?;
        debug!(
            tag = %release.tag,
            assets = release.assets.len(),
            "Resolved latest release"
        );
        Ok(release)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        if let Some(token) = &self.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| RelbinError::config("GitHub token contains invalid characters"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}
