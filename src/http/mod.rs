//! Minimal HTTP fetcher built on `reqwest`.
//!
//! Every request goes through one [`HttpFetcher`], which owns a shared
//! `reqwest::Client` configured with the user agent and the redirect limit.
//! Failures of any kind (transport, redirect overflow, non-2xx/3xx status,
//! stream interruption, unparsable JSON) surface as
//! [`RelbinError::Network`], except a refused resume offset, which is
//! [`RelbinError::RangeNotSatisfiable`].

use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, RANGE};
use reqwest::{Client, StatusCode, redirect};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::HttpConfig;
use crate::core::{RelbinError, Result};

/// A response whose status has already been accepted.
pub struct FetchResponse {
    url: String,
    status: StatusCode,
    response: reqwest::Response,
}

impl FetchResponse {
    /// HTTP status of the final (post-redirect) response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The body as a stream of chunks; transport errors become network errors.
    pub fn into_stream(self) -> impl Stream<Item = Result<impl AsRef<[u8]> + Send>> + Send {
        let operation = format!("reading body of {}", self.url);
        self.response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| RelbinError::network(operation.clone(), e)))
    }

    /// Drain the body into a string.
    pub async fn text(self) -> Result<String> {
        let operation = format!("reading body of {}", self.url);
        self.response.text().await.map_err(|e| RelbinError::network(operation, e))
    }
}

/// Issues GET requests with redirect following and byte-range support.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    max_redirects: usize,
}

impl HttpFetcher {
    /// Build a fetcher from the HTTP section of the configuration.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| RelbinError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_redirects: config.max_redirects,
        })
    }

    /// GET `url`, following redirects; any 2xx/3xx final status is success.
    pub async fn fetch(&self, url: &str, headers: HeaderMap) -> Result<FetchResponse> {
        let response = self.send(url, headers).await?;
        let status = response.status();

        if !(status.is_success() || status.is_redirection()) {
            return Err(RelbinError::network(
                format!("GET {url}"),
                format!("unexpected status {status}"),
            ));
        }

        Ok(FetchResponse {
            url: url.to_string(),
            status,
            response,
        })
    }

    /// GET `url` starting at byte `offset`.
    ///
    /// Both `200 OK` (server ignored the range) and `206 Partial Content`
    /// are accepted; the caller inspects [`FetchResponse::status`] to tell
    /// them apart. `416` is reported as [`RelbinError::RangeNotSatisfiable`].
    pub async fn fetch_range(
        &self,
        url: &str,
        offset: u64,
        mut headers: HeaderMap,
    ) -> Result<FetchResponse> {
        let range = HeaderValue::from_str(&format!("bytes={offset}-"))
            .map_err(|e| RelbinError::network(format!("GET {url}"), e))?;
        headers.insert(RANGE, range);

        let response = self.send(url, headers).await?;
        let status = response.status();

        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Err(RelbinError::RangeNotSatisfiable {
                url: url.to_string(),
                offset,
            });
        }
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(RelbinError::network(
                format!("GET {url} (range from {offset})"),
                format!("unexpected status {status}"),
            ));
        }

        Ok(FetchResponse {
            url: url.to_string(),
            status,
            response,
        })
    }

    /// GET `url` and return the body as text.
    pub async fn fetch_text(&self, url: &str, headers: HeaderMap) -> Result<String> {
        self.fetch(url, headers).await?.text().await
    }

    /// GET `url` and parse the body as JSON.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str, headers: HeaderMap) -> Result<T> {
        let body = self.fetch_text(url, headers).await?;
        serde_json::from_str(&body)
            .map_err(|e| RelbinError::network(format!("GET {url}"), format!("invalid JSON: {e}")))
    }

    async fn send(&self, url: &str, headers: HeaderMap) -> Result<reqwest::Response> {
        debug!(url, "GET");

        self.client.get(url).headers(headers).send().await.map_err(|e| {
            if e.is_redirect() {
                RelbinError::network(
                    format!("GET {url}"),
                    format!("redirect limit ({}) exceeded", self.max_redirects),
                )
            } else {
                RelbinError::network(format!("GET {url}"), e)
            }
        })
    }
}
