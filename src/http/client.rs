//! HTTP peer client.
//!
//! The outbound half of the pool protocol: one [`HttpClient`] per peer,
//! all sharing the pool's connection-pooling [`reqwest::Client`].

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::Url;

use crate::routing::peers::PeerGetter;

/// Per-request ceiling for peer fetches. A peer slower than this is
/// treated as failed and the caller falls back to its local loader.
const FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// Fetches values from one peer's pool endpoint.
pub struct HttpClient {
    base: String,
    http: reqwest::Client,
}

impl HttpClient {
    /// `base` is the peer's URL up to and including the pool base path,
    /// e.g. `http://10.0.0.2:8001/_peercache`.
    pub fn new(base: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base: base.into(),
            http,
        }
    }
}

/// Append group and key as percent-encoded path segments.
fn value_url(base: &str, group: &str, key: &str) -> anyhow::Result<Url> {
    let mut url =
        Url::parse(base).with_context(|| format!("invalid peer base url {base:?}"))?;
    url.path_segments_mut()
        .map_err(|()| anyhow::anyhow!("peer base url {base:?} cannot take paths"))?
        .push(group)
        .push(key);
    Ok(url)
}

#[async_trait]
impl PeerGetter for HttpClient {
    async fn fetch(&self, group: &str, key: &str) -> anyhow::Result<Vec<u8>> {
        let url = value_url(&self.base, group, key)?;

        let response = self
            .http
            .get(url.clone())
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("peer request {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("peer {url} answered {status}");
        }

        let body = response
            .bytes()
            .await
            .with_context(|| format!("reading peer response from {url}"))?;
        Ok(body.to_vec())
    }
}
