//! Upstream HTTP access.
//!
//! A thin wrapper over a shared `reqwest` client with the quirks the
//! MacCMS ecosystem expects: query parameters merged into whatever query
//! the configured endpoint already carries, a randomized desktop
//! user-agent per request, and a best-effort same-host `Referer` echo of
//! the previous request.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use reqwest::header::{REFERER, USER_AGENT};
use url::Url;

use crate::error::{EngineError, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:122.0) Gecko/20100101 Firefox/122.0",
];

/// Outbound GET port. The engine only ever needs one operation; tests
/// substitute a scripted implementation.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch `uri` with `params` merged into its query string.
    ///
    /// Returns the body bytes on 2xx/3xx with a non-empty body, an empty
    /// buffer on any other status, and an error only on transport
    /// failure.
    async fn get(
        &self,
        uri: &str,
        params: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>>;
}

/// Merge `params` into the existing query of `base`, overwriting on key
/// collision. Existing pairs keep their relative order; new keys append.
pub fn build_url(base: &str, params: &[(&str, String)]) -> Result<String> {
    let mut url =
        Url::parse(base).map_err(|e| EngineError::Http(format!("bad url {base:?}: {e}")))?;
    if params.is_empty() {
        return Ok(url.into());
    }

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    for (key, value) in params {
        match pairs.iter_mut().find(|(k, _)| k == key) {
            Some(existing) => existing.1 = value.clone(),
            None => pairs.push((key.to_string(), value.clone())),
        }
    }

    url.query_pairs_mut().clear().extend_pairs(&pairs);
    Ok(url.into())
}

/// Production fetcher. The referer hint is scoped to the instance so
/// concurrent crawls only ever observe each other's hints best-effort.
pub struct HttpFetcher {
    client: reqwest::Client,
    last_url: Mutex<Option<Url>>,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher").finish_non_exhaustive()
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            last_url: Mutex::new(None),
        }
    }

    fn pick_user_agent() -> &'static str {
        let idx = rand::rng().random_range(0..USER_AGENTS.len());
        USER_AGENTS[idx]
    }

    fn referer_for(&self, target: &Url) -> Option<String> {
        let last = self.last_url.lock();
        match (last.as_ref().and_then(Url::host_str), target.host_str()) {
            (Some(prev), Some(cur)) if prev == cur => {
                last.as_ref().map(|u| u.as_str().to_string())
            }
            _ => None,
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get(
        &self,
        uri: &str,
        params: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>> {
        let target = build_url(uri, params)?;
        let url = Url::parse(&target).map_err(|e| EngineError::Http(e.to_string()))?;

        let mut request = self
            .client
            .get(url.clone())
            .header(USER_AGENT, Self::pick_user_agent());
        if let Some(referer) = self.referer_for(&url) {
            request = request.header(REFERER, referer);
        }
        if let Some(t) = timeout {
            request = request.timeout(t);
        }

        let response = request.send().await?;
        let status = response.status();
        let final_url = response.url().clone();
        let body = response.bytes().await?;

        *self.last_url.lock() = Some(final_url);

        if (status.is_success() || status.is_redirection()) && !body.is_empty() {
            Ok(body.to_vec())
        } else {
            tracing::warn!(url = %url, status = %status, "upstream returned unusable response");
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_url_appends_new_keys() {
        let out = build_url(
            "https://api.example.com/api.php/provide/vod/",
            &[("ac", "videolist".into()), ("pg", "2".into())],
        )
        .unwrap();
        assert_eq!(
            out,
            "https://api.example.com/api.php/provide/vod/?ac=videolist&pg=2"
        );
    }

    #[test]
    fn build_url_overwrites_existing_keys() {
        let out = build_url(
            "https://api.example.com/provide/?ac=list&at=json",
            &[("ac", "videolist".into()), ("h", "3".into())],
        )
        .unwrap();
        assert_eq!(
            out,
            "https://api.example.com/provide/?ac=videolist&at=json&h=3"
        );
    }

    #[test]
    fn build_url_without_params_is_identity() {
        let base = "https://api.example.com/provide/?ac=list";
        assert_eq!(build_url(base, &[]).unwrap(), base);
    }

    #[test]
    fn user_agent_pool_is_desktop_only() {
        assert!(!USER_AGENTS.is_empty());
        assert!(USER_AGENTS.iter().all(|ua| ua.starts_with("Mozilla/5.0")));
    }
}
