//! Downloading source payloads.

use crate::error::{Error, Result};
use async_trait::async_trait;
use diagnostics::*;
use reqwest::Client;
use reqwest::Url;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Retrieves raw bytes for a URL.
///
/// Implementations must fail on any non-success response; there is no retry.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        cookies: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>>;
}

/// HTTP fetcher. Uses library default timeouts.
#[derive(Debug, Default)]
pub struct HttpFetcher;

impl HttpFetcher {
    pub fn new() -> Self {
        Self
    }

    /// GET `url` with the given headers and a cookie jar seeded with `cookies`.
    pub async fn fetch_with_custom_headers(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        cookies: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>> {
        let parsed = Url::parse(url).map_err(|e| Error::Config(format!("invalid URL {url}: {e}")))?;

        let jar = Arc::new(Jar::default());
        for (name, value) in cookies {
            jar.add_cookie_str(&format!("{name}={value}"), &parsed);
        }

        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("invalid value for header '{name}': {e}")))?;
            header_map.insert(name, value);
        }

        let transport = |source: reqwest::Error| Error::Transport {
            url: url.to_string(),
            source,
        };

        let client = Client::builder()
            .cookie_provider(jar)
            .default_headers(header_map)
            .build()
            .map_err(transport)?;

        debug!("GET {url}", url: url);
        let response = client.get(parsed).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        info!("Fetched {url} ({size} bytes)", url: url, size: body.len());
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        cookies: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>> {
        self.fetch_with_custom_headers(url, headers, cookies).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_config_error() {
        let none = BTreeMap::new();
        let err = HttpFetcher::new()
            .fetch("not a url", &none, &none)
            .await
            .expect_err("invalid url");
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_invalid_header_is_config_error() {
        let headers = BTreeMap::from([("Bad Header".to_string(), "x".to_string())]);
        let err = HttpFetcher::new()
            .fetch("http://127.0.0.1:9/x.csv", &headers, &BTreeMap::new())
            .await
            .expect_err("invalid header");
        assert!(matches!(err, Error::Config(_)));
    }
}
