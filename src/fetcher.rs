//! HTTP GET abstraction shared by the updater and plugins.
//!
//! Everything network-bound goes through [`ContentFetcher`], so the updater
//! and the remote lookups can be pointed at a local test server.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::{HostError, Result};

/// Maximum response body size (10 MB).
const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Raw result of a GET request.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub status: u16,
    /// URL of the final response after redirects.
    pub final_url: String,
    /// True when the server redirected the request elsewhere.
    pub redirected: bool,
    pub body: Vec<u8>,
}

impl FetchedBody {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Perform a GET request. Non-2xx statuses are returned, not raised;
    /// only transport failures and invalid URLs are errors.
    async fn get(&self, url: &str) -> Result<FetchedBody>;
}

// ---------------------------------------------------------------------------
// URL validation
// ---------------------------------------------------------------------------

/// Validate that a URL is safe to fetch: it must parse and use http or https.
pub fn validate_url(url: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(url).map_err(|e| HostError::UnsupportedUrl {
        url: url.to_string(),
        reason: format!("Invalid URL: {e}"),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(HostError::UnsupportedUrl {
            url: url.to_string(),
            reason: format!("Scheme \"{scheme}\" is not allowed; use http or https"),
        }),
    }
}

// ---------------------------------------------------------------------------
// reqwest implementation
// ---------------------------------------------------------------------------

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| HostError::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_default_timeout() -> Result<Self> {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<FetchedBody> {
        let requested = validate_url(url)?;

        let response = self
            .client
            .get(requested.clone())
            .send()
            .await
            .map_err(|e| HostError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let redirected = final_url != requested;

        let body = response
            .bytes()
            .await
            .map_err(|e| HostError::Http(format!("Failed to read response body: {e}")))?;

        if body.len() > MAX_RESPONSE_BYTES {
            return Err(HostError::Http(format!(
                "Response body exceeds maximum size ({} bytes > {} bytes)",
                body.len(),
                MAX_RESPONSE_BYTES
            )));
        }

        debug!(%url, status, redirected, bytes = body.len(), "fetched");

        Ok(FetchedBody {
            status,
            final_url: final_url.to_string(),
            redirected,
            body: body.to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_allows_https() {
        assert!(validate_url("https://2004.lostcity.rs/serverlist").is_ok());
    }

    #[test]
    fn validate_allows_http() {
        assert!(validate_url("http://127.0.0.1:1234/plugins.json").is_ok());
    }

    #[test]
    fn validate_blocks_file_scheme() {
        let err = validate_url("file:///etc/passwd").unwrap_err();
        assert!(err.to_string().contains("not allowed"));
    }

    #[test]
    fn validate_rejects_invalid_url() {
        let err = validate_url("not a url").unwrap_err();
        assert!(err.to_string().contains("Invalid URL"));
    }

    #[test]
    fn fetched_body_helpers() {
        let body = FetchedBody {
            status: 200,
            final_url: "https://example.com/plugins.json".into(),
            redirected: false,
            body: br#"{"plugins":[]}"#.to_vec(),
        };
        assert!(body.is_success());
        assert_eq!(body.text(), r#"{"plugins":[]}"#);
    }

    #[tokio::test]
    async fn http_fetcher_reports_status_without_error() {
        let mut server = mockito::Server::new_async().await;
        let _missing = server
            .mock("GET", "/missing.js")
            .with_status(404)
            .create_async()
            .await;
        let _present = server
            .mock("GET", "/present.js")
            .with_status(200)
            .with_body("window.present = () => ({})")
            .create_async()
            .await;

        let fetcher = HttpFetcher::with_default_timeout().unwrap();

        let missing = fetcher.get(&format!("{}/missing.js", server.url())).await.unwrap();
        assert_eq!(missing.status, 404);
        assert!(!missing.is_success());

        let present = fetcher.get(&format!("{}/present.js", server.url())).await.unwrap();
        assert!(present.is_success());
        assert!(!present.redirected);
        assert_eq!(present.text(), "window.present = () => ({})");
    }

    #[tokio::test]
    async fn http_fetcher_detects_redirects() {
        let mut server = mockito::Server::new_async().await;
        let target = format!("{}/hiscores", server.url());
        let _redirect = server
            .mock("GET", "/hiscores/player/nobody")
            .with_status(302)
            .with_header("location", &target)
            .create_async()
            .await;
        let _landing = server
            .mock("GET", "/hiscores")
            .with_status(200)
            .with_body("<html></html>")
            .create_async()
            .await;

        let fetcher = HttpFetcher::with_default_timeout().unwrap();
        let body = fetcher
            .get(&format!("{}/hiscores/player/nobody", server.url()))
            .await
            .unwrap();
        assert!(body.redirected);
        assert_eq!(body.status, 200);
    }
}
