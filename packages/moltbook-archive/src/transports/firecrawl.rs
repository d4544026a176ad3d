//! Firecrawl-based transport implementation.
//!
//! Renders pages through the Firecrawl scrape API, which handles JavaScript
//! rendering and returns markdown plus the links found on the page.
//!
//! Requires the `firecrawl` feature to be enabled.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::{TransportError, TransportResult};
use crate::traits::transport::{FetchedPage, Transport};

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";

/// Firecrawl scrape API transport.
///
/// # Example
///
/// ```rust,ignore
/// use moltbook_archive::transports::FirecrawlTransport;
///
/// let transport = FirecrawlTransport::from_env()?;
/// let page = transport.fetch_page("https://www.moltbook.com/").await?;
/// ```
pub struct FirecrawlTransport {
    client: Client,
    api_key: SecretString,
    api_url: String,
    only_main_content: bool,
}

// Request/Response types for the Firecrawl API

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: [&'static str; 2],
    #[serde(rename = "onlyMainContent")]
    only_main_content: bool,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ScrapeData {
    markdown: Option<String>,
    #[serde(default)]
    links: Vec<String>,
    metadata: Option<PageMetadata>,
}

#[derive(Deserialize)]
struct PageMetadata {
    title: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl FirecrawlTransport {
    /// Create a new Firecrawl transport with the given API key.
    pub fn new(api_key: impl Into<String>) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| TransportError::Http(Box::new(e)))?;

        Ok(Self {
            client,
            api_key: SecretString::from(api_key.into()),
            api_url: FIRECRAWL_API_URL.to_string(),
            only_main_content: true,
        })
    }

    /// Create from environment variable `FIRECRAWL_API_KEY`.
    pub fn from_env() -> TransportResult<Self> {
        let api_key = std::env::var("FIRECRAWL_API_KEY").map_err(|_| TransportError::Api {
            status: 401,
            message: "FIRECRAWL_API_KEY environment variable not set".into(),
        })?;
        Self::new(api_key)
    }

    /// Point at a different API root (self-hosted Firecrawl).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    /// Keep navigation and sidebars in the markdown.
    pub fn with_full_page(mut self) -> Self {
        self.only_main_content = false;
        self
    }
}

/// Pull the API's own message out of an error body, falling back to the
/// raw text.
fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.trim().to_string()
            }
        })
}

#[async_trait]
impl Transport for FirecrawlTransport {
    async fn fetch_page(&self, url: &str) -> TransportResult<FetchedPage> {
        url::Url::parse(url).map_err(|_| TransportError::InvalidUrl {
            url: url.to_string(),
        })?;

        let request = ScrapeRequest {
            url,
            formats: ["markdown", "links"],
            only_main_content: self.only_main_content,
        };

        debug!(url = %url, "Firecrawl scrape");

        let response = self
            .client
            .post(format!("{}/scrape", self.api_url))
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        url: url.to_string(),
                    }
                } else {
                    TransportError::Http(Box::new(e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Api {
                status: status.as_u16(),
                message: api_error_message(status, &text),
            });
        }

        let body: ScrapeResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Http(Box::new(e)))?;

        if !body.success {
            return Err(TransportError::Api {
                status: status.as_u16(),
                message: body.error.unwrap_or_else(|| "scrape unsuccessful".into()),
            });
        }

        let data = body.data.ok_or_else(|| TransportError::EmptyContent {
            url: url.to_string(),
        })?;
        let markdown = data
            .markdown
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| TransportError::EmptyContent {
                url: url.to_string(),
            })?;

        Ok(FetchedPage {
            url: url.to_string(),
            markdown,
            links: data.links,
            title: data.metadata.and_then(|m| m.title),
            fetched_at: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "firecrawl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = ScrapeRequest {
            url: "https://www.moltbook.com/",
            formats: ["markdown", "links"],
            only_main_content: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "url": "https://www.moltbook.com/",
                "formats": ["markdown", "links"],
                "onlyMainContent": true
            })
        );
    }

    #[test]
    fn test_api_error_message() {
        let status = reqwest::StatusCode::PAYMENT_REQUIRED;
        assert_eq!(
            api_error_message(status, r#"{"success":false,"error":"Insufficient credits"}"#),
            "Insufficient credits"
        );
        assert_eq!(api_error_message(status, "upstream broke"), "upstream broke");
        assert_eq!(api_error_message(status, ""), "Payment Required");
    }

    #[test]
    fn test_response_parsing() {
        let body: ScrapeResponse = serde_json::from_str(
            r#"{"success":true,"data":{"markdown":"# Hi","links":["https://x.test/post/1"],"metadata":{"title":"Hi","sourceURL":"https://x.test"}}}"#,
        )
        .unwrap();
        let data = body.data.unwrap();
        assert_eq!(data.markdown.as_deref(), Some("# Hi"));
        assert_eq!(data.links.len(), 1);
        assert_eq!(data.metadata.unwrap().title.as_deref(), Some("Hi"));
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_request() {
        let transport = FirecrawlTransport::new("key").unwrap();
        let err = transport.fetch_page("not a url").await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl { .. }));
    }
}
