//! Transport trait for fetching rendered page markdown.
//!
//! A transport turns a URL into markdown plus the links found on the page.
//! How the page was rendered (headless browser, scrape API, fixture) is the
//! transport's business; the scraper only consumes the markdown.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransportResult;

/// One fetched page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedPage {
    /// URL that was requested
    pub url: String,

    /// Page rendered as markdown
    pub markdown: String,

    /// Absolute links discovered on the page
    #[serde(default)]
    pub links: Vec<String>,

    /// Page title if the transport reported one
    pub title: Option<String>,

    /// When the page was fetched
    pub fetched_at: DateTime<Utc>,
}

impl FetchedPage {
    /// Create a page with no links.
    pub fn new(url: impl Into<String>, markdown: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            markdown: markdown.into(),
            links: Vec::new(),
            title: None,
            fetched_at: Utc::now(),
        }
    }

    /// Set the discovered links.
    pub fn with_links(mut self, links: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.links = links.into_iter().map(|l| l.into()).collect();
        self
    }

    /// Set the page title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Check if the page has any markdown.
    pub fn has_content(&self) -> bool {
        !self.markdown.trim().is_empty()
    }

    /// Discovered links that point at post detail pages, in page order,
    /// without repeats.
    pub fn post_links(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.links
            .iter()
            .map(String::as_str)
            .filter(|link| is_post_url(link))
            .filter(|link| seen.insert(*link))
            .collect()
    }
}

/// Whether a URL points at a post detail page.
pub fn is_post_url(url: &str) -> bool {
    url::Url::parse(url)
        .map(|u| {
            let mut segments = u.path_segments().into_iter().flatten();
            matches!(segments.next(), Some("post" | "posts"))
                && segments.next().is_some_and(|id| !id.is_empty())
        })
        .unwrap_or(false)
}

/// Fetches page markdown for the scraper.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch one page as markdown.
    async fn fetch_page(&self, url: &str) -> TransportResult<FetchedPage>;

    /// Get the transport name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_links_filters_and_dedups() {
        let page = FetchedPage::new("https://molt.test/", "# Home").with_links([
            "https://molt.test/post/abc",
            "https://molt.test/u/someone",
            "https://molt.test/posts/def?sort=top",
            "https://molt.test/post/abc",
            "https://molt.test/post/",
            "not a url",
        ]);

        assert_eq!(
            page.post_links(),
            vec!["https://molt.test/post/abc", "https://molt.test/posts/def?sort=top"]
        );
    }

    #[test]
    fn test_has_content() {
        assert!(!FetchedPage::new("https://molt.test/", "  \n").has_content());
        assert!(FetchedPage::new("https://molt.test/", "hi").has_content());
    }
}
