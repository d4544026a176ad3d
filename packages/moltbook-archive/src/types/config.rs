//! Configuration types for scraping.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, Result};
use crate::extractors::PAGE_BOUNDARY;
use crate::types::job::ScrapeScope;

/// Default site root.
pub const DEFAULT_BASE_URL: &str = "https://www.moltbook.com";

lazy_static! {
    static ref TARGET_ID_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap();
}

/// Configuration for a scrape cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Site root, without trailing slash.
    ///
    /// Default: `https://www.moltbook.com`.
    pub base_url: String,

    /// Paths fetched for a `full` scrape, relative to `base_url`.
    ///
    /// Default: `["/"]`.
    pub listing_paths: Vec<String>,

    /// Post detail pages to follow from discovered links.
    ///
    /// Detail pages carry comments and full bodies. Default: 0.
    pub max_post_pages: usize,

    /// Fail the whole job when any page fails to fetch.
    ///
    /// When false, failed pages are skipped as long as at least one page
    /// was fetched. Default: true.
    pub fail_on_page_error: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            listing_paths: vec!["/".to_string()],
            max_post_pages: 0,
            fail_on_page_error: true,
        }
    }
}

impl ScrapeConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the site root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Set the listing paths for full scrapes.
    pub fn with_listing_paths(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.listing_paths = paths.into_iter().map(|p| p.into()).collect();
        self
    }

    /// Follow up to `max` post detail pages.
    pub fn with_max_post_pages(mut self, max: usize) -> Self {
        self.max_post_pages = max;
        self
    }

    /// Skip pages that fail to fetch instead of failing the job.
    pub fn tolerate_page_errors(mut self) -> Self {
        self.fail_on_page_error = false;
        self
    }

    /// Join a path onto the base URL.
    pub fn page_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.is_empty() || path == "/" {
            format!("{}/", base)
        } else if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Marker line that precedes a page's markdown.
    pub fn boundary_for(&self, url: &str) -> String {
        format!("{} {} -->", PAGE_BOUNDARY, url)
    }
}

/// A caller's request for one scrape cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub scope: ScrapeScope,

    /// Submolt name or agent username for targeted scopes
    pub target_id: Option<String>,

    /// Explicit page URL, overrides the URL derived from scope and target
    pub url: Option<String>,
}

impl ScrapeRequest {
    /// Scrape the site's listing pages.
    pub fn full() -> Self {
        Self {
            scope: ScrapeScope::Full,
            target_id: None,
            url: None,
        }
    }

    /// Scrape one submolt.
    pub fn submolt(name: impl Into<String>) -> Self {
        Self {
            scope: ScrapeScope::Submolt,
            target_id: Some(name.into()),
            url: None,
        }
    }

    /// Scrape one agent's profile.
    pub fn agent(username: impl Into<String>) -> Self {
        Self {
            scope: ScrapeScope::Agent,
            target_id: Some(username.into()),
            url: None,
        }
    }

    /// Parse a scope string and target, as received from an API caller.
    pub fn parse(scope: &str, target_id: Option<String>) -> Result<Self> {
        let request = Self {
            scope: scope.parse()?,
            target_id,
            url: None,
        };
        request.validate()?;
        Ok(request)
    }

    /// Override the page URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Reject malformed requests before any work begins.
    pub fn validate(&self) -> Result<()> {
        match (&self.target_id, self.scope.requires_target()) {
            (None, true) => {
                return Err(ArchiveError::InvalidJob {
                    reason: "target_id is required for submolt or agent scope".into(),
                })
            }
            (Some(target), _) if !TARGET_ID_REGEX.is_match(target) => {
                return Err(ArchiveError::InvalidJob {
                    reason: format!("invalid target_id: '{}'", target),
                })
            }
            _ => {}
        }

        if let Some(raw) = &self.url {
            let parsed = url::Url::parse(raw).map_err(|e| ArchiveError::InvalidJob {
                reason: format!("invalid url '{}': {}", raw, e),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ArchiveError::InvalidJob {
                    reason: format!("unsupported url scheme: {}", parsed.scheme()),
                });
            }
        }

        Ok(())
    }

    /// Pages to fetch for this request, in order.
    pub fn target_urls(&self, config: &ScrapeConfig) -> Vec<String> {
        if let Some(url) = &self.url {
            return vec![url.clone()];
        }

        match (self.scope, self.target_id.as_deref()) {
            (ScrapeScope::Submolt, Some(name)) => {
                vec![config.page_url(&format!("/m/{}", name.to_lowercase()))]
            }
            (ScrapeScope::Agent, Some(username)) => {
                vec![config.page_url(&format!("/u/{}", username.to_lowercase()))]
            }
            _ => config
                .listing_paths
                .iter()
                .map(|path| config.page_url(path))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_scope_uses_listing_paths() {
        let config = ScrapeConfig::new()
            .with_base_url("https://molt.test/")
            .with_listing_paths(["/", "/new", "top"]);

        let urls = ScrapeRequest::full().target_urls(&config);
        assert_eq!(
            urls,
            vec![
                "https://molt.test/",
                "https://molt.test/new",
                "https://molt.test/top",
            ]
        );
    }

    #[test]
    fn test_targeted_scopes() {
        let config = ScrapeConfig::new().with_base_url("https://molt.test");

        assert_eq!(
            ScrapeRequest::submolt("AgentOps").target_urls(&config),
            vec!["https://molt.test/m/agentops"]
        );
        assert_eq!(
            ScrapeRequest::agent("researcher_bot").target_urls(&config),
            vec!["https://molt.test/u/researcher_bot"]
        );
    }

    #[test]
    fn test_explicit_url_overrides() {
        let config = ScrapeConfig::new();
        let request = ScrapeRequest::full().with_url("https://molt.test/post/abc");
        assert_eq!(request.target_urls(&config), vec!["https://molt.test/post/abc"]);
    }

    #[test]
    fn test_validation() {
        assert!(ScrapeRequest::full().validate().is_ok());
        assert!(ScrapeRequest::submolt("agentops").validate().is_ok());

        let missing_target = ScrapeRequest {
            scope: ScrapeScope::Agent,
            target_id: None,
            url: None,
        };
        assert!(matches!(
            missing_target.validate(),
            Err(ArchiveError::InvalidJob { .. })
        ));

        assert!(ScrapeRequest::submolt("../etc").validate().is_err());
        assert!(ScrapeRequest::full().with_url("not a url").validate().is_err());
        assert!(ScrapeRequest::full()
            .with_url("file:///etc/passwd")
            .validate()
            .is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_scope() {
        assert!(ScrapeRequest::parse("full", None).is_ok());
        assert!(ScrapeRequest::parse("submolt", None).is_err());
        assert!(ScrapeRequest::parse("planet", None).is_err());
    }

    #[test]
    fn test_boundary_marker() {
        let config = ScrapeConfig::new();
        assert_eq!(
            config.boundary_for("https://molt.test/"),
            "<!-- moltbook-page: https://molt.test/ -->"
        );
    }
}
