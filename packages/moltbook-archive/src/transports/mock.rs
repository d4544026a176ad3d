//! Mock transport for testing.
//!
//! Serves canned markdown pages and scripted failures without touching the
//! network.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{TransportError, TransportResult};
use crate::traits::transport::{FetchedPage, Transport};

/// Mock of the Moltbook site.
///
/// # Example
///
/// ```rust
/// use moltbook_archive::transports::MockSite;
///
/// let site = MockSite::new()
///     .with_markdown("https://www.moltbook.com/", "# Home")
///     .with_failure("https://www.moltbook.com/m/broken", 503, "unavailable");
/// ```
#[derive(Default, Clone)]
pub struct MockSite {
    /// Canned pages indexed by URL
    pages: Arc<RwLock<HashMap<String, FetchedPage>>>,
    /// Scripted API failures indexed by URL
    failures: Arc<RwLock<HashMap<String, (u16, String)>>>,
    /// Requested URLs, in order
    fetch_calls: Arc<RwLock<Vec<String>>>,
}

impl MockSite {
    /// Create a new empty mock site.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page that will be returned for its URL.
    pub fn add_page(&self, page: FetchedPage) {
        let mut pages = self.pages.write().unwrap();
        pages.insert(page.url.clone(), page);
    }

    /// Add a page (builder pattern).
    pub fn with_page(self, page: FetchedPage) -> Self {
        self.add_page(page);
        self
    }

    /// Add a page with only markdown (builder pattern).
    pub fn with_markdown(self, url: &str, markdown: &str) -> Self {
        self.with_page(FetchedPage::new(url, markdown))
    }

    /// Make fetching `url` fail with an API error (builder pattern).
    pub fn with_failure(self, url: &str, status: u16, message: &str) -> Self {
        self.failures
            .write()
            .unwrap()
            .insert(url.to_string(), (status, message.to_string()));
        self
    }

    /// Get the number of fetches.
    pub fn fetch_call_count(&self) -> usize {
        self.fetch_calls.read().unwrap().len()
    }

    /// Get the URLs that were fetched, in order.
    pub fn fetch_calls(&self) -> Vec<String> {
        self.fetch_calls.read().unwrap().clone()
    }

    /// Clear all recorded calls.
    pub fn reset_calls(&self) {
        self.fetch_calls.write().unwrap().clear();
    }
}

#[async_trait]
impl Transport for MockSite {
    async fn fetch_page(&self, url: &str) -> TransportResult<FetchedPage> {
        self.fetch_calls.write().unwrap().push(url.to_string());

        if let Some((status, message)) = self.failures.read().unwrap().get(url).cloned() {
            return Err(TransportError::Api { status, message });
        }

        self.pages
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Api {
                status: 404,
                message: format!("no page at {}", url),
            })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
