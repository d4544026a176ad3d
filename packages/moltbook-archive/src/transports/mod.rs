//! Transport implementations for fetching page markdown.
//!
//! # Available Transports
//!
//! - `FirecrawlTransport` - Firecrawl scrape API (requires `firecrawl` feature)
//! - `MockSite` - For testing

mod mock;

#[cfg(feature = "firecrawl")]
mod firecrawl;

pub use mock::MockSite;

#[cfg(feature = "firecrawl")]
pub use firecrawl::FirecrawlTransport;

// Re-export from traits for convenience
pub use crate::traits::transport::{FetchedPage, Transport};
