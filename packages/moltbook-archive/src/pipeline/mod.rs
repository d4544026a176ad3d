//! Scrape orchestration.
//!
//! One cycle: record the job, fetch pages through a
//! [`Transport`](crate::traits::transport::Transport), extract candidates,
//! reconcile them into storage, then record the job's outcome.

pub mod scrape;

pub use scrape::{ScrapeOutcome, Scraper};
