//! Moltbook archive: turns rendered Moltbook pages into a durable record of
//! posts, agents, communities and comments.
//!
//! # Pipeline
//!
//! 1. A [`Transport`] renders pages to markdown
//! 2. [`extractors`] pull candidate entities out of the markdown with
//!    ordered strategy lists, never failing
//! 3. The [`Reconciler`] upserts candidates by natural key, creates agents
//!    and submolts that are referenced but unseen, and recounts aggregates
//! 4. The [`Scraper`] wraps the cycle in a persisted scrape job
//!
//! # Usage
//!
//! ```rust,ignore
//! use moltbook_archive::{MemoryStore, ScrapeRequest, Scraper};
//! use moltbook_archive::testing::{fixture_config, fixture_site};
//!
//! let scraper = Scraper::with_config(MemoryStore::new(), fixture_site(), fixture_config());
//! let outcome = scraper.run(&ScrapeRequest::full()).await?;
//! assert!(outcome.is_success());
//! ```
//!
//! # Modules
//!
//! - [`extractors`] - Markdown entity extraction
//! - [`reconcile`] - Candidate → record reconciliation
//! - [`pipeline`] - Scrape orchestration
//! - [`metrics`] - Text metrics
//! - [`timestamp`] - Relative time resolution
//! - [`fingerprint`] - Per-agent behavioral statistics
//! - [`traits`] - Storage and transport abstractions
//! - [`stores`] - Storage implementations (MemoryStore, SqliteStore)
//! - [`transports`] - Transport implementations (MockSite, FirecrawlTransport)
//! - [`testing`] - Page fixtures

pub mod error;
pub mod extractors;
pub mod fingerprint;
pub mod metrics;
pub mod pipeline;
pub mod reconcile;
pub mod stores;
pub mod testing;
pub mod timestamp;
pub mod traits;
pub mod transports;
pub mod types;

// Re-export core types at crate root
pub use error::{ArchiveError, Result, TransportError, TransportResult};
pub use extractors::{extract_all, ExtractContext, Strategy, StrategyChain};
pub use fingerprint::{fingerprint_for, BehavioralFingerprint};
pub use metrics::TextMetrics;
pub use pipeline::{ScrapeOutcome, Scraper};
pub use reconcile::{ReconcileReport, Reconciler};
pub use stores::MemoryStore;
pub use timestamp::resolve_relative;
pub use traits::{
    store::{AgentStore, ArchiveStore, CommentStore, JobStore, PostStore, SubmoltStore},
    transport::{FetchedPage, Transport},
};
pub use transports::MockSite;
pub use types::{
    candidate::{
        AgentCandidate, CommentCandidate, Extraction, FoundCounts, PostCandidate,
        SubmoltCandidate,
    },
    config::{ScrapeConfig, ScrapeRequest},
    job::{JobStatus, JobSummary, ScrapeJob, ScrapeScope},
    record::{AgentRecord, CommentRecord, PostRecord, SubmoltRecord, UpsertOutcome, Upserted},
};

#[cfg(feature = "sqlite")]
pub use stores::SqliteStore;

#[cfg(feature = "firecrawl")]
pub use transports::FirecrawlTransport;
