//! Data types for the archive: extracted candidates, stored records,
//! scrape jobs and configuration.

pub mod candidate;
pub mod config;
pub mod job;
pub mod record;
