//! Scrape job record and its state machine.
//!
//! `pending → running → {completed | failed}`. Terminal states are final;
//! a failed job is never retried, callers create a new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{ArchiveError, Result};
use crate::types::candidate::FoundCounts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Pending or running.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(ArchiveError::storage_msg(format!(
                "unknown job status: {}",
                other
            ))),
        }
    }
}

/// What a scrape job covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeScope {
    /// Listing pages of the whole site
    Full,
    /// One community, `target_id` is its name
    Submolt,
    /// One agent profile, `target_id` is the username
    Agent,
}

impl ScrapeScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeScope::Full => "full",
            ScrapeScope::Submolt => "submolt",
            ScrapeScope::Agent => "agent",
        }
    }

    pub fn requires_target(&self) -> bool {
        !matches!(self, ScrapeScope::Full)
    }
}

impl fmt::Display for ScrapeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScrapeScope {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(ScrapeScope::Full),
            "submolt" => Ok(ScrapeScope::Submolt),
            "agent" => Ok(ScrapeScope::Agent),
            other => Err(ArchiveError::InvalidJob {
                reason: format!(
                    "invalid scope '{}'; must be one of: full, submolt, agent",
                    other
                ),
            }),
        }
    }
}

/// Counters written when a job completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Posts inserted or updated
    pub posts_scraped: usize,
    /// Agents inserted (directly or by referential completion)
    pub agents_discovered: usize,
    /// Submolts inserted
    pub submolts_discovered: usize,
    /// Comments inserted or updated
    pub comments_scraped: usize,
    /// Entities whose write was rejected
    pub write_failures: usize,
    /// Candidate counts before reconciliation
    pub found: FoundCounts,
}

/// Persisted state for one scrape cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub scope: ScrapeScope,
    pub target_id: Option<String>,
    pub summary: JobSummary,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScrapeJob {
    /// Create a new pending job.
    pub fn new(scope: ScrapeScope, target_id: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            status: JobStatus::Pending,
            scope,
            target_id,
            summary: JobSummary::default(),
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// `pending → running`.
    pub fn start(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(at);
        Ok(())
    }

    /// `running → completed`, recording the summary counters.
    pub fn complete(&mut self, summary: JobSummary, at: DateTime<Utc>) -> Result<()> {
        self.transition(JobStatus::Completed)?;
        self.summary = summary;
        self.completed_at = Some(at);
        Ok(())
    }

    /// `pending | running → failed`.
    pub fn fail(&mut self, message: impl Into<String>, at: DateTime<Utc>) -> Result<()> {
        self.transition(JobStatus::Failed)?;
        self.error_message = Some(message.into());
        self.completed_at = Some(at);
        Ok(())
    }

    fn transition(&mut self, to: JobStatus) -> Result<()> {
        let allowed = matches!(
            (self.status, to),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Failed)
        );
        if !allowed {
            return Err(ArchiveError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }
}
