//! Candidate entities produced by the extractors.
//!
//! Candidates are transient: they carry natural keys (usernames, submolt
//! names, post ids) rather than storage ids. Only reconciliation turns them
//! into durable records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A post found in scraped markdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostCandidate {
    /// Post id from the URL path, or a synthesized `synth-` id
    pub external_id: String,

    /// Non-empty title
    pub title: String,

    /// Body preview if one was rendered
    pub content: Option<String>,

    /// Canonical post URL if known
    pub url: Option<String>,

    pub upvotes: u32,
    pub downvotes: u32,
    pub comment_count: u32,

    /// Resolved from a relative time, when present
    pub posted_at: Option<DateTime<Utc>>,

    /// Lowercased author username
    pub agent_reference: Option<String>,

    /// Lowercased submolt name
    pub submolt_reference: Option<String>,
}

impl PostCandidate {
    /// Create a candidate with just the identifying fields.
    pub fn new(external_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            content: None,
            url: None,
            upvotes: 0,
            downvotes: 0,
            comment_count: 0,
            posted_at: None,
            agent_reference: None,
            submolt_reference: None,
        }
    }

    /// Set the author. The username is normalized to lowercase.
    pub fn with_agent(mut self, username: impl AsRef<str>) -> Self {
        self.agent_reference = Some(normalize_key(username.as_ref()));
        self
    }

    /// Set the submolt. The name is normalized to lowercase.
    pub fn with_submolt(mut self, name: impl AsRef<str>) -> Self {
        self.submolt_reference = Some(normalize_key(name.as_ref()));
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_votes(mut self, upvotes: u32, downvotes: u32) -> Self {
        self.upvotes = upvotes;
        self.downvotes = downvotes;
        self
    }

    pub fn with_comment_count(mut self, count: u32) -> Self {
        self.comment_count = count;
        self
    }

    pub fn with_posted_at(mut self, posted_at: DateTime<Utc>) -> Self {
        self.posted_at = Some(posted_at);
        self
    }

    /// Deterministic id for posts whose URL carries no post segment.
    ///
    /// Stable across re-scrapes as long as title, author and submolt are.
    pub fn synthesize_id(title: &str, agent: Option<&str>, submolt: Option<&str>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(title.trim().to_lowercase().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(agent.unwrap_or_default().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(submolt.unwrap_or_default().as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        format!("synth-{}", &digest[..16])
    }
}

/// An agent found in scraped markdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCandidate {
    /// Lowercased username
    pub username: String,

    /// Name as rendered, original casing
    pub display_name: Option<String>,
}

impl AgentCandidate {
    pub fn new(username: impl AsRef<str>) -> Self {
        Self {
            username: normalize_key(username.as_ref()),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// A submolt (community) found in scraped markdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmoltCandidate {
    /// Lowercased name
    pub name: String,

    /// Only set when the page rendered a member count
    pub member_count: Option<u32>,

    pub description: Option<String>,
}

impl SubmoltCandidate {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: normalize_key(name.as_ref()),
            member_count: None,
            description: None,
        }
    }

    pub fn with_member_count(mut self, count: u32) -> Self {
        self.member_count = Some(count);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A comment found in scraped markdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentCandidate {
    /// Content hash of (post, author, body); see [`CommentCandidate::new`]
    pub external_id: String,

    pub content: String,

    /// Lowercased author username
    pub agent_reference: Option<String>,

    /// External id of the parent post, when one precedes the comment
    pub post_reference: Option<String>,

    pub upvotes: u32,

    pub posted_at: Option<DateTime<Utc>>,
}

impl CommentCandidate {
    /// Create a comment candidate. The external id is derived from the
    /// parent post, author and body, so the same comment re-scraped maps to
    /// the same row.
    pub fn new(
        content: impl Into<String>,
        agent: Option<&str>,
        post_reference: Option<&str>,
    ) -> Self {
        let content = content.into();
        let agent_reference = agent.map(normalize_key);
        let post_reference = post_reference.map(str::to_string);

        let mut hasher = Sha256::new();
        hasher.update(post_reference.as_deref().unwrap_or_default().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(agent_reference.as_deref().unwrap_or_default().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(content.trim().as_bytes());
        let digest = format!("{:x}", hasher.finalize());

        Self {
            external_id: format!("comment-{}", &digest[..20]),
            content,
            agent_reference,
            post_reference,
            upvotes: 0,
            posted_at: None,
        }
    }

    pub fn with_upvotes(mut self, upvotes: u32) -> Self {
        self.upvotes = upvotes;
        self
    }

    pub fn with_posted_at(mut self, posted_at: DateTime<Utc>) -> Self {
        self.posted_at = Some(posted_at);
        self
    }
}

/// Everything extracted from one scrape cycle's markdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub posts: Vec<PostCandidate>,
    pub agents: Vec<AgentCandidate>,
    pub submolts: Vec<SubmoltCandidate>,
    pub comments: Vec<CommentCandidate>,
}

impl Extraction {
    /// Check if nothing was found.
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
            && self.agents.is_empty()
            && self.submolts.is_empty()
            && self.comments.is_empty()
    }

    /// Raw counts before reconciliation.
    pub fn counts(&self) -> FoundCounts {
        FoundCounts {
            posts: self.posts.len(),
            agents: self.agents.len(),
            submolts: self.submolts.len(),
            comments: self.comments.len(),
        }
    }
}

/// Raw candidate counts, reported separately from reconciled counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundCounts {
    pub posts: usize,
    pub agents: usize,
    pub submolts: usize,
    pub comments: usize,
}

/// Natural keys are case-insensitive; store them lowercased.
pub fn normalize_key(key: &str) -> String {
    key.trim().trim_start_matches('@').to_lowercase()
}
