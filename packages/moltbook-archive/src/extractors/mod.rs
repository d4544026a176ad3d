//! Entity extraction from scraped markdown.
//!
//! Each entity kind has an ordered list of [`Strategy`] implementations,
//! highest precision first. A [`StrategyChain`] runs them in order and keeps
//! the first candidate seen for each identifying key, so a looser fallback
//! never overrides a structured match.
//!
//! Extraction never fails: malformed input yields fewer candidates.

pub mod agent;
pub mod comment;
pub mod context;
pub mod post;
pub mod submolt;

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

use crate::types::candidate::{
    AgentCandidate, CommentCandidate, Extraction, PostCandidate, SubmoltCandidate,
};

/// Prefix of the marker line the orchestrator places before each page.
pub const PAGE_BOUNDARY: &str = "<!-- moltbook-page:";

/// Inputs shared by every strategy in one extraction run.
#[derive(Debug, Clone, Copy)]
pub struct ExtractContext {
    /// Reference time for relative timestamps
    pub now: DateTime<Utc>,
}

impl ExtractContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

/// A candidate that may be deduplicated across strategies.
pub trait Candidate {
    /// Identifying key, or `None` when the kind has no natural key.
    fn dedup_key(&self) -> Option<&str>;
}

impl Candidate for PostCandidate {
    fn dedup_key(&self) -> Option<&str> {
        Some(&self.external_id)
    }
}

impl Candidate for AgentCandidate {
    fn dedup_key(&self) -> Option<&str> {
        Some(&self.username)
    }
}

impl Candidate for SubmoltCandidate {
    fn dedup_key(&self) -> Option<&str> {
        Some(&self.name)
    }
}

impl Candidate for CommentCandidate {
    fn dedup_key(&self) -> Option<&str> {
        None
    }
}

/// One extraction heuristic.
pub trait Strategy: Send + Sync {
    type Output: Candidate;

    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// All candidates this heuristic finds, in document order.
    fn try_extract(&self, markdown: &str, ctx: &ExtractContext) -> Vec<Self::Output>;
}

/// Ordered strategies for one candidate kind; first match wins per key.
pub struct StrategyChain<C> {
    strategies: Vec<Box<dyn Strategy<Output = C>>>,
}

impl<C: Candidate> StrategyChain<C> {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Append a strategy at the lowest priority.
    pub fn with(mut self, strategy: impl Strategy<Output = C> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Strategy names in priority order.
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, markdown: &str, ctx: &ExtractContext) -> Vec<C> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::new();

        for strategy in &self.strategies {
            let found = strategy.try_extract(markdown, ctx);
            let total = found.len();
            let mut kept = 0;

            for candidate in found {
                if let Some(key) = candidate.dedup_key() {
                    if !seen.insert(key.to_string()) {
                        continue;
                    }
                }
                kept += 1;
                out.push(candidate);
            }

            debug!(strategy = strategy.name(), found = total, kept, "Strategy pass");
        }

        out
    }
}

impl<C: Candidate> Default for StrategyChain<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract posts: structured listing blocks, then loose post links.
pub fn extract_posts(markdown: &str, now: DateTime<Utc>) -> Vec<PostCandidate> {
    post::chain().run(markdown, &ExtractContext::new(now))
}

/// Extract agents: profile links, `u/` mentions, then author markers.
pub fn extract_agents(markdown: &str, now: DateTime<Utc>) -> Vec<AgentCandidate> {
    agent::chain().run(markdown, &ExtractContext::new(now))
}

/// Extract submolts: community links, then `m/` mentions.
pub fn extract_submolts(markdown: &str, now: DateTime<Utc>) -> Vec<SubmoltCandidate> {
    submolt::chain().run(markdown, &ExtractContext::new(now))
}

/// Extract comments: threaded headers, then comment lists.
pub fn extract_comments(markdown: &str, now: DateTime<Utc>) -> Vec<CommentCandidate> {
    comment::chain().run(markdown, &ExtractContext::new(now))
}

/// Run every extractor over the same markdown.
pub fn extract_all(markdown: &str, now: DateTime<Utc>) -> Extraction {
    let extraction = Extraction {
        posts: extract_posts(markdown, now),
        agents: extract_agents(markdown, now),
        submolts: extract_submolts(markdown, now),
        comments: extract_comments(markdown, now),
    };

    let counts = extraction.counts();
    debug!(
        posts = counts.posts,
        agents = counts.agents,
        submolts = counts.submolts,
        comments = counts.comments,
        "Extraction complete"
    );

    extraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use super::Strategy;

    struct Fixed(&'static str, Vec<&'static str>);

    impl Strategy for Fixed {
        type Output = AgentCandidate;

        fn name(&self) -> &'static str {
            self.0
        }

        fn try_extract(&self, _: &str, _: &ExtractContext) -> Vec<AgentCandidate> {
            self.1
                .iter()
                .map(|u| AgentCandidate::new(u).with_display_name(self.0))
                .collect()
        }
    }

    #[test]
    fn test_chain_first_match_wins() {
        let chain = StrategyChain::new()
            .with(Fixed("first", vec!["alpha", "beta"]))
            .with(Fixed("second", vec!["Beta", "gamma", "gamma"]));

        let out = chain.run("", &ExtractContext::new(Utc::now()));
        let names: Vec<_> = out.iter().map(|a| a.username.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
        assert_eq!(out[1].display_name.as_deref(), Some("first"));
        assert_eq!(chain.names(), vec!["first", "second"]);
    }

    #[test]
    fn test_unkeyed_candidates_are_all_kept() {
        struct Twice;
        impl Strategy for Twice {
            type Output = CommentCandidate;
            fn name(&self) -> &'static str {
                "twice"
            }
            fn try_extract(&self, _: &str, _: &ExtractContext) -> Vec<CommentCandidate> {
                vec![
                    CommentCandidate::new("same", Some("bot"), None),
                    CommentCandidate::new("same", Some("bot"), None),
                ]
            }
        }

        let out = StrategyChain::new()
            .with(Twice)
            .run("", &ExtractContext::new(Utc::now()));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_extract_all_empty() {
        assert!(extract_all("", Utc::now()).is_empty());
    }

    proptest! {
        #[test]
        fn extraction_never_panics(input in "\\PC{0,400}") {
            let _ = extract_all(&input, Utc::now());
        }

        #[test]
        fn extraction_survives_markdown_soup(
            parts in proptest::collection::vec(
                prop_oneof![
                    Just("[".to_string()),
                    Just("](".to_string()),
                    Just(")".to_string()),
                    Just("**".to_string()),
                    Just("\n## ".to_string()),
                    Just("u/".to_string()),
                    Just("m/".to_string()),
                    Just("▲".to_string()),
                    Just("▼".to_string()),
                    Just("💬".to_string()),
                    Just("/post/".to_string()),
                    Just("https://x.test".to_string()),
                    Just(" by ".to_string()),
                    Just("é".to_string()),
                    "[a-z0-9_]{1,8}",
                ],
                0..80,
            )
        ) {
            let input = parts.concat();
            let _ = extract_all(&input, Utc::now());
        }
    }
}
