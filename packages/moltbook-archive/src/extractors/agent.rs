//! Agent extraction strategies.

use lazy_static::lazy_static;
use regex::Regex;

use super::context::{is_plausible_username, AUTHOR_MARKER_REGEX, USER_MENTION_REGEX};
use super::{ExtractContext, Strategy, StrategyChain};
use crate::types::candidate::AgentCandidate;

lazy_static! {
    /// `[Display Name](…/u/name)` or a bare profile URL.
    static ref PROFILE_LINK_REGEX: Regex = Regex::new(concat!(
        r"\[(?P<label>[^\]\n]*)\]\([^)\s]*?/u/(?P<name>[A-Za-z0-9_-]{2,40})/?\)",
        r"|https?://[^\s<>()\[\]]*?/u/(?P<bare>[A-Za-z0-9_-]{2,40})\b",
    ))
    .unwrap();

    static ref LABEL_NOISE_REGEX: Regex = Regex::new(r"^\s*(?:u/|@)").unwrap();
}

/// Strategies in priority order.
pub fn chain() -> StrategyChain<AgentCandidate> {
    StrategyChain::new()
        .with(ProfileLink)
        .with(Mention)
        .with(AuthorMarker)
}

/// Links to `/u/<name>` profile pages. Carries display names.
pub struct ProfileLink;

impl Strategy for ProfileLink {
    type Output = AgentCandidate;

    fn name(&self) -> &'static str {
        "profile_link"
    }

    fn try_extract(&self, markdown: &str, _ctx: &ExtractContext) -> Vec<AgentCandidate> {
        PROFILE_LINK_REGEX
            .captures_iter(markdown)
            .filter_map(|caps| {
                let name = caps.name("name").or_else(|| caps.name("bare"))?.as_str();
                if !is_plausible_username(name) {
                    return None;
                }
                let mut agent = AgentCandidate::new(name);
                if let Some(display) = caps.name("label").and_then(|l| display_name(l.as_str())) {
                    agent = agent.with_display_name(display);
                }
                Some(agent)
            })
            .collect()
    }
}

/// A display name is only kept when it looks like a name, not a sentence.
fn display_name(label: &str) -> Option<String> {
    let cleaned = LABEL_NOISE_REGEX
        .replace(label, "")
        .replace("**", "")
        .trim()
        .to_string();
    let len = cleaned.chars().count();
    if len == 0 || len > 60 || cleaned.contains("](") {
        return None;
    }
    Some(cleaned)
}

/// `u/<name>` mentions outside of URLs.
pub struct Mention;

impl Strategy for Mention {
    type Output = AgentCandidate;

    fn name(&self) -> &'static str {
        "mention"
    }

    fn try_extract(&self, markdown: &str, _ctx: &ExtractContext) -> Vec<AgentCandidate> {
        USER_MENTION_REGEX
            .captures_iter(markdown)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|name| is_plausible_username(name))
            .map(AgentCandidate::new)
            .collect()
    }
}

/// "by <name>" author markers, filtered against common prose.
pub struct AuthorMarker;

impl Strategy for AuthorMarker {
    type Output = AgentCandidate;

    fn name(&self) -> &'static str {
        "author_marker"
    }

    fn try_extract(&self, markdown: &str, _ctx: &ExtractContext) -> Vec<AgentCandidate> {
        AUTHOR_MARKER_REGEX
            .captures_iter(markdown)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|name| is_plausible_username(name))
            .map(AgentCandidate::new)
            .collect()
    }
}
