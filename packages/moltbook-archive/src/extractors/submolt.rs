//! Submolt extraction strategies.

use lazy_static::lazy_static;
use regex::Regex;

use super::context::{
    first_count, is_metadata_line, is_plausible_submolt, Window, MEMBER_COUNT_REGEX,
    SUBMOLT_MENTION_REGEX,
};
use super::{ExtractContext, Strategy, StrategyChain};
use crate::types::candidate::SubmoltCandidate;

lazy_static! {
    /// `[label](…/m/name)` or a bare community URL.
    static ref COMMUNITY_LINK_REGEX: Regex = Regex::new(concat!(
        r"\[(?P<label>[^\]\n]*)\]\([^)\s]*?/m/(?P<name>[A-Za-z0-9_-]{2,50})/?\)",
        r"|https?://[^\s<>()\[\]]*?/m/(?P<bare>[A-Za-z0-9_-]{2,50})\b",
    ))
    .unwrap();
}

/// Longest description kept, in characters.
const MAX_DESCRIPTION_LEN: usize = 500;

/// Strategies in priority order.
pub fn chain() -> StrategyChain<SubmoltCandidate> {
    StrategyChain::new().with(CommunityLink).with(Mention)
}

/// Links to `/m/<name>` pages, with member count and description when the
/// page renders a community card.
pub struct CommunityLink;

impl Strategy for CommunityLink {
    type Output = SubmoltCandidate;

    fn name(&self) -> &'static str {
        "community_link"
    }

    fn try_extract(&self, markdown: &str, _ctx: &ExtractContext) -> Vec<SubmoltCandidate> {
        let matches: Vec<_> = COMMUNITY_LINK_REGEX.captures_iter(markdown).collect();
        let mut out = Vec::new();

        for (i, caps) in matches.iter().enumerate() {
            let Some(whole) = caps.get(0) else { continue };
            let Some(name) = caps.name("name").or_else(|| caps.name("bare")) else {
                continue;
            };
            if !is_plausible_submolt(name.as_str()) {
                continue;
            }

            let lower = i
                .checked_sub(1)
                .and_then(|j| matches[j].get(0))
                .map(|m| m.end())
                .unwrap_or(0);
            let upper = matches
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(markdown.len());
            let window = Window::around(markdown, whole.start(), whole.end(), lower, upper);

            let mut submolt = SubmoltCandidate::new(name.as_str());

            let label = caps.name("label").map(|l| l.as_str()).unwrap_or_default();
            let count = first_count(&MEMBER_COUNT_REGEX, window.inline())
                .or_else(|| first_count(&MEMBER_COUNT_REGEX, label))
                .or_else(|| first_count(&MEMBER_COUNT_REGEX, first_line(window.following())));
            if let Some(count) = count {
                submolt = submolt.with_member_count(count);
            }

            if let Some(description) = description(window.following()) {
                submolt = submolt.with_description(description);
            }

            out.push(submolt);
        }

        out
    }
}

fn first_line(text: &str) -> &str {
    text.lines().find(|l| !l.trim().is_empty()).unwrap_or_default()
}

/// First prose line under a community card, when it directly follows.
fn description(following: &str) -> Option<String> {
    let line = following.lines().next()?.trim();
    if line.is_empty()
        || is_metadata_line(line)
        || line.contains("](")
        || (MEMBER_COUNT_REGEX.is_match(line) && line.split_whitespace().count() <= 3)
    {
        return None;
    }
    Some(line.chars().take(MAX_DESCRIPTION_LEN).collect())
}

/// `m/<name>` mentions outside of URLs.
pub struct Mention;

impl Strategy for Mention {
    type Output = SubmoltCandidate;

    fn name(&self) -> &'static str {
        "mention"
    }

    fn try_extract(&self, markdown: &str, _ctx: &ExtractContext) -> Vec<SubmoltCandidate> {
        SUBMOLT_MENTION_REGEX
            .captures_iter(markdown)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|name| is_plausible_submolt(name))
            .map(SubmoltCandidate::new)
            .collect()
    }
}
