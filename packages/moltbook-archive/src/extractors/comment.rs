//! Comment extraction strategies.
//!
//! Comments have no natural key on the page, so the chain keeps every
//! candidate. Re-scrapes still converge because the candidate id is a hash
//! of parent post, author and body.

use lazy_static::lazy_static;
use regex::Regex;

use super::context::{
    first_count, is_metadata_line, is_plausible_username, page_segments, PageSegment,
    COMMENTS_HEADING_REGEX, POST_ID_REGEX, THREAD_HEADER_REGEX, VOTE_BLOCK_REGEX,
    VOTE_WORDS_REGEX,
};
use super::{ExtractContext, Strategy, StrategyChain};
use crate::timestamp::resolve_relative;
use crate::types::candidate::CommentCandidate;

/// Body lines kept per comment.
const MAX_COMMENT_LINES: usize = 40;

lazy_static! {
    static ref ANY_HEADING_REGEX: Regex = Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]").unwrap();

    /// `- **name**: body` or `- u/name: body`.
    static ref LIST_ITEM_REGEX: Regex = Regex::new(
        r"(?m)^[ \t]*[-*][ \t]+(?:\*\*)?(?:u/|@)?(?P<author>[A-Za-z0-9_-]{2,40})(?:\*\*)?[ \t]*:[ \t]*(?P<body>[^\n]+)$",
    )
    .unwrap();

    static ref BLOCK_END_REGEX: Regex = Regex::new(r"^(?:#{1,6}[ \t]|---+$|\*\*\*+$)").unwrap();
}

/// Strategies in priority order.
pub fn chain() -> StrategyChain<CommentCandidate> {
    StrategyChain::new().with(ThreadHeader).with(CommentList)
}

/// Parent post for a comment at `pos` in `segment`: the page's own post
/// id on a detail page, else the closest preceding post link.
fn parent_post<'a>(segment: &PageSegment<'a>, pos: usize) -> Option<&'a str> {
    segment.post_id().or_else(|| {
        POST_ID_REGEX
            .captures_iter(&segment.text[..pos])
            .filter_map(|c| c.get(1))
            .last()
            .map(|m| m.as_str())
    })
}

/// Threaded comments introduced by an author header line.
pub struct ThreadHeader;

impl Strategy for ThreadHeader {
    type Output = CommentCandidate;

    fn name(&self) -> &'static str {
        "thread_header"
    }

    fn try_extract(&self, markdown: &str, ctx: &ExtractContext) -> Vec<CommentCandidate> {
        let mut out = Vec::new();

        for segment in page_segments(markdown) {
            let text = segment.text;
            let headers: Vec<_> = THREAD_HEADER_REGEX.captures_iter(text).collect();

            for (i, caps) in headers.iter().enumerate() {
                let (Some(whole), Some(author)) = (caps.get(0), caps.name("author")) else {
                    continue;
                };
                if !is_plausible_username(author.as_str()) {
                    continue;
                }
                let meta = caps.name("meta").map(|m| m.as_str()).unwrap_or_default();

                let block_end = headers
                    .get(i + 1)
                    .and_then(|next| next.get(0))
                    .map(|m| m.start())
                    .unwrap_or(text.len());
                let block = &text[whole.end()..block_end];

                let Some(body) = comment_body(block) else {
                    continue;
                };

                let upvotes = first_count(&VOTE_BLOCK_REGEX, meta)
                    .or_else(|| first_count(&VOTE_WORDS_REGEX, meta))
                    .or_else(|| first_count(&VOTE_BLOCK_REGEX, block))
                    .or_else(|| first_count(&VOTE_WORDS_REGEX, block))
                    .unwrap_or(0);

                let mut comment = CommentCandidate::new(
                    body,
                    Some(author.as_str()),
                    parent_post(&segment, whole.start()),
                )
                .with_upvotes(upvotes);
                if let Some(posted_at) = resolve_relative(meta, ctx.now) {
                    comment = comment.with_posted_at(posted_at);
                }
                out.push(comment);
            }
        }

        out
    }
}

/// Body lines of one threaded comment, up to the next structural break.
fn comment_body(block: &str) -> Option<String> {
    let mut lines = Vec::new();
    for raw in block.lines() {
        let line = raw.trim_start_matches([' ', '\t', '>']).trim();
        if BLOCK_END_REGEX.is_match(line) {
            break;
        }
        if is_metadata_line(line) || is_action_line(line) {
            continue;
        }
        lines.push(line);
        if lines.len() >= MAX_COMMENT_LINES {
            break;
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Comment toolbars render as a row of short action words.
fn is_action_line(line: &str) -> bool {
    line.split(|c: char| c.is_whitespace() || c == '•' || c == '·' || c == '|')
        .filter(|w| !w.is_empty())
        .all(|w| {
            matches!(
                w.to_lowercase().as_str(),
                "reply" | "share" | "report" | "save" | "permalink" | "edit" | "delete"
            )
        })
}

/// Bulleted `name: body` items under a "Comments" heading.
pub struct CommentList;

impl Strategy for CommentList {
    type Output = CommentCandidate;

    fn name(&self) -> &'static str {
        "comment_list"
    }

    fn try_extract(&self, markdown: &str, _ctx: &ExtractContext) -> Vec<CommentCandidate> {
        let mut out = Vec::new();

        for segment in page_segments(markdown) {
            let text = segment.text;

            for heading in COMMENTS_HEADING_REGEX.find_iter(text) {
                let section_start = heading.end();
                let section_end = ANY_HEADING_REGEX
                    .find_at(text, section_start)
                    .map(|m| m.start())
                    .unwrap_or(text.len());
                let section = &text[section_start..section_end];

                for caps in LIST_ITEM_REGEX.captures_iter(section) {
                    let (Some(author), Some(body)) = (caps.name("author"), caps.name("body"))
                    else {
                        continue;
                    };
                    let body = body.as_str().trim();
                    if body.is_empty() || !is_plausible_username(author.as_str()) {
                        continue;
                    }
                    out.push(CommentCandidate::new(
                        body,
                        Some(author.as_str()),
                        parent_post(&segment, heading.start()),
                    ));
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::extract_comments;
    use chrono::{Duration, TimeZone, Utc};

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_threaded_comments_on_detail_page() {
        let md = "<!-- moltbook-page: https://www.moltbook.com/post/p-001 -->\n\
                  # Memory compaction tricks\n\n\
                  **u/helper_bot** • 2h ago\n\
                  Compaction is underrated.\n\
                  ▲ 5\n\
                  Reply • Share\n\n\
                  > **u/Researcher_Bot** • 1h ago\n\
                  > Agreed, thanks!\n";
        let comments = extract_comments(md, now());

        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].agent_reference.as_deref(), Some("helper_bot"));
        assert_eq!(comments[0].content, "Compaction is underrated.");
        assert_eq!(comments[0].upvotes, 5);
        assert_eq!(comments[0].post_reference.as_deref(), Some("p-001"));
        assert_eq!(comments[0].posted_at, Some(now() - Duration::hours(2)));

        assert_eq!(comments[1].agent_reference.as_deref(), Some("researcher_bot"));
        assert_eq!(comments[1].content, "Agreed, thanks!");
        assert_eq!(comments[1].upvotes, 0);
    }

    #[test]
    fn test_detail_page_post_beats_links_in_body() {
        let md = "<!-- moltbook-page: https://www.moltbook.com/post/p-001 -->\n\
                  # Memory compaction tricks\n\n\
                  Follow-up to [my older thread](https://www.moltbook.com/post/old-9).\n\n\
                  **u/helper_bot** • 2h ago\n\
                  Compaction is underrated.\n";
        let comments = extract_comments(md, now());

        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].post_reference.as_deref(), Some("p-001"));
    }

    #[test]
    fn test_comment_list_under_heading() {
        let md = "[Great idea](https://x.test/post/abc-123)\n\n\
                  ## Comments (2)\n\
                  - **alpha_bot**: love this\n\
                  - u/beta_bot: same here\n\n\
                  ## Related\n\
                  - **gamma_bot**: not a comment";
        let comments = extract_comments(md, now());

        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].content, "love this");
        assert_eq!(comments[0].post_reference.as_deref(), Some("abc-123"));
        assert_eq!(comments[1].agent_reference.as_deref(), Some("beta_bot"));
    }

    #[test]
    fn test_comment_without_parent_post() {
        let md = "u/lonely_bot • 5m ago\nanyone here?";
        let comments = extract_comments(md, now());

        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].post_reference, None);
    }

    #[test]
    fn test_header_without_body_is_dropped() {
        let md = "**u/empty_bot** • 3h ago\n▲ 2\nReply\n";
        assert!(extract_comments(md, now()).is_empty());
    }

    #[test]
    fn test_same_comment_twice_is_not_deduplicated() {
        let md = "u/echo_bot • 1h ago\nhello\n\nu/echo_bot • 1h ago\nhello\n";
        let comments = extract_comments(md, now());

        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].external_id, comments[1].external_id);
    }
}
