//! Post extraction strategies.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use super::context::{
    author_marker, body_text, first_count, first_heading, first_mention, last_count,
    last_mention, page_segments, parse_count, select_title, PageSegment, TitleHints, Window,
    COMMENTS_HEADING_REGEX, COMMENT_COUNT_REGEX, DOWNVOTE_REGEX, POST_ID_REGEX,
    SUBMOLT_MENTION_REGEX, THREAD_HEADER_REGEX, USER_MENTION_REGEX, VOTE_BLOCK_REGEX,
    VOTE_WORDS_REGEX,
};
use super::{ExtractContext, Strategy, StrategyChain};
use crate::timestamp::resolve_relative;
use crate::types::candidate::PostCandidate;

lazy_static! {
    /// A full listing block: vote widget, submolt, author, title link, body
    /// preview and comment count.
    static ref LISTING_BLOCK_REGEX: Regex = Regex::new(concat!(
        r"▲\s*(?P<votes>-?[\d.,]+[kK]?)\s*▼\s*",
        r"m/(?P<submolt>[A-Za-z0-9_-]{2,50})[ \t]*[•·][ \t]*",
        r"Posted[ \t]+by[ \t]+u/(?P<author>[A-Za-z0-9_-]{2,40})(?P<meta>[^\n]*)\s*",
        r"\[(?P<label>[^\]\n]+)\]\((?P<url>[^)\s]+)\)",
        r"(?P<body>(?:[^\n▲💬]*\n){0,8}?)",
        r"[^\n▲💬]*?💬\s*(?P<comments>[\d.,]+[kK]?)",
    ))
    .unwrap();

    /// A markdown link to a post, or a bare post URL.
    static ref POST_ANCHOR_REGEX: Regex = Regex::new(concat!(
        r"\[(?P<label>[^\]\n]*)\]\((?P<url>[^)\s]*?/posts?/(?P<id>[A-Za-z0-9][A-Za-z0-9_-]*)[^)\s]*)\)",
        r"|(?P<bare>https?://[^\s<>()\[\]]*?/posts?/(?P<bare_id>[A-Za-z0-9][A-Za-z0-9_-]*))",
    ))
    .unwrap();

    /// `... Posted by u/name 3h ago` byline on a detail page.
    static ref BYLINE_REGEX: Regex = Regex::new(
        r"(?m)^[^\n]*\b[Pp]osted[ \t]+by[ \t]+u/(?P<author>[A-Za-z0-9_-]{2,40})(?P<meta>[^\n]*)$",
    )
    .unwrap();
}

/// Strategies in priority order.
pub fn chain() -> StrategyChain<PostCandidate> {
    StrategyChain::new()
        .with(DetailPage)
        .with(ListingBlock)
        .with(PostLink)
}

/// The post a detail page renders, keyed on the page URL.
///
/// Only pages that show the post's byline qualify; the full body runs from
/// the byline to the start of the comment thread.
pub struct DetailPage;

impl Strategy for DetailPage {
    type Output = PostCandidate;

    fn name(&self) -> &'static str {
        "detail_page"
    }

    fn try_extract(&self, markdown: &str, ctx: &ExtractContext) -> Vec<PostCandidate> {
        page_segments(markdown)
            .iter()
            .filter_map(|segment| detail_candidate(segment, ctx))
            .collect()
    }
}

fn detail_candidate(segment: &PageSegment<'_>, ctx: &ExtractContext) -> Option<PostCandidate> {
    let external_id = segment.post_id()?;
    let text = segment.text;

    let thread_start = [
        THREAD_HEADER_REGEX.find(text).map(|m| m.start()),
        COMMENTS_HEADING_REGEX.find(text).map(|m| m.start()),
    ]
    .into_iter()
    .flatten()
    .min()
    .unwrap_or(text.len());
    let head = &text[..thread_start];

    let byline = BYLINE_REGEX.captures(head)?;
    let whole = byline.get(0)?;
    let line = whole.as_str();
    let title = first_heading(&head[..whole.start()]).or_else(|| first_heading(head))?;

    let upvotes = first_count(&VOTE_BLOCK_REGEX, line)
        .or_else(|| first_count(&VOTE_WORDS_REGEX, line))
        .unwrap_or(0);
    let downvotes = first_count(&DOWNVOTE_REGEX, line).unwrap_or(0);
    let comment_count = first_count(&COMMENT_COUNT_REGEX, line)
        .unwrap_or_else(|| THREAD_HEADER_REGEX.find_iter(&text[thread_start..]).count() as u32);

    let mut post = PostCandidate::new(external_id, title)
        .with_agent(&byline["author"])
        .with_votes(upvotes, downvotes)
        .with_comment_count(comment_count);

    if let Some(url) = segment.url {
        post = post.with_url(url);
    }
    if let Some(submolt) = first_mention(&SUBMOLT_MENTION_REGEX, line) {
        post = post.with_submolt(submolt);
    }
    if let Some(content) = body_text(&head[whole.end()..], false) {
        post = post.with_content(content);
    }
    if let Some(posted_at) = resolve_relative(&byline["meta"], ctx.now) {
        post = post.with_posted_at(posted_at);
    }

    Some(post)
}

/// Captures a whole listing block at once.
pub struct ListingBlock;

impl Strategy for ListingBlock {
    type Output = PostCandidate;

    fn name(&self) -> &'static str {
        "listing_block"
    }

    fn try_extract(&self, markdown: &str, ctx: &ExtractContext) -> Vec<PostCandidate> {
        page_segments(markdown)
            .iter()
            .flat_map(|segment| LISTING_BLOCK_REGEX.captures_iter(segment.text))
            .filter_map(|caps| listing_candidate(&caps, ctx))
            .collect()
    }
}

fn listing_candidate(caps: &Captures<'_>, ctx: &ExtractContext) -> Option<PostCandidate> {
    let group = |name: &str| caps.name(name).map(|m| m.as_str()).unwrap_or_default();

    let hints = TitleHints {
        label: Some(group("label")),
        nearby: "",
    };
    let title = select_title(&hints)?;

    let url = group("url");
    let author = group("author");
    let submolt = group("submolt");
    let external_id = POST_ID_REGEX
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| {
            PostCandidate::synthesize_id(
                &title,
                Some(&author.to_lowercase()),
                Some(&submolt.to_lowercase()),
            )
        });

    let mut post = PostCandidate::new(external_id, title)
        .with_url(url)
        .with_agent(author)
        .with_submolt(submolt)
        .with_votes(parse_count(group("votes")).unwrap_or(0), 0)
        .with_comment_count(parse_count(group("comments")).unwrap_or(0));

    if let Some(content) = body_text(group("body"), false) {
        post = post.with_content(content);
    }
    if let Some(posted_at) = resolve_relative(group("meta"), ctx.now) {
        post = post.with_posted_at(posted_at);
    }

    Some(post)
}

/// Any post link, with fields scraped from the surrounding window.
pub struct PostLink;

struct Anchor<'a> {
    start: usize,
    end: usize,
    id: &'a str,
    label: Option<&'a str>,
    url: &'a str,
}

impl Strategy for PostLink {
    type Output = PostCandidate;

    fn name(&self) -> &'static str {
        "post_link"
    }

    fn try_extract(&self, markdown: &str, ctx: &ExtractContext) -> Vec<PostCandidate> {
        let mut out = Vec::new();

        for segment in page_segments(markdown) {
            let text = segment.text;
            let anchors: Vec<Anchor<'_>> = POST_ANCHOR_REGEX
                .captures_iter(text)
                .filter_map(|caps| {
                    let whole = caps.get(0)?;
                    let (id, url, label) = match caps.name("id") {
                        Some(id) => (id, caps.name("url")?, caps.name("label")),
                        None => (caps.name("bare_id")?, caps.name("bare")?, None),
                    };
                    Some(Anchor {
                        start: whole.start(),
                        end: whole.end(),
                        id: id.as_str(),
                        label: label.map(|l| l.as_str()),
                        url: url.as_str(),
                    })
                })
                .collect();

            for (i, anchor) in anchors.iter().enumerate() {
                let lower = anchors[..i]
                    .iter()
                    .rev()
                    .find(|other| other.id != anchor.id)
                    .map(|other| other.end)
                    .unwrap_or(0);
                let upper = anchors[i + 1..]
                    .iter()
                    .find(|other| other.id != anchor.id)
                    .map(|other| other.start)
                    .unwrap_or(text.len());

                let window = Window::around(text, anchor.start, anchor.end, lower, upper);
                if let Some(post) = link_candidate(anchor, &window, ctx) {
                    out.push(post);
                }
            }
        }

        out
    }
}

fn link_candidate(
    anchor: &Anchor<'_>,
    window: &Window<'_>,
    ctx: &ExtractContext,
) -> Option<PostCandidate> {
    let lead = window.lead();
    let inline = window.inline();
    let line = format!("{} {}", lead, inline);
    let preceding = window.preceding();
    let following = window.following();

    let previous_line = preceding.rsplit('\n').next().unwrap_or_default();
    let nearby = format!("{}\n{}{}", previous_line, lead, inline);
    let title = select_title(&TitleHints {
        label: anchor.label,
        nearby: &nearby,
    })?;

    let author = author_marker(inline)
        .or_else(|| first_mention(&USER_MENTION_REGEX, &line))
        .or_else(|| author_marker(lead))
        .or_else(|| last_mention(&USER_MENTION_REGEX, preceding))
        .or_else(|| first_mention(&USER_MENTION_REGEX, following));

    let submolt = first_mention(&SUBMOLT_MENTION_REGEX, &line)
        .or_else(|| last_mention(&SUBMOLT_MENTION_REGEX, preceding))
        .or_else(|| first_mention(&SUBMOLT_MENTION_REGEX, following));

    // Vote widgets sit above a title; comment counts below it.
    let upvotes = first_count(&VOTE_BLOCK_REGEX, &line)
        .or_else(|| first_count(&VOTE_WORDS_REGEX, &line))
        .or_else(|| last_count(&VOTE_BLOCK_REGEX, preceding))
        .or_else(|| last_count(&VOTE_WORDS_REGEX, preceding))
        .or_else(|| first_count(&VOTE_BLOCK_REGEX, following))
        .unwrap_or(0);
    let downvotes = first_count(&DOWNVOTE_REGEX, &line)
        .or_else(|| first_count(&DOWNVOTE_REGEX, following))
        .unwrap_or(0);
    let comment_count = first_count(&COMMENT_COUNT_REGEX, &line)
        .or_else(|| first_count(&COMMENT_COUNT_REGEX, following))
        .unwrap_or(0);

    let posted_at = resolve_relative(&line, ctx.now)
        .or_else(|| resolve_relative(previous_line, ctx.now))
        .or_else(|| resolve_relative(following, ctx.now));

    let mut post = PostCandidate::new(anchor.id, title)
        .with_url(anchor.url)
        .with_votes(upvotes, downvotes)
        .with_comment_count(comment_count);

    if let Some(author) = author {
        post = post.with_agent(author);
    }
    if let Some(submolt) = submolt {
        post = post.with_submolt(submolt);
    }
    if let Some(content) = body_text(following, true) {
        post = post.with_content(content);
    }
    if let Some(posted_at) = posted_at {
        post = post.with_posted_at(posted_at);
    }

    Some(post)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::extract_posts;
    use chrono::{Duration, TimeZone, Utc};

    fn ctx() -> ExtractContext {
        ExtractContext::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_inline_post_link() {
        let md = "[Great idea](https://x.test/post/abc-123) by u/researcher_bot in m/agentops — ▲42▼ 💬7";
        let posts = extract_posts(md, ctx().now);

        assert_eq!(posts.len(), 1);
        let post = &posts[0];
        assert_eq!(post.external_id, "abc-123");
        assert!(post.title.contains("Great idea"));
        assert_eq!(post.upvotes, 42);
        assert_eq!(post.comment_count, 7);
        assert_eq!(post.agent_reference.as_deref(), Some("researcher_bot"));
        assert_eq!(post.submolt_reference.as_deref(), Some("agentops"));
    }

    #[test]
    fn test_listing_block() {
        let md = "▲ 1.2k ▼ m/AgentOps • Posted by u/Researcher_Bot 3h ago\n\
                  [**Memory compaction tricks**](https://www.moltbook.com/post/p-001)\n\
                  Sharing what worked for long sessions.\n\
                  💬 15 comments\n";
        let posts = ListingBlock.try_extract(md, &ctx());

        assert_eq!(posts.len(), 1);
        let post = &posts[0];
        assert_eq!(post.external_id, "p-001");
        assert_eq!(post.title, "Memory compaction tricks");
        assert_eq!(post.upvotes, 1200);
        assert_eq!(post.comment_count, 15);
        assert_eq!(post.agent_reference.as_deref(), Some("researcher_bot"));
        assert_eq!(post.submolt_reference.as_deref(), Some("agentops"));
        assert_eq!(
            post.content.as_deref(),
            Some("Sharing what worked for long sessions.")
        );
        assert_eq!(post.posted_at, Some(ctx().now - Duration::hours(3)));
    }

    #[test]
    fn test_listing_block_without_post_segment_synthesizes_id() {
        let md = "▲ 3 ▼ m/general • Posted by u/bot_one\n[Hello molts](https://x.test/feed?item=7)\n💬 0\n";
        let posts = ListingBlock.try_extract(md, &ctx());

        assert_eq!(posts.len(), 1);
        assert_eq!(
            posts[0].external_id,
            PostCandidate::synthesize_id("Hello molts", Some("bot_one"), Some("general"))
        );
    }

    #[test]
    fn test_structured_match_wins_over_fallback() {
        let md = "▲ 10 ▼ m/agentops • Posted by u/alpha\n\
                  [Structured title](https://x.test/post/dup-1)\n\
                  💬 2 comments\n\n\
                  Also see [a different label](https://x.test/post/dup-1) by u/beta";
        let posts = extract_posts(md, ctx().now);

        let dups: Vec<_> = posts.iter().filter(|p| p.external_id == "dup-1").collect();
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].title, "Structured title");
        assert_eq!(dups[0].agent_reference.as_deref(), Some("alpha"));
    }

    #[test]
    fn test_bare_url_needs_a_title() {
        let md = "check https://x.test/post/zzz9 now";
        assert!(extract_posts(md, ctx().now).is_empty());

        let md = "## Weekly agent roundup\nhttps://x.test/post/zzz9 by u/curator";
        let posts = extract_posts(md, ctx().now);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "Weekly agent roundup");
        assert_eq!(posts[0].agent_reference.as_deref(), Some("curator"));
    }

    #[test]
    fn test_neighbouring_posts_do_not_share_fields() {
        let md = "[First post here](https://x.test/post/one) by u/alice 💬 3\n\
                  [Second post here](https://x.test/post/two) by u/bob";
        let posts = extract_posts(md, ctx().now);

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].agent_reference.as_deref(), Some("alice"));
        assert_eq!(posts[0].comment_count, 3);
        assert_eq!(posts[1].agent_reference.as_deref(), Some("bob"));
        assert_eq!(posts[1].comment_count, 0);
    }

    #[test]
    fn test_prose_author_marker_is_filtered() {
        let md = "[Thoughts on tools](https://x.test/post/t1) by the way";
        let posts = extract_posts(md, ctx().now);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].agent_reference, None);
    }

    #[test]
    fn test_boundary_marker_url_is_not_a_post() {
        let md = "<!-- moltbook-page: https://x.test/post/page-1 -->\nno posts here";
        assert!(extract_posts(md, ctx().now).is_empty());
    }

    #[test]
    fn test_output_keeps_detection_order() {
        let md = "[Zeta topic](https://x.test/post/z)\n\n[Alpha topic](https://x.test/post/a)";
        let ids: Vec<_> = extract_posts(md, ctx().now)
            .into_iter()
            .map(|p| p.external_id)
            .collect();
        assert_eq!(ids, vec!["z", "a"]);
    }

    #[test]
    fn test_detail_page_keeps_full_body() {
        let md = "<!-- moltbook-page: https://www.moltbook.com/post/p-001 -->\n\
                  # Memory compaction tricks\n\n\
                  ▲ 1.2k ▼ m/agentops • Posted by u/Researcher_Bot 3h ago\n\n\
                  Sharing what worked for long sessions.\n\n\
                  Summaries every 50 turns keep context small.\n\n\
                  **u/helper_bot** • 2h ago\n\
                  Compaction is underrated.\n";
        let posts = extract_posts(md, ctx().now);

        assert_eq!(posts.len(), 1);
        let post = &posts[0];
        assert_eq!(post.external_id, "p-001");
        assert_eq!(post.title, "Memory compaction tricks");
        assert_eq!(
            post.content.as_deref(),
            Some("Sharing what worked for long sessions.\nSummaries every 50 turns keep context small.")
        );
        assert_eq!(post.upvotes, 1200);
        assert_eq!(post.comment_count, 1);
        assert_eq!(post.agent_reference.as_deref(), Some("researcher_bot"));
        assert_eq!(post.submolt_reference.as_deref(), Some("agentops"));
        assert_eq!(post.url.as_deref(), Some("https://www.moltbook.com/post/p-001"));
        assert_eq!(post.posted_at, Some(ctx().now - Duration::hours(3)));
    }

    #[test]
    fn test_detail_page_wins_over_listing_preview() {
        let md = "<!-- moltbook-page: https://x.test/ -->\n\
                  ▲ 9 ▼ m/agentops • Posted by u/alpha\n\
                  [Deep dive](https://x.test/post/d-1)\n\
                  Short preview.\n\
                  💬 0 comments\n\
                  <!-- moltbook-page: https://x.test/post/d-1 -->\n\
                  # Deep dive\n\
                  ▲ 9 ▼ m/agentops • Posted by u/alpha\n\
                  Short preview.\n\n\
                  And the rest of it.\n";
        let posts = extract_posts(md, ctx().now);

        assert_eq!(posts.len(), 1);
        assert_eq!(
            posts[0].content.as_deref(),
            Some("Short preview.\nAnd the rest of it.")
        );
    }

    #[test]
    fn test_detail_page_without_byline_is_left_to_listings() {
        let md = "<!-- moltbook-page: https://x.test/post/d-2 -->\n# Just a heading\n\nSome text.\n";
        assert!(DetailPage.try_extract(md, &ctx()).is_empty());
    }

    #[test]
    fn test_listing_block_stays_within_its_page() {
        let md = "<!-- moltbook-page: https://x.test/ -->\n\
                  ▲ 3 ▼ m/general • Posted by u/bot_one\n\
                  [Hello molts](https://x.test/post/h-1)\n\
                  <!-- moltbook-page: https://x.test/new -->\n\
                  💬 4 comments\n";
        assert!(ListingBlock.try_extract(md, &ctx()).is_empty());
    }
}
