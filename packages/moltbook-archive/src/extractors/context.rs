//! Shared helpers for the extraction strategies: bounded context windows
//! around an anchor match, count parsing, username noise filtering and title
//! selection.

use lazy_static::lazy_static;
use regex::Regex;

use super::PAGE_BOUNDARY;

/// Characters scanned on each side of an anchor.
pub const CONTEXT_WINDOW: usize = 240;

/// Minimum title length in characters (tunable).
pub const MIN_TITLE_LEN: usize = 3;

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 300;

/// Words that regularly follow "by" in prose and are never agent names.
const USERNAME_STOPLIST: &[&str] = &[
    "a", "about", "accident", "all", "an", "and", "anyone", "being", "both", "chance",
    "comparison", "contrast", "day", "default", "definition", "design", "doing", "each",
    "email", "everyone", "far", "getting", "hand", "having", "her", "here", "him", "how",
    "humans", "it", "its", "itself", "making", "me", "my", "myself", "name", "nature",
    "night", "now", "one", "or", "people", "someone", "taking", "that", "the", "them",
    "themselves", "then", "there", "these", "this", "those", "today", "tomorrow", "tonight",
    "two", "us", "users", "using", "way", "what", "which", "who", "whom", "whose", "you",
    "your",
];

lazy_static! {
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_-]{2,40}$").unwrap();

    /// `/post/<id>` or `/posts/<id>` anywhere in a URL.
    pub static ref POST_ID_REGEX: Regex =
        Regex::new(r"/posts?/([A-Za-z0-9][A-Za-z0-9_-]*)").unwrap();

    pub static ref USER_MENTION_REGEX: Regex =
        Regex::new(r"(?:^|[^\w/])u/([A-Za-z0-9_-]{2,40})").unwrap();

    pub static ref SUBMOLT_MENTION_REGEX: Regex =
        Regex::new(r"(?:^|[^\w/])m/([A-Za-z0-9_-]{2,50})").unwrap();

    pub static ref AUTHOR_MARKER_REGEX: Regex =
        Regex::new(r"(?i)\b(?:posted\s+)?by\s+(?:u/)?@?([A-Za-z0-9_-]{2,40})\b").unwrap();

    pub static ref VOTE_BLOCK_REGEX: Regex =
        Regex::new(r"▲\s*(-?[\d.,]+[kK]?)").unwrap();

    pub static ref VOTE_WORDS_REGEX: Regex =
        Regex::new(r"(?i)\b([\d.,]+[kK]?)\s*(?:upvotes?|points?|karma)\b").unwrap();

    pub static ref DOWNVOTE_REGEX: Regex =
        Regex::new(r"(?i)\b([\d.,]+[kK]?)\s*downvotes?\b").unwrap();

    pub static ref COMMENT_COUNT_REGEX: Regex =
        Regex::new(r"(?i)💬\s*([\d.,]+[kK]?)|\b([\d.,]+[kK]?)\s+comments?\b").unwrap();

    pub static ref MEMBER_COUNT_REGEX: Regex =
        Regex::new(r"(?i)\b([\d.,]+[kK]?)\s*(?:members?|subscribers?|molts)\b").unwrap();

    /// `**u/name** • 2h ago` on its own line, optionally quoted for replies.
    pub static ref THREAD_HEADER_REGEX: Regex = Regex::new(
        r"(?m)^[ \t>]*(?:\*\*)?u/(?P<author>[A-Za-z0-9_-]{2,40})(?:\*\*)?[ \t]*[•·][ \t]*(?P<meta>[^\n]*)$",
    )
    .unwrap();

    pub static ref COMMENTS_HEADING_REGEX: Regex =
        Regex::new(r"(?mi)^[ \t]*#{1,6}[ \t]+comments\b[^\n]*$").unwrap();

    static ref BOLD_REGEX: Regex =
        Regex::new(r"\*\*([^*\n]+?)\*\*|__([^_\n]+?)__").unwrap();

    static ref HEADING_REGEX: Regex =
        Regex::new(r"(?m)^[ \t]{0,3}#{1,6}[ \t]+([^\n]+?)[ \t#]*$").unwrap();

    static ref LIST_MARKER_REGEX: Regex =
        Regex::new(r"^(?:[-*+•]|\d+[.)])(?:\s|$)").unwrap();

    static ref ARTIFACT_ONLY_REGEX: Regex =
        Regex::new(r"^[\d\s▲▼.,kK+\-•·|💬]*$").unwrap();

    static ref HANDLE_ONLY_REGEX: Regex = Regex::new(r"^[um]/[A-Za-z0-9_-]+$").unwrap();

    /// Vote/submolt/author residue that precedes a title in a link label.
    static ref LABEL_ARTIFACT_REGEX: Regex = Regex::new(
        r"^(?:\s*(?:▲\s*-?[\d.,]*[kK]?\s*▼?|▼|[\d.,]+[kK]?\s+(?:points?|upvotes?)|m/[A-Za-z0-9_-]+|u/[A-Za-z0-9_-]+|[Pp]osted\s+by|[•·|—–-]))+\s*",
    )
    .unwrap();

    /// Lines that carry only metadata, never body text.
    static ref METADATA_LINE_REGEX: Regex = Regex::new(
        r"(?i)^(?:[▲▼]\s*-?[\d.,]*[kK]?\s*▼?|-?[\d.,]+[kK]?|💬.*|[\d.,]+[kK]?\s+comments?|(?:m/[\w-]+\s*[•·]\s*)?posted\s+by\s+u/.*|share|reply|save|report|---+|<!--.*-->)$",
    )
    .unwrap();
}

/// Text immediately around an anchor match, clamped to neighbouring anchors.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    /// Text preceding the anchor
    pub before: &'a str,
    /// Text following the anchor
    pub after: &'a str,
}

impl<'a> Window<'a> {
    /// Build a window of [`CONTEXT_WINDOW`] characters on each side of
    /// `start..end`, never crossing `lower` or `upper`.
    pub fn around(text: &'a str, start: usize, end: usize, lower: usize, upper: usize) -> Self {
        let from = back_chars(text, start, CONTEXT_WINDOW).max(lower.min(start));
        let to = forward_chars(text, end, CONTEXT_WINDOW).min(upper.max(end));
        Self {
            before: &text[from..start],
            after: &text[end..to],
        }
    }

    /// Rest of the anchor's own line after the match.
    pub fn inline(&self) -> &'a str {
        self.after.split('\n').next().unwrap_or_default()
    }

    /// Start of the anchor's own line before the match.
    pub fn lead(&self) -> &'a str {
        self.before.rsplit('\n').next().unwrap_or_default()
    }

    /// Lines after the anchor's own line.
    pub fn following(&self) -> &'a str {
        match self.after.find('\n') {
            Some(idx) => &self.after[idx + 1..],
            None => "",
        }
    }

    /// Lines before the anchor's own line.
    pub fn preceding(&self) -> &'a str {
        match self.before.rfind('\n') {
            Some(idx) => &self.before[..idx],
            None => "",
        }
    }
}

/// One fetched page's markdown inside the concatenated cycle input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSegment<'a> {
    /// URL from the boundary marker, if the segment has one
    pub url: Option<&'a str>,
    /// Page markdown without its marker line
    pub text: &'a str,
}

impl<'a> PageSegment<'a> {
    /// Post id of the page itself, for post detail pages.
    pub fn post_id(&self) -> Option<&'a str> {
        self.url
            .and_then(|url| POST_ID_REGEX.captures(url))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

/// Split concatenated markdown on page boundary markers.
///
/// Text before the first marker forms a segment without a URL.
pub fn page_segments(markdown: &str) -> Vec<PageSegment<'_>> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    let mut url = None;

    for (idx, _) in markdown.match_indices(PAGE_BOUNDARY) {
        if idx < cursor {
            continue;
        }
        if idx > cursor || url.is_some() {
            segments.push(PageSegment {
                url,
                text: &markdown[cursor..idx],
            });
        }
        let line_end = markdown[idx..]
            .find('\n')
            .map(|n| idx + n + 1)
            .unwrap_or(markdown.len());
        let marker = markdown[idx + PAGE_BOUNDARY.len()..line_end]
            .trim()
            .trim_end_matches("-->")
            .trim();
        url = if marker.is_empty() { None } else { Some(marker) };
        cursor = line_end;
    }

    if cursor < markdown.len() || url.is_some() {
        segments.push(PageSegment {
            url,
            text: &markdown[cursor..],
        });
    }

    segments
}

/// Byte offset `n` characters before `from`.
pub fn back_chars(text: &str, from: usize, n: usize) -> usize {
    text[..from]
        .char_indices()
        .rev()
        .take(n)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(from)
}

/// Byte offset `n` characters after `from`.
pub fn forward_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

/// Parse "42", "1,234", "1.2k" into a non-negative count.
pub fn parse_count(raw: &str) -> Option<u32> {
    let cleaned = raw.trim().replace(',', "").to_lowercase();
    let (digits, multiplier) = match cleaned.strip_suffix('k') {
        Some(d) => (d, 1_000.0),
        None => (cleaned.as_str(), 1.0),
    };
    let value: f64 = digits.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some((value * multiplier).max(0.0).round() as u32)
}

/// First capture group that matched, as a count.
fn count_from(regex: &Regex, text: &str, last: bool) -> Option<u32> {
    let mut matches = regex.captures_iter(text);
    let caps = if last { matches.last() } else { matches.next() }?;
    let raw = caps.iter().skip(1).flatten().next()?;
    parse_count(raw.as_str())
}

/// First count in `text`.
pub fn first_count(regex: &Regex, text: &str) -> Option<u32> {
    count_from(regex, text, false)
}

/// Last count in `text`.
pub fn last_count(regex: &Regex, text: &str) -> Option<u32> {
    count_from(regex, text, true)
}

/// Usernames must look like handles and not be common prose words.
pub fn is_plausible_username(name: &str) -> bool {
    if !USERNAME_REGEX.is_match(name) || name.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let lower = name.to_lowercase();
    !USERNAME_STOPLIST.contains(&lower.as_str())
}

/// Submolt names share the handle charset; no stoplist applies.
pub fn is_plausible_submolt(name: &str) -> bool {
    name.len() >= 2 && name.len() <= 50 && !name.chars().all(|c| c.is_ascii_digit())
}

/// First `u/<name>` mention in `text` that passes the noise filter.
pub fn first_mention(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .find(|name| is_plausible_username(name))
        .map(str::to_string)
}

/// Last mention in `text` that passes the noise filter.
pub fn last_mention(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|name| is_plausible_username(name))
        .last()
        .map(str::to_string)
}

/// Author named by a "by <name>" marker in `text`.
pub fn author_marker(text: &str) -> Option<String> {
    AUTHOR_MARKER_REGEX
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .find(|name| is_plausible_username(name))
        .map(str::to_string)
}

/// Ordered title sources; the first plausible candidate wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSource {
    Bold,
    Heading,
    LinkLabel,
}

/// Title precedence: bold > heading > link label.
pub const TITLE_PRECEDENCE: [TitleSource; 3] =
    [TitleSource::Bold, TitleSource::Heading, TitleSource::LinkLabel];

/// Where a title may come from for one anchor.
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleHints<'a> {
    /// Link label of the anchor, if the anchor is a markdown link
    pub label: Option<&'a str>,
    /// Lines right around the anchor
    pub nearby: &'a str,
}

impl TitleSource {
    pub fn try_extract(&self, hints: &TitleHints<'_>) -> Option<String> {
        match self {
            TitleSource::Bold => hints
                .label
                .into_iter()
                .chain(std::iter::once(hints.nearby))
                .flat_map(|text| BOLD_REGEX.captures_iter(text))
                .filter_map(|c| c.get(1).or_else(|| c.get(2)))
                .map(|m| m.as_str().trim().to_string())
                .find(|t| is_plausible_title(t)),
            TitleSource::Heading => HEADING_REGEX
                .captures_iter(hints.nearby)
                .filter_map(|c| c.get(1))
                .map(|m| strip_emphasis(m.as_str()))
                .filter(|t| is_plausible_title(t))
                .last(),
            TitleSource::LinkLabel => hints
                .label
                .map(clean_label)
                .filter(|t| is_plausible_title(t)),
        }
    }
}

/// Pick a title following [`TITLE_PRECEDENCE`].
pub fn select_title(hints: &TitleHints<'_>) -> Option<String> {
    TITLE_PRECEDENCE.iter().find_map(|source| source.try_extract(hints))
}

/// First plausible heading in `text`.
pub fn first_heading(text: &str) -> Option<String> {
    HEADING_REGEX
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| strip_emphasis(m.as_str()))
        .find(|t| is_plausible_title(t))
}

/// Plausible length, not a list marker, numbered item or vote residue.
pub fn is_plausible_title(title: &str) -> bool {
    let trimmed = title.trim();
    let len = trimmed.chars().count();
    len >= MIN_TITLE_LEN
        && len <= MAX_TITLE_LEN
        && !LIST_MARKER_REGEX.is_match(trimmed)
        && !ARTIFACT_ONLY_REGEX.is_match(trimmed)
        && !HANDLE_ONLY_REGEX.is_match(trimmed)
}

/// Strip leading vote/submolt/author residue and emphasis from a label.
pub fn clean_label(label: &str) -> String {
    let stripped = strip_emphasis(label);
    LABEL_ARTIFACT_REGEX.replace(&stripped, "").trim().to_string()
}

fn strip_emphasis(text: &str) -> String {
    text.replace("**", "").replace("__", "").trim().to_string()
}

/// Whether a line carries only metadata (votes, counts, bylines, actions).
pub fn is_metadata_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || METADATA_LINE_REGEX.is_match(trimmed)
}

/// Body text from a block: non-metadata lines, trimmed, joined by newline.
///
/// With `first_paragraph_only`, stops at the first blank line after body
/// text begins.
pub fn body_text(block: &str, first_paragraph_only: bool) -> Option<String> {
    let mut lines = Vec::new();
    for line in block.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if first_paragraph_only && !lines.is_empty() {
                break;
            }
            continue;
        }
        if is_metadata_line(trimmed) {
            continue;
        }
        lines.push(trimmed);
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
