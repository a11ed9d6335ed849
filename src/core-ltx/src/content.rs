//! Normalizes crawled page content before fingerprinting.
//!
//! Crawl providers hand back either markdown or raw HTML. Both are reduced to
//! the same markdown form with volatile noise removed, so that re-crawling an
//! unchanged page produces an identical fingerprint.

use std::sync::LazyLock;

use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use regex::Regex;

/// Longest description kept for the index entry.
pub const MAX_DESCRIPTION_CHARS: usize = 200;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*(!doctype|html|head|body|div|p|span|a|h[1-6]|ul|ol|li|table|section|article|main)\b")
        .expect("HTML_TAG: hardcoded regex is valid")
});

static ZERO_WIDTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[\u{200B}\u{200C}\u{200D}\u{FEFF}]").expect("ZERO_WIDTH: hardcoded regex is valid"));

// Image URLs commonly carry cache-busting query strings.
static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("IMAGE: hardcoded regex is valid"));

static TRAILING_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)[ \t]+$").expect("TRAILING_WS: hardcoded regex is valid"));

// Only runs after a non-space character, leaving indentation alone.
static INNER_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\S)[ \t]{2,}").expect("INNER_WS: hardcoded regex is valid"));

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("BLANK_LINES: hardcoded regex is valid"));

/// A page after cleaning, with whatever title and description could be found.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedPage {
    pub markdown: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

pub fn looks_like_html(content: &str) -> bool {
    HTML_TAG.is_match(content)
}

/// Converts HTML to markdown when needed and strips volatile whitespace and images.
pub fn normalize(raw: &str) -> String {
    let markdown = if looks_like_html(raw) {
        html2md::parse_html(raw)
    } else {
        raw.to_string()
    };

    let text = markdown.replace("\r\n", "\n").replace('\r', "\n");
    let text = ZERO_WIDTH.replace_all(&text, "");
    let text = IMAGE.replace_all(&text, "");
    let text = TRAILING_WS.replace_all(&text, "");
    let text = INNER_WS.replace_all(&text, "$1 ");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Text of the first heading in the document.
pub fn extract_title(markdown: &str) -> Option<String> {
    let mut in_heading = false;
    let mut title = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading { .. }) => in_heading = true,
            Event::End(TagEnd::Heading(_)) => {
                let trimmed = title.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
                in_heading = false;
            }
            Event::Text(t) | Event::Code(t) if in_heading => title.push_str(&t),
            _ => {}
        }
    }
    None
}

/// Plain text of the first paragraph, cut to [`MAX_DESCRIPTION_CHARS`] on a word boundary.
pub fn extract_description(markdown: &str) -> Option<String> {
    let mut in_paragraph = false;
    let mut text = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Paragraph) => in_paragraph = true,
            Event::End(TagEnd::Paragraph) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    return Some(truncate_words(trimmed, MAX_DESCRIPTION_CHARS));
                }
                text.clear();
                in_paragraph = false;
            }
            Event::Text(t) | Event::Code(t) if in_paragraph => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak if in_paragraph => text.push(' '),
            _ => {}
        }
    }
    None
}

fn truncate_words(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    let cut = match cut.rfind(' ') {
        Some(idx) if idx > 0 => &cut[..idx],
        _ => cut.as_str(),
    };
    format!("{}...", cut.trim_end())
}

/// Normalizes a page, preferring the provider's metadata for title and description.
pub fn clean_page(raw: &str, title: Option<&str>, description: Option<&str>) -> CleanedPage {
    let markdown = normalize(raw);
    let non_empty = |s: Option<&str>| s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

    let title = non_empty(title).or_else(|| extract_title(&markdown));
    let description = non_empty(description)
        .map(|d| truncate_words(&d, MAX_DESCRIPTION_CHARS))
        .or_else(|| extract_description(&markdown));

    CleanedPage {
        markdown,
        title,
        description,
    }
}
