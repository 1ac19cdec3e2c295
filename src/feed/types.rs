use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const TITLE_MAX_CHARS: usize = 100;
pub const BODY_MAX_CHARS: usize = 125;
/// Body cap when the title already eats most of the panel.
pub const BODY_MAX_CHARS_LONG_TITLE: usize = 90;
pub const LONG_TITLE_CHARS: usize = 80;

pub const PLACEHOLDER_TITLE: &str = "RSS unavailable";
pub const PLACEHOLDER_TEXT: &str = "Unable to load feed at this time.";

static TAG_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"<[^>]*>").expect("static regex"));

/// One entry as it appears in the feed document, before cleanup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub body: String,
}

/// Display-ready feed item: HTML stripped and truncated to the panel budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub title: String,
    pub text: String,
}

impl FeedItem {
    pub fn placeholder() -> Self {
        Self {
            title: PLACEHOLDER_TITLE.to_string(),
            text: PLACEHOLDER_TEXT.to_string(),
        }
    }

    pub fn from_entry(entry: &FeedEntry) -> Self {
        let raw_title = strip_html(&entry.title);
        let body_cap = if raw_title.chars().count() > LONG_TITLE_CHARS {
            BODY_MAX_CHARS_LONG_TITLE
        } else {
            BODY_MAX_CHARS
        };
        Self {
            title: truncate(&raw_title, TITLE_MAX_CHARS),
            text: truncate(&strip_html(&entry.body), body_cap),
        }
    }
}

/// Remove tags, decode the common entities left behind, collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let without_tags = TAG_RE.replace_all(html, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut to at most `max` chars, the last one being an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<p>Hello&nbsp;<b>world</b></p>\n\n  &amp; more"),
            "Hello world & more"
        );
        assert_eq!(strip_html(""), "");
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let out = truncate("ééééééééééé", 5);
        assert_eq!(out, "éééé…");
        assert_eq!(out.chars().count(), 5);
    }

    #[test]
    fn test_body_cap_depends_on_title_length() {
        let body = "x".repeat(300);
        let short = FeedItem::from_entry(&FeedEntry {
            title: "Short title".to_string(),
            body: body.clone(),
        });
        assert_eq!(short.text.chars().count(), BODY_MAX_CHARS);

        let long = FeedItem::from_entry(&FeedEntry {
            title: "t".repeat(81),
            body,
        });
        assert_eq!(long.text.chars().count(), BODY_MAX_CHARS_LONG_TITLE);
    }

    #[test]
    fn test_title_capped_at_100() {
        let item = FeedItem::from_entry(&FeedEntry {
            title: "a".repeat(250),
            body: String::new(),
        });
        assert_eq!(item.title.chars().count(), TITLE_MAX_CHARS);
        assert!(item.title.ends_with('…'));
    }

    #[test]
    fn test_placeholder_text() {
        let item = FeedItem::placeholder();
        assert_eq!(item.title, "RSS unavailable");
        assert_eq!(item.text, "Unable to load feed at this time.");
    }
}
