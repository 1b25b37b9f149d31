use std::fmt;

use crate::fetcher::FeedItem;

/// A feed item whose text fields are decoded, trimmed and non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Raw publish date, left for the date normalizer
    pub pub_date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BlankTitle,
    BlankLink,
    BlankDescription,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = match self {
            SkipReason::BlankTitle => "title",
            SkipReason::BlankLink => "link",
            SkipReason::BlankDescription => "description",
        };
        write!(f, "blank {}", field)
    }
}

/// Decode HTML entities and trim surrounding whitespace.
pub fn clean_text(raw: &str) -> String {
    html_escape::decode_html_entities(raw).trim().to_string()
}

/// Clean every text field of `item`, rejecting it if any ends up blank.
pub fn sanitize_item(item: &FeedItem) -> Result<CleanItem, SkipReason> {
    let title = clean_text(&item.title);
    if title.is_empty() {
        return Err(SkipReason::BlankTitle);
    }

    let link = clean_text(&item.link);
    if link.is_empty() {
        return Err(SkipReason::BlankLink);
    }

    let description = clean_text(&item.description);
    if description.is_empty() {
        return Err(SkipReason::BlankDescription);
    }

    Ok(CleanItem {
        title,
        link,
        description,
        pub_date: item.pub_date.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, link: &str, description: &str) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            link: link.to_string(),
            description: description.to_string(),
            pub_date: "Mon, 09 Dec 2024 12:00:00 GMT".to_string(),
        }
    }

    #[test]
    fn test_clean_text_decodes_and_trims() {
        assert_eq!(clean_text("  &amp;Title \n"), "&Title");
        assert_eq!(clean_text("Rust &lt;3 &quot;you&quot;"), "Rust <3 \"you\"");
        assert_eq!(clean_text("caf&#233;"), "café");
    }

    #[test]
    fn test_clean_text_leaves_bare_ampersand() {
        assert_eq!(clean_text("&Title"), "&Title");
    }

    #[test]
    fn test_sanitize_valid_item() {
        let cleaned = sanitize_item(&item(
            " &amp;Title ",
            " https://example.com/a?x=1&amp;y=2 ",
            "Some &lt;b&gt;text&lt;/b&gt;",
        ))
        .unwrap();

        assert_eq!(cleaned.title, "&Title");
        assert_eq!(cleaned.link, "https://example.com/a?x=1&y=2");
        assert_eq!(cleaned.description, "Some <b>text</b>");
        assert_eq!(cleaned.pub_date, "Mon, 09 Dec 2024 12:00:00 GMT");
    }

    #[test]
    fn test_blank_fields_are_rejected() {
        assert_eq!(
            sanitize_item(&item("   ", "https://example.com", "d")),
            Err(SkipReason::BlankTitle)
        );
        assert_eq!(
            sanitize_item(&item("Title", " \t ", "d")),
            Err(SkipReason::BlankLink)
        );
        assert_eq!(
            sanitize_item(&item("Title", "https://example.com", "")),
            Err(SkipReason::BlankDescription)
        );
    }

    #[test]
    fn test_entity_that_decodes_to_whitespace_is_blank() {
        assert_eq!(
            sanitize_item(&item("&#32;&#32;", "https://example.com", "d")),
            Err(SkipReason::BlankTitle)
        );
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::BlankLink.to_string(), "blank link");
    }
}
