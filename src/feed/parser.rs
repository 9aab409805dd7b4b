use chrono::{DateTime, Utc};
use feed_rs::parser;
use serde::Serialize;
use thiserror::Error;

use crate::util::strip_control_chars;

/// Transient parse result of one fetched feed document. Consumed by the
/// aggregation engine (or serialized straight onto the wire by the feed
/// endpoint) and discarded.
#[derive(Debug, Clone, Serialize)]
pub struct RawFeedDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub items: Vec<RawItem>,
}

/// One feed entry in normalized-but-unmapped form: every field optional,
/// wire names matching what feed consumers expect (`pubDate`,
/// `contentSnippet`).
#[derive(Debug, Clone, Serialize)]
pub struct RawItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(rename = "pubDate", skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    #[serde(rename = "contentSnippet", skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Errors from turning fetched bytes into a [`RawFeedDocument`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document is a web page, not a feed. Kept distinct from
    /// [`ParseError::Malformed`] so the user sees an actionable message
    /// instead of an XML error.
    #[error("this URL returned an HTML page, not an RSS/Atom feed; point it at the site's feed URL")]
    HtmlDocument,
    /// The document claims to be a feed but cannot be parsed.
    #[error("malformed feed document: {0}")]
    Malformed(String),
}

/// Parses RSS 2.0 / Atom bytes into a [`RawFeedDocument`].
///
/// Missing optional fields never raise; per item this extracts the GUID,
/// title, first link, publish timestamp (falling back to the updated
/// timestamp), summary snippet, and extended content body
/// (`content:encoded` / Atom content) when the dialect provides one.
pub fn parse_document(bytes: &[u8]) -> Result<RawFeedDocument, ParseError> {
    let feed = parser::parse(bytes).map_err(|e| {
        if looks_like_html(bytes) {
            ParseError::HtmlDocument
        } else {
            ParseError::Malformed(e.to_string())
        }
    })?;

    let title = feed
        .title
        .map(|t| strip_control_chars(&t.content).into_owned())
        .filter(|t| !t.trim().is_empty());

    let items = feed.entries.into_iter().map(raw_item).collect();

    Ok(RawFeedDocument { title, items })
}

fn raw_item(entry: feed_rs::model::Entry) -> RawItem {
    let guid = Some(entry.id.trim())
        .filter(|id| !id.is_empty())
        .map(str::to_owned);
    let link = entry.links.first().map(|l| l.href.clone());
    let published = entry.published.or(entry.updated);
    // Feed text can embed terminal escape sequences; titles are the one
    // field rendered raw by the CLI.
    let title = entry
        .title
        .map(|t| strip_control_chars(&t.content).into_owned());
    let snippet = entry.summary.map(|s| s.content);
    let content = entry.content.and_then(|c| c.body);

    RawItem {
        guid,
        title,
        link,
        published,
        snippet,
        content,
    }
}

fn looks_like_html(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
    let head = head.trim_start().to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html") || head.contains("<html")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS_FULL: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Example Blog</title>
    <link>https://example.com</link>
    <item>
      <guid>post-1</guid>
      <title>First Post</title>
      <link>https://example.com/post/1</link>
      <pubDate>Mon, 01 Jan 2024 12:00:00 GMT</pubDate>
      <description>A short excerpt</description>
      <content:encoded><![CDATA[<p>Full <b>body</b></p>]]></content:encoded>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_rss_with_content_extension() {
        let doc = parse_document(RSS_FULL.as_bytes()).unwrap();
        assert_eq!(doc.title.as_deref(), Some("Example Blog"));
        assert_eq!(doc.items.len(), 1);

        let item = &doc.items[0];
        assert_eq!(item.guid.as_deref(), Some("post-1"));
        assert_eq!(item.title.as_deref(), Some("First Post"));
        assert_eq!(item.link.as_deref(), Some("https://example.com/post/1"));
        assert_eq!(
            item.published,
            Some(chrono::Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(item.snippet.as_deref(), Some("A short excerpt"));
        assert_eq!(item.content.as_deref(), Some("<p>Full <b>body</b></p>"));
    }

    #[test]
    fn atom_falls_back_to_updated_timestamp() {
        let atom = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Blog</title>
  <entry>
    <id>urn:entry:1</id>
    <title>Entry</title>
    <link href="https://example.com/1"/>
    <updated>2024-02-02T08:30:00Z</updated>
  </entry>
</feed>"#;
        let doc = parse_document(atom.as_bytes()).unwrap();
        let item = &doc.items[0];
        assert_eq!(
            item.published,
            Some(chrono::Utc.with_ymd_and_hms(2024, 2, 2, 8, 30, 0).unwrap())
        );
    }

    #[test]
    fn missing_optional_fields_do_not_raise() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <item><title>Bare item</title></item>
</channel></rss>"#;
        let doc = parse_document(rss.as_bytes()).unwrap();
        assert!(doc.title.is_none());
        let item = &doc.items[0];
        assert_eq!(item.title.as_deref(), Some("Bare item"));
        assert!(item.link.is_none());
        assert!(item.published.is_none());
        assert!(item.snippet.is_none());
        assert!(item.content.is_none());
    }

    #[test]
    fn empty_feed_parses_to_no_items() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Empty</title></channel></rss>"#;
        let doc = parse_document(rss.as_bytes()).unwrap();
        assert!(doc.items.is_empty());
    }

    #[test]
    fn html_page_is_reported_distinctly() {
        let html = "<!DOCTYPE html><html><body><h1>Not a feed</h1></body></html>";
        let err = parse_document(html.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::HtmlDocument));
        assert!(err.to_string().contains("HTML page"));
    }

    #[test]
    fn garbage_is_a_generic_parse_failure() {
        let err = parse_document(b"<not valid xml").unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn strips_control_chars_from_titles() {
        let rss = "<?xml version=\"1.0\"?>\n<rss version=\"2.0\"><channel>\
            <title>Evil\x1b[31m Feed</title>\
            <item><guid>1</guid><title>Post\x07</title></item>\
            </channel></rss>";
        let doc = parse_document(rss.as_bytes()).unwrap();
        assert_eq!(doc.title.as_deref(), Some("Evil[31m Feed"));
        assert_eq!(doc.items[0].title.as_deref(), Some("Post"));
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let doc = parse_document(RSS_FULL.as_bytes()).unwrap();
        let json = serde_json::to_value(&doc).unwrap();
        let item = &json["items"][0];
        assert!(item.get("pubDate").is_some());
        assert!(item.get("contentSnippet").is_some());
        assert!(item.get("published").is_none());
        assert!(item.get("snippet").is_none());
    }
}
