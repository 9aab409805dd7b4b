//! Allow-list HTML sanitizer for feed-supplied markup.
//!
//! Feeds embed arbitrary HTML in summaries and full-content fields; nothing
//! from the wire may reach a renderer unfiltered. The sanitizer parses the
//! fragment into a real DOM (via `scraper`) and re-emits only allow-listed
//! tags and attributes. Disallowed elements are unwrapped so their safe
//! inline text survives, except for script-bearing elements, which are
//! dropped wholesale.
//!
//! The strategy is chosen once at startup: [`SanitizeMode::Passthrough`]
//! exists for hosts with no renderer, where the output is never displayed.

use scraper::ego_tree::NodeRef;
use scraper::node::Node;
use scraper::Html;
use serde::Deserialize;

/// Tags that survive sanitization: basic inline and structural formatting.
const ALLOWED_TAGS: &[&str] = &[
    "b", "i", "em", "strong", "a", "p", "br", "ul", "ol", "li", "h1", "h2", "h3", "h4", "h5",
    "h6", "blockquote", "code", "pre",
];

/// Attributes that survive sanitization (link target and behavior hints).
const ALLOWED_ATTRS: &[&str] = &["href", "target", "rel"];

/// Elements whose entire subtree is discarded rather than unwrapped.
/// Unwrapping a `<script>` would leak its code as visible text.
const DROPPED_SUBTREES: &[&str] = &["script", "style", "iframe"];

/// Sanitization strategy, selected at startup from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SanitizeMode {
    /// Parse and re-emit through the allow-list.
    Strict,
    /// Return input unchanged. Only acceptable where output is never rendered.
    Passthrough,
}

/// A configured sanitizer. `clean` is pure: same input, same output.
#[derive(Debug, Clone, Copy)]
pub struct Sanitizer {
    mode: SanitizeMode,
}

impl Sanitizer {
    pub fn new(mode: SanitizeMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> SanitizeMode {
        self.mode
    }

    /// Sanitizes an HTML fragment according to the configured mode.
    pub fn clean(&self, html: &str) -> String {
        match self.mode {
            SanitizeMode::Passthrough => html.to_owned(),
            SanitizeMode::Strict => {
                let fragment = Html::parse_fragment(html);
                let mut out = String::with_capacity(html.len());
                // The fragment root is a synthetic <html> element; it is not
                // allow-listed, so the walk unwraps it transparently.
                for child in fragment.tree.root().children() {
                    emit(child, &mut out);
                }
                out
            }
        }
    }
}

fn emit(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => escape_text(&text.text, out),
        Node::Element(el) => {
            let name = el.name();

            if DROPPED_SUBTREES.contains(&name) {
                return;
            }

            if !ALLOWED_TAGS.contains(&name) {
                // Unwrap: drop the tag, keep its children.
                for child in node.children() {
                    emit(child, out);
                }
                return;
            }

            // Sorted so output is deterministic regardless of the backing
            // attribute map's iteration order
            let mut attrs: Vec<(&str, &str)> = el
                .attrs()
                .filter(|(attr, value)| {
                    ALLOWED_ATTRS.contains(attr) && (*attr != "href" || is_safe_href(value))
                })
                .collect();
            attrs.sort_unstable_by_key(|(attr, _)| *attr);

            out.push('<');
            out.push_str(name);
            for (attr, value) in attrs {
                out.push(' ');
                out.push_str(attr);
                out.push_str("=\"");
                escape_attr(value, out);
                out.push('"');
            }
            out.push('>');

            // Void element: no children, no closing tag.
            if name == "br" {
                return;
            }

            for child in node.children() {
                emit(child, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        // Comments, doctypes, processing instructions are dropped.
        _ => {}
    }
}

/// Rejects href values whose scheme can execute.
///
/// Whitespace and control characters are ignored before the scheme check:
/// `jav\tascript:` is still `javascript:` to a browser.
fn is_safe_href(value: &str) -> bool {
    let head: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();
    !(head.starts_with("javascript:") || head.starts_with("data:") || head.starts_with("vbscript:"))
}

fn escape_text(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
