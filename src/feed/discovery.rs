use futures::StreamExt;
use std::time::Duration;

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_DISCOVERY_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// Resolves the effective feed URL for an arbitrary source URL.
///
/// If the response's Content-Type already indicates a feed document, the
/// input URL is returned unchanged; there is nothing to discover. If it is an HTML
/// page, the page is scanned for `<link rel="alternate">` auto-discovery
/// tags and the best match is returned (RSS preferred over Atom over
/// JSON-feed), with relative hrefs resolved against the page URL.
///
/// Returns `None` when nothing could be fetched, parsed, or matched.
/// `None` is not an error: it means "use the original URL as-is and let the
/// feed parser fail naturally if it truly isn't a feed". Discovery is never
/// fatal to the caller.
pub async fn discover(client: &reqwest::Client, url: &str) -> Option<String> {
    let response = match tokio::time::timeout(DISCOVERY_TIMEOUT, client.get(url).send()).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            tracing::debug!(url = %url, error = %e, "discovery fetch failed, passing URL through");
            return None;
        }
        Err(_) => {
            tracing::debug!(url = %url, "discovery fetch timed out, passing URL through");
            return None;
        }
    };

    if !response.status().is_success() {
        tracing::debug!(url = %url, status = %response.status(), "discovery fetch unsuccessful");
        return None;
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();

    if is_feed_content_type(&content_type) {
        // Already a feed document; nothing to discover.
        return Some(url.to_owned());
    }

    let is_html = content_type.contains("text/html") || content_type.contains("application/xhtml");
    let bytes = read_discovery_bytes(response).await?;

    // Ambiguous or missing Content-Type: trust the body when it sniffs
    // as a feed, otherwise fall through to the HTML scan.
    if !is_html && looks_like_feed(&bytes) {
        return Some(url.to_owned());
    }

    let html = String::from_utf8_lossy(&bytes);
    let resolved = find_feed_link(&html, url);
    if resolved.is_none() {
        tracing::debug!(url = %url, "no feed auto-discovery link found");
    }
    resolved
}

fn is_feed_content_type(content_type: &str) -> bool {
    content_type.contains("application/rss+xml")
        || content_type.contains("application/atom+xml")
        || content_type.contains("application/xml")
        || content_type.contains("text/xml")
}

fn looks_like_feed(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(1024)]).to_lowercase();
    head.contains("<rss") || head.contains("<feed") || head.contains("<rdf:rdf")
}

/// Reads the response body with a size limit. All failures degrade to `None`.
async fn read_discovery_bytes(response: reqwest::Response) -> Option<Vec<u8>> {
    if let Some(len) = response.content_length() {
        if len as usize > MAX_DISCOVERY_SIZE {
            tracing::debug!(len = len, "discovery response too large");
            return None;
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(error = %e, "discovery body read failed");
                return None;
            }
        };
        if bytes.len().saturating_add(chunk.len()) > MAX_DISCOVERY_SIZE {
            tracing::debug!("discovery response too large");
            return None;
        }
        bytes.extend_from_slice(&chunk);
    }

    Some(bytes)
}

/// Scans HTML for feed auto-discovery `<link>` tags and returns the best
/// match's resolved target URL.
///
/// Priority order: RSS, then Atom, then JSON-feed. Uses simple string
/// scanning over the markup; handles attribute ordering variations and both
/// quote styles.
fn find_feed_link(html: &str, base_url: &str) -> Option<String> {
    let html_lower = html.to_lowercase();
    let mut best: Option<(u8, String)> = None;
    let mut search_from = 0;

    while let Some(link_start) = html_lower[search_from..].find("<link") {
        let abs_start = search_from + link_start;
        let remaining = &html_lower[abs_start..];

        let tag_end = match remaining.find('>') {
            Some(pos) => pos,
            None => break,
        };
        let tag = &remaining[..=tag_end];

        if contains_attr(tag, "rel", "alternate") {
            if let Some(rank) = feed_type_rank(tag) {
                let beats_current = best.as_ref().map_or(true, |(r, _)| rank < *r);
                if beats_current {
                    // Extract href from the original (non-lowered) HTML to
                    // preserve URL case
                    let original_tag = &html[abs_start..abs_start + tag_end + 1];
                    if let Some(href) = extract_attr_value(original_tag, "href") {
                        let resolved = resolve_url(href, base_url);
                        if rank == 0 {
                            // RSS outranks everything else; stop scanning
                            return Some(resolved);
                        }
                        best = Some((rank, resolved));
                    }
                }
            }
        }

        search_from = abs_start + tag_end + 1;
    }

    best.map(|(_, href)| href)
}

/// Ranks a lowercased `<link>` tag's feed type: lower is preferred.
fn feed_type_rank(tag: &str) -> Option<u8> {
    if tag.contains("application/rss+xml") {
        Some(0)
    } else if tag.contains("application/atom+xml") {
        Some(1)
    } else if tag.contains("application/feed+json") {
        Some(2)
    } else {
        None
    }
}

/// Checks if a lowercased tag contains an attribute with the given value.
fn contains_attr(tag: &str, attr_name: &str, attr_value: &str) -> bool {
    // Match: attr_name="attr_value" or attr_name='attr_value'
    let pattern_double = format!("{attr_name}=\"{attr_value}\"");
    let pattern_single = format!("{attr_name}='{attr_value}'");
    tag.contains(&pattern_double) || tag.contains(&pattern_single)
}

/// Extracts the value of an attribute from a tag string (case-preserving).
fn extract_attr_value<'a>(tag: &'a str, attr_name: &str) -> Option<&'a str> {
    let tag_lower = tag.to_lowercase();
    let attr_prefix = format!("{attr_name}=");

    let attr_start = tag_lower.find(&attr_prefix)?;
    let value_start = attr_start + attr_prefix.len();

    if value_start >= tag.len() {
        return None;
    }

    let rest = &tag[value_start..];
    let quote = rest.as_bytes().first()?;

    if *quote != b'"' && *quote != b'\'' {
        return None;
    }

    let quote_char = *quote as char;
    let inner = &rest[1..];
    let end = inner.find(quote_char)?;

    Some(&inner[..end])
}

/// Resolves a potentially relative URL against a base URL.
fn resolve_url(href: &str, base_url: &str) -> String {
    // Already absolute
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_owned();
    }

    // Protocol-relative: run through the URL parser so the result is
    // well-formed rather than string-glued
    if href.starts_with("//") {
        let with_scheme = format!("https:{}", href);
        if let Ok(parsed) = url::Url::parse(&with_scheme) {
            return parsed.to_string();
        }
    }

    // Relative URL: resolve against base
    if let Ok(base) = url::Url::parse(base_url) {
        if let Ok(resolved) = base.join(href) {
            return resolved.to_string();
        }
    }

    // Fallback: return as-is
    href.to_owned()
}
