//! Shared utilities: feed URL validation and text hygiene for
//! feed-supplied strings headed to a terminal.

mod text;
mod url;

pub use text::strip_control_chars;
pub use url::{canonical_feed_url, UrlError};
