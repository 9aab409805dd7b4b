//! The feed-ingestion pipeline: discovery, fetch, parse.
//!
//! - [`discover`] turns an arbitrary URL into the URL of its feed document,
//!   degrading to pass-through when nothing can be resolved
//! - [`fetch_and_parse`] retrieves one feed document and normalizes its wire
//!   format (RSS 2.0, Atom, content extensions) into a [`RawFeedDocument`]
//!
//! The aggregation engine composes these per subscription; the HTTP surface
//! exposes the same chain for a single URL.

mod discovery;
mod fetcher;
mod parser;

pub use discovery::discover;
pub use fetcher::{fetch_and_parse, FetchError};
pub use parser::{parse_document, ParseError, RawFeedDocument, RawItem};
