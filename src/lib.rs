//! rivulet aggregates RSS/Atom subscriptions into a single
//! reverse-chronological article stream.
//!
//! The core is the feed-ingestion pipeline: [`feed::discover`] resolves an
//! arbitrary URL to its feed document, [`feed::fetch_and_parse`] normalizes
//! the wire format, [`aggregator::refresh`] fans the chain out across all
//! subscriptions and merges whatever succeeded, and [`sanitize::Sanitizer`]
//! strips unsafe markup at render time. [`store::SubscriptionStore`] keeps
//! the durable subscription set; [`http::router`] exposes the single-feed
//! endpoint for the UI.

pub mod aggregator;
pub mod config;
pub mod feed;
pub mod http;
pub mod sanitize;
pub mod store;
pub mod util;
