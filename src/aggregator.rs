//! Aggregation engine: fans out one fetch chain per subscription, merges
//! whatever succeeded, and returns a single newest-first article stream.
//!
//! Failure isolation is the contract here: a dead source contributes zero
//! articles and is logged, never propagated. The engine holds no state;
//! the result is rebuilt from the wire on every refresh.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::feed::{discover, fetch_and_parse, RawFeedDocument, RawItem};
use crate::store::Subscription;

/// Upper bound on simultaneously in-flight fetch chains.
const MAX_CONCURRENT_REFRESH: usize = 10;

/// One article in the merged stream, bound back to its originating
/// subscription by `source_url`. Ephemeral: exists only for the duration of
/// a single aggregation pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedArticle {
    /// Feed-native unique identifier, falling back to the item link.
    pub id: String,
    pub title: String,
    pub link: String,
    /// Publication timestamp. Items without one are stamped with the
    /// normalization time so they sort near "now" instead of failing.
    pub pub_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub source_title: String,
    pub source_url: String,
}

/// Fetches every subscription concurrently and returns the union of all
/// sources that succeeded, sorted descending by publication date.
///
/// Per subscription the chain is: discovery (degrading to the stored URL),
/// fetch, parse, normalize. Chains are independent, so one hung or failing
/// source never blocks or aborts the others, and the engine waits for all
/// of them to settle before merging.
///
/// An empty subscription set returns immediately with no network activity.
///
/// The sort is stable and chain results are merged in subscription order, so
/// articles with equal timestamps keep a deterministic relative order.
pub async fn refresh(
    client: &reqwest::Client,
    subscriptions: &[Subscription],
) -> Vec<NormalizedArticle> {
    if subscriptions.is_empty() {
        return Vec::new();
    }

    let mut per_source: Vec<(usize, Vec<NormalizedArticle>)> =
        stream::iter(subscriptions.iter().enumerate())
            .map(|(index, subscription)| async move {
                (index, fetch_source(client, subscription).await)
            })
            .buffer_unordered(MAX_CONCURRENT_REFRESH)
            .collect()
            .await;

    // buffer_unordered yields in completion order; restore input order so
    // the stable sort's tie-break is deterministic
    per_source.sort_by_key(|(index, _)| *index);

    let mut articles: Vec<NormalizedArticle> = per_source
        .into_iter()
        .flat_map(|(_, items)| items)
        .collect();

    articles.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));
    articles
}

/// Runs one subscription's chain. Failures are logged and swallowed here,
/// at the aggregation boundary; they never abort the overall refresh.
async fn fetch_source(
    client: &reqwest::Client,
    subscription: &Subscription,
) -> Vec<NormalizedArticle> {
    let effective_url = discover(client, &subscription.url)
        .await
        .unwrap_or_else(|| subscription.url.clone());

    match fetch_and_parse(client, &effective_url).await {
        Ok(document) => normalize_document(document, subscription),
        Err(e) => {
            tracing::warn!(
                source = %subscription.url,
                error = %e,
                "Source failed during refresh, contributing no articles"
            );
            Vec::new()
        }
    }
}

fn normalize_document(
    document: RawFeedDocument,
    subscription: &Subscription,
) -> Vec<NormalizedArticle> {
    // Priority: feed-reported title, then the stored subscription name
    let source_title = document
        .title
        .or_else(|| subscription.name.clone())
        .unwrap_or_else(|| "Unknown Source".to_owned());

    document
        .items
        .into_iter()
        .map(|item| normalize_item(item, &source_title, subscription))
        .collect()
}

fn normalize_item(
    item: RawItem,
    source_title: &str,
    subscription: &Subscription,
) -> NormalizedArticle {
    let link = item
        .link
        .unwrap_or_else(|| subscription.url.clone());
    let id = item.guid.unwrap_or_else(|| link.clone());

    NormalizedArticle {
        id,
        title: item.title.unwrap_or_else(|| "Untitled".to_owned()),
        link,
        pub_date: item.published.unwrap_or_else(Utc::now),
        content_snippet: item.snippet,
        content: item.content,
        source_title: source_title.to_owned(),
        source_url: subscription.url.clone(),
    }
}
