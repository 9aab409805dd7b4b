//! HTTP surface consumed by the external UI collaborator.
//!
//! One network-facing operation: `GET /feed?url=<source-url>` runs the
//! discovery + fetch + parse chain for a single URL and returns the raw feed
//! document as JSON. Credentials embedded in the supplied URL (basic-auth
//! userinfo, token query parameters) pass through untouched.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::feed::{discover, fetch_and_parse, FetchError, RawFeedDocument};

pub struct AppState {
    pub client: reqwest::Client,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/feed", get(feed))
        .route("/health", get(health))
        // Browser UI lives on another origin
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Deserialize)]
pub struct FeedQuery {
    url: Option<String>,
}

#[derive(Serialize)]
struct FeedResponse {
    feed: RawFeedDocument,
    /// Present only when discovery resolved to a different URL than supplied.
    #[serde(rename = "discoveredUrl", skip_serializing_if = "Option::is_none")]
    discovered_url: Option<String>,
}

/// Error response with a JSON `{"error": …}` body.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn missing_url() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "Missing url parameter".to_owned(),
        }
    }

    fn upstream(err: FetchError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

async fn feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>, ApiError> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(ApiError::missing_url)?;

    let discovered = discover(&state.client, &url).await;
    let effective = discovered.as_deref().unwrap_or(&url);

    let document = fetch_and_parse(&state.client, effective)
        .await
        .map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Feed endpoint request failed");
            ApiError::upstream(e)
        })?;

    let discovered_url = discovered.filter(|d| d != &url);

    Ok(Json(FeedResponse {
        feed: document,
        discovered_url,
    }))
}

async fn health() -> &'static str {
    "OK"
}
