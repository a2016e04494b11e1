use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub transcript: String,
}

/// REST mirror of the `search_properties` WebSocket command.
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Json<Value> {
    let recommendations = state.listings.search(&request.transcript).await;
    info!(count = recommendations.len(), "REST property search");
    Json(json!({ "recommendations": recommendations }))
}
