use std::sync::atomic::Ordering;

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "deepgram": state.settings.deepgram.api_key.is_some(),
        "openai": state.settings.openai.api_key.is_some(),
        "properties": state.listings.catalog_len(),
        "connections": state.connections.load(Ordering::SeqCst),
    }))
}
