use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

use crate::{api::state::AppState, error::Result};

/// The body is taken as raw text: the signature covers the exact bytes sent.
pub async fn gateway(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>> {
    let signature = headers
        .get(state.settings.gateway.signature_header.as_str())
        .and_then(|value| value.to_str().ok());

    state
        .service_context
        .webhook_service
        .ingest(&body, signature)
        .await?;

    Ok(Json(json!({ "success": true })))
}
