//! Message dispatch endpoint.
//!
//! POST /api/v1/dispatch - Run a message through middleware, the handler
//! registry and, if unclaimed, the provider router.

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use concierge_types::dispatch::{DispatchContext, DispatchResponse};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DispatchBody {
    pub message: String,
    pub context: DispatchContext,
}

pub async fn dispatch(
    State(state): State<AppState>,
    Json(body): Json<DispatchBody>,
) -> Result<Json<ApiResponse<DispatchResponse>>, AppError> {
    let start = Instant::now();

    if body.context.user_id.trim().is_empty() {
        return Err(AppError::Validation("context.user_id must not be empty".to_string()));
    }

    let response = state.dispatcher.dispatch(body.message, body.context).await;
    let request_id = response
        .metadata
        .request_id
        .map(|id| id.to_string())
        .unwrap_or_default();

    Ok(Json(ApiResponse::success(
        response,
        request_id,
        start.elapsed().as_millis() as u64,
    )))
}
