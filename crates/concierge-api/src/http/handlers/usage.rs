//! Usage statistics endpoint.
//!
//! GET /api/v1/usage?window_secs=3600 - Per-provider spend and tokens over
//! a trailing window.

use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use concierge_types::usage::UsageStats;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_window_secs() -> u64 {
    3600
}

pub async fn get_usage(
    State(state): State<AppState>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<ApiResponse<UsageStats>>, AppError> {
    let start = Instant::now();
    if query.window_secs == 0 {
        return Err(AppError::Validation("window_secs must be positive".to_string()));
    }

    let stats = state
        .router
        .ledger()
        .get_usage_stats(Duration::from_secs(query.window_secs));
    Ok(Json(
        ApiResponse::success(
            stats,
            uuid::Uuid::now_v7().to_string(),
            start.elapsed().as_millis() as u64,
        )
        .with_link("self", "/api/v1/usage"),
    ))
}
