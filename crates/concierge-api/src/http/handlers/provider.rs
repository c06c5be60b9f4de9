//! Provider health endpoint.
//!
//! GET /api/v1/providers - Live circuit breaker state of every provider.

use std::time::Instant;

use axum::extract::State;
use axum::Json;

use concierge_types::llm::ProviderStatusInfo;

use crate::http::response::ApiResponse;
use crate::state::AppState;

pub async fn list_providers(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<ProviderStatusInfo>>> {
    let start = Instant::now();
    let statuses = state.router.health_status();
    Json(
        ApiResponse::success(
            statuses,
            uuid::Uuid::now_v7().to_string(),
            start.elapsed().as_millis() as u64,
        )
        .with_link("self", "/api/v1/providers"),
    )
}
