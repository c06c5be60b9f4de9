//! Handler registry endpoints.
//!
//! GET /api/v1/handlers         - List registered handlers.
//! GET /api/v1/handlers/stubs   - Catalog intents with no handler.
//! GET /api/v1/handlers/{name}  - One handler's details.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;

use concierge_core::handler::stubs::HandlerStub;
use concierge_types::dispatch::HandlerInfo;
use concierge_types::intent::Intent;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

pub async fn list_handlers(State(state): State<AppState>) -> Json<ApiResponse<Vec<HandlerInfo>>> {
    let start = Instant::now();
    let handlers = state.dispatcher.registry().list_handlers();
    Json(
        ApiResponse::success(
            handlers,
            uuid::Uuid::now_v7().to_string(),
            start.elapsed().as_millis() as u64,
        )
        .with_link("self", "/api/v1/handlers")
        .with_link("stubs", "/api/v1/handlers/stubs"),
    )
}

pub async fn get_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<HandlerInfo>>, AppError> {
    let start = Instant::now();
    let info = state.dispatcher.registry().get_handler_info(&name)?;
    Ok(Json(
        ApiResponse::success(
            info,
            uuid::Uuid::now_v7().to_string(),
            start.elapsed().as_millis() as u64,
        )
        .with_link("self", &format!("/api/v1/handlers/{name}")),
    ))
}

pub async fn handler_stubs(State(state): State<AppState>) -> Json<ApiResponse<Vec<HandlerStub>>> {
    let start = Instant::now();
    let stubs = state.dispatcher.generate_handler_stubs(&Intent::CATALOG);
    Json(ApiResponse::success(
        stubs,
        uuid::Uuid::now_v7().to_string(),
        start.elapsed().as_millis() as u64,
    ))
}
