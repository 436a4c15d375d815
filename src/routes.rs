//! HTTP trigger endpoints. The service does not decide when to run; these
//! routes and the daily loop in `runtime` are the two external triggers.

use crate::application::commands::{
    appointment_changed_impl, run_sweep_impl, AppState, ChangeResponse, SweepResponse,
};
use crate::infrastructure::definition_mapper::ChangeEventPayload;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sweep", post(sweep))
        .route("/appointments/changed", post(appointment_changed))
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

struct AppError(String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse { error: self.0 });
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

async fn health() -> &'static str {
    "ok"
}

/// POST /sweep - run one periodic sweep now
async fn sweep(State(state): State<Arc<AppState>>) -> Result<Json<SweepResponse>, AppError> {
    run_sweep_impl(&state)
        .map(Json)
        .map_err(|error| AppError(state.command_error("run_sweep", &error)))
}

/// POST /appointments/changed - apply one definition change notification
async fn appointment_changed(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChangeEventPayload>,
) -> Result<Json<ChangeResponse>, AppError> {
    appointment_changed_impl(&state, payload)
        .map(Json)
        .map_err(|error| AppError(state.command_error("appointment_changed", &error)))
}
