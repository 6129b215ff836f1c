use crate::supervisor::{Supervisor, SupervisorError};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use convoy_core::types::{ServiceReport, StartOutcome, StopOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
	pub supervisor: Arc<Supervisor>,
}

pub fn router(supervisor: Arc<Supervisor>) -> Router {
	Router::new()
		.route("/services", get(list_services))
		.route("/services/{id}/start", post(start_service))
		.route("/services/{id}/stop", post(stop_service))
		.route("/services/{id}/restart", post(restart_service))
		.route("/services/{id}/logs", get(service_logs))
		.route("/health", get(health))
		.layer(CorsLayer::permissive())
		.with_state(AppState { supervisor })
}

#[derive(Serialize)]
struct ErrorResponse {
	error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Unknown ids are 404, unmanaged operations 400. Everything else is a 200
/// carrying an `ok` flag in the body.
fn error_response(err: SupervisorError) -> ApiError {
	let status = match &err {
		SupervisorError::UnknownService(_) => StatusCode::NOT_FOUND,
		SupervisorError::NotManaged(_) => StatusCode::BAD_REQUEST,
	};
	(status, Json(ErrorResponse { error: err.to_string() }))
}

async fn list_services(State(state): State<AppState>) -> Json<Vec<ServiceReport>> {
	Json(state.supervisor.list_status().await)
}

async fn start_service(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<StartOutcome>, ApiError> {
	state.supervisor.start(&id).await.map(Json).map_err(error_response)
}

async fn stop_service(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<StopOutcome>, ApiError> {
	state.supervisor.stop(&id).await.map(Json).map_err(error_response)
}

async fn restart_service(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<StartOutcome>, ApiError> {
	state.supervisor.restart(&id).await.map(Json).map_err(error_response)
}

#[derive(Deserialize)]
struct LogsQuery {
	#[serde(default = "default_last")]
	last: usize,
}

fn default_last() -> usize {
	100
}

#[derive(Serialize)]
struct LogLines {
	lines: Vec<String>,
}

async fn service_logs(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Query(query): Query<LogsQuery>,
) -> Result<Json<LogLines>, ApiError> {
	state
		.supervisor
		.tail_logs(&id, query.last)
		.await
		.map(|lines| Json(LogLines { lines }))
		.map_err(error_response)
}

#[derive(Serialize)]
struct HealthResponse {
	status: &'static str,
}

async fn health() -> Json<HealthResponse> {
	Json(HealthResponse { status: "ok" })
}
