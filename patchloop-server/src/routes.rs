//! HTTP route handlers for the agent API.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use patchloop::cancel::CancelToken;
use patchloop::controller::run_agent;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::state::AppState;

const NO_CHANGES: &str = "agent didn't produce any code changes";

/// Build the application router with permissive CORS.
pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/agent", post(run_agent_handler))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

/// GET / - liveness check.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "running".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct AgentRequest {
    code: String,
    instruction: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AgentResponse {
    plan: Vec<String>,
    result: String,
    success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    detail: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn internal_error(detail: impl Into<String>) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            detail: detail.into(),
        }),
    )
}

/// POST /agent - plan and apply `instruction` to `code`.
///
/// The run executes on the blocking pool. If the client disconnects, the
/// handler future is dropped and the guard cancels the run.
async fn run_agent_handler(
    State(state): State<AppState>,
    Json(request): Json<AgentRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    info!(
        instruction = %request.instruction,
        code_bytes = request.code.len(),
        "agent request"
    );

    let cancel = CancelToken::new();
    let guard = cancel.drop_guard();
    let task_state = state.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        run_agent(
            &*task_state.model,
            &*task_state.search,
            &request.instruction,
            &request.code,
            &task_state.config,
            &cancel,
            |report| {
                info!(
                    step = report.index,
                    total = report.total,
                    tier = ?report.tier,
                    "step applied"
                );
            },
        )
    })
    .await
    .map_err(|e| internal_error(format!("agent task failed: {e}")))?
    .map_err(|e| internal_error(format!("{e:#}")))?;
    guard.disarm();

    if let Some(error) = &outcome.error {
        warn!(error = %error, "agent run failed");
        return Err(internal_error(error.to_string()));
    }
    if outcome.steps_applied() == 0 || outcome.final_code.trim().is_empty() {
        warn!(steps = outcome.steps.len(), "agent run produced no changes");
        return Err(internal_error(NO_CHANGES));
    }

    Ok(Json(AgentResponse {
        plan: outcome.steps,
        result: outcome.final_code,
        success: true,
    }))
}
