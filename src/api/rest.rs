// =============================================================================
// REST API Endpoints (Axum 0.7)
// =============================================================================
//
// All endpoints live under `/api/v1/` and are read-only.  View computation
// reads CSV files and runs the indicator pipeline, so it is moved off the
// async runtime with `spawn_blocking`.
//
// Ratio fields of indicator rows that went non-finite (a zero price) are sent
// as "inf", "-inf" or "NaN"; `null` only ever means undefined.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error};

use crate::app_state::{AppState, ViewError};
use crate::ats_view::{AtsView, PeriodLatest};

// =============================================================================
// Router construction
// =============================================================================

/// Build the REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/config", get(config))
        .route("/api/v1/view/:symbol", get(view))
        .route("/api/v1/view/:symbol/latest", get(latest))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorBody { error: message })).into_response()
}

impl IntoResponse for ViewError {
    fn into_response(self) -> Response {
        let status = match &self {
            ViewError::NotFound(_) => StatusCode::NOT_FOUND,
            ViewError::Load(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ViewError::Indicator(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, self.to_string())
    }
}

/// Run the (blocking) view lookup on the blocking pool.
async fn fetch_view(
    state: Arc<AppState>,
    symbol: String,
    plain: bool,
) -> Result<Arc<AtsView>, Response> {
    let result = tokio::task::spawn_blocking(move || state.view_for(&symbol, plain)).await;
    match result {
        Ok(Ok(view)) => Ok(view),
        Ok(Err(e)) => Err(e.into_response()),
        Err(e) => {
            error!(error = %e, "view task failed");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "view task failed".to_string(),
            ))
        }
    }
}

// =============================================================================
// Health
// =============================================================================

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.health())
}

// =============================================================================
// Config
// =============================================================================

async fn config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.runtime_config.read().clone();
    Json(config)
}

// =============================================================================
// Views
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct ViewQuery {
    #[serde(default)]
    plain: bool,
}

async fn view(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Response {
    debug!(symbol = %symbol, plain = query.plain, "view requested");
    match fetch_view(state, symbol, query.plain).await {
        Ok(view) => Json(view.as_ref()).into_response(),
        Err(resp) => resp,
    }
}

#[derive(Serialize)]
struct LatestResponse {
    symbol: String,
    last_date: Option<NaiveDate>,
    periods: Vec<PeriodLatest>,
}

async fn latest(State(state): State<Arc<AppState>>, Path(symbol): Path<String>) -> Response {
    match fetch_view(state, symbol, false).await {
        Ok(view) => Json(LatestResponse {
            symbol: view.symbol.clone(),
            last_date: view.last_date,
            periods: view.latest(),
        })
        .into_response(),
        Err(resp) => resp,
    }
}
