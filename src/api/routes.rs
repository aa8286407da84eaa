use axum::{
    routing::{get, post},
    Router,
    extract::{Json, State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use tower_http::cors::{CorsLayer, Any};
use tracing::{info, warn};

use crate::AppState;
use crate::api::models::{AppCheckRequest, HealthResponse};
use crate::api::response;
use crate::error::AppError;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/app-check", post(app_check_handler))
        .route("/health", get(health_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn app_check_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AppCheckRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "rejected app check body");
            return AppError::InvalidRequest(rejection.body_text()).into_response();
        }
    };

    info!(url = %req.url, "processing app check");
    let start_time = std::time::Instant::now();

    // The core imposes no deadline; the boundary does.
    let result = tokio::time::timeout(
        state.request_timeout,
        state.service.get_or_analyze(&req.url),
    )
    .await;

    let elapsed = start_time.elapsed();

    match result {
        Ok(Ok(outcome)) => {
            info!(url = %req.url, from_cache = outcome.from_cache, ?elapsed, "app check completed");
            response::success(outcome).into_response()
        }
        Ok(Err(err)) => {
            warn!(url = %req.url, error = %err, ?elapsed, "app check failed");
            err.into_response()
        }
        Err(_) => {
            warn!(url = %req.url, ?elapsed, "app check timed out");
            AppError::Timeout.into_response()
        }
    }
}
