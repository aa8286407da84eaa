use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};

use crate::api::response;

/// Errors that reach the HTTP boundary.
///
/// Every failure inside the analysis pipeline is collapsed into
/// `AnalysisFailed`; the specific cause is only logged.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Analysis failed")]
    AnalysisFailed,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request processing timed out")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AnalysisFailed => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Timeout => StatusCode::REQUEST_TIMEOUT,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        response::error::<()>(self.status(), self.to_string()).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
