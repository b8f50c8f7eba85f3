//! HTTP error mapping for control-plane failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use needle_sim::ControlError;
use serde::Serialize;

/// Error body returned by every failing route.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("control task failed: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Control(ControlError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Control(ControlError::Decode { .. }) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "control request failed");
        } else {
            tracing::debug!(error = %self, %status, "control request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
