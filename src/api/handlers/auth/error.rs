//! Error taxonomy for the auth endpoints.
//!
//! Authentication failures collapse to one uniform message so callers cannot
//! distinguish unknown users, wrong passwords, or revoked/expired tokens.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use super::types::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Duplicate(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid credentials")]
    Authentication,
    #[error("Insufficient role")]
    Authorization,
    #[error("Rate limited")]
    RateLimited,
    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub(super) const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Duplicate(_) | Self::NotFound(_) => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Authorization => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            error!("internal error: {err:#}");
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}
