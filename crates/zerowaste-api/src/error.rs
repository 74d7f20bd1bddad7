use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use zerowaste_core::lifecycle::TransitionError;
use zerowaste_db::Database;
use zerowaste_types::api::ErrorBody;

use crate::auth::AppState;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or inconsistent input.
    #[error("{0}")]
    Validation(String),
    /// Missing, invalid or expired credentials.
    #[error("{0}")]
    Auth(String),
    /// Authenticated, but not allowed to do this.
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// The target is not in the state the operation requires.
    #[error("{0}")]
    Conflict(String),
    #[error("store read failed: {0:#}")]
    RemoteRead(anyhow::Error),
    #[error("store write failed: {0:#}")]
    RemoteWrite(anyhow::Error),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Auth(_) => "auth",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::RemoteRead(_) => "remote_read",
            Self::RemoteWrite(_) => "remote_write",
            Self::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RemoteRead(_) | Self::RemoteWrite(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(e: TransitionError) -> Self {
        Self::Conflict(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::RemoteRead(_) | Self::RemoteWrite(_) | Self::Internal(_) => {
                error!("{}", self);
                "the request could not be completed, please try again".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.kind().to_string(),
            message,
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Run store work off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| ApiError::Internal(format!("spawn_blocking join error: {}", e)))?
}
