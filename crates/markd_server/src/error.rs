use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use markd_core::{PathError, RenderError};

/// Log target of rejected path escapes.
pub const SECURITY_TARGET: &str = "markd::security";

/// Request scoped failures, each mapped onto one status code.
///
/// The response body never carries the underlying detail, which only goes
/// to the logs.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("bad request: {0}")]
    BadRequest(&'static str),
    #[error("failed to render {path}: {source}")]
    Render {
        path: String,
        #[source]
        source: RenderError,
    },
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<PathError> for ServerError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::NotFound(path) => Self::NotFound(path),
            PathError::Forbidden(path) => Self::Forbidden(path),
        }
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Render { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            Self::NotFound(path) => tracing::debug!(%path, "Not found"),
            Self::Forbidden(path) => {
                tracing::warn!(
                    target: SECURITY_TARGET,
                    %path,
                    "Rejected path outside of the served root"
                )
            }
            Self::BadRequest(reason) => tracing::debug!(%reason, "Bad request"),
            Self::Render { .. } | Self::Internal(_) => {
                tracing::error!(error = %self, "Request failed")
            }
        }

        let message = match &self {
            Self::BadRequest(reason) => *reason,
            _ => status.canonical_reason().unwrap_or("Error"),
        };

        let body = format!(
            "<!DOCTYPE html>\n<html><head><title>{code} {message}</title></head>\
             <body><h1>{code} {message}</h1></body></html>\n",
            code = status.as_u16(),
        );

        (status, Html(body)).into_response()
    }
}
