//! Request-level rejections and their HTTP mapping

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use krb_protocol::wire::MISSING_FIELD_HEADER;

/// Why a single request was turned away. The reason is logged; the response
/// carries only the status and a generic body, so a caller cannot tell which
/// stage of ticket or authenticator checking failed.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Framing metadata missing or malformed; names the offending header.
    #[error("missing or invalid header {0}")]
    BadRequest(&'static str),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProtocolError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Metrics label
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "error",
        }
    }
}

impl IntoResponse for ProtocolError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::Internal(_) => tracing::error!(status = %status, "{self}"),
            _ => tracing::warn!(status = %status, "request rejected: {self}"),
        }

        let body = match &self {
            Self::BadRequest(_) => "Bad Request",
            Self::Unauthorized(_) => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::NotFound(_) => "Not Found",
            Self::Internal(_) => "Internal Server Error",
        };

        let mut response = (status, body).into_response();
        if let Self::BadRequest(field) = self {
            response.headers_mut().insert(
                HeaderName::from_static(MISSING_FIELD_HEADER),
                HeaderValue::from_static(field),
            );
        }
        response
    }
}
