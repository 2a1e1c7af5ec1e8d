//! Structured API error responses with request tracking.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::GameError;

/// Top-level error payload: `{ request_id, error: { code, message } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code (NOT_FOUND, BAD_REQUEST, ...).
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    NotFound(String),
    BadRequest(String),
    InternalError(String),
}

impl ApiError {
    pub fn not_found(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::NotFound(message),
            request_id,
        }
    }

    pub fn bad_request(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::BadRequest(message),
            request_id,
        }
    }

    pub fn internal_error(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::InternalError(message),
            request_id,
        }
    }

    /// Map a domain error onto an HTTP response class. Caller mistakes are
    /// 4xx; anything infrastructural stays a 500.
    pub fn from_game(request_id: String, err: GameError) -> Self {
        match err {
            GameError::UserNotFound(_) => Self::not_found(request_id, err.to_string()),
            GameError::InsufficientBalance { .. }
            | GameError::RoundClosed { .. }
            | GameError::NoActiveRound
            | GameError::InvalidBet(_)
            | GameError::InvalidOverride(_) => Self::bad_request(request_id, err.to_string()),
            other => Self::internal_error(request_id, other.to_string()),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::NotFound(msg) => write!(f, "[{}] Not Found: {}", self.request_id, msg),
            ApiErrorKind::BadRequest(msg) => {
                write!(f, "[{}] Bad Request: {}", self.request_id, msg)
            }
            ApiErrorKind::InternalError(msg) => {
                write!(f, "[{}] Internal Error: {}", self.request_id, msg)
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.kind {
            ApiErrorKind::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiErrorKind::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiErrorKind::InternalError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id.clone(),
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Period;

    #[test]
    fn test_domain_errors_map_to_http_classes() {
        let not_found = ApiError::from_game(
            "req-1".to_string(),
            GameError::UserNotFound("alice".to_string()),
        );
        assert!(matches!(not_found.kind, ApiErrorKind::NotFound(_)));

        let bad_request = ApiError::from_game(
            "req-2".to_string(),
            GameError::RoundClosed {
                period: Period::from("20260821143032".to_string()),
            },
        );
        assert!(matches!(bad_request.kind, ApiErrorKind::BadRequest(_)));

        let internal = ApiError::from_game(
            "req-3".to_string(),
            GameError::Config("broken".to_string()),
        );
        assert!(matches!(internal.kind, ApiErrorKind::InternalError(_)));
    }
}
