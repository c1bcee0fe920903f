use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::core::shared::enums::LeadStatus;
use crate::core::shared::ApiResponse;

/// Error taxonomy for the REST surface. Every variant maps to one status
/// code and renders through the standard response envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error")]
    Validation(Vec<String>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Access denied")]
    AccessDenied,

    #[error("{0}")]
    Unauthorized(String),

    #[error("Too many requests, please try again later")]
    RateLimited,

    #[error("{0}")]
    UploadRejected(String),

    #[error("Cannot transition lead from {from} to {to}")]
    IllegalTransition { from: LeadStatus, to: LeadStatus },

    #[error("database error")]
    Database(#[from] diesel::result::Error),

    #[error("database pool error")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(entity: &str) -> Self {
        Self::NotFound(format!("{entity} not found"))
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::BadRequest(_)
            | Self::Conflict(_)
            | Self::UploadRejected(_)
            | Self::IllegalTransition { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Database(_) | Self::Pool(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal detail stays in the server log.
        let (message, errors) = match self {
            Self::Validation(errors) => ("Validation error".to_string(), Some(errors)),
            Self::Database(e) => {
                tracing::error!(error = %e, "database error");
                ("Internal server error".to_string(), None)
            }
            Self::Pool(e) => {
                tracing::error!(error = %e, "database pool error");
                ("Internal server error".to_string(), None)
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                ("Internal server error".to_string(), None)
            }
            other => (other.to_string(), None),
        };

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            message: Some(message),
            errors,
            pagination: None,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            ApiError::Validation(vec![]).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::not_found("Lead").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::AccessDenied.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::Unauthorized("Token expired".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::IllegalTransition {
                from: LeadStatus::Closed,
                to: LeadStatus::Open
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn illegal_transition_message_names_both_states() {
        let e = ApiError::IllegalTransition {
            from: LeadStatus::Open,
            to: LeadStatus::Negotiation,
        };
        assert_eq!(e.to_string(), "Cannot transition lead from open to negotiation");
    }
}
