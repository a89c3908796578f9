//! Unified API error handling
//!
//! Provides consistent error responses across all endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::client::{ClientError, KnownErrorCode};
use crate::services::estimator::EstimateError;
use crate::services::structural::DesignError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("Database error")]
    Database(#[source] ClientError),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(anyhow::anyhow!(msg.into()))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Conflict(_) => "CONFLICT",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg)
            | Self::ServiceUnavailable(msg) => msg.clone(),
            // Don't leak internal error details
            Self::Internal(_) | Self::Database(_) => "An internal error occurred".to_string(),
        }
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        match &err {
            ClientError::NotFound { model } => Self::NotFound(format!("{} not found", model)),
            ClientError::Validation(msg) => Self::BadRequest(msg.clone()),
            ClientError::Initialization(_) => {
                tracing::error!(error = %err, "Database unavailable");
                Self::ServiceUnavailable("Database unavailable".to_string())
            }
            ClientError::KnownRequest { code, message, .. } => match code {
                KnownErrorCode::RecordNotFound => Self::NotFound(message.clone()),
                KnownErrorCode::UniqueConstraint
                | KnownErrorCode::TransactionConflict
                | KnownErrorCode::TransactionTimeout
                | KnownErrorCode::TransactionStartTimeout => Self::Conflict(message.clone()),
                KnownErrorCode::ForeignKeyConstraint
                | KnownErrorCode::NullConstraint
                | KnownErrorCode::InvalidValue => Self::BadRequest(message.clone()),
                KnownErrorCode::PoolTimeout => {
                    tracing::error!(error = %err, "Connection pool exhausted");
                    Self::ServiceUnavailable("Database busy, retry later".to_string())
                }
            },
            ClientError::UnknownRequest(_) => Self::Database(err),
        }
    }
}

impl From<DesignError> for ApiError {
    fn from(err: DesignError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<EstimateError> for ApiError {
    fn from(err: EstimateError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Log internal errors
        match &self {
            Self::Internal(e) => {
                tracing::error!(error = ?e, "Internal server error");
            }
            Self::Database(e) => {
                tracing::error!(error = ?e, "Database error");
            }
            _ => {
                tracing::warn!(error = %self, "API error");
            }
        }

        let status = self.status_code();
        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.public_message(),
            request_id: None,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ClientError) -> StatusCode {
        ApiError::from(err).status_code()
    }

    #[test]
    fn client_errors_map_to_statuses() {
        assert_eq!(
            status_of(ClientError::NotFound { model: "Project" }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ClientError::known(KnownErrorCode::RecordNotFound, "gone")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ClientError::known(KnownErrorCode::UniqueConstraint, "dup")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ClientError::known(KnownErrorCode::TransactionTimeout, "slow")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ClientError::known(KnownErrorCode::ForeignKeyConstraint, "fk")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ClientError::validation("bad take")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ClientError::known(KnownErrorCode::PoolTimeout, "busy")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ClientError::Initialization("refused".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ClientError::UnknownRequest("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_are_hidden() {
        let err = ApiError::from(ClientError::UnknownRequest("relation \"x\" does not exist".into()));
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert_eq!(err.public_message(), "An internal error occurred");

        let err = ApiError::from(ClientError::NotFound { model: "Bid" });
        assert_eq!(err.public_message(), "Bid not found");
    }

    #[test]
    fn calculator_errors_are_bad_requests() {
        let err = ApiError::from(DesignError::MissingLoads);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "Loads must be provided");
    }
}
