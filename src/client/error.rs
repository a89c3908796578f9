//! Error taxonomy surfaced by the data-access client.
//!
//! Every database failure is classified into one of five categories so callers
//! can react without inspecting driver internals.

use serde::Serialize;
use thiserror::Error;

/// Classified database-reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KnownErrorCode {
    UniqueConstraint,
    ForeignKeyConstraint,
    NullConstraint,
    InvalidValue,
    TransactionConflict,
    RecordNotFound,
    PoolTimeout,
    TransactionTimeout,
    TransactionStartTimeout,
}

impl KnownErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UniqueConstraint => "UNIQUE_CONSTRAINT",
            Self::ForeignKeyConstraint => "FOREIGN_KEY_CONSTRAINT",
            Self::NullConstraint => "NULL_CONSTRAINT",
            Self::InvalidValue => "INVALID_VALUE",
            Self::TransactionConflict => "TRANSACTION_CONFLICT",
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::PoolTimeout => "POOL_TIMEOUT",
            Self::TransactionTimeout => "TRANSACTION_TIMEOUT",
            Self::TransactionStartTimeout => "TRANSACTION_START_TIMEOUT",
        }
    }
}

impl std::fmt::Display for KnownErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// Raised by the `*_or_throw` lookups.
    #[error("No {model} found")]
    NotFound { model: &'static str },

    #[error("{code}: {message}")]
    KnownRequest {
        code: KnownErrorCode,
        message: String,
        target: Option<String>,
    },

    #[error("Unknown request error: {0}")]
    UnknownRequest(String),

    #[error("Client initialization failed: {0}")]
    Initialization(String),

    #[error("Invalid query arguments: {0}")]
    Validation(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn known(code: KnownErrorCode, message: impl Into<String>) -> Self {
        Self::KnownRequest {
            code,
            message: message.into(),
            target: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn record_not_found(model: &'static str, operation: &str) -> Self {
        Self::known(
            KnownErrorCode::RecordNotFound,
            format!("{} to {} not found", model, operation),
        )
    }

    /// Code of a known request error, if this is one.
    pub fn code(&self) -> Option<KnownErrorCode> {
        match self {
            Self::KnownRequest { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Classify a failure reported by Postgres from its SQLSTATE.
    pub(crate) fn from_database_parts(
        sqlstate: Option<&str>,
        constraint: Option<&str>,
        message: &str,
    ) -> Self {
        let target = constraint.map(str::to_string);
        let known = |code: KnownErrorCode, text: String| Self::KnownRequest {
            code,
            message: text,
            target: target.clone(),
        };

        match sqlstate {
            Some("23505") => known(
                KnownErrorCode::UniqueConstraint,
                format!(
                    "Unique constraint failed on {}",
                    constraint.unwrap_or("a unique field")
                ),
            ),
            Some("23503") => known(
                KnownErrorCode::ForeignKeyConstraint,
                format!(
                    "Foreign key constraint failed on {}",
                    constraint.unwrap_or("a relation field")
                ),
            ),
            Some("23502") => known(KnownErrorCode::NullConstraint, message.to_string()),
            // check_violation
            Some("23514") => known(
                KnownErrorCode::InvalidValue,
                format!(
                    "Value violates check constraint {}",
                    constraint.unwrap_or("on the table")
                ),
            ),
            Some("40001") | Some("40P01") => known(
                KnownErrorCode::TransactionConflict,
                "Transaction failed due to a write conflict or a deadlock".to_string(),
            ),
            Some(code) if code.starts_with("22") => {
                known(KnownErrorCode::InvalidValue, message.to_string())
            }
            _ => Self::UnknownRequest(message.to_string()),
        }
    }
}

impl From<sqlx::Error> for ClientError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => {
                Self::from_database_parts(db.code().as_deref(), db.constraint(), db.message())
            }
            sqlx::Error::RowNotFound => Self::known(
                KnownErrorCode::RecordNotFound,
                "Expected a record, found none",
            ),
            sqlx::Error::PoolTimedOut => Self::known(
                KnownErrorCode::PoolTimeout,
                "Timed out fetching a new connection from the connection pool",
            ),
            sqlx::Error::PoolClosed => {
                Self::Initialization("connection pool has been closed".to_string())
            }
            sqlx::Error::Configuration(_) | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                Self::Initialization(err.to_string())
            }
            other => Self::UnknownRequest(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_is_known_with_target() {
        let err = ClientError::from_database_parts(
            Some("23505"),
            Some("users_email_key"),
            "duplicate key value violates unique constraint",
        );

        match err {
            ClientError::KnownRequest { code, target, message } => {
                assert_eq!(code, KnownErrorCode::UniqueConstraint);
                assert_eq!(target.as_deref(), Some("users_email_key"));
                assert!(message.contains("users_email_key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn sqlstate_classes_map_to_codes() {
        let code = |state: &str| ClientError::from_database_parts(Some(state), None, "x").code();

        assert_eq!(code("23503"), Some(KnownErrorCode::ForeignKeyConstraint));
        assert_eq!(code("23502"), Some(KnownErrorCode::NullConstraint));
        assert_eq!(code("23514"), Some(KnownErrorCode::InvalidValue));
        assert_eq!(code("22012"), Some(KnownErrorCode::InvalidValue));
        assert_eq!(code("22P02"), Some(KnownErrorCode::InvalidValue));
        assert_eq!(code("40001"), Some(KnownErrorCode::TransactionConflict));
        assert_eq!(code("40P01"), Some(KnownErrorCode::TransactionConflict));
    }

    #[test]
    fn unclassified_database_errors_are_unknown() {
        let err = ClientError::from_database_parts(Some("42P01"), None, "relation does not exist");
        assert!(matches!(err, ClientError::UnknownRequest(msg) if msg.contains("relation")));

        let err = ClientError::from_database_parts(None, None, "boom");
        assert!(matches!(err, ClientError::UnknownRequest(_)));
    }

    #[test]
    fn pool_errors_are_classified() {
        assert_eq!(
            ClientError::from(sqlx::Error::PoolTimedOut).code(),
            Some(KnownErrorCode::PoolTimeout)
        );
        assert!(matches!(
            ClientError::from(sqlx::Error::PoolClosed),
            ClientError::Initialization(_)
        ));
    }

    #[test]
    fn not_found_message_names_model() {
        let err = ClientError::NotFound { model: "Project" };
        assert_eq!(err.to_string(), "No Project found");
    }
}
