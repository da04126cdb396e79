use axum::http::StatusCode;
use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::error::HttpError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupportError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Data service unavailable: {0}")]
    DataUnavailable(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("A realtime subscription set is already mounted")]
    SubscriptionActive,
}

impl SupportError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SupportError::Validation(_) => StatusCode::BAD_REQUEST,
            SupportError::NotFound(_) => StatusCode::NOT_FOUND,
            SupportError::SubscriptionActive => StatusCode::CONFLICT,
            SupportError::DataUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, SupportError::DataUnavailable(_))
    }
}

impl From<sqlx::Error> for SupportError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => SupportError::NotFound("Row".to_string()),
            // A message for a ticket that does not exist.
            sqlx::Error::Database(db_err) if db_err.kind() == ErrorKind::ForeignKeyViolation => {
                SupportError::NotFound("Referenced ticket".to_string())
            }
            other => SupportError::DataUnavailable(other.to_string()),
        }
    }
}

impl From<SupportError> for HttpError {
    fn from(error: SupportError) -> Self {
        HttpError::new(error.to_string(), error.status_code())
    }
}
