//! API error type and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::domain::aggregates::{InventoryError, OrderError, PricingError, ReturnError};
use crate::domain::value_objects::SkuError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("authentication required")]
    Unauthorized,

    #[error("not allowed")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Return(#[from] ReturnError),

    #[error(transparent)]
    Sku(#[from] SkuError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidCredentials | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest(_)
            | Self::Order(_)
            | Self::Inventory(_)
            | Self::Pricing(_)
            | Self::Return(_)
            | Self::Sku(_) => StatusCode::BAD_REQUEST,
            Self::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            // Duplicate phone/name/SKU is bad client input, not a server
            // fault; uniqueness is enforced by the schema rather than
            // pre-checks.
            Self::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                StatusCode::CONFLICT
            }
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                match db.constraint() {
                    Some(c) => format!("already exists ({c})"),
                    None => "already exists".to_string(),
                }
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(serde_json::json!({
            "status": "error",
            "message": self.message(),
        }));
        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::BadRequest(e.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_are_client_errors() {
        let err: ApiError = OrderError::EmptyOrder.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let err: ApiError = InventoryError::Insufficient { available: 1, requested: 2 }.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_rows_map_to_404() {
        let err = ApiError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::NotFound("Order").status(), StatusCode::NOT_FOUND);
    }

    #[derive(Debug)]
    struct DuplicatePhone;

    impl std::fmt::Display for DuplicatePhone {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("duplicate key value violates unique constraint \"users_phone_key\"")
        }
    }
    impl std::error::Error for DuplicatePhone {}

    impl sqlx::error::DatabaseError for DuplicatePhone {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint \"users_phone_key\""
        }
        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some("23505".into())
        }
        fn constraint(&self) -> Option<&str> {
            Some("users_phone_key")
        }
        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }
        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }
        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }
        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn unique_violations_are_conflicts_not_server_errors() {
        let err = ApiError::Database(sqlx::Error::Database(Box::new(DuplicatePhone)));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.message(), "already exists (users_phone_key)");
    }

    #[test]
    fn other_database_errors_stay_internal() {
        let err = ApiError::Database(sqlx::Error::PoolClosed);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
