use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use diesel::result::DatabaseErrorKind;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Structured API error returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Application-level error type that converts into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<Vec<FieldError>>,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    /// 406: team full, or a repeated vote for the same team.
    pub fn not_acceptable(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_ACCEPTABLE, code, message)
    }

    /// 451: the room was deactivated by its creator.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS,
            "ROOM_INACTIVE",
            message,
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            message,
        )
    }

    pub fn validation(details: Vec<FieldError>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_ERROR".to_string(),
            message: "Validation failed".to_string(),
            details: Some(details),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<diesel::result::Error> for ApiError {
    fn from(err: diesel::result::Error) -> Self {
        RoomError::from(err).into()
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for ApiError {
    fn from(err: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        RoomError::from(err).into()
    }
}

/// Outcomes of room operations shared by the HTTP routes and the room
/// sessions. Everything except `Database` and `Pool` is a caller-visible,
/// recoverable rejection that left stored state untouched.
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("This team reached maximum amount of participants")]
    CapacityExceeded,

    #[error("You have already voted for this team")]
    AlreadyVoted,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    ConstraintViolation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    RoomInactive(String),

    #[error("database error: {0}")]
    Database(#[source] diesel::result::Error),

    #[error("pool error: {0}")]
    Pool(#[source] diesel_async::pooled_connection::deadpool::PoolError),
}

impl RoomError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn inactive(message: impl Into<String>) -> Self {
        Self::RoomInactive(message.into())
    }

    /// Text shown to the caller. Infrastructure details never leave the server.
    pub fn client_message(&self) -> String {
        match self {
            RoomError::Database(_) | RoomError::Pool(_) => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<diesel::result::Error> for RoomError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::Error::DatabaseError;

        let (kind, info) = match err {
            DatabaseError(kind, info) => (kind, info),
            diesel::result::Error::NotFound => return RoomError::not_found("Entity not found"),
            other => return RoomError::Database(other),
        };

        let message = match kind {
            DatabaseErrorKind::UniqueViolation => "This record already exists",
            DatabaseErrorKind::ForeignKeyViolation => "A referenced record does not exist",
            DatabaseErrorKind::CheckViolation => "A value is outside the allowed range",
            other => return RoomError::Database(DatabaseError(other, info)),
        };

        // Constraint names stay in the log.
        tracing::warn!(
            constraint = info.constraint_name().unwrap_or("unknown"),
            table = info.table_name().unwrap_or("unknown"),
            detail = info.message(),
            "constraint violation"
        );
        RoomError::ConstraintViolation(message.to_string())
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for RoomError {
    fn from(err: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        RoomError::Pool(err)
    }
}

impl From<RoomError> for ApiError {
    fn from(err: RoomError) -> Self {
        let message = err.client_message();
        match err {
            RoomError::Validation(_) | RoomError::InvalidArgument(_) => {
                ApiError::bad_request(message)
            }
            RoomError::Unauthenticated(_) => ApiError::unauthorized(message),
            RoomError::PermissionDenied(_) => ApiError::forbidden(message),
            RoomError::CapacityExceeded => ApiError::not_acceptable("TEAM_FULL", message),
            RoomError::AlreadyVoted => ApiError::not_acceptable("ALREADY_VOTED", message),
            RoomError::Conflict(_) | RoomError::ConstraintViolation(_) => {
                ApiError::conflict(message)
            }
            RoomError::NotFound(_) => ApiError::not_found(message),
            RoomError::RoomInactive(_) => ApiError::unavailable(message),
            RoomError::Database(err) => {
                tracing::error!(?err, "database error");
                ApiError::internal(message)
            }
            RoomError::Pool(err) => {
                tracing::error!(?err, "pool error");
                ApiError::internal(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases: Vec<(RoomError, StatusCode)> = vec![
            (RoomError::validation("x"), StatusCode::BAD_REQUEST),
            (RoomError::InvalidArgument("x".into()), StatusCode::BAD_REQUEST),
            (RoomError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (RoomError::forbidden("x"), StatusCode::FORBIDDEN),
            (RoomError::CapacityExceeded, StatusCode::NOT_ACCEPTABLE),
            (RoomError::AlreadyVoted, StatusCode::NOT_ACCEPTABLE),
            (RoomError::conflict("x"), StatusCode::CONFLICT),
            (RoomError::ConstraintViolation("x".into()), StatusCode::CONFLICT),
            (RoomError::not_found("x"), StatusCode::NOT_FOUND),
            (
                RoomError::inactive("x"),
                StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS,
            ),
            (
                RoomError::Database(diesel::result::Error::RollbackTransaction),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status, status);
        }
    }

    #[test]
    fn infrastructure_detail_is_hidden() {
        let err = RoomError::Database(diesel::result::Error::RollbackTransaction);
        assert_eq!(err.client_message(), "An internal error occurred");

        let err = RoomError::CapacityExceeded;
        assert_eq!(
            err.client_message(),
            "This team reached maximum amount of participants"
        );
    }

    struct Violation(&'static str);

    impl diesel::result::DatabaseErrorInformation for Violation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            Some("memberships")
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            Some(self.0)
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    #[test]
    fn constraint_names_are_not_shown_to_callers() {
        let cases = [
            DatabaseErrorKind::UniqueViolation,
            DatabaseErrorKind::ForeignKeyViolation,
            DatabaseErrorKind::CheckViolation,
        ];
        for kind in cases {
            let err: RoomError = diesel::result::Error::DatabaseError(
                kind,
                Box::new(Violation("memberships_pkey")),
            )
            .into();
            assert!(matches!(err, RoomError::ConstraintViolation(_)));
            assert!(!err.client_message().contains("memberships_pkey"));

            let api: ApiError = err.into();
            assert_eq!(api.status, StatusCode::CONFLICT);
            assert!(!api.message.contains("memberships"));
        }
    }

    #[test]
    fn other_database_errors_stay_internal() {
        let err: RoomError = diesel::result::Error::DatabaseError(
            DatabaseErrorKind::SerializationFailure,
            Box::new(Violation("rooms_pkey")),
        )
        .into();
        assert!(matches!(err, RoomError::Database(_)));
    }

    #[test]
    fn diesel_not_found_maps_to_not_found() {
        let err: RoomError = diesel::result::Error::NotFound.into();
        assert!(matches!(err, RoomError::NotFound(_)));
    }
}
