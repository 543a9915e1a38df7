use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::error;
use serde::Serialize;
use std::fmt::Display;

pub type ApiResult<T> = Result<T, ApiError>;

/// Which constraint a 409 came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Duplicate,
    Reference,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{message}")]
    InvalidRequest {
        message: String,
        details: Option<String>,
    },
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Conflict {
        message: String,
        details: Option<String>,
        kind: ConflictKind,
    },
    #[error("{message}")]
    Internal {
        message: String,
        details: Option<String>,
    },
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            details: None,
            kind: ConflictKind::Duplicate,
        }
    }

    pub fn internal(message: impl Into<String>, cause: impl Display) -> Self {
        Self::Internal {
            message: message.into(),
            details: Some(cause.to_string()),
        }
    }

    /// Replaces the generic unique-violation message with a resource specific
    /// one. Foreign key conflicts keep their own message.
    pub fn or_conflict(self, message: &str) -> Self {
        self.rename_conflict(ConflictKind::Duplicate, message)
    }

    /// Same as [`ApiError::or_conflict`] for foreign key violations.
    pub fn or_reference_conflict(self, message: &str) -> Self {
        self.rename_conflict(ConflictKind::Reference, message)
    }

    fn rename_conflict(self, wanted: ConflictKind, message: &str) -> Self {
        match self {
            Self::Conflict { details, kind, .. } if kind == wanted => Self::Conflict {
                message: message.to_string(),
                details,
                kind,
            },
            other => other,
        }
    }

    pub fn or_not_found(self, message: &str) -> Self {
        match self {
            Self::NotFound(_) => Self::NotFound(message.to_string()),
            other => other,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let details = match self {
            Self::InvalidRequest { details, .. }
            | Self::Conflict { details, .. }
            | Self::Internal { details, .. } => details.clone(),
            _ => None,
        };
        ErrorBody {
            success: false,
            error: self.to_string(),
            details,
        }
    }
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound("Record not found".to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Self::Conflict {
                    message: "A record with the same unique value already exists".to_string(),
                    details: Some(info.message().to_string()),
                    kind: ConflictKind::Duplicate,
                }
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                Self::Conflict {
                    message: "The record is referenced by or refers to missing data".to_string(),
                    details: Some(info.message().to_string()),
                    kind: ConflictKind::Reference,
                }
            }
            other => Self::internal("Database operation failed", other),
        }
    }
}

impl From<diesel::r2d2::PoolError> for ApiError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        Self::internal("Database connection failed", err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest {
            message: "Invalid request body".to_string(),
            details: Some(rejection.body_text()),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidRequest {
            message: "Invalid path parameter".to_string(),
            details: Some(rejection.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidRequest {
            message: "Invalid query string".to_string(),
            details: Some(rejection.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let Self::Internal { message, details } = &self {
            error!("{message}: {}", details.as_deref().unwrap_or("no details"));
        }
        (status, Json(self.body())).into_response()
    }
}
