use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    DatabaseError(sqlx::Error),
    MigrationError(sqlx::migrate::MigrateError),
    ConfigError(String),
    InternalError(String),
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
}

/// RFC 7807 body returned for every error response.
#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub title: &'static str,
    pub status: u16,
    pub detail: String,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::MigrationError(e) => write!(f, "Migration error: {}", e),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::MigrationError(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::DatabaseError(_)
            | AppError::MigrationError(_)
            | AppError::ConfigError(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn problem_details(&self) -> ProblemDetails {
        match self {
            AppError::NotFound(msg) => ProblemDetails {
                kind: "https://tools.ietf.org/html/rfc9110#section-15.5.5",
                title: "Not Found",
                status: 404,
                detail: msg.clone(),
            },
            AppError::BadRequest(msg) => ProblemDetails {
                kind: "https://tools.ietf.org/html/rfc9110#section-15.5.1",
                title: "Bad Request",
                status: 400,
                detail: msg.clone(),
            },
            AppError::Unauthorized(msg) => ProblemDetails {
                kind: "https://tools.ietf.org/html/rfc9110#section-15.5.2",
                title: "Unauthorized",
                status: 401,
                detail: msg.clone(),
            },
            // server-side details never leave the log
            _ => ProblemDetails {
                kind: "https://tools.ietf.org/html/rfc9110#section-15.6.1",
                title: "Server error",
                status: 500,
                detail: "An unexpected error has occurred".to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::DatabaseError(ref e) => tracing::error!("Database error: {:?}", e),
            AppError::MigrationError(ref e) => tracing::error!("Migration error: {:?}", e),
            AppError::ConfigError(ref msg) => tracing::error!("Configuration error: {}", msg),
            AppError::InternalError(ref msg) => tracing::error!("Internal error: {}", msg),
            AppError::Unauthorized(ref msg) => tracing::debug!("Rejected request: {}", msg),
            _ => {}
        }

        (
            self.status(),
            [(header::CONTENT_TYPE, "application/problem+json")],
            Json(self.problem_details()),
        )
            .into_response()
    }
}
