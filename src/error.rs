use chrono::{DateTime, NaiveDate, Utc};
use rocket::http::Status;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::{catch, Request};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use std::sync::PoisonError;

/// A rejected input. The aggregate is never touched when one of these is raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title is required")]
    TitleRequired,

    #[error("title must be at most 100 characters (got {0})")]
    TitleTooLong(usize),

    #[error("detail must be at most 1000 characters (got {0})")]
    DetailTooLong(usize),

    #[error("due date is required")]
    DueDateRequired,

    #[error("due date {due} is before today ({today})")]
    DueDateInPast { due: NaiveDate, today: NaiveDate },

    #[error("public id must be a UUID: {0:?}")]
    MalformedPublicId(String),

    #[error("internal id must be a positive integer (got {0})")]
    NonPositiveInternalId(i64),

    #[error("version number must be at least 1 (got {0})")]
    NonPositiveVersion(i64),

    #[error("version number {0} cannot be incremented")]
    VersionExhausted(i64),
}

#[derive(Debug, Error)]
pub enum TodoError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("todo not found")]
    NotFound,

    #[error("todo {public_id} was modified concurrently (expected version {expected})")]
    VersionConflict { public_id: String, expected: i64 },

    #[error("stored todo {internal_id} is invalid: {reason}")]
    CorruptRow {
        internal_id: i64,
        reason: ValidationError,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<PoisonError<T>> for TodoError {
    fn from(e: PoisonError<T>) -> TodoError {
        TodoError::LockPoisoned(e.to_string())
    }
}

pub type TodoResult<T> = Result<T, TodoError>;

impl TodoError {
    pub fn status(&self) -> Status {
        match self {
            TodoError::Validation(_) => Status::BadRequest,
            TodoError::NotFound => Status::NotFound,
            TodoError::VersionConflict { .. } => Status::Conflict,
            TodoError::CorruptRow { .. } | TodoError::Database(_) | TodoError::LockPoisoned(_) => {
                Status::InternalServerError
            }
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
    pub path: String,
}

impl ErrorResponse {
    pub fn new(status: Status, message: String, request: &Request<'_>) -> ErrorResponse {
        ErrorResponse {
            timestamp: Utc::now(),
            status: status.code,
            error: status.reason().unwrap_or_default().to_string(),
            message,
            path: request.uri().path().to_string(),
        }
    }
}

impl<'r> Responder<'r, 'static> for TodoError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();

        // Storage failures are logged in full but never echoed to the caller.
        let message = if status == Status::InternalServerError {
            error!(error = %self, path = %request.uri(), "request failed");
            String::from("unexpected error")
        } else {
            self.to_string()
        };

        let body = ErrorResponse::new(status, message, request);

        Response::build_from(Json(body).respond_to(request)?)
            .status(status)
            .ok()
    }
}

// Failures raised by rocket itself (data guards, unmatched routes) get the same
// JSON body as handler errors.

#[catch(400)]
pub fn bad_request(request: &Request) -> (Status, Json<ErrorResponse>) {
    let message = String::from("request could not be read");
    (
        Status::BadRequest,
        Json(ErrorResponse::new(Status::BadRequest, message, request)),
    )
}

/// A body that is JSON but does not fit `TodoInput` (bad date, wrong type) is
/// still the caller's mistake, so it is reported as 400.
#[catch(422)]
pub fn malformed_body(request: &Request) -> (Status, Json<ErrorResponse>) {
    let message = String::from("request body is malformed");
    (
        Status::BadRequest,
        Json(ErrorResponse::new(Status::BadRequest, message, request)),
    )
}

#[catch(404)]
pub fn not_found(request: &Request) -> (Status, Json<ErrorResponse>) {
    let message = format!("no resource at {}", request.uri().path());
    (
        Status::NotFound,
        Json(ErrorResponse::new(Status::NotFound, message, request)),
    )
}

#[catch(default)]
pub fn fallback(status: Status, request: &Request) -> (Status, Json<ErrorResponse>) {
    let message = String::from("unexpected error");
    (status, Json(ErrorResponse::new(status, message, request)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            TodoError::from(ValidationError::TitleRequired).status(),
            Status::BadRequest
        );
        assert_eq!(TodoError::NotFound.status(), Status::NotFound);
        assert_eq!(
            TodoError::VersionConflict {
                public_id: "x".into(),
                expected: 3
            }
            .status(),
            Status::Conflict
        );
        assert_eq!(
            TodoError::LockPoisoned("boom".into()).status(),
            Status::InternalServerError
        );
    }

    #[test]
    fn validation_messages_name_the_constraint() {
        assert_eq!(
            ValidationError::TitleTooLong(101).to_string(),
            "title must be at most 100 characters (got 101)"
        );
        assert_eq!(
            ValidationError::DetailTooLong(1001).to_string(),
            "detail must be at most 1000 characters (got 1001)"
        );
    }
}
