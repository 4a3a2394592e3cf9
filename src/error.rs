//! Defines the app level error type and its conversion to JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde_json::json;
use time::Date;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A zero or negative amount was used where a positive amount is required.
    ///
    /// Every ledger amount is strictly positive; whether it adds to or
    /// subtracts from the balance is decided by the transaction type.
    #[error("amount must be greater than zero, got {0}")]
    InvalidAmount(Decimal),

    /// A date range was inverted or otherwise unusable.
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    /// The caller tried to modify or delete a system-owned resource.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The analytics cache could not be invalidated after a successful ledger
    /// write.
    ///
    /// This is retried internally before being surfaced. Serving a stale
    /// aggregate after a write is a correctness violation, so the operation
    /// reports failure rather than leaving the cache inconsistent.
    #[error("the reporting caches could not be refreshed after the write")]
    ConsistencyFailure,

    /// Tried to delete a category that still has transactions recorded
    /// against it.
    #[error("the category has recorded transactions and cannot be deleted")]
    CategoryInUse,

    /// The specified category name already exists.
    #[error("the category \"{0}\" already exists")]
    DuplicateCategoryName(String),

    /// A budget for the same category already covers part of the requested
    /// period.
    #[error("a budget already exists for this category and period")]
    OverlappingBudget,

    /// An alert threshold outside the 0-100 percent range was given.
    #[error("alert threshold must be between 0 and 100, got {0}")]
    InvalidAlertThreshold(i64),

    /// An empty string was used to create a savings goal name.
    #[error("savings goal name cannot be empty")]
    EmptyGoalName,

    /// A savings goal deadline was set before the goal could start.
    #[error("{0} is in the past, savings goal deadlines must be today or later")]
    DeadlineInPast(Date),

    /// The savings goal is no longer active and cannot accept contributions.
    #[error("the savings goal is not active")]
    GoalNotActive,

    /// The request did not carry a resolved user id.
    ///
    /// The session layer in front of this service authenticates callers and
    /// forwards their id; a request without one cannot be served.
    #[error("no user id was forwarded with the request")]
    MissingUserId,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An error occurred while serializing a struct as JSON
    #[error("could not serialize as JSON: {0}")]
    JsonSerializationError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = match &self {
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::InvalidAmount(_)
            | Error::InvalidDateRange(_)
            | Error::InvalidAlertThreshold(_)
            | Error::EmptyGoalName
            | Error::DeadlineInPast(_)
            | Error::GoalNotActive => StatusCode::UNPROCESSABLE_ENTITY,
            Error::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Error::CategoryInUse | Error::DuplicateCategoryName(_) | Error::OverlappingBudget => {
                StatusCode::CONFLICT
            }
            Error::MissingUserId => StatusCode::UNAUTHORIZED,
            Error::ConsistencyFailure => StatusCode::INTERNAL_SERVER_ERROR,
            // Any errors that are not handled above are not intended to be
            // shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "an unexpected error occurred" })),
                )
                    .into_response();
            }
        };

        (status_code, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
