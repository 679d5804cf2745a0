//! Crate-wide error taxonomy.
//!
//! Every fallible operation in the domain layer returns `Result<T, AppError>`.
//! The taxonomy mirrors the error-handling design: transient I/O errors are
//! downgraded to a miss on the read path, not-found is a first-class
//! negative, validation errors are never retried, and scheduler/bus failures
//! are contained at their boundary rather than propagated.

use http::StatusCode;

use crate::{body::TakoBody, responder::Responder, types::Response};

/// Errors surfaced by the cache provider.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The underlying store failed to service the request (connection reset,
    /// timeout, or similar). Never fatal on a read: callers treat it as a miss.
    #[error("cache backend error: {0}")]
    Backend(String),

    /// A stored value could not be deserialized into the requested type.
    #[error("cache serialization error for key {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced by the primary facility repository the cache decorates.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("facility not found: {0}")]
    NotFound(String),

    #[error("invalid facility data: {0}")]
    Validation(String),

    #[error("repository backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the event bus.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("no subscribers on channel {0}")]
    NoSubscribers(String),

    #[error("event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by the scheduler.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("job not found: {0}")]
    UnknownJob(String),

    #[error("provider for job {job} failed: {source}")]
    ProviderFailed {
        job: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("provider for job {0} panicked")]
    ProviderPanicked(String),
}

/// Top-level application error, the union of every component's error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("not found")]
    NotFound,

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Maps an error to the status code REST handlers surface for it.
    ///
    /// Per the error-handling design, REST endpoints return `5xx` only on
    /// primary-repository failure; not-found and validation errors get their
    /// own 4xx codes instead of being folded into a generic server error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound | AppError::Repository(RepositoryError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            AppError::Validation(_) | AppError::Repository(RepositoryError::Validation(_)) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Responder for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({ "error": self.to_string() }).to_string();
        hyper::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(TakoBody::new(http_body_util::Full::from(bytes::Bytes::from(body))))
            .expect("well-formed error response")
    }
}
