//! Error types shared by the PostgREST storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`RestDaoError`] failures.
pub type RestResult<T> = Result<T, RestDaoError>;

/// Failures that can occur while interacting with the REST backend.
#[derive(Debug, Error)]
pub enum RestDaoError {
    /// Required environment variable is missing.
    #[error("missing REST backend environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// Environment variable is present but unusable.
    #[error("invalid value `{value}` for `{var}`")]
    InvalidEnvVar {
        /// Name of the variable.
        var: &'static str,
        /// Rejected value.
        value: String,
    },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build REST client")]
    ClientBuilder {
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent.
    #[error("failed to send request to `{table}`")]
    RequestSend {
        /// Table the request targeted.
        table: &'static str,
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// The backend answered with an unexpected status code.
    #[error("unexpected response status {status} for `{table}`")]
    RequestStatus {
        /// Table the request targeted.
        table: &'static str,
        /// Status the backend answered with.
        status: StatusCode,
    },
    /// Response payload could not be parsed into the expected rows.
    #[error("failed to decode response for `{table}`")]
    DecodeResponse {
        /// Table the request targeted.
        table: &'static str,
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// A write returned no representation.
    #[error("no `{table}` row matched the write")]
    NoRowMatched {
        /// Table the write targeted.
        table: &'static str,
    },
}

impl From<RestDaoError> for StorageError {
    fn from(err: RestDaoError) -> Self {
        match err {
            RestDaoError::DecodeResponse { table, source } => StorageError::Decode {
                collection: table,
                message: source.to_string(),
            },
            RestDaoError::RequestStatus { table, status } if status.is_client_error() => {
                StorageError::rejected(table, format!("status {status}"))
            }
            RestDaoError::NoRowMatched { table } => StorageError::rejected(table, "no row matched"),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
