use thiserror::Error;

use crate::ErrorResponse;

/// Errors returned by client operations.
///
/// Remote business failures (not-found, validation, conflict) are not errors
/// at invoke time; they arrive as [`crate::Response::Error`]. Everything here
/// is either a local validation failure, raised before any transport call, or
/// a fatal transport/protocol fault.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Base URL is not a valid absolute URL.
    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    /// Endpoint path could not be joined to the base URL.
    #[error("invalid endpoint path '{0}'")]
    InvalidPath(String),

    /// The requested operation id is not present in the operation catalog.
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    /// A required path template parameter was not provided.
    #[error("missing required path parameter '{parameter}' for operation '{operation_id}'")]
    MissingPathParameter {
        operation_id: String,
        parameter: String,
    },

    /// Two selectors the operation declares mutually exclusive were both supplied.
    #[error("operation '{operation_id}' accepts only one of '{first}' or '{second}'")]
    ConflictingSelectors {
        operation_id: String,
        first: String,
        second: String,
    },

    /// A request option has a value the client cannot send.
    #[error("invalid value for option '{option}': {reason}")]
    InvalidOption { option: String, reason: String },

    /// HTTP transport-layer request failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The array rejected the supplied credentials.
    #[error("authentication rejected: {0}")]
    Authentication(String),

    /// Response body could not be parsed as JSON.
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered in a way that breaks the paging contract.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A follow-up page of an already accepted listing was refused by the server.
    #[error("continuation page rejected with status {}", .0.status())]
    PageRejected(Box<ErrorResponse>),
}

impl ClientError {
    pub(crate) fn invalid_option(option: &str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.to_owned(),
            reason: reason.into(),
        }
    }
}
