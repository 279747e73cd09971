//! Error types for the endpoint client.
//!
//! # Design
//! `EndpointError` is what result callbacks receive. Transport failures and
//! decode failures share the one enum so every callback has the same shape;
//! callers that care which happened match on the variant. The type is
//! `Clone` because the multi-response aggregator hands each error to the
//! partial callback and also keeps it for the final error list.
//!
//! `ClientError` is returned synchronously by the caller-facing layer when a
//! request cannot be turned into a transport call at all. Such requests never
//! reach the scheduler.

use std::sync::Arc;

use crate::transport::TransportError;

/// Errors delivered to result callbacks.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EndpointError {
    /// The transport could not complete the call (connectivity, timeout,
    /// protocol). Passed through verbatim, never retried.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The body was missing or could not be turned into the expected value.
    #[error("Unable to process response data")]
    UnableToProcessResponseData,

    /// The body was not well-formed JSON.
    #[error("malformed JSON in response: {0}")]
    Json(Arc<serde_json::Error>),

    /// Persisting the body to its destination failed.
    #[error("failed to write response data: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for EndpointError {
    fn from(err: std::io::Error) -> Self {
        EndpointError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for EndpointError {
    /// Syntax errors keep their detail; a document that parsed but has the
    /// wrong shape for the target type is reported as unprocessable.
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            serde_json::error::Category::Data => EndpointError::UnableToProcessResponseData,
            serde_json::error::Category::Io => EndpointError::Io(Arc::new(err.into())),
            _ => EndpointError::Json(Arc::new(err)),
        }
    }
}

/// Errors returned synchronously while composing or submitting a request.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid URL `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The request body could not be serialized.
    #[error("failed to serialize request body: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request splits into several transport calls but was queued with a
    /// single-response callback.
    #[error("request fans out to {count} transport calls and needs a multi-response callback")]
    RequiresMultiResponse { count: usize },

    /// `EndpointClient` was created outside a tokio runtime and no handle
    /// was supplied.
    #[error("no tokio runtime available to run transport calls")]
    NoRuntime,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
