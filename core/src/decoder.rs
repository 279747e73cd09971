//! Turns transport output into the value a caller asked for.
//!
//! # Design
//! Each request kind is a `ResultDecoder` variant carrying the caller's
//! callback. `decode` consumes the decoder, so a callback can run at most
//! once. Every variant follows the same rules:
//!
//! - a transport error is passed through untouched and nothing is decoded;
//! - a variant that needs content (text, integer, JSON, file) reports
//!   `UnableToProcessResponseData` when the body is missing or unusable;
//! - status codes are not errors; callers that care read the response.
//!
//! The JSON variant is the only one that supports fan-out. In multi mode a
//! set of decoders share one `ResponseAggregator`; every completion calls the
//! partial callback and the last one fires the final callback.

use std::fmt;
use std::io::Write;
use std::num::NonZeroUsize;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::aggregator::ResponseAggregator;
use crate::error::EndpointError;
use crate::http::HttpResponse;
use crate::transport::{TransportError, TransportResponse};

pub type Callback<T> = Box<dyn FnOnce(Result<T, EndpointError>) + Send + 'static>;

pub type TransportOutcome = Result<TransportResponse, TransportError>;

/// Response metadata with the body exactly as the transport delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub response: HttpResponse,
    pub body: Option<Vec<u8>>,
}

pub enum ResultDecoder {
    Raw(Callback<RawResponse>),
    Text(Callback<String>),
    Integer(Callback<i64>),
    Json(JsonDecoder),
    /// Persists the body to `destination`; the callback gets the response
    /// metadata once the file is in place.
    File {
        destination: PathBuf,
        on_result: Callback<HttpResponse>,
    },
    Success(Callback<HttpResponse>),
    /// Headers only; any body is ignored.
    Head(Callback<Vec<(String, String)>>),
}

impl ResultDecoder {
    pub fn raw(
        on_result: impl FnOnce(Result<RawResponse, EndpointError>) + Send + 'static,
    ) -> Self {
        ResultDecoder::Raw(Box::new(on_result))
    }

    pub fn text(on_result: impl FnOnce(Result<String, EndpointError>) + Send + 'static) -> Self {
        ResultDecoder::Text(Box::new(on_result))
    }

    pub fn integer(on_result: impl FnOnce(Result<i64, EndpointError>) + Send + 'static) -> Self {
        ResultDecoder::Integer(Box::new(on_result))
    }

    pub fn json<T, F>(on_result: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: FnOnce(Result<T, EndpointError>) + Send + 'static,
    {
        ResultDecoder::Json(JsonDecoder::single(on_result))
    }

    pub fn file(
        destination: impl Into<PathBuf>,
        on_result: impl FnOnce(Result<HttpResponse, EndpointError>) + Send + 'static,
    ) -> Self {
        ResultDecoder::File {
            destination: destination.into(),
            on_result: Box::new(on_result),
        }
    }

    pub fn success(
        on_result: impl FnOnce(Result<HttpResponse, EndpointError>) + Send + 'static,
    ) -> Self {
        ResultDecoder::Success(Box::new(on_result))
    }

    pub fn head(
        on_result: impl FnOnce(Result<Vec<(String, String)>, EndpointError>) + Send + 'static,
    ) -> Self {
        ResultDecoder::Head(Box::new(on_result))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResultDecoder::Raw(_) => "raw",
            ResultDecoder::Text(_) => "text",
            ResultDecoder::Integer(_) => "integer",
            ResultDecoder::Json(_) => "json",
            ResultDecoder::File { .. } => "file",
            ResultDecoder::Success(_) => "success",
            ResultDecoder::Head(_) => "head",
        }
    }

    /// Decodes `outcome` and invokes the callback, synchronously.
    pub fn decode(self, outcome: TransportOutcome) {
        let outcome = outcome.map_err(EndpointError::from);
        match self {
            ResultDecoder::Raw(on_result) => on_result(outcome.map(|t| RawResponse {
                response: t.response,
                body: t.body,
            })),
            ResultDecoder::Text(on_result) => {
                on_result(outcome.and_then(|t| decode_text(t.body.as_deref())))
            }
            ResultDecoder::Integer(on_result) => {
                on_result(outcome.and_then(|t| decode_integer(t.body.as_deref())))
            }
            ResultDecoder::Json(decoder) => (decoder.deliver)(outcome),
            ResultDecoder::File {
                destination,
                on_result,
            } => on_result(outcome.and_then(|t| {
                persist(&destination, t.body.as_deref())?;
                Ok(t.response)
            })),
            ResultDecoder::Success(on_result) => on_result(outcome.map(|t| t.response)),
            ResultDecoder::Head(on_result) => on_result(outcome.map(|t| t.response.headers)),
        }
    }
}

impl fmt::Debug for ResultDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultDecoder::File { destination, .. } => f
                .debug_struct("ResultDecoder::File")
                .field("destination", destination)
                .finish_non_exhaustive(),
            other => write!(f, "ResultDecoder::{}", other.kind()),
        }
    }
}

/// A type-erased JSON decoder, either standalone or one member of a
/// fanned-out set sharing an aggregator.
pub struct JsonDecoder {
    deliver: Box<dyn FnOnce(Result<TransportResponse, EndpointError>) + Send + 'static>,
}

impl JsonDecoder {
    pub fn single<T, F>(on_result: F) -> Self
    where
        T: DeserializeOwned + 'static,
        F: FnOnce(Result<T, EndpointError>) + Send + 'static,
    {
        Self {
            deliver: Box::new(move |outcome| {
                on_result(outcome.and_then(|t| decode_json(t.body.as_deref())))
            }),
        }
    }

    /// Builds `total` decoders sharing one aggregator. `on_partial` sees every
    /// completion; `on_complete` fires once, after the last, with every error.
    pub fn multi<T, P, C>(total: NonZeroUsize, on_partial: P, on_complete: C) -> Vec<Self>
    where
        T: DeserializeOwned + 'static,
        P: Fn(Result<T, EndpointError>) + Send + Sync + 'static,
        C: FnOnce(Vec<EndpointError>) + Send + 'static,
    {
        let aggregator = Arc::new(ResponseAggregator::new(total, on_complete));
        let on_partial = Arc::new(on_partial);
        (0..total.get())
            .map(|_| {
                let aggregator = Arc::clone(&aggregator);
                let on_partial = Arc::clone(&on_partial);
                Self {
                    deliver: Box::new(move |outcome| {
                        let decoded =
                            outcome.and_then(|t| decode_json::<T>(t.body.as_deref()));
                        let error = decoded.as_ref().err().cloned();
                        // A panicking partial callback still counts toward the total.
                        let delivered = catch_unwind(AssertUnwindSafe(|| on_partial(decoded)));
                        aggregator.record_partial(error);
                        if let Err(panic) = delivered {
                            resume_unwind(panic);
                        }
                    }),
                }
            })
            .collect()
    }
}

pub fn decode_text(body: Option<&[u8]>) -> Result<String, EndpointError> {
    let bytes = body.ok_or(EndpointError::UnableToProcessResponseData)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| EndpointError::UnableToProcessResponseData)
}

/// Surrounding ASCII whitespace is ignored, so `"42\n"` decodes to 42.
pub fn decode_integer(body: Option<&[u8]>) -> Result<i64, EndpointError> {
    body.and_then(|bytes| std::str::from_utf8(bytes).ok())
        .and_then(|text| text.trim().parse().ok())
        .ok_or(EndpointError::UnableToProcessResponseData)
}

pub fn decode_json<T: DeserializeOwned>(body: Option<&[u8]>) -> Result<T, EndpointError> {
    match body {
        Some(bytes) if !bytes.is_empty() => Ok(serde_json::from_slice(bytes)?),
        _ => Err(EndpointError::UnableToProcessResponseData),
    }
}

/// Writes to a temporary file next to `destination` and renames it into
/// place, so `destination` is either untouched or complete.
pub fn persist(destination: &Path, body: Option<&[u8]>) -> Result<(), EndpointError> {
    let bytes = body.ok_or(EndpointError::UnableToProcessResponseData)?;
    let directory = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(directory)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(destination).map_err(|err| err.error)?;
    Ok(())
}
