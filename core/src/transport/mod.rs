//! The seam between the scheduler and whatever actually talks to the network.
//!
//! # Design
//! The scheduler only needs "send this request, eventually produce response
//! metadata and body bytes, or an error". `Transport` captures exactly that
//! as a boxed future so implementations can be async clients, blocking
//! clients pushed onto a worker pool, or scripted fakes in tests. Timeouts,
//! TLS, redirects and connection reuse are the implementation's business.

use std::fmt;

use futures::future::BoxFuture;

use crate::http::{HttpRequest, HttpResponse};

#[cfg(feature = "ureq-transport")]
mod blocking;

#[cfg(feature = "ureq-transport")]
pub use blocking::UreqTransport;

/// Per-host connection limit assumed when a transport does not state one.
pub const DEFAULT_MAX_CONNECTIONS_PER_HOST: usize = 6;

pub type TransportFuture = BoxFuture<'static, Result<TransportResponse, TransportError>>;

/// Executes admitted requests.
///
/// `execute` is called at most once per admitted descriptor and the returned
/// future is driven to completion on the scheduler's runtime, even if the
/// descriptor is cancelled in the meantime.
pub trait Transport: Send + Sync + 'static {
    fn execute(&self, request: HttpRequest) -> TransportFuture;

    /// Used as the scheduler's ceiling when the client config leaves it unset.
    fn max_connections_per_host(&self) -> usize {
        DEFAULT_MAX_CONNECTIONS_PER_HOST
    }
}

/// What a transport produced for a completed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub response: HttpResponse,
    /// `None` when the exchange carries no body at all (e.g. `HEAD`).
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Connect,
    Timeout,
    Protocol,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Protocol => "protocol",
            TransportErrorKind::Other => "transport",
        };
        f.write_str(name)
    }
}

/// A failure reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
