//! Asynchronous endpoint client with bounded, prioritized dispatch.
//!
//! # Overview
//! Callers queue `EndpointRequest`s with a callback. The client composes
//! wire requests, a `Scheduler` admits at most a fixed number of them at a
//! time in priority order, a `Transport` executes them, and a
//! `ResultDecoder` turns each result into the value the callback expects.
//!
//! # Design
//! - The scheduler owns every in-flight request. Callers hold only a
//!   `RequestHandle` and cancel through it or through a group name.
//! - Admission is serialized per scheduler; transport calls and callbacks
//!   run in tokio tasks outside that critical section.
//! - Cancellation suppresses callbacks. It never aborts a transport call.
//! - The transport is a trait so the network layer can be swapped out; the
//!   `ureq-transport` feature provides a blocking `ureq` implementation.

pub mod aggregator;
pub mod client;
pub mod config;
pub mod decoder;
pub mod descriptor;
pub mod error;
pub mod http;
pub mod request;
pub mod scheduler;
pub mod sync;
pub mod transport;

pub use aggregator::ResponseAggregator;
pub use client::EndpointClient;
pub use config::{ClientConfig, ClientConfigBuilder, MultiValueQueryHandling};
pub use decoder::{JsonDecoder, RawResponse, ResultDecoder};
pub use descriptor::{Priority, RequestHandle, RequestState, SubmitOptions};
pub use error::{ClientError, EndpointError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, HttpStatus};
pub use request::{EndpointRequest, QueryValue};
pub use scheduler::Scheduler;
pub use transport::{
    Transport, TransportError, TransportErrorKind, TransportFuture, TransportResponse,
};

#[cfg(feature = "ureq-transport")]
pub use transport::UreqTransport;
