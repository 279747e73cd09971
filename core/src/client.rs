//! Caller-facing endpoint client.
//!
//! # Design
//! `EndpointClient` turns `EndpointRequest`s into wire requests using its
//! `ClientConfig`, attaches the decoder that matches the caller's callback
//! shape and hands the result to its `Scheduler`. A request that cannot be
//! composed (bad URL, fan-out into a single-response callback) is rejected
//! here with a `ClientError` and never reaches the scheduler.
//!
//! Every `queue_*` method returns immediately. Callbacks run later on the
//! tokio runtime the client was created on, once per completed transport
//! call, unless the request was cancelled first.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::runtime::Handle;

use crate::config::ClientConfig;
use crate::decoder::{JsonDecoder, RawResponse, ResultDecoder};
use crate::descriptor::{RequestHandle, SubmitOptions};
use crate::error::{ClientError, EndpointError};
use crate::http::{HttpRequest, HttpResponse};
use crate::request::EndpointRequest;
use crate::scheduler::Scheduler;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct EndpointClient {
    config: ClientConfig,
    scheduler: Scheduler,
}

impl EndpointClient {
    /// Creates a client on the current tokio runtime.
    pub fn new(config: ClientConfig, transport: impl Transport) -> Result<Self, ClientError> {
        let runtime = Handle::try_current().map_err(|_| ClientError::NoRuntime)?;
        Self::with_runtime(config, transport, runtime)
    }

    pub fn with_runtime(
        config: ClientConfig,
        transport: impl Transport,
        runtime: Handle,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let ceiling = config
            .maximum_concurrent_requests
            .unwrap_or_else(|| transport.max_connections_per_host());
        let scheduler = Scheduler::new(Arc::new(transport), ceiling, runtime);
        scheduler.set_log_transactions(config.log_transactions);
        Ok(Self { config, scheduler })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Queues `request` with an already-built decoder. The request is never
    /// split.
    pub fn queue(
        &self,
        request: &EndpointRequest,
        options: SubmitOptions,
        decoder: ResultDecoder,
    ) -> Result<RequestHandle, ClientError> {
        let http_request = self.compose_one(request)?;
        Ok(self.scheduler.submit(http_request, &options, decoder))
    }

    pub fn queue_raw<F>(
        &self,
        request: &EndpointRequest,
        options: SubmitOptions,
        on_result: F,
    ) -> Result<RequestHandle, ClientError>
    where
        F: FnOnce(Result<RawResponse, EndpointError>) + Send + 'static,
    {
        self.queue(request, options, ResultDecoder::raw(on_result))
    }

    pub fn queue_text<F>(
        &self,
        request: &EndpointRequest,
        options: SubmitOptions,
        on_result: F,
    ) -> Result<RequestHandle, ClientError>
    where
        F: FnOnce(Result<String, EndpointError>) + Send + 'static,
    {
        self.queue(request, options, ResultDecoder::text(on_result))
    }

    pub fn queue_integer<F>(
        &self,
        request: &EndpointRequest,
        options: SubmitOptions,
        on_result: F,
    ) -> Result<RequestHandle, ClientError>
    where
        F: FnOnce(Result<i64, EndpointError>) + Send + 'static,
    {
        self.queue(request, options, ResultDecoder::integer(on_result))
    }

    /// Single-response JSON. Fails with `RequiresMultiResponse` if the
    /// request's splittable query would need more than one transport call.
    pub fn queue_json<T, F>(
        &self,
        request: &EndpointRequest,
        options: SubmitOptions,
        on_result: F,
    ) -> Result<RequestHandle, ClientError>
    where
        T: DeserializeOwned + 'static,
        F: FnOnce(Result<T, EndpointError>) + Send + 'static,
    {
        let mut requests = request.to_http_requests(&self.config, true)?;
        if requests.len() != 1 {
            return Err(ClientError::RequiresMultiResponse {
                count: requests.len(),
            });
        }
        let http_request = requests.remove(0);
        Ok(self
            .scheduler
            .submit(http_request, &options, ResultDecoder::json(on_result)))
    }

    /// Multi-response JSON. `on_partial` runs for every transport call the
    /// request fans out to; `on_complete` runs once after the last of them
    /// with every error collected along the way.
    pub fn queue_json_multi<T, P, C>(
        &self,
        request: &EndpointRequest,
        options: SubmitOptions,
        on_partial: P,
        on_complete: C,
    ) -> Result<RequestHandle, ClientError>
    where
        T: DeserializeOwned + 'static,
        P: Fn(Result<T, EndpointError>) + Send + Sync + 'static,
        C: FnOnce(Vec<EndpointError>) + Send + 'static,
    {
        let requests = request.to_http_requests(&self.config, true)?;
        let total = NonZeroUsize::new(requests.len())
            .ok_or(ClientError::RequiresMultiResponse { count: 0 })?;
        if total.get() > 1 {
            tracing::debug!(count = total.get(), "request fans out");
        }
        let decoders = JsonDecoder::multi::<T, _, _>(total, on_partial, on_complete);
        let calls = requests
            .into_iter()
            .zip(decoders.into_iter().map(ResultDecoder::Json))
            .collect();
        Ok(self.scheduler.submit_all(calls, &options))
    }

    /// Downloads the body to `destination`, replacing it only once the whole
    /// body has been written.
    pub fn queue_file<F>(
        &self,
        request: &EndpointRequest,
        options: SubmitOptions,
        destination: impl Into<PathBuf>,
        on_result: F,
    ) -> Result<RequestHandle, ClientError>
    where
        F: FnOnce(Result<HttpResponse, EndpointError>) + Send + 'static,
    {
        self.queue(request, options, ResultDecoder::file(destination, on_result))
    }

    pub fn queue_success<F>(
        &self,
        request: &EndpointRequest,
        options: SubmitOptions,
        on_result: F,
    ) -> Result<RequestHandle, ClientError>
    where
        F: FnOnce(Result<HttpResponse, EndpointError>) + Send + 'static,
    {
        self.queue(request, options, ResultDecoder::success(on_result))
    }

    pub fn queue_head<F>(
        &self,
        request: &EndpointRequest,
        options: SubmitOptions,
        on_result: F,
    ) -> Result<RequestHandle, ClientError>
    where
        F: FnOnce(Result<Vec<(String, String)>, EndpointError>) + Send + 'static,
    {
        self.queue(request, options, ResultDecoder::head(on_result))
    }

    pub fn cancel(&self, group: &str) -> usize {
        self.scheduler.cancel(group)
    }

    pub fn cancel_handle(&self, handle: RequestHandle) -> usize {
        self.scheduler.cancel_handle(handle)
    }

    fn compose_one(&self, request: &EndpointRequest) -> Result<HttpRequest, ClientError> {
        let mut requests = request.to_http_requests(&self.config, false)?;
        requests
            .pop()
            .ok_or(ClientError::RequiresMultiResponse { count: 0 })
    }
}
