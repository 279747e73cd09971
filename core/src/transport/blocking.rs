//! `Transport` backed by a blocking `ureq` agent.
//!
//! Each call runs on tokio's blocking pool so the scheduler's tasks never
//! park a runtime worker on socket I/O. Status codes are returned as data
//! (`http_status_as_error(false)`), leaving interpretation to the decoders.

use std::time::Duration;

use futures::FutureExt;

use super::{
    Transport, TransportError, TransportErrorKind, TransportFuture, TransportResponse,
    DEFAULT_MAX_CONNECTIONS_PER_HOST,
};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    max_connections_per_host: usize,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            agent,
            max_connections_per_host: DEFAULT_MAX_CONNECTIONS_PER_HOST,
        }
    }

    #[must_use]
    pub fn with_max_connections_per_host(mut self, max: usize) -> Self {
        self.max_connections_per_host = max;
        self
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> TransportFuture {
        let agent = self.agent.clone();
        async move {
            tokio::task::spawn_blocking(move || perform(&agent, request))
                .await
                .map_err(|err| TransportError::new(TransportErrorKind::Other, err.to_string()))?
        }
        .boxed()
    }

    fn max_connections_per_host(&self) -> usize {
        self.max_connections_per_host
    }
}

fn prepare<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
    timeout: Duration,
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.config().timeout_global(Some(timeout)).build()
}

fn perform(agent: &ureq::Agent, request: HttpRequest) -> Result<TransportResponse, TransportError> {
    let HttpRequest {
        method,
        url,
        headers,
        body,
        timeout,
    } = request;

    let result = match method {
        HttpMethod::Get => prepare(agent.get(&url), &headers, timeout).call(),
        HttpMethod::Head => prepare(agent.head(&url), &headers, timeout).call(),
        HttpMethod::Delete => prepare(agent.delete(&url), &headers, timeout).call(),
        HttpMethod::Post => send(prepare(agent.post(&url), &headers, timeout), body),
        HttpMethod::Put => send(prepare(agent.put(&url), &headers, timeout), body),
        HttpMethod::Patch => send(prepare(agent.patch(&url), &headers, timeout), body),
    };
    let mut response = result.map_err(map_error)?;

    let metadata = HttpResponse {
        status: response.status().as_u16(),
        headers: response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect(),
    };
    let body = if method == HttpMethod::Head {
        None
    } else {
        Some(response.body_mut().read_to_vec().map_err(map_error)?)
    };

    Ok(TransportResponse {
        response: metadata,
        body,
    })
}

fn send(
    builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: Option<Vec<u8>>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(bytes) => builder.send(bytes.as_slice()),
        None => builder.send_empty(),
    }
}

fn map_error(err: ureq::Error) -> TransportError {
    let kind = match &err {
        ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
        ureq::Error::Io(_) => TransportErrorKind::Connect,
        _ => TransportErrorKind::Protocol,
    };
    TransportError::new(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_host_limit_defaults_and_overrides() {
        assert_eq!(
            UreqTransport::new().max_connections_per_host(),
            DEFAULT_MAX_CONNECTIONS_PER_HOST
        );
        let transport = UreqTransport::new().with_max_connections_per_host(2);
        assert_eq!(transport.max_connections_per_host(), 2);
    }

    #[test]
    fn io_failures_map_to_connect_errors() {
        let err = map_error(ureq::Error::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionRefused,
        )));
        assert_eq!(err.kind, TransportErrorKind::Connect);
    }
}
