//! In-memory transport whose calls complete only when a test releases them.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use endpoint_core::{
    HttpMethod, HttpRequest, HttpResponse, Transport, TransportError, TransportErrorKind,
    TransportFuture, TransportResponse,
};
use parking_lot::Mutex;
use tokio::sync::oneshot;

pub type Outcome = Result<TransportResponse, TransportError>;

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<String>>,
    pending: Mutex<HashMap<String, oneshot::Sender<Outcome>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    immediate: bool,
}

/// Records every call. Gated transports hold each call open until
/// `release`; immediate ones answer with the URL as body after a yield.
#[derive(Clone)]
pub struct ScriptedTransport {
    shared: Arc<Shared>,
}

impl ScriptedTransport {
    pub fn gated() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn immediate() -> Self {
        Self {
            shared: Arc::new(Shared {
                immediate: true,
                ..Shared::default()
            }),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.shared.calls.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.shared.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    pub async fn wait_for_calls(&self, count: usize) {
        wait_until(|| self.shared.calls.lock().len() >= count).await;
    }

    /// Completes the pending call to `url` with `outcome`.
    pub fn release(&self, url: &str, outcome: Outcome) {
        let sender = self
            .shared
            .pending
            .lock()
            .remove(url)
            .unwrap_or_else(|| panic!("no pending call to {url}"));
        let _ = sender.send(outcome);
    }

    pub fn release_ok(&self, url: &str, body: &str) {
        self.release(url, ok(body));
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: HttpRequest) -> TransportFuture {
        let shared = Arc::clone(&self.shared);
        Box::pin(async move {
            let now = shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            shared.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let outcome = if shared.immediate {
                shared.calls.lock().push(request.url.clone());
                tokio::task::yield_now().await;
                ok(&request.url)
            } else {
                let (tx, rx) = oneshot::channel();
                shared.pending.lock().insert(request.url.clone(), tx);
                shared.calls.lock().push(request.url.clone());
                rx.await.unwrap_or_else(|_| {
                    Err(TransportError::new(TransportErrorKind::Other, "released without outcome"))
                })
            };

            shared.in_flight.fetch_sub(1, Ordering::SeqCst);
            outcome
        })
    }
}

pub fn request(name: &str) -> HttpRequest {
    HttpRequest {
        method: HttpMethod::Get,
        url: url(name),
        headers: Vec::new(),
        body: None,
        timeout: Duration::from_secs(5),
    }
}

pub fn url(name: &str) -> String {
    format!("http://scripted.test/{name}")
}

pub fn ok(body: &str) -> Outcome {
    Ok(TransportResponse {
        response: HttpResponse::new(200),
        body: Some(body.as_bytes().to_vec()),
    })
}

pub fn failure(message: &str) -> Outcome {
    Err(TransportError::new(TransportErrorKind::Connect, message))
}

/// Polls `condition` every millisecond, failing the test after five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for condition");
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
