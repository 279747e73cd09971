//! Admission and dispatch of submitted requests.
//!
//! # Design
//! Submitted descriptors wait in the queued set until an admission pass
//! promotes them to the active set, which never holds more than `ceiling`
//! descriptors. A pass runs after every submission and after every
//! completion, because either can change the number of free slots.
//!
//! Each pass runs entirely under the scheduler's admission lock:
//!
//! 1. drop finished descriptors still sitting in the active set;
//! 2. stop if no slot is free;
//! 3. sort the queue by (priority, submission sequence), which keeps
//!    submission order within a priority;
//! 4. pop from the front while slots remain, discarding cancelled
//!    descriptors and spawning a transport task for each admitted one.
//!
//! The lock is per scheduler, and nothing inside it blocks or awaits:
//! transport calls and caller callbacks run in the spawned tasks. A task
//! that completes marks its descriptor finished, removes it from the active
//! set, decodes unless cancelled and then runs another pass.
//!
//! A transport future that panics counts as a failed call, so its slot is
//! still released.
//!
//! Cancellation never interrupts a transport call. A queued descriptor is
//! removed before it can be admitted; an active one runs to completion and
//! its callback is skipped.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::decoder::{ResultDecoder, TransportOutcome};
use crate::descriptor::{Descriptor, RequestHandle, RequestState, SubmitOptions};
use crate::http::HttpRequest;
use crate::sync::LockingVec;
use crate::transport::{Transport, TransportError, TransportErrorKind};

/// Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    runtime: Handle,
    ceiling: usize,
    log_transactions: AtomicBool,
    admission: Mutex<()>,
    queued: LockingVec<Arc<Descriptor>>,
    active: LockingVec<Arc<Descriptor>>,
    sequence: AtomicU64,
}

impl Scheduler {
    /// `ceiling` is clamped to at least one.
    pub fn new(transport: Arc<dyn Transport>, ceiling: usize, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                runtime,
                ceiling: ceiling.max(1),
                log_transactions: AtomicBool::new(false),
                admission: Mutex::new(()),
                queued: LockingVec::new(),
                active: LockingVec::new(),
                sequence: AtomicU64::new(0),
            }),
        }
    }

    /// Logs every request handed to the transport at `info` level.
    pub fn set_log_transactions(&self, enabled: bool) {
        self.inner.log_transactions.store(enabled, Ordering::Relaxed);
    }

    /// Queues one transport call and runs an admission pass.
    pub fn submit(
        &self,
        request: HttpRequest,
        options: &SubmitOptions,
        decoder: ResultDecoder,
    ) -> RequestHandle {
        self.submit_all(vec![(request, decoder)], options)
    }

    /// Queues several transport calls under one handle, in order, then runs
    /// a single admission pass.
    pub fn submit_all(
        &self,
        calls: Vec<(HttpRequest, ResultDecoder)>,
        options: &SubmitOptions,
    ) -> RequestHandle {
        let handle = RequestHandle::new();
        for (request, decoder) in calls {
            let sequence = self.inner.sequence.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                %handle,
                group = %options.group,
                priority = options.priority.ordinal(),
                sequence,
                kind = decoder.kind(),
                url = %request.url,
                "queued request"
            );
            let descriptor = Descriptor::new(handle, options, sequence, request, decoder);
            self.inner.queued.push(Arc::new(descriptor));
        }
        self.inner.admit();
        handle
    }

    /// Cancels every queued or active descriptor in `group`. Returns how
    /// many were flagged.
    pub fn cancel(&self, group: &str) -> usize {
        let count = self.inner.cancel_where(|descriptor| descriptor.group == group);
        tracing::debug!(group, count, "cancelled group");
        count
    }

    /// Cancels every descriptor belonging to one submission.
    pub fn cancel_handle(&self, handle: RequestHandle) -> usize {
        let count = self.inner.cancel_where(|descriptor| descriptor.handle == handle);
        tracing::debug!(%handle, count, "cancelled submission");
        count
    }

    /// Runs an admission pass without any new submission.
    pub fn poll_admission(&self) {
        self.inner.admit();
    }

    pub fn ceiling(&self) -> usize {
        self.inner.ceiling
    }

    pub fn queued_len(&self) -> usize {
        self.inner.queued.len()
    }

    pub fn active_len(&self) -> usize {
        self.inner.active.len()
    }

    /// Lifecycle states of a submission's descriptors that are still
    /// tracked, in submission order. Finished descriptors drop out.
    pub fn states(&self, handle: RequestHandle) -> Vec<RequestState> {
        let _serialized = self.inner.admission.lock();
        let mut tracked = Vec::new();
        let mut collect = |descriptor: &Arc<Descriptor>| {
            if descriptor.handle == handle {
                tracked.push((descriptor.sequence, descriptor.lifecycle.state()));
            }
        };
        self.inner.active.for_each(&mut collect);
        self.inner.queued.for_each(&mut collect);
        tracked.sort_by_key(|(sequence, _)| *sequence);
        tracked.into_iter().map(|(_, state)| state).collect()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("ceiling", &self.inner.ceiling)
            .field("queued", &self.inner.queued.len())
            .field("active", &self.inner.active.len())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn admit(self: &Arc<Self>) {
        let _serialized = self.admission.lock();

        let purged = self
            .active
            .remove_where(|descriptor| descriptor.lifecycle.state() == RequestState::Finished);
        if !purged.is_empty() {
            tracing::trace!(count = purged.len(), "purged finished requests");
        }

        if self.active.len() >= self.ceiling {
            return;
        }

        self.queued
            .sort_by_key(|descriptor| (descriptor.priority, descriptor.sequence));

        while self.active.len() < self.ceiling {
            let Some(descriptor) = self.queued.pop_front() else {
                break;
            };
            if descriptor.lifecycle.is_cancelled() {
                tracing::trace!(handle = %descriptor.handle, "discarded cancelled request");
                continue;
            }
            if !descriptor.lifecycle.activate() {
                continue;
            }

            tracing::debug!(
                handle = %descriptor.handle,
                sequence = descriptor.sequence,
                active = self.active.len() + 1,
                ceiling = self.ceiling,
                "admitted request"
            );
            self.active.push(Arc::clone(&descriptor));
            self.dispatch(descriptor);
        }
    }

    fn dispatch(self: &Arc<Self>, descriptor: Arc<Descriptor>) {
        let transport = Arc::clone(&self.transport);
        let scheduler = Arc::downgrade(self);
        let log_transactions = self.log_transactions.load(Ordering::Relaxed);

        self.runtime.spawn(async move {
            if log_transactions {
                tracing::info!(
                    method = %descriptor.request.method,
                    url = %descriptor.request.url,
                    "sending request"
                );
            }
            let request = descriptor.request.clone();
            let call = AssertUnwindSafe(async move { transport.execute(request).await });
            let outcome = match call.catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::error!(handle = %descriptor.handle, "transport panicked");
                    Err(TransportError::new(TransportErrorKind::Other, "transport panicked"))
                }
            };
            complete(&scheduler, &descriptor, outcome);
        });
    }

    fn cancel_where(&self, matches: impl Fn(&Descriptor) -> bool) -> usize {
        let _serialized = self.admission.lock();

        let mut count = 0;
        self.active.for_each(|descriptor| {
            if matches(descriptor) {
                descriptor.lifecycle.cancel();
                count += 1;
            }
        });
        let removed = self.queued.remove_where(|descriptor| matches(descriptor));
        for descriptor in &removed {
            descriptor.lifecycle.cancel();
        }
        count + removed.len()
    }
}

/// Completion path for one transport call. Runs even if the scheduler has
/// been dropped, in which case the result is still delivered but no further
/// admission happens.
fn complete(scheduler: &Weak<Inner>, descriptor: &Arc<Descriptor>, outcome: TransportOutcome) {
    descriptor.lifecycle.finish();

    let scheduler = scheduler.upgrade();
    if let Some(inner) = &scheduler {
        inner
            .active
            .remove_where(|tracked| Arc::ptr_eq(tracked, descriptor));
    }

    if descriptor.lifecycle.is_cancelled() {
        tracing::debug!(handle = %descriptor.handle, "suppressed result of cancelled request");
    } else if let Some(decoder) = descriptor.take_decoder() {
        let kind = decoder.kind();
        let failed = outcome.is_err();
        tracing::debug!(handle = %descriptor.handle, kind, failed, "request finished");
        if catch_unwind(AssertUnwindSafe(|| decoder.decode(outcome))).is_err() {
            tracing::error!(handle = %descriptor.handle, kind, "result callback panicked");
        }
    }

    if let Some(inner) = scheduler {
        inner.admit();
    }
}
