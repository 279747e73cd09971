//! Scheduler-owned request records and their lifecycle.
//!
//! # Design
//! A descriptor moves `Queued → Active → Finished` and never back. Each
//! transition is a compare-and-swap on an atomic, so a second attempt at the
//! same transition fails instead of silently re-running it. Cancellation is
//! a separate flag rather than a state: a finished request can still be
//! cancelled, it just has nothing left to suppress.
//!
//! Callers never see a `Descriptor`. They get a `RequestHandle` back from
//! submission and cancel through the handle or the group name.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::decoder::ResultDecoder;
use crate::http::HttpRequest;

/// Lower ordinals are admitted first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    pub const NORMAL: Priority = Priority(0);
    pub const BACKGROUND: Priority = Priority(1);

    pub const fn new(ordinal: u8) -> Self {
        Priority(ordinal)
    }

    pub const fn ordinal(self) -> u8 {
        self.0
    }
}

/// Identifies one submission. Every transport call a submission fans out to
/// shares its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestHandle(Uuid);

impl RequestHandle {
    pub(crate) fn new() -> Self {
        RequestHandle(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-submission scheduling options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    pub priority: Priority,
    /// Not required to be unique; `cancel(group)` cancels every match.
    pub group: String,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestState {
    Queued = 0,
    Active = 1,
    Finished = 2,
}

impl RequestState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RequestState::Queued,
            1 => RequestState::Active,
            _ => RequestState::Finished,
        }
    }
}

/// Monotonic lifecycle state plus the cancellation flag.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
    cancelled: AtomicBool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(RequestState::Queued as u8),
            cancelled: AtomicBool::new(false),
        }
    }
}

impl Lifecycle {
    pub fn state(&self) -> RequestState {
        RequestState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Queued → Active`. Returns false if the descriptor was not queued.
    pub fn activate(&self) -> bool {
        self.transition(RequestState::Queued, RequestState::Active)
    }

    /// `Active → Finished`. Returns false if the descriptor was not active.
    pub fn finish(&self) -> bool {
        self.transition(RequestState::Active, RequestState::Finished)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn transition(&self, from: RequestState, to: RequestState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// One transport call as tracked by the scheduler.
pub(crate) struct Descriptor {
    pub(crate) handle: RequestHandle,
    pub(crate) group: String,
    pub(crate) priority: Priority,
    /// Submission order, the tie-break within a priority.
    pub(crate) sequence: u64,
    pub(crate) request: HttpRequest,
    pub(crate) lifecycle: Lifecycle,
    decoder: Mutex<Option<ResultDecoder>>,
}

impl Descriptor {
    pub(crate) fn new(
        handle: RequestHandle,
        options: &SubmitOptions,
        sequence: u64,
        request: HttpRequest,
        decoder: ResultDecoder,
    ) -> Self {
        Self {
            handle,
            group: options.group.clone(),
            priority: options.priority,
            sequence,
            request,
            lifecycle: Lifecycle::default(),
            decoder: Mutex::new(Some(decoder)),
        }
    }

    /// Hands the decoder out once; later calls get `None`.
    pub(crate) fn take_decoder(&self) -> Option<ResultDecoder> {
        self.decoder.lock().take()
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("handle", &self.handle)
            .field("group", &self.group)
            .field("priority", &self.priority)
            .field("sequence", &self.sequence)
            .field("url", &self.request.url)
            .field("state", &self.lifecycle.state())
            .field("cancelled", &self.lifecycle.is_cancelled())
            .finish()
    }
}
