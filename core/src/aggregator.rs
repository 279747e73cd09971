//! Merges several transport completions into one caller notification.
//!
//! Each completion records its error (if any) and then bumps the completed
//! counter. The completion that brings the counter to the expected total
//! takes the final callback and calls it with every recorded error. Errors
//! are pushed before the increment, so the last completion always sees the
//! full list.

use std::fmt;
use std::num::NonZeroUsize;

use parking_lot::Mutex;

use crate::error::EndpointError;
use crate::sync::LockingCounter;

pub type CompletionCallback = Box<dyn FnOnce(Vec<EndpointError>) + Send + 'static>;

pub struct ResponseAggregator {
    total: usize,
    completed: LockingCounter,
    errors: Mutex<Vec<EndpointError>>,
    on_complete: Mutex<Option<CompletionCallback>>,
}

impl ResponseAggregator {
    pub fn new<F>(total: NonZeroUsize, on_complete: F) -> Self
    where
        F: FnOnce(Vec<EndpointError>) + Send + 'static,
    {
        Self {
            total: total.get(),
            completed: LockingCounter::new(),
            errors: Mutex::new(Vec::new()),
            on_complete: Mutex::new(Some(Box::new(on_complete))),
        }
    }

    /// Records one completion. Returns true for the completion that fired
    /// the final callback.
    pub fn record_partial(&self, error: Option<EndpointError>) -> bool {
        if let Some(error) = error {
            self.errors.lock().push(error);
        }
        if self.completed.add(1) != self.total {
            return false;
        }

        let errors = std::mem::take(&mut *self.errors.lock());
        let Some(on_complete) = self.on_complete.lock().take() else {
            return false;
        };
        tracing::debug!(total = self.total, failed = errors.len(), "all responses received");
        on_complete(errors);
        true
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed.value()
    }
}

impl fmt::Debug for ResponseAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseAggregator")
            .field("total", &self.total)
            .field("completed", &self.completed())
            .finish_non_exhaustive()
    }
}
