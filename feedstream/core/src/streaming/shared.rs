//! State shared between a streaming result, its producer and its consumer view

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::state::StateCell;
use crate::error::DecodeError;

/// Unique identifier of a streaming result, used in logs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StreamId(pub Uuid);

impl StreamId {
    /// Generate a new random identifier
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream_{}", self.0.simple())
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) id: StreamId,
    pub(crate) state: StateCell,
    pub(crate) cancel: CancellationToken,
    /// Records handed to the consumer
    delivered: AtomicU64,
    /// Records read by the producer
    produced: AtomicU64,
    last_error: Mutex<Option<Arc<DecodeError>>>,
}

impl Shared {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            id: StreamId::new(),
            state: StateCell::new(),
            cancel: CancellationToken::new(),
            delivered: AtomicU64::new(0),
            produced: AtomicU64::new(0),
            last_error: Mutex::new(None),
        })
    }

    pub(crate) fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Acquire)
    }

    pub(crate) fn mark_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn produced(&self) -> u64 {
        self.produced.load(Ordering::Acquire)
    }

    pub(crate) fn mark_produced(&self) {
        self.produced.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn last_error(&self) -> Option<Arc<DecodeError>> {
        self.last_error.lock().clone()
    }

    pub(crate) fn retain_error(&self, error: &Arc<DecodeError>) {
        *self.last_error.lock() = Some(Arc::clone(error));
    }
}
