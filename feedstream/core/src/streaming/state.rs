//! Production State
//!
//! `NotStarted -> Running -> {Finished, Faulted, Cancelled}`, stored in a
//! single atomic so the producer and the consumer views agree without a lock.
//! `NotStarted -> Cancelled` is taken when a result is disposed unconsumed.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of the background producer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProductionState {
    /// No consumer has started reading yet
    NotStarted = 0,
    /// The producer thread is reading records
    Running = 1,
    /// The reader reported clean exhaustion
    Finished = 2,
    /// The reader failed; the error is retained
    Faulted = 3,
    /// Production was stopped by disposal or a detached consumer
    Cancelled = 4,
}

impl ProductionState {
    /// Whether this state is absorbing
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Faulted | Self::Cancelled)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::NotStarted,
            1 => Self::Running,
            2 => Self::Finished,
            3 => Self::Faulted,
            _ => Self::Cancelled,
        }
    }
}

impl fmt::Display for ProductionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Running => write!(f, "running"),
            Self::Finished => write!(f, "finished"),
            Self::Faulted => write!(f, "faulted"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Atomic holder for [`ProductionState`]
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ProductionState::NotStarted as u8))
    }

    pub(crate) fn get(&self) -> ProductionState {
        ProductionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Claim `NotStarted -> Running`
    ///
    /// On failure returns the state that blocked the claim.
    pub(crate) fn claim_running(&self) -> Result<(), ProductionState> {
        self.transition(ProductionState::NotStarted, ProductionState::Running)
    }

    /// Move `Running` into a terminal state
    pub(crate) fn settle(&self, terminal: ProductionState) -> Result<(), ProductionState> {
        debug_assert!(terminal.is_terminal());
        self.transition(ProductionState::Running, terminal)
    }

    /// Move an unconsumed result straight to `Cancelled`
    pub(crate) fn cancel_unstarted(&self) -> Result<(), ProductionState> {
        self.transition(ProductionState::NotStarted, ProductionState::Cancelled)
    }

    fn transition(
        &self,
        from: ProductionState,
        to: ProductionState,
    ) -> Result<(), ProductionState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(ProductionState::from_u8)
    }
}
