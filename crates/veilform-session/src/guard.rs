//! Single-flight guard around response submission
//!
//! The guard admits exactly one submission attempt per composition session.
//! Triggers arriving while an attempt is in flight are dropped. A successful
//! attempt closes the guard for good; a failed one keeps it closed until the
//! user explicitly rearms it.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::debug;

/// State of a [`SubmissionGuard`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GuardState {
    /// No attempt has been made, or the last failure was rearmed
    Idle = 0,
    /// An attempt is running
    InFlight = 1,
    /// An attempt succeeded
    Submitted = 2,
    /// An attempt failed and has not been rearmed
    Failed = 3,
}

impl GuardState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => GuardState::Idle,
            1 => GuardState::InFlight,
            2 => GuardState::Submitted,
            _ => GuardState::Failed,
        }
    }
}

impl fmt::Display for GuardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GuardState::Idle => "idle",
            GuardState::InFlight => "in-flight",
            GuardState::Submitted => "submitted",
            GuardState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Atomic `Idle -> InFlight -> {Submitted | Failed}` state machine
#[derive(Debug)]
pub struct SubmissionGuard {
    state: AtomicU8,
}

impl Default for SubmissionGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionGuard {
    /// Create an idle guard
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(GuardState::Idle as u8),
        }
    }

    /// Current state
    pub fn state(&self) -> GuardState {
        GuardState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether an attempt has succeeded
    pub fn is_submitted(&self) -> bool {
        self.state() == GuardState::Submitted
    }

    /// Try to start an attempt
    ///
    /// Returns `None` unless the guard was `Idle`. The returned ticket
    /// resolves the attempt; dropping it unresolved counts as a failure.
    pub fn try_begin(&self) -> Option<SubmissionTicket<'_>> {
        self.transition(GuardState::Idle, GuardState::InFlight)
            .then_some(SubmissionTicket {
                guard: self,
                resolved: false,
            })
    }

    /// Reopen the guard after a failed attempt
    ///
    /// Only `Failed -> Idle` is allowed; returns whether it happened.
    pub fn rearm_after_failure(&self) -> bool {
        let rearmed = self.transition(GuardState::Failed, GuardState::Idle);
        if rearmed {
            debug!("Submission guard rearmed");
        }
        rearmed
    }

    fn transition(&self, from: GuardState, to: GuardState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Proof that the holder owns the in-flight attempt
#[derive(Debug)]
#[must_use = "dropping a ticket marks the attempt failed"]
pub struct SubmissionTicket<'a> {
    guard: &'a SubmissionGuard,
    resolved: bool,
}

impl SubmissionTicket<'_> {
    /// Mark the attempt successful
    pub fn succeed(mut self) {
        self.resolve(GuardState::Submitted);
    }

    /// Mark the attempt failed
    pub fn fail(mut self) {
        self.resolve(GuardState::Failed);
    }

    fn resolve(&mut self, outcome: GuardState) {
        self.resolved = true;
        self.guard.state.store(outcome as u8, Ordering::Release);
    }
}

impl Drop for SubmissionTicket<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.resolve(GuardState::Failed);
        }
    }
}
