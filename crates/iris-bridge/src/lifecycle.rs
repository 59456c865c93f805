//! Worker process lifecycle as an explicit state machine.
//!
//! Every invocation walks the child through exactly one path from
//! `Spawning` to a terminal state, so resources (pipes, the deadline
//! timer, the process table entry) are released exactly once.

use tracing::trace;

/// States a worker child process moves through during one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Child is being created.
    Spawning,
    /// Child is running; streams are being drained.
    Running,
    /// Child exited with code 0 before the deadline.
    ExitedNormally,
    /// Child exited with a non-zero code (or died mid-exchange).
    ExitedWithError,
    /// Deadline fired first; the child was killed and reaped.
    TerminatedByTimeout,
    /// The OS refused to create the child.
    SpawnFailed,
}

impl WorkerState {
    /// Whether this state ends the invocation.
    pub fn is_terminal(self) -> bool {
        !matches!(self, WorkerState::Spawning | WorkerState::Running)
    }

    /// Valid transitions out of this state.
    fn allows(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Spawning, Running)
                | (Spawning, SpawnFailed)
                | (Running, ExitedNormally)
                | (Running, ExitedWithError)
                | (Running, TerminatedByTimeout)
        )
    }
}

/// Tracks one child's walk through the state machine.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: WorkerState,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: WorkerState::Spawning,
        }
    }

    pub(crate) fn state(&self) -> WorkerState {
        self.state
    }

    /// Advance to `next`. Invalid transitions are a logic error.
    pub(crate) fn advance(&mut self, next: WorkerState) {
        debug_assert!(
            self.state.allows(next),
            "invalid worker state transition {:?} -> {:?}",
            self.state,
            next
        );
        trace!(from = ?self.state, to = ?next, "worker state transition");
        self.state = next;
    }
}
