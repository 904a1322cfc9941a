//! State - Thread state machine
//!
//! Manages thread lifecycle and state transitions

use core::fmt;

/// Thread state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ThreadState {
    /// Free slot (initial and terminal, never runnable)
    #[default]
    Unused,

    /// Runnable, waiting for the CPU
    Ready,

    /// Currently executing (at most one thread)
    Running,

    /// Waiting on a semaphore
    Blocked,
}

impl ThreadState {
    /// Check if state is schedulable
    pub fn is_schedulable(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Check if state is active
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Ready)
    }

    /// Slot holds a thread that has not terminated
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Unused)
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unused => write!(f, "Unused"),
            Self::Ready => write!(f, "Ready"),
            Self::Running => write!(f, "Running"),
            Self::Blocked => write!(f, "Blocked"),
        }
    }
}

/// Validate state transition
pub fn validate_transition(from: ThreadState, to: ThreadState) -> bool {
    use ThreadState::*;

    match (from, to) {
        // Unused -> Ready (create)
        (Unused, Ready) => true,

        // Ready -> Running (dispatch)
        (Ready, Running) => true,

        // Running -> Ready (yield, preemption)
        (Running, Ready) => true,

        // Running -> Blocked (semaphore wait)
        (Running, Blocked) => true,

        // Running -> Unused (exit)
        (Running, Unused) => true,

        // Blocked -> Ready (semaphore post)
        (Blocked, Ready) => true,

        // Blocked -> Running (block withdrawn, nothing else to run)
        (Blocked, Running) => true,

        // All other transitions invalid
        _ => false,
    }
}
