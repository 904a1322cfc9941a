//! Scheduler Error Handling
//!
//! Typed errors for every fallible runtime operation, with recovery hints.

use crate::scheduler::thread::{ThreadId, ThreadState};

/// Resource that ran out during thread creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Every slot of the thread table is in use
    ThreadSlot { capacity: usize },
    /// The stack arena could not be allocated
    Stack { size: usize },
    /// The ticket pool would exceed `u32`
    Tickets { total: u32 },
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ThreadSlot { capacity } => write!(f, "thread table full ({} slots)", capacity),
            Self::Stack { size } => write!(f, "stack allocation of {} bytes failed", size),
            Self::Tickets { total } => write!(f, "ticket pool full ({} tickets)", total),
        }
    }
}

/// Scheduler error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    // ═══════════════════════════════════════════════════════════════
    // Creation
    // ═══════════════════════════════════════════════════════════════
    /// Table full or stack arena unavailable
    #[error("resource exhausted: {resource}")]
    ResourceExhausted { resource: Resource },

    // ═══════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════
    /// Runtime used before `init`
    #[error("runtime not initialized")]
    NotInitialized,

    /// `init` called twice without `shutdown`
    #[error("runtime already initialized")]
    AlreadyInitialized,

    /// Policy change requested after threads were created
    #[error("scheduling policy is locked once threads exist")]
    PolicyLocked,

    /// Operation reserved to the bootstrap thread (slot 0)
    #[error("operation requires the bootstrap thread, called from thread {caller}")]
    NotBootstrap { caller: ThreadId },

    /// Shutdown requested while other threads are still alive
    #[error("{live} thread(s) still alive")]
    LiveThreads { live: usize },

    /// Configuration rejected by `RuntimeConfig::validate`
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: &'static str },

    // ═══════════════════════════════════════════════════════════════
    // Thread state
    // ═══════════════════════════════════════════════════════════════
    /// Slot index outside the table or slot unused
    #[error("thread {thread_id} not found")]
    ThreadNotFound { thread_id: ThreadId },

    /// Transition rejected by the state machine
    #[error("thread {thread_id}: invalid transition {from} -> {to}")]
    InvalidStateTransition {
        thread_id: ThreadId,
        from: ThreadState,
        to: ThreadState,
    },

    /// Nothing can run: every other live thread is blocked
    #[error("deadlock: no runnable thread, {blocked} blocked")]
    Deadlock { blocked: usize },

    // ═══════════════════════════════════════════════════════════════
    // Timer
    // ═══════════════════════════════════════════════════════════════
    /// Installing or arming the timer source failed
    #[cfg(unix)]
    #[error("timer setup failed: {0}")]
    Timer(#[from] nix::errno::Errno),
}

impl SchedulerError {
    /// Get recovery hint for this error
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::ResourceExhausted { resource: Resource::ThreadSlot { .. } } => {
                "Wait for threads to exit or raise the table capacity"
            }
            Self::ResourceExhausted { resource: Resource::Stack { .. } } => {
                "Free memory or reduce the configured stack size"
            }
            Self::ResourceExhausted { resource: Resource::Tickets { .. } } => {
                "Lower max_priority so every slot's tickets fit in u32"
            }
            Self::NotInitialized => "Call gthreads::init() first",
            Self::PolicyLocked => "Select the policy before creating threads",
            Self::Deadlock { .. } => "Review semaphore usage: every waiter needs a matching post",
            Self::InvalidStateTransition { .. } => "Check thread lifecycle management",
            _ => "Check runtime configuration",
        }
    }

    /// Is this a recoverable error?
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Deadlock { .. } | Self::InvalidStateTransition { .. })
    }

    /// True for table-full and stack-allocation failures
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, Self::ResourceExhausted { .. })
    }

    /// Get error severity (0-3)
    pub fn severity(&self) -> u8 {
        match self {
            Self::Deadlock { .. } => 3,
            Self::InvalidStateTransition { .. } => 2,
            Self::ResourceExhausted { .. } => 1,
            _ => 0,
        }
    }
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Log and abort on an unrecoverable invariant violation.
///
/// Unwinding is not an option here: the failing code may be running on a stack
/// that no longer belongs to any live thread.
#[cold]
pub fn fatal(reason: &str) -> ! {
    log::error!("[SCHED CRITICAL] Invariant violated: {}", reason);
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_exhausted_display() {
        let err = SchedulerError::ResourceExhausted {
            resource: Resource::ThreadSlot { capacity: 5 },
        };
        assert!(err.is_resource_exhausted());
        assert_eq!(err.to_string(), "resource exhausted: thread table full (5 slots)");
    }

    #[test]
    fn test_severity_and_recovery() {
        let deadlock = SchedulerError::Deadlock { blocked: 2 };
        assert_eq!(deadlock.severity(), 3);
        assert!(!deadlock.is_recoverable());
        assert!(SchedulerError::NotInitialized.is_recoverable());
        assert_eq!(
            SchedulerError::PolicyLocked.recovery_hint(),
            "Select the policy before creating threads"
        );
    }
}
