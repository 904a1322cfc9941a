//! Scheduler subsystem
//!
//! Fixed thread table, three selection policies, per-architecture context
//! switch and the process-wide runtime built on them.

pub mod core;
pub mod runtime;
pub mod switch;
pub mod thread;

// Re-exports
pub use self::core::{
    Resource, SchedulerCounters, SchedulerError, SchedulerResult, SchedulingPolicy, StatsReport,
    ThreadReport, BOOTSTRAP_ID,
};
pub use runtime::{
    create, current_thread, init, init_with, select_policy, shutdown, snapshot_stats, stop,
    wait_all, yield_now,
};
pub use thread::{Priority, ThreadId, ThreadState};
