//! gthreads - user-level green threads
//!
//! A fixed table of lightweight threads multiplexed onto the calling OS
//! thread. Threads switch on [`yield_now`], on a blocking [`Semaphore::wait`],
//! on exit, and on a periodic `SIGALRM` tick unless the timer is disabled.
//!
//! ```ignore
//! use gthreads::{critical, RuntimeConfig, SchedulingPolicy};
//!
//! gthreads::init_with(RuntimeConfig::new().with_policy(SchedulingPolicy::PriorityBased))?;
//! for priority in [18, 12, 6, 2] {
//!     gthreads::create(move || {
//!         for i in 0..3 {
//!             critical(|| println!("prio {}: {}", priority, i));
//!             gthreads::yield_now();
//!         }
//!     }, priority)?;
//! }
//! println!("{}", gthreads::snapshot_stats()?);
//! gthreads::stop(0);
//! ```
//!
//! # Preemption
//! A tick may interrupt a thread between any two instructions. Anything that
//! is not reentrant on one OS thread (stdout, the allocator, application
//! state shared between green threads) belongs inside [`critical`].
//!
//! # Platforms
//! x86_64 and aarch64 ELF targets; the interval timer needs a Unix.

pub mod config;
pub mod scheduler;
pub mod sync;
pub mod time;

pub use config::{RuntimeConfig, TimerMode};
pub use scheduler::{
    create, current_thread, init, init_with, select_policy, shutdown, snapshot_stats, stop,
    wait_all, yield_now, Priority, SchedulerError, SchedulerResult, SchedulingPolicy,
    StatsReport, ThreadId, ThreadReport, ThreadState,
};
pub use sync::{critical, CriticalSection, Semaphore};
