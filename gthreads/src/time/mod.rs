//! Time subsystem
//!
//! Microsecond clock used by the statistics tracker and the periodic timer
//! source that drives preemption.

pub mod timer;

pub use timer::{CooperativeTimer, TimerHandler, TimerSource};
#[cfg(unix)]
pub use timer::SignalTimer;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Microseconds since an arbitrary per-clock origin
pub type Micros = u64;

/// Time source for scheduler accounting
pub trait Clock: Send {
    /// Current time in microseconds
    fn now_us(&self) -> Micros;
}

/// Elapsed microseconds between two readings, clamped at zero.
///
/// Readings from a non-monotonic source may go backwards; a negative interval
/// is reported as 0 rather than wrapping.
#[inline]
pub fn elapsed_us(start: Micros, end: Micros) -> Micros {
    end.saturating_sub(start)
}

/// Monotonic clock backed by [`Instant`]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_us(&self) -> Micros {
        self.origin.elapsed().as_micros() as Micros
    }
}

/// Hand-driven clock for deterministic accounting tests
///
/// Clones share the same reading, so a test keeps one handle and gives the
/// other to the scheduler.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Micros) -> Self {
        Self { now: Arc::new(AtomicU64::new(start)) }
    }

    /// Move the clock forward
    pub fn advance(&self, us: Micros) {
        self.now.fetch_add(us, Ordering::Relaxed);
    }

    /// Jump to an absolute reading (may go backwards)
    pub fn set(&self, us: Micros) {
        self.now.store(us, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> Micros {
        self.now.load(Ordering::Relaxed)
    }
}
