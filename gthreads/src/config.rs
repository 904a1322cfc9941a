//! Runtime Configuration
//!
//! Parameters fixed at `init` time: table size, stack size, priority range,
//! policy, preemption timer and lottery seed.

use crate::scheduler::core::error::{SchedulerError, SchedulerResult};
use crate::scheduler::core::policy::SchedulingPolicy;
use crate::scheduler::thread::stack::{DEFAULT_STACK_SIZE, MIN_STACK_SIZE};
use crate::scheduler::thread::Priority;
use core::time::Duration;

/// Thread table capacity, bootstrap thread included
pub const DEFAULT_CAPACITY: usize = 5;

/// Highest priority (and bootstrap priority)
pub const DEFAULT_MAX_PRIORITY: Priority = 20;

/// Preemption period
pub const DEFAULT_TIMER_INTERVAL: Duration = Duration::from_micros(500);

/// Preemption source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// Purely cooperative: switches only on yield, wait and exit
    Disabled,
    /// `SIGALRM` every interval
    Interval(Duration),
}

impl Default for TimerMode {
    fn default() -> Self {
        Self::Interval(DEFAULT_TIMER_INTERVAL)
    }
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Slots in the thread table
    pub capacity: usize,

    /// Bytes per green thread stack
    pub stack_size: usize,

    /// Upper bound of the priority range `1..=max_priority`
    pub max_priority: Priority,

    /// Selection algorithm
    pub policy: SchedulingPolicy,

    /// Preemption timer
    pub timer: TimerMode,

    /// Lottery generator seed
    pub lottery_seed: u64,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            stack_size: DEFAULT_STACK_SIZE,
            max_priority: DEFAULT_MAX_PRIORITY,
            policy: SchedulingPolicy::default(),
            timer: TimerMode::default(),
            lottery_seed: time_seed(),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn with_max_priority(mut self, max_priority: Priority) -> Self {
        self.max_priority = max_priority;
        self
    }

    pub fn with_policy(mut self, policy: SchedulingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timer(mut self, timer: TimerMode) -> Self {
        self.timer = timer;
        self
    }

    pub fn with_lottery_seed(mut self, seed: u64) -> Self {
        self.lottery_seed = seed;
        self
    }

    /// Priority given to out-of-range requests
    pub fn default_priority(&self) -> Priority {
        (self.max_priority / 2).max(1)
    }

    /// Check limits
    pub fn validate(&self) -> SchedulerResult<()> {
        let invalid = |reason: &'static str| -> SchedulerResult<()> {
            Err(SchedulerError::InvalidConfig { reason })
        };
        if self.capacity < 2 {
            return invalid("capacity must hold the bootstrap thread and at least one more");
        }
        if self.stack_size < MIN_STACK_SIZE {
            return invalid("stack size below 64 KiB");
        }
        if self.max_priority < 1 {
            return invalid("max priority must be at least 1");
        }
        // Every slot may hold up to max_priority tickets.
        if self.max_priority as u64 * self.capacity as u64 > u32::MAX as u64 {
            return invalid("max priority times capacity exceeds the ticket range");
        }
        if self.timer == TimerMode::Interval(Duration::ZERO) {
            return invalid("timer interval must be non-zero");
        }
        Ok(())
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Seed taken from the wall clock
fn time_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
