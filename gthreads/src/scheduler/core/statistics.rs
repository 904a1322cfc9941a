//! Statistics - per-thread timing and scheduler counters
//!
//! Every thread keeps two sample series, time spent running per dispatch and
//! time spent Ready before each dispatch. Both are folded in at the moment of
//! a switch; a snapshot adds the slice still in progress without folding it.

use crate::scheduler::core::policy::SchedulingPolicy;
use crate::scheduler::thread::{Priority, ThreadId, ThreadState, TicketRange};
use crate::time::{elapsed_us, Micros};
use core::fmt;

/// Streaming summary of a sample sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Series {
    count: u64,
    total: u64,
    sum_sq: u128,
    min: u64,
    max: u64,
}

impl Series {
    pub const fn new() -> Self {
        Self { count: 0, total: 0, sum_sq: 0, min: 0, max: 0 }
    }

    /// Add one sample
    pub fn record(&mut self, sample: Micros) {
        if self.count == 0 || sample < self.min {
            self.min = sample;
        }
        if sample > self.max {
            self.max = sample;
        }
        self.count += 1;
        self.total = self.total.saturating_add(sample);
        self.sum_sq = self.sum_sq.saturating_add(u128::from(sample) * u128::from(sample));
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Sum of all samples (µs)
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Smallest sample, 0 when empty
    pub fn min(&self) -> u64 {
        self.min
    }

    /// Largest sample, 0 when empty
    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total as f64 / self.count as f64
        }
    }

    /// Population variance `sum_sq/n - mean²`, 0 for fewer than two samples
    pub fn variance(&self) -> f64 {
        if self.count <= 1 {
            return 0.0;
        }
        let n = self.count as f64;
        let mean = self.total as f64 / n;
        (self.sum_sq as f64 / n - mean * mean).max(0.0)
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Timing record of one thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadStats {
    pub runtime: Series,
    pub waittime: Series,
    /// Last dispatch
    run_since: Micros,
    /// Last transition to Ready
    ready_since: Micros,
}

impl ThreadStats {
    /// Fresh record for a thread that became Ready at `now`
    pub fn ready_at(now: Micros) -> Self {
        Self { ready_since: now, ..Self::default() }
    }

    /// Thread starts waiting for the CPU
    pub fn mark_ready(&mut self, now: Micros) {
        self.ready_since = now;
    }

    /// Thread is dispatched: closes the wait slice
    pub fn mark_dispatched(&mut self, now: Micros) {
        self.waittime.record(elapsed_us(self.ready_since, now));
        self.run_since = now;
    }

    /// Thread already owns the CPU (bootstrap): opens a run slice only
    pub fn mark_started(&mut self, now: Micros) {
        self.run_since = now;
    }

    /// Thread leaves the CPU: closes the run slice
    pub fn mark_descheduled(&mut self, now: Micros) {
        self.runtime.record(elapsed_us(self.run_since, now));
    }

    /// Open run slice
    pub fn running_for(&self, now: Micros) -> Micros {
        elapsed_us(self.run_since, now)
    }

    /// Open wait slice
    pub fn waiting_for(&self, now: Micros) -> Micros {
        elapsed_us(self.ready_since, now)
    }
}

/// Global scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerCounters {
    /// Context switches performed
    pub total_switches: u64,

    /// Threads created
    pub total_spawns: u64,

    /// Threads terminated
    pub total_exits: u64,

    /// Voluntary reschedules
    pub yields: u64,

    /// Timer-driven reschedules
    pub preemptions: u64,

    /// Semaphore waits that suspended
    pub blocks: u64,
}

/// Live view of one thread slot
#[derive(Debug, Clone)]
pub struct ThreadReport {
    pub id: ThreadId,
    pub state: ThreadState,
    pub base_priority: Priority,
    pub current_priority: Priority,
    pub tickets: Option<TicketRange>,
    pub runtime: Series,
    pub waittime: Series,
    /// Run slice not yet folded into `runtime` (Running thread only)
    pub running_for: Micros,
    /// Wait slice not yet folded into `waittime` (Ready threads only)
    pub waiting_for: Micros,
}

impl ThreadReport {
    /// Cumulative runtime including the slice in progress
    pub fn total_runtime(&self) -> Micros {
        self.runtime.total() + self.running_for
    }

    /// Cumulative wait time including the slice in progress
    pub fn total_waittime(&self) -> Micros {
        self.waittime.total() + self.waiting_for
    }
}

/// Snapshot of the whole runtime
#[derive(Debug, Clone)]
pub struct StatsReport {
    pub policy: SchedulingPolicy,
    pub current: ThreadId,
    pub total_tickets: u32,
    pub counters: SchedulerCounters,
    /// Slots that are live or have run at least once
    pub threads: Vec<ThreadReport>,
}

impl StatsReport {
    pub fn thread(&self, id: ThreadId) -> Option<&ThreadReport> {
        self.threads.iter().find(|t| t.id == id)
    }

    /// Number of threads in `state`
    pub fn count_in(&self, state: ThreadState) -> usize {
        self.threads.iter().filter(|t| t.state == state).count()
    }
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "----- Thread Statistics -----")?;
        writeln!(
            f,
            "{:<6} {:<10} {:>12} {:>12} {:>12} {:>12} {:>10} {:>10} {:>10}",
            "ID", "State", "Runtime(us)", "Wait(us)", "AvgRun(us)", "AvgWait(us)", "StdRun", "StdWait", "Prio c/b"
        )?;
        for t in &self.threads {
            writeln!(
                f,
                "{:<6} {:<10} {:>12} {:>12} {:>12.2} {:>12.2} {:>10.2} {:>10.2} {:>10}",
                t.id,
                t.state,
                t.total_runtime(),
                t.total_waittime(),
                t.runtime.mean(),
                t.waittime.mean(),
                t.runtime.std_dev(),
                t.waittime.std_dev(),
                format!("{}/{}", t.current_priority, t.base_priority),
            )?;
        }

        writeln!(f, "--- Additional Thread Info ---")?;
        writeln!(f, "Scheduling policy: {}", self.policy)?;
        for t in &self.threads {
            writeln!(f, "Thread {} ({}):", t.id, t.state)?;
            writeln!(
                f,
                "  runs: {:<6} min run: {}us  max run: {}us",
                t.runtime.count(),
                t.runtime.min(),
                t.runtime.max()
            )?;
            writeln!(
                f,
                "  waits: {:<5} min wait: {}us  max wait: {}us",
                t.waittime.count(),
                t.waittime.min(),
                t.waittime.max()
            )?;
            match t.tickets {
                Some(range) => writeln!(f, "  tickets: {} ({}-{})", range.len(), range.start, range.end)?,
                None => writeln!(f, "  tickets: none")?,
            }
        }
        writeln!(f, "Total tickets: {}", self.total_tickets)?;

        let c = &self.counters;
        writeln!(
            f,
            "Switches: {}  spawns: {}  exits: {}  yields: {}  preemptions: {}  blocks: {}",
            c.total_switches, c.total_spawns, c.total_exits, c.yields, c.preemptions, c.blocks
        )
    }
}
