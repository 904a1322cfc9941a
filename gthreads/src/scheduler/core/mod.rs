//! Scheduler core module
//!
//! - `scheduler`: thread table, selection and switch bookkeeping
//! - `policy`: RoundRobin / PriorityBased / Lottery selection
//! - `statistics`: per-thread timing series, counters and reports
//! - `error`: typed scheduler errors

pub mod error;
pub mod policy;
pub mod scheduler;
pub mod statistics;

pub use error::{fatal, Resource, SchedulerError, SchedulerResult};
pub use policy::{ParsePolicyError, SchedulingPolicy};
pub use scheduler::{Scheduler, Switch, SwitchCause, BOOTSTRAP_ID};
pub use statistics::{SchedulerCounters, Series, StatsReport, ThreadReport, ThreadStats};
