use clap::{Parser, ValueEnum};
use gthreads::SchedulingPolicy;

/// gthreads-demo - green thread workloads under a chosen scheduling policy
#[derive(Debug, Parser)]
#[command(name = "gthreads-demo", version, about, long_about = None)]
pub struct Cli {
    /// Scheduling policy: round-robin, priority or lottery (prompted when absent).
    #[arg(short, long, env = "GTHREADS_POLICY")]
    pub policy: Option<SchedulingPolicy>,

    /// Which set of threads to run.
    #[arg(short, long, value_enum, default_value_t = Workload::Plain, env = "GTHREADS_WORKLOAD")]
    pub workload: Workload,

    /// Iterations per thread before it returns.
    #[arg(short, long, default_value_t = 5, env = "GTHREADS_ROUNDS")]
    pub rounds: u32,

    /// Preemption period in microseconds; 0 runs cooperatively.
    #[arg(short, long, default_value_t = 500, env = "GTHREADS_INTERVAL_US")]
    pub interval: u64,

    /// Simulated work between two prints, in milliseconds.
    #[arg(long, default_value_t = 50)]
    pub pause_ms: u64,

    /// Stack size per thread, in KiB.
    #[arg(long, default_value_t = 4096, env = "GTHREADS_STACK_KIB")]
    pub stack_kib: usize,

    /// Seed for the lottery draw (time-based when absent).
    #[arg(long, env = "GTHREADS_SEED")]
    pub seed: Option<u64>,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Workload {
    /// Two `f` and two `g` workers at priorities 1, 20, 5 and 10.
    Plain,
    /// Four workers sharing one semaphore at priorities 18, 12, 6 and 2.
    Sem,
}
