mod app;
mod workload;

use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use gthreads::{RuntimeConfig, SchedulingPolicy, TimerMode};

use crate::app::Cli;
use crate::workload::Pace;

/// Numbered menu on stdout, RoundRobin on anything unexpected
fn prompt_policy() -> io::Result<SchedulingPolicy> {
    let mut out = io::stdout().lock();
    writeln!(out, "Select scheduling algorithm:")?;
    for (i, policy) in SchedulingPolicy::ALL.iter().enumerate() {
        writeln!(out, "{}. {}", i, policy)?;
    }
    write!(out, "Enter the number of the algorithm you want to use: ")?;
    out.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let policy = match line.trim().parse::<usize>() {
        Ok(i) if i < SchedulingPolicy::ALL.len() => SchedulingPolicy::ALL[i],
        _ => {
            writeln!(out, "Invalid selection. Defaulting to RoundRobin.")?;
            SchedulingPolicy::RoundRobin
        }
    };
    writeln!(out, "Selected scheduling algorithm: {}", policy)?;
    Ok(policy)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp_micros()
        .format_module_path(false)
        .init();

    let policy = match cli.policy {
        Some(policy) => policy,
        None => prompt_policy().context("reading the algorithm selection")?,
    };

    let timer = match cli.interval {
        0 => TimerMode::Disabled,
        us => TimerMode::Interval(Duration::from_micros(us)),
    };
    let mut config = RuntimeConfig::new()
        .with_policy(policy)
        .with_timer(timer)
        .with_stack_size(cli.stack_kib * 1024);
    if let Some(seed) = cli.seed {
        config = config.with_lottery_seed(seed);
    }

    gthreads::init_with(config).context("initializing the runtime")?;
    workload::spawn(
        cli.workload,
        Pace { rounds: cli.rounds, pause: Duration::from_millis(cli.pause_ms) },
    )
    .context("creating the workload threads")?;

    gthreads::wait_all().context("running the workload")?;
    let report = gthreads::snapshot_stats().context("collecting statistics")?;
    println!("{}", report);

    gthreads::stop(0)
}
