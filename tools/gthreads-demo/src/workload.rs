//! Demo thread bodies

use crate::app::Workload;
use gthreads::{critical, Priority, Semaphore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Shared by every `f_sem` worker
static SEM: Semaphore = Semaphore::new(1);

static NEXT_F: AtomicUsize = AtomicUsize::new(0);
static NEXT_G: AtomicUsize = AtomicUsize::new(0);
static NEXT_F_SEM: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Copy)]
pub struct Pace {
    pub rounds: u32,
    pub pause: Duration,
}

/// Priorities of the threads a workload starts, in creation order
pub fn priorities(workload: Workload) -> [Priority; 4] {
    match workload {
        Workload::Plain => [1, 20, 5, 10],
        Workload::Sem => [18, 12, 6, 2],
    }
}

/// Create every thread of `workload`
pub fn spawn(workload: Workload, pace: Pace) -> gthreads::SchedulerResult<()> {
    if workload == Workload::Sem {
        SEM.init(1);
    }
    for (i, priority) in priorities(workload).into_iter().enumerate() {
        let id = match workload {
            Workload::Plain if i < 2 => gthreads::create(move || f(pace), priority)?,
            Workload::Plain => gthreads::create(move || g(pace), priority)?,
            Workload::Sem => gthreads::create(move || f_sem(pace), priority)?,
        };
        critical(|| log::debug!("spawned thread {} at priority {}", id, priority));
    }
    Ok(())
}

/// Uninterrupted wait; the OS thread sleeps, ticks may still switch us out
fn pause(pace: Pace) {
    std::thread::sleep(pace.pause);
}

fn chatter(tag: &str, counter: &AtomicUsize, pace: Pace) {
    let id = counter.fetch_add(1, Ordering::Relaxed) + 1;
    let mut val = 0;
    for _ in 0..pace.rounds {
        val += 1;
        critical(|| println!("{} Thread id = {}, val = {} BEGINNING", tag, id, val));
        pause(pace);
        val += 1;
        critical(|| println!("{} Thread id = {}, val = {} END", tag, id, val));
        pause(pace);
    }
}

fn f(pace: Pace) {
    chatter("F", &NEXT_F, pace);
}

fn g(pace: Pace) {
    chatter("G", &NEXT_G, pace);
}

fn f_sem(pace: Pace) {
    let id = NEXT_F_SEM.fetch_add(1, Ordering::Relaxed) + 1;
    for _ in 0..pace.rounds {
        if let Err(e) = SEM.wait() {
            critical(|| log::error!("f_sem {}: {}", id, e));
            return;
        }
        critical(|| println!("SEMAPHORE IN CRITICAL SECTION WITH ID {}", id));
        pause(pace);
        pause(pace);
        SEM.post();
    }
}
