//! Runtime - the process-wide green thread scheduler
//!
//! Wraps one [`Scheduler`] in a global lock and performs the context switches
//! it decides. The lock is only taken with the timer masked and is always
//! released before switching; the critical-section guard, however, is held
//! across the switch and dropped by the same thread when it resumes.
//!
//! All green threads live on the OS thread that called [`init`].

use crate::config::{RuntimeConfig, TimerMode};
use crate::scheduler::core::error::{fatal, SchedulerError, SchedulerResult};
use crate::scheduler::core::policy::SchedulingPolicy;
use crate::scheduler::core::scheduler::{Scheduler, Switch, SwitchCause, BOOTSTRAP_ID};
use crate::scheduler::core::statistics::StatsReport;
use crate::scheduler::switch;
use crate::scheduler::thread::{Priority, ThreadId, ThreadState};
use crate::sync::critical::{self, CriticalSection};
use crate::time::{CooperativeTimer, MonotonicClock, TimerSource};
use spin::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Global scheduler instance
static RUNTIME: Mutex<Option<Scheduler>> = Mutex::new(None);

/// Run `f` on the scheduler. Caller must hold a critical section.
fn with_scheduler<R>(f: impl FnOnce(&mut Scheduler) -> R) -> SchedulerResult<R> {
    let mut runtime = RUNTIME.lock();
    runtime.as_mut().map(f).ok_or(SchedulerError::NotInitialized)
}

/// Carry out a committed switch, then free a parked stack once back
///
/// # Safety
/// Caller holds a critical section and no scheduler lock.
unsafe fn perform(sw: Switch) {
    switch::switch(sw.old, sw.new);
    reap();
}

fn reap() {
    if let Some(sched) = RUNTIME.lock().as_mut() {
        sched.reap();
    }
}

/// Initialize with the default configuration
pub fn init() -> SchedulerResult<()> {
    init_with(RuntimeConfig::default())
}

/// Adopt the calling OS thread as the bootstrap thread and arm the timer
pub fn init_with(config: RuntimeConfig) -> SchedulerResult<()> {
    config.validate()?;

    let timer: Arc<dyn TimerSource> = match config.timer {
        TimerMode::Disabled => Arc::new(CooperativeTimer::new()),
        #[cfg(unix)]
        TimerMode::Interval(period) => Arc::new(crate::time::SignalTimer::new(period)),
        #[cfg(not(unix))]
        TimerMode::Interval(_) => {
            log::warn!("[SCHED] No interval timer on this platform, running cooperatively");
            Arc::new(CooperativeTimer::new())
        }
    };

    {
        let _cs = CriticalSection::with(timer.clone());
        let mut runtime = RUNTIME.lock();
        if runtime.is_some() {
            return Err(SchedulerError::AlreadyInitialized);
        }
        let mut sched = Scheduler::new(&config, Box::new(MonotonicClock::new()), thread_start)?;
        sched.install_bootstrap()?;
        *runtime = Some(sched);
    }

    critical::install_timer(timer.clone());
    if let Err(e) = timer.arm(on_tick) {
        critical::remove_timer();
        *RUNTIME.lock() = None;
        log::error!("[SCHED] Failed to arm {} timer: {}", timer.name(), e);
        return Err(e);
    }

    critical::critical(|| {
        log::info!(
            "[SCHED] Runtime initialized: {} slots, {} KiB stacks, policy {}, timer {}",
            config.capacity,
            config.stack_size / 1024,
            config.policy,
            timer.name()
        )
    });
    Ok(())
}

/// Tear the runtime down; only the bootstrap thread, once alone, may do it
pub fn shutdown() -> SchedulerResult<()> {
    let _cs = CriticalSection::new();
    {
        let mut runtime = RUNTIME.lock();
        let sched = runtime.as_ref().ok_or(SchedulerError::NotInitialized)?;
        if sched.current() != BOOTSTRAP_ID {
            return Err(SchedulerError::NotBootstrap { caller: sched.current() });
        }
        let live = sched.others_live();
        if live > 0 {
            return Err(SchedulerError::LiveThreads { live });
        }
        *runtime = None;
    }
    if let Some(timer) = critical::remove_timer() {
        timer.disarm();
    }
    log::info!("[SCHED] Runtime shut down");
    Ok(())
}

/// Create a Ready thread running `entry`
///
/// Priorities outside `1..=max_priority` are clamped to the default.
pub fn create<F>(entry: F, priority: Priority) -> SchedulerResult<ThreadId>
where
    F: FnOnce() + Send + 'static,
{
    let _cs = CriticalSection::new();
    with_scheduler(|s| s.create(Box::new(entry), priority))?
}

/// Offer the CPU to another thread
///
/// Returns true if a switch happened (the call returns once this thread is
/// scheduled again), false if nothing else could run.
pub fn yield_now() -> bool {
    let _cs = CriticalSection::new();
    match with_scheduler(|s| s.reschedule(SwitchCause::Yield)) {
        Ok(Some(sw)) => {
            // SAFETY: critical section held, lock released.
            unsafe { perform(sw) };
            true
        }
        _ => false,
    }
}

/// Fix the scheduling policy before any thread is created
pub fn select_policy(policy: SchedulingPolicy) -> SchedulerResult<()> {
    let _cs = CriticalSection::new();
    with_scheduler(|s| s.select_policy(policy))??;
    log::info!("[SCHED] Scheduling policy: {}", policy);
    Ok(())
}

/// Live statistics of every thread
pub fn snapshot_stats() -> SchedulerResult<StatsReport> {
    let _cs = CriticalSection::new();
    with_scheduler(|s| s.snapshot())
}

/// Slot of the calling green thread
pub fn current_thread() -> SchedulerResult<ThreadId> {
    let _cs = CriticalSection::new();
    with_scheduler(|s| s.current())
}

/// Run other threads until none is left (bootstrap thread only)
///
/// Fails with `Deadlock` when the remaining threads are all Blocked.
pub fn wait_all() -> SchedulerResult<()> {
    loop {
        let _cs = CriticalSection::new();
        let (me, others) = with_scheduler(|s| (s.current(), s.others_live()))?;
        if me != BOOTSTRAP_ID {
            return Err(SchedulerError::NotBootstrap { caller: me });
        }
        if others == 0 {
            return Ok(());
        }

        let outcome = with_scheduler(|s| match s.reschedule(SwitchCause::Yield) {
            Some(sw) => Ok(Some(sw)),
            // Lottery may draw the bootstrap thread itself; just draw again.
            None if s.count_in(ThreadState::Ready) > 0 => Ok(None),
            None => Err(SchedulerError::Deadlock { blocked: s.count_in(ThreadState::Blocked) }),
        })??;
        if let Some(sw) = outcome {
            // SAFETY: critical section held, lock released.
            unsafe { perform(sw) };
        }
    }
}

/// Terminate the calling thread
///
/// From the bootstrap thread: wait for every other thread, shut down and
/// exit the process with `exit_code`. From any other thread: exit that thread.
pub fn stop(exit_code: i32) -> ! {
    match current_thread() {
        Ok(BOOTSTRAP_ID) => {
            if let Err(e) = wait_all() {
                log::error!("[SCHED] {} ({})", e, e.recovery_hint());
            }
            if let Err(e) = shutdown() {
                log::warn!("[SCHED] Shutdown incomplete: {}", e);
            }
            std::process::exit(exit_code)
        }
        Ok(id) => {
            critical::critical(|| log::info!("[SCHED] Thread {} stopped with code {}", id, exit_code));
            exit_current()
        }
        Err(_) => std::process::exit(exit_code),
    }
}

/// Termination path of every non-bootstrap thread
pub(crate) fn exit_current() -> ! {
    critical::mask_for_good();
    match with_scheduler(|s| s.terminate_current()) {
        // SAFETY: timer masked, lock released; this stack is parked as a
        // zombie and freed by the thread that resumes.
        Ok(Ok(sw)) => unsafe { switch::switch(sw.old, sw.new) },
        Ok(Err(e)) | Err(e) => fatal(&format!("thread exit failed: {}", e)),
    }
    fatal("terminated thread resumed")
}

/// Suspend the current thread as Blocked until [`wake`]
pub(crate) fn block_current() -> SchedulerResult<()> {
    let _cs = CriticalSection::new();
    let sw = with_scheduler(|s| s.block_current())??;
    // SAFETY: critical section held, lock released.
    unsafe { perform(sw) };
    Ok(())
}

/// Make a Blocked thread Ready
pub(crate) fn wake(id: ThreadId) -> SchedulerResult<()> {
    let _cs = CriticalSection::new();
    with_scheduler(|s| s.wake(id))?
}

/// Timer handler: preempt the running thread
fn on_tick() {
    let _cs = CriticalSection::new();
    // Busy only if a tick slipped into a section that holds the lock.
    let Some(mut runtime) = RUNTIME.try_lock() else {
        return;
    };
    let sw = runtime.as_mut().and_then(|s| s.reschedule(SwitchCause::Preempt));
    drop(runtime);

    if let Some(sw) = sw {
        // No reaping here: this may run in signal context.
        // SAFETY: timer masked, lock released.
        unsafe { switch::switch(sw.old, sw.new) };
    }
}

/// First frame of every created thread
///
/// Entered from a switch with the timer masked. When the first dispatch comes
/// from a tick this frame sits above the interrupted thread's handler frame,
/// so the reap below may free a stack while still nested in the handler. It
/// stays under the mask, the same rule applications follow for the allocator.
extern "C" fn thread_start() -> ! {
    let entry = RUNTIME.lock().as_mut().and_then(|s| {
        s.reap();
        s.take_entry()
    });
    critical::unmask();

    let Some(entry) = entry else {
        fatal("thread started without an entry");
    };
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry)) {
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string panic>");
        critical::critical(|| log::error!("[SCHED] Thread panicked: {}", message));
    }
    exit_current()
}
