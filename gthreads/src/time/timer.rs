//! Timer - periodic preemption source
//!
//! The runtime only needs four things from a timer: register a tick handler,
//! stop ticking, and mask/unmask delivery around critical sections.
//!
//! - [`SignalTimer`]: `SIGALRM` driven by `setitimer(ITIMER_REAL)`
//! - [`CooperativeTimer`]: no periodic source; ticks are injected by hand
//!
//! # Safety
//! The tick handler runs in signal context. It must only touch state that is
//! otherwise accessed with the timer masked.

use crate::scheduler::core::error::SchedulerResult;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Reschedule entry point invoked on every tick
pub type TimerHandler = fn();

/// Periodic event source with maskable delivery
pub trait TimerSource: Send + Sync {
    /// Register `handler` and start ticking
    fn arm(&self, handler: TimerHandler) -> SchedulerResult<()>;

    /// Stop ticking and forget the handler
    fn disarm(&self);

    /// Block delivery. Returns true if delivery was already blocked.
    fn mask(&self) -> bool;

    /// Allow delivery; a tick that arrived while masked is delivered now
    fn unmask(&self);

    /// Is delivery currently blocked?
    fn is_masked(&self) -> bool;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Store a handler in an atomic slot (0 = none)
fn store_handler(slot: &AtomicUsize, handler: Option<TimerHandler>) {
    slot.store(handler.map_or(0, |h| h as usize), Ordering::Release);
}

/// Load a handler from an atomic slot
fn load_handler(slot: &AtomicUsize) -> Option<TimerHandler> {
    match slot.load(Ordering::Acquire) {
        0 => None,
        // Only ever written by `store_handler` from a valid `fn()`.
        raw => Some(unsafe { core::mem::transmute::<usize, TimerHandler>(raw) }),
    }
}

// ═══════════════════════════════════════════════════════════════
// Cooperative (no periodic source)
// ═══════════════════════════════════════════════════════════════

/// Timer without a hardware source
///
/// Keeps the mask bookkeeping so critical sections behave identically, and
/// lets tests inject preemption points with [`CooperativeTimer::tick`].
pub struct CooperativeTimer {
    handler: AtomicUsize,
    masked: AtomicBool,
    pending: AtomicBool,
}

impl CooperativeTimer {
    pub const fn new() -> Self {
        Self {
            handler: AtomicUsize::new(0),
            masked: AtomicBool::new(false),
            pending: AtomicBool::new(false),
        }
    }

    /// Deliver one tick now, or latch it until unmasked
    pub fn tick(&self) {
        if self.masked.load(Ordering::Acquire) {
            self.pending.store(true, Ordering::Release);
            return;
        }
        if let Some(handler) = load_handler(&self.handler) {
            handler();
        }
    }

    /// Tick latched while masked and not yet delivered
    pub fn has_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl Default for CooperativeTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerSource for CooperativeTimer {
    fn arm(&self, handler: TimerHandler) -> SchedulerResult<()> {
        store_handler(&self.handler, Some(handler));
        Ok(())
    }

    fn disarm(&self) {
        store_handler(&self.handler, None);
        self.pending.store(false, Ordering::Release);
    }

    fn mask(&self) -> bool {
        self.masked.swap(true, Ordering::AcqRel)
    }

    fn unmask(&self) {
        self.masked.store(false, Ordering::Release);
        if self.pending.swap(false, Ordering::AcqRel) {
            self.tick();
        }
    }

    fn is_masked(&self) -> bool {
        self.masked.load(Ordering::Acquire)
    }

    fn name(&self) -> &'static str {
        "cooperative"
    }
}

// ═══════════════════════════════════════════════════════════════
// SIGALRM interval timer
// ═══════════════════════════════════════════════════════════════

#[cfg(unix)]
pub use self::signal::SignalTimer;

#[cfg(unix)]
mod signal {
    use super::{load_handler, store_handler, TimerHandler, TimerSource};
    use crate::scheduler::core::error::SchedulerResult;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use core::time::Duration;
    use nix::errno::Errno;
    use nix::libc;
    use nix::sys::pthread::{pthread_kill, pthread_self, Pthread};
    use nix::sys::signal::{
        pthread_sigmask, sigaction, SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal,
    };
    use spin::Mutex;

    /// Handler invoked from `on_sigalrm`
    static SIGNAL_HANDLER: AtomicUsize = AtomicUsize::new(0);

    /// OS thread that owns the green threads (0 = none)
    static OWNER: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn on_sigalrm(_signal: libc::c_int) {
        // A process-directed SIGALRM may land on any OS thread that does not
        // block it; the green threads only exist on the owner.
        let owner = OWNER.load(Ordering::Acquire);
        if owner != 0 && owner != pthread_self() as usize {
            let _ = pthread_kill(owner as Pthread, Signal::SIGALRM);
            return;
        }
        if let Some(handler) = load_handler(&SIGNAL_HANDLER) {
            handler();
        }
    }

    fn alarm_set() -> SigSet {
        let mut set = SigSet::empty();
        set.add(Signal::SIGALRM);
        set
    }

    fn set_interval(interval: Duration) -> SchedulerResult<()> {
        let tv = libc::timeval {
            tv_sec: interval.as_secs() as libc::time_t,
            tv_usec: interval.subsec_micros() as libc::suseconds_t,
        };
        let spec = libc::itimerval { it_interval: tv, it_value: tv };
        // SAFETY: both pointers are valid for the duration of the call.
        let res = unsafe { libc::setitimer(libc::ITIMER_REAL, &spec, core::ptr::null_mut()) };
        Errno::result(res)?;
        Ok(())
    }

    /// `SIGALRM` preemption source
    ///
    /// Delivery is masked per OS thread with `pthread_sigmask`, so a tick
    /// arriving inside a critical section stays pending and is delivered by
    /// the kernel on unmask.
    pub struct SignalTimer {
        interval: Duration,
        previous: Mutex<Option<SigAction>>,
    }

    impl SignalTimer {
        pub fn new(interval: Duration) -> Self {
            Self { interval, previous: Mutex::new(None) }
        }

        pub fn interval(&self) -> Duration {
            self.interval
        }
    }

    impl TimerSource for SignalTimer {
        fn arm(&self, handler: TimerHandler) -> SchedulerResult<()> {
            store_handler(&SIGNAL_HANDLER, Some(handler));
            OWNER.store(pthread_self() as usize, Ordering::Release);

            let action = SigAction::new(
                SigHandler::Handler(on_sigalrm),
                SaFlags::SA_RESTART,
                SigSet::empty(),
            );
            // SAFETY: `on_sigalrm` only reads atomics and calls the registered
            // handler, which runs with the alarm masked by the kernel.
            let previous = unsafe { sigaction(Signal::SIGALRM, &action) }?;
            self.previous.lock().get_or_insert(previous);

            set_interval(self.interval)?;
            self.unmask();
            log::debug!("[TIMER] SIGALRM armed every {}us", self.interval.as_micros());
            Ok(())
        }

        fn disarm(&self) {
            if let Err(e) = set_interval(Duration::ZERO) {
                log::warn!("[TIMER] failed to stop interval timer: {}", e);
            }
            // Ignoring the signal discards a tick still pending on a masked
            // thread before the previous disposition (usually terminate) returns.
            let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
            // SAFETY: SIG_IGN installs no handler code.
            let _ = unsafe { sigaction(Signal::SIGALRM, &ignore) };
            if let Some(previous) = self.previous.lock().take() {
                // SAFETY: restoring the action that was installed before `arm`.
                if let Err(e) = unsafe { sigaction(Signal::SIGALRM, &previous) } {
                    log::warn!("[TIMER] failed to restore SIGALRM action: {}", e);
                }
            }
            store_handler(&SIGNAL_HANDLER, None);
            OWNER.store(0, Ordering::Release);
        }

        fn mask(&self) -> bool {
            let mut old = SigSet::empty();
            match pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&alarm_set()), Some(&mut old)) {
                Ok(()) => old.contains(Signal::SIGALRM),
                // Cannot fail with valid arguments; never unmask what we did not mask.
                Err(_) => true,
            }
        }

        fn unmask(&self) {
            let _ = pthread_sigmask(SigmaskHow::SIG_UNBLOCK, Some(&alarm_set()), None);
        }

        fn is_masked(&self) -> bool {
            let mut current = SigSet::empty();
            pthread_sigmask(SigmaskHow::SIG_BLOCK, None, Some(&mut current))
                .map(|()| current.contains(Signal::SIGALRM))
                .unwrap_or(false)
        }

        fn name(&self) -> &'static str {
            "sigalrm"
        }
    }
}
