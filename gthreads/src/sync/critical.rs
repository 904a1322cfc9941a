//! Critical sections
//!
//! A critical section masks the preemption timer for its lifetime. Guards
//! nest: only the outermost one unmasks on drop.

use crate::time::TimerSource;
use std::sync::Arc;
use spin::RwLock;

/// Timer registered by `init`, if any
static TIMER: RwLock<Option<Arc<dyn TimerSource>>> = RwLock::new(None);

/// Make `timer` the source masked by [`CriticalSection::new`]
pub(crate) fn install_timer(timer: Arc<dyn TimerSource>) {
    *TIMER.write() = Some(timer);
}

/// Forget the registered timer, returning it
pub(crate) fn remove_timer() -> Option<Arc<dyn TimerSource>> {
    TIMER.write().take()
}

/// Currently registered timer
pub(crate) fn current_timer() -> Option<Arc<dyn TimerSource>> {
    TIMER.read().clone()
}

/// Mask the registered timer with no guard to undo it
///
/// For code that switches away and never returns; whoever resumes next
/// restores delivery.
pub(crate) fn mask_for_good() {
    if let Some(timer) = current_timer() {
        timer.mask();
    }
}

/// Unmask the registered timer unconditionally
pub(crate) fn unmask() {
    if let Some(timer) = current_timer() {
        timer.unmask();
    }
}

/// RAII guard for masking/restoring timer delivery
///
/// May be held across a context switch: the thread that resumes drops its own
/// guard and unmasks then.
pub struct CriticalSection {
    timer: Option<Arc<dyn TimerSource>>,
    was_masked: bool,
}

impl CriticalSection {
    /// Mask the registered timer (no-op when none is registered)
    pub fn new() -> Self {
        match current_timer() {
            Some(timer) => Self::with(timer),
            None => Self { timer: None, was_masked: true },
        }
    }

    /// Mask a specific timer source
    pub fn with(timer: Arc<dyn TimerSource>) -> Self {
        let was_masked = timer.mask();
        Self { timer: Some(timer), was_masked }
    }

    /// True if this guard is the outermost one
    pub fn is_outermost(&self) -> bool {
        !self.was_masked
    }
}

impl Drop for CriticalSection {
    fn drop(&mut self) {
        if self.was_masked {
            return;
        }
        if let Some(timer) = &self.timer {
            timer.unmask();
        }
    }
}

impl Default for CriticalSection {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `f` with preemption masked
///
/// Use it around output or any other state that must not be interleaved with
/// another green thread.
///
/// ```ignore
/// gthreads::critical(|| println!("f: {}", i));
/// ```
pub fn critical<R>(f: impl FnOnce() -> R) -> R {
    let _guard = CriticalSection::new();
    f()
}
