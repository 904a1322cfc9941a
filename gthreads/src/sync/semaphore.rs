//! Counting semaphore with a strict FIFO wait queue
//!
//! Waiters are woken in the order they blocked, regardless of priority or
//! ticket allocation. Every operation runs inside a [`CriticalSection`]; with
//! one OS thread and the timer masked nothing else can touch the state.
//!
//! Lock order: semaphore state, then the scheduler.

use super::critical::CriticalSection;
use crate::scheduler::core::error::SchedulerResult;
use crate::scheduler::runtime;
use crate::scheduler::thread::ThreadId;
use spin::Mutex;
use std::collections::VecDeque;

/// Outcome of [`SemaphoreState::acquire`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// A unit was taken; the caller continues
    Acquired,
    /// The caller was queued and must suspend
    MustBlock,
}

/// Counter and wait queue, without any scheduling
#[derive(Debug, Default)]
pub struct SemaphoreState {
    value: usize,
    waiters: VecDeque<ThreadId>,
}

impl SemaphoreState {
    pub const fn new(value: usize) -> Self {
        Self { value, waiters: VecDeque::new() }
    }

    /// Set the counter and drop every queued waiter
    pub fn reset(&mut self, value: usize) {
        self.value = value;
        self.waiters.clear();
    }

    /// Take a unit, or queue `thread` at the tail
    pub fn acquire(&mut self, thread: ThreadId) -> Acquire {
        if self.value > 0 {
            self.value -= 1;
            Acquire::Acquired
        } else {
            self.waiters.push_back(thread);
            Acquire::MustBlock
        }
    }

    /// Hand a unit to the head waiter, or bank it
    pub fn release(&mut self) -> Option<ThreadId> {
        let head = self.waiters.pop_front();
        if head.is_none() {
            self.value += 1;
        }
        head
    }

    /// Withdraw a queued waiter that could not suspend
    pub fn cancel(&mut self, thread: ThreadId) -> bool {
        match self.waiters.iter().position(|&t| t == thread) {
            Some(pos) => self.waiters.remove(pos).is_some(),
            None => false,
        }
    }

    pub fn value(&self) -> usize {
        self.value
    }

    pub fn waiting(&self) -> usize {
        self.waiters.len()
    }

    /// Queued waiters, head first
    pub fn waiters(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.waiters.iter().copied()
    }
}

/// Counting semaphore for green threads
///
/// ```ignore
/// static SEM: Semaphore = Semaphore::new(1);
///
/// SEM.wait()?;
/// // ... exclusive section ...
/// SEM.post();
/// ```
pub struct Semaphore {
    state: Mutex<SemaphoreState>,
}

impl Semaphore {
    pub const fn new(value: usize) -> Self {
        Self { state: Mutex::new(SemaphoreState::new(value)) }
    }

    /// Reset to `value` with an empty wait queue
    pub fn init(&self, value: usize) {
        let _cs = CriticalSection::new();
        self.state.lock().reset(value);
    }

    /// Take a unit, suspending the calling green thread until one is posted
    ///
    /// Fails with `Deadlock` when blocking would leave nothing runnable, in
    /// which case the caller is withdrawn from the queue and keeps running.
    pub fn wait(&self) -> SchedulerResult<()> {
        let _cs = CriticalSection::new();
        let me = runtime::current_thread()?;

        let outcome = self.state.lock().acquire(me);
        if outcome == Acquire::Acquired {
            return Ok(());
        }

        log::debug!("[SEM] thread {} waits", me);
        if let Err(e) = runtime::block_current() {
            self.state.lock().cancel(me);
            log::warn!("[SEM] thread {} cannot block: {}", me, e);
            return Err(e);
        }
        Ok(())
    }

    /// Release a unit; the longest waiter becomes Ready (not Running)
    pub fn post(&self) {
        let _cs = CriticalSection::new();
        let woken = self.state.lock().release();
        if let Some(thread) = woken {
            match runtime::wake(thread) {
                Ok(()) => log::debug!("[SEM] thread {} woken", thread),
                Err(e) => log::warn!("[SEM] failed to wake thread {}: {}", thread, e),
            }
        }
    }

    /// Units currently available
    pub fn value(&self) -> usize {
        let _cs = CriticalSection::new();
        self.state.lock().value()
    }

    /// Number of blocked waiters
    pub fn waiting(&self) -> usize {
        let _cs = CriticalSection::new();
        self.state.lock().waiting()
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new(0)
    }
}
