//! Thread - Thread Control Block
//!
//! One slot of the fixed thread table.

use super::stack::ThreadStack;
use super::state::{validate_transition, ThreadState};
use crate::scheduler::core::error::{SchedulerError, SchedulerResult};
use crate::scheduler::core::statistics::ThreadStats;
use crate::scheduler::switch::Context;

/// Thread ID type (slot index in the table)
pub type ThreadId = usize;

/// Scheduling priority, `1..=max_priority`
pub type Priority = i32;

/// Entry closure of a green thread
pub type Entry = Box<dyn FnOnce() + Send + 'static>;

/// Lottery tickets owned by a thread, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketRange {
    pub start: u32,
    pub end: u32,
}

impl TicketRange {
    /// `count` tickets starting at `start` (`count >= 1`)
    pub fn new(start: u32, count: u32) -> Self {
        Self { start, end: start + count.max(1) - 1 }
    }

    /// Like [`TicketRange::new`], or None if the range would pass `u32::MAX`
    pub fn checked(start: u32, count: u32) -> Option<Self> {
        let end = start.checked_add(count.max(1) - 1)?;
        Some(Self { start, end })
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn contains(&self, draw: u32) -> bool {
        (self.start..=self.end).contains(&draw)
    }

    /// Same range moved `by` tickets towards 1
    pub fn shifted_down(self, by: u32) -> Self {
        Self { start: self.start - by, end: self.end - by }
    }
}

/// Number of lottery tickets for a base priority
pub fn tickets_for(priority: Priority) -> u32 {
    priority.max(1) as u32
}

/// Thread Control Block
pub struct Thread {
    /// Slot index
    id: ThreadId,

    /// Lifecycle state
    state: ThreadState,

    /// Saved registers while not Running
    context: Context,

    /// Owned stack (None for the bootstrap thread and free slots)
    stack: Option<ThreadStack>,

    /// Closure run on first dispatch
    entry: Option<Entry>,

    /// Priority given at creation
    base_priority: Priority,

    /// Aged priority (PriorityBased)
    current_priority: Priority,

    /// Lottery allocation
    tickets: Option<TicketRange>,

    /// Timing record
    stats: ThreadStats,
}

impl Thread {
    /// Free slot
    pub fn unused(id: ThreadId) -> Self {
        Self {
            id,
            state: ThreadState::Unused,
            context: Context::zeroed(),
            stack: None,
            entry: None,
            base_priority: 0,
            current_priority: 0,
            tickets: None,
            stats: ThreadStats::default(),
        }
    }

    /// Fill a free slot with a new Ready thread
    pub(crate) fn spawn(
        &mut self,
        stack: Option<ThreadStack>,
        entry: Option<Entry>,
        priority: Priority,
        tickets: TicketRange,
        now: u64,
    ) -> SchedulerResult<()> {
        if self.state != ThreadState::Unused {
            return Err(SchedulerError::InvalidStateTransition {
                thread_id: self.id,
                from: self.state,
                to: ThreadState::Ready,
            });
        }
        self.context = Context::zeroed();
        self.stack = stack;
        self.entry = entry;
        self.base_priority = priority;
        self.current_priority = priority;
        self.tickets = Some(tickets);
        self.stats = ThreadStats::ready_at(now);
        self.state = ThreadState::Ready;
        Ok(())
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Move to `to`, rejecting transitions the state machine forbids
    pub fn set_state(&mut self, to: ThreadState) -> SchedulerResult<()> {
        if !validate_transition(self.state, to) {
            return Err(SchedulerError::InvalidStateTransition {
                thread_id: self.id,
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    pub fn base_priority(&self) -> Priority {
        self.base_priority
    }

    pub fn current_priority(&self) -> Priority {
        self.current_priority
    }

    /// One aging step: +1, capped at `max`
    pub fn age(&mut self, max: Priority) {
        self.current_priority = self.current_priority.saturating_add(1).min(max);
    }

    /// Back to base priority (on dispatch)
    pub fn reset_priority(&mut self) {
        self.current_priority = self.base_priority;
    }

    pub fn tickets(&self) -> Option<TicketRange> {
        self.tickets
    }

    pub(crate) fn set_tickets(&mut self, tickets: Option<TicketRange>) {
        self.tickets = tickets;
    }

    pub fn stats(&self) -> &ThreadStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut ThreadStats {
        &mut self.stats
    }

    pub(crate) fn context_ptr(&mut self) -> *mut Context {
        &mut self.context
    }

    pub(crate) fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub(crate) fn stack(&self) -> Option<&ThreadStack> {
        self.stack.as_ref()
    }

    pub(crate) fn take_stack(&mut self) -> Option<ThreadStack> {
        self.stack.take()
    }

    pub(crate) fn take_entry(&mut self) -> Option<Entry> {
        self.entry.take()
    }
}

impl core::fmt::Debug for Thread {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("base_priority", &self.base_priority)
            .field("current_priority", &self.current_priority)
            .field("tickets", &self.tickets)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_range() {
        let r = TicketRange::new(11, 20);
        assert_eq!((r.start, r.end), (11, 30));
        assert_eq!(r.len(), 20);
        assert!(r.contains(15));
        assert!(!r.contains(31));
        assert_eq!(r.shifted_down(10), TicketRange::new(1, 20));
        assert_eq!(tickets_for(0), 1);
        assert_eq!(tickets_for(7), 7);
    }

    #[test]
    fn test_aging_caps_at_max() {
        let mut t = Thread::unused(1);
        t.spawn(None, None, 18, TicketRange::new(1, 18), 0).unwrap();
        t.age(20);
        t.age(20);
        t.age(20);
        assert_eq!(t.current_priority(), 20);
        t.reset_priority();
        assert_eq!(t.current_priority(), 18);
    }

    #[test]
    fn test_aging_saturates_at_priority_limit() {
        let mut t = Thread::unused(1);
        t.spawn(None, None, Priority::MAX, TicketRange::new(1, 1), 0).unwrap();
        t.age(Priority::MAX);
        assert_eq!(t.current_priority(), Priority::MAX);
    }

    #[test]
    fn test_checked_range_rejects_overflow() {
        assert_eq!(TicketRange::checked(1, 20), Some(TicketRange::new(1, 20)));
        assert_eq!(
            TicketRange::checked(u32::MAX, 1),
            Some(TicketRange { start: u32::MAX, end: u32::MAX })
        );
        assert_eq!(TicketRange::checked(u32::MAX, 2), None);
        assert_eq!(TicketRange::checked(u32::MAX - 9, u32::MAX), None);
    }

    #[test]
    fn test_spawn_requires_free_slot() {
        let mut t = Thread::unused(2);
        t.spawn(None, None, 5, TicketRange::new(1, 5), 0).unwrap();
        assert_eq!(t.state(), ThreadState::Ready);
        assert!(t.spawn(None, None, 5, TicketRange::new(6, 5), 0).is_err());
        assert!(t.set_state(ThreadState::Blocked).is_err());
    }
}
