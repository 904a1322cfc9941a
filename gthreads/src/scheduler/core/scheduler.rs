//! Scheduler Core - fixed thread table with pluggable selection
//!
//! Pure state machine: every operation decides and commits the state flips
//! and statistics of a switch, then hands back a [`Switch`] describing the
//! two contexts. The runtime performs the actual register swap after
//! releasing the scheduler lock.
//!
//! # Features
//! - Fixed-capacity table indexed by slot (`ThreadId`)
//! - RoundRobin, PriorityBased (aging) and Lottery selection
//! - Ticket pool kept as a gap-free partition of `1..=total_tickets`
//! - Deferred stack release for terminated threads
//! - Per-thread timing statistics and global counters

use crate::config::RuntimeConfig;
use crate::scheduler::core::error::{fatal, Resource, SchedulerError, SchedulerResult};
use crate::scheduler::core::policy::{self, Lottery, SchedulingPolicy};
use crate::scheduler::core::statistics::{SchedulerCounters, StatsReport, ThreadReport};
use crate::scheduler::switch::{self, Context};
use crate::scheduler::thread::{
    tickets_for, Entry, Priority, Thread, ThreadId, ThreadStack, ThreadState, TicketRange,
};
use crate::time::Clock;

/// Slot of the bootstrap thread
pub const BOOTSTRAP_ID: ThreadId = 0;

/// First code run on a fresh thread stack
pub type EntryPoint = extern "C" fn() -> !;

/// Why a reschedule was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchCause {
    /// `yield_now` or the bootstrap wait loop
    Yield,
    /// Timer tick
    Preempt,
    /// Semaphore wait
    Block,
    /// Thread termination
    Exit,
}

/// A committed switch, to be carried out with [`switch::switch`]
#[derive(Debug)]
pub struct Switch {
    pub from: ThreadId,
    pub to: ThreadId,
    pub old: *mut Context,
    pub new: *const Context,
}

/// Global scheduler state
pub struct Scheduler {
    /// Thread table, never resized after construction
    threads: Vec<Thread>,

    /// Slot owning the CPU
    current: ThreadId,

    /// Selection algorithm
    policy: SchedulingPolicy,

    /// Priority range upper bound
    max_priority: Priority,

    /// Priority used for out-of-range requests
    default_priority: Priority,

    /// Bytes per thread stack
    stack_size: usize,

    /// Sum of all ticket allocations
    total_tickets: u32,

    /// Ticket drawing machine
    lottery: Lottery,

    /// Time source for statistics
    clock: Box<dyn Clock>,

    /// Trampoline seeded into new contexts
    entry_point: EntryPoint,

    /// Scheduler counters
    counters: SchedulerCounters,

    /// Stack of the last terminated thread, freed by the next one to resume
    zombie: Option<ThreadStack>,
}

impl Scheduler {
    /// Create a scheduler with an all-Unused table
    ///
    /// Fails with `InvalidConfig` when `config` does not validate.
    pub fn new(
        config: &RuntimeConfig,
        clock: Box<dyn Clock>,
        entry_point: EntryPoint,
    ) -> SchedulerResult<Self> {
        config.validate()?;
        Ok(Self {
            threads: (0..config.capacity).map(Thread::unused).collect(),
            current: BOOTSTRAP_ID,
            policy: config.policy,
            max_priority: config.max_priority,
            default_priority: config.default_priority(),
            stack_size: config.stack_size,
            total_tickets: 0,
            lottery: Lottery::new(config.lottery_seed),
            clock,
            entry_point,
            counters: SchedulerCounters::default(),
            zombie: None,
        })
    }

    /// Adopt the calling OS thread as slot 0, already Running
    ///
    /// The bootstrap thread runs on the process stack, so it owns no arena.
    pub fn install_bootstrap(&mut self) -> SchedulerResult<()> {
        if self.threads[BOOTSTRAP_ID].state() != ThreadState::Unused {
            return Err(SchedulerError::AlreadyInitialized);
        }
        let now = self.clock.now_us();
        let priority = self.max_priority;
        let tickets = self.next_tickets(priority)?;

        let thread = &mut self.threads[BOOTSTRAP_ID];
        thread.spawn(None, None, priority, tickets, now)?;
        thread.set_state(ThreadState::Running)?;
        thread.stats_mut().mark_started(now);
        self.total_tickets = tickets.end;
        self.current = BOOTSTRAP_ID;
        Ok(())
    }

    /// Change the policy; only allowed before the first `create`
    pub fn select_policy(&mut self, policy: SchedulingPolicy) -> SchedulerResult<()> {
        if self.counters.total_spawns > 0 {
            return Err(SchedulerError::PolicyLocked);
        }
        self.policy = policy;
        Ok(())
    }

    /// Clamp out-of-range priorities to the default
    pub fn clamp_priority(&self, priority: Priority) -> Priority {
        if (1..=self.max_priority).contains(&priority) {
            priority
        } else {
            self.default_priority
        }
    }

    /// Create a Ready thread that will run `entry` on its own stack
    ///
    /// On failure the table is left exactly as it was.
    pub fn create(&mut self, entry: Entry, priority: Priority) -> SchedulerResult<ThreadId> {
        let priority = self.clamp_priority(priority);

        let slot = self
            .threads
            .iter()
            .position(|t| t.state() == ThreadState::Unused)
            .ok_or(SchedulerError::ResourceExhausted {
                resource: Resource::ThreadSlot { capacity: self.threads.len() },
            })?;

        let tickets = self.next_tickets(priority)?;
        let stack = ThreadStack::new(self.stack_size)?;
        let top = stack.top();
        let now = self.clock.now_us();

        let entry_point = self.entry_point;
        let thread = &mut self.threads[slot];
        thread.spawn(Some(stack), Some(entry), priority, tickets, now)?;
        // SAFETY: `top` is the end of the arena now owned by this slot; it is
        // only released after the thread has switched away for good.
        unsafe { switch::init_context(thread.context_mut(), top, entry_point) };

        self.total_tickets = tickets.end;
        self.counters.total_spawns += 1;

        log::info!(
            "[SCHED] Thread {} created (priority {}, tickets {}-{})",
            slot,
            priority,
            tickets.start,
            tickets.end
        );
        Ok(slot)
    }

    /// Pick the next thread and commit the switch
    ///
    /// Returns None, with no state or statistics change, when no other thread
    /// can run.
    pub fn reschedule(&mut self, cause: SwitchCause) -> Option<Switch> {
        let from = self.current;
        let to = self.select()?;
        let now = self.clock.now_us();

        {
            let outgoing = &mut self.threads[from];
            outgoing.stats_mut().mark_descheduled(now);
            if outgoing.state() == ThreadState::Running {
                commit(outgoing, ThreadState::Ready);
                outgoing.stats_mut().mark_ready(now);
            }
        }
        {
            let incoming = &mut self.threads[to];
            incoming.stats_mut().mark_dispatched(now);
            incoming.reset_priority();
            commit(incoming, ThreadState::Running);
        }
        self.current = to;

        self.counters.total_switches += 1;
        match cause {
            SwitchCause::Yield => self.counters.yields += 1,
            SwitchCause::Preempt => self.counters.preemptions += 1,
            SwitchCause::Block => self.counters.blocks += 1,
            SwitchCause::Exit => {}
        }
        log::trace!("[SCHED] {:?}: {} -> {}", cause, from, to);

        let old = self.threads[from].context_ptr();
        let new = self.threads[to].context_ptr() as *const Context;
        Some(Switch { from, to, old, new })
    }

    /// Candidate other than the current thread, per policy
    fn select(&mut self) -> Option<ThreadId> {
        let current = self.current;
        let picked = match self.policy {
            SchedulingPolicy::RoundRobin => policy::round_robin(&self.threads, current),
            SchedulingPolicy::PriorityBased => {
                policy::priority_based(&mut self.threads, self.max_priority)
            }
            SchedulingPolicy::Lottery => self
                .lottery
                .draw(self.total_tickets)
                .and_then(|draw| policy::lottery(&self.threads, draw)),
        }
        .filter(|&id| id != current);

        // A thread that just blocked or exited must not be resumed: fall back
        // to a plain scan when the policy came up empty.
        if picked.is_none() && !self.threads[current].state().is_active() {
            return policy::round_robin(&self.threads, current);
        }
        picked
    }

    /// Block the current thread and switch away
    ///
    /// Fails with `Deadlock` if nothing else can run; the thread then stays
    /// Running.
    pub fn block_current(&mut self) -> SchedulerResult<Switch> {
        let current = self.current;
        self.threads[current].set_state(ThreadState::Blocked)?;

        match self.reschedule(SwitchCause::Block) {
            Some(sw) => {
                log::debug!("[SCHED] Thread {} blocked", current);
                Ok(sw)
            }
            None => {
                self.threads[current].set_state(ThreadState::Running)?;
                Err(SchedulerError::Deadlock { blocked: self.count_in(ThreadState::Blocked) })
            }
        }
    }

    /// Make a Blocked thread Ready; its wait is measured from now
    pub fn wake(&mut self, id: ThreadId) -> SchedulerResult<()> {
        let now = self.clock.now_us();
        let thread = self
            .threads
            .get_mut(id)
            .ok_or(SchedulerError::ThreadNotFound { thread_id: id })?;
        if thread.state() != ThreadState::Blocked {
            return Err(SchedulerError::InvalidStateTransition {
                thread_id: id,
                from: thread.state(),
                to: ThreadState::Ready,
            });
        }
        thread.set_state(ThreadState::Ready)?;
        thread.stats_mut().mark_ready(now);
        Ok(())
    }

    /// Terminate the current (non-bootstrap) thread and switch away
    ///
    /// Its stack is parked until [`Scheduler::reap`] runs on another stack.
    pub fn terminate_current(&mut self) -> SchedulerResult<Switch> {
        let current = self.current;
        if current == BOOTSTRAP_ID {
            return Err(SchedulerError::InvalidStateTransition {
                thread_id: current,
                from: self.threads[current].state(),
                to: ThreadState::Unused,
            });
        }

        self.threads[current].set_state(ThreadState::Unused)?;
        self.zombie = self.threads[current].take_stack();
        self.release_tickets(current);
        self.counters.total_exits += 1;
        log::info!("[SCHED] Thread {} exited", current);

        self.reschedule(SwitchCause::Exit)
            .ok_or(SchedulerError::Deadlock { blocked: self.count_in(ThreadState::Blocked) })
    }

    /// Free the stack of the last terminated thread
    ///
    /// Must run on a stack other than the dead thread's.
    pub fn reap(&mut self) {
        self.zombie = None;
    }

    /// Entry closure of the current thread (first dispatch only)
    pub fn take_entry(&mut self) -> Option<Entry> {
        self.threads[self.current].take_entry()
    }

    /// Range of `max(1, priority)` tickets right after the pool
    fn next_tickets(&self, priority: Priority) -> SchedulerResult<TicketRange> {
        self.total_tickets
            .checked_add(1)
            .and_then(|start| TicketRange::checked(start, tickets_for(priority)))
            .ok_or(SchedulerError::ResourceExhausted {
                resource: Resource::Tickets { total: self.total_tickets },
            })
    }

    /// Return a thread's tickets and close the gap it leaves
    fn release_tickets(&mut self, id: ThreadId) {
        let Some(released) = self.threads[id].tickets() else {
            return;
        };
        self.threads[id].set_tickets(None);

        let n = released.len();
        for thread in self.threads.iter_mut() {
            if let Some(range) = thread.tickets() {
                if range.start > released.end {
                    thread.set_tickets(Some(range.shifted_down(n)));
                }
            }
        }
        self.total_tickets -= n;
    }

    /// Read-only report including the slices in progress
    pub fn snapshot(&self) -> StatsReport {
        let now = self.clock.now_us();
        let threads = self
            .threads
            .iter()
            .filter(|t| t.state().is_live() || t.stats().runtime.count() > 0)
            .map(|t| {
                let stats = t.stats();
                ThreadReport {
                    id: t.id(),
                    state: t.state(),
                    base_priority: t.base_priority(),
                    current_priority: t.current_priority(),
                    tickets: t.tickets(),
                    runtime: stats.runtime,
                    waittime: stats.waittime,
                    running_for: if t.state() == ThreadState::Running {
                        stats.running_for(now)
                    } else {
                        0
                    },
                    waiting_for: if t.state() == ThreadState::Ready {
                        stats.waiting_for(now)
                    } else {
                        0
                    },
                }
            })
            .collect();

        StatsReport {
            policy: self.policy,
            current: self.current,
            total_tickets: self.total_tickets,
            counters: self.counters,
            threads,
        }
    }

    pub fn current(&self) -> ThreadId {
        self.current
    }

    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    pub fn capacity(&self) -> usize {
        self.threads.len()
    }

    pub fn total_tickets(&self) -> u32 {
        self.total_tickets
    }

    pub fn counters(&self) -> SchedulerCounters {
        self.counters
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn thread(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.get(id)
    }

    /// Threads in `state`
    pub fn count_in(&self, state: ThreadState) -> usize {
        self.threads.iter().filter(|t| t.state() == state).count()
    }

    /// Live threads other than the bootstrap thread
    pub fn others_live(&self) -> usize {
        self.threads
            .iter()
            .filter(|t| t.id() != BOOTSTRAP_ID && t.state().is_live())
            .count()
    }
}

/// Apply a transition the scheduler has already proven valid
fn commit(thread: &mut Thread, to: ThreadState) {
    if let Err(e) = thread.set_state(to) {
        fatal(&e.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimerMode;
    use crate::scheduler::thread::stack::MIN_STACK_SIZE;
    use crate::time::ManualClock;
    use proptest::prelude::*;

    extern "C" fn never_started() -> ! {
        unreachable!("contexts are never resumed in scheduler unit tests")
    }

    fn config(policy: SchedulingPolicy) -> RuntimeConfig {
        RuntimeConfig::new()
            .with_policy(policy)
            .with_stack_size(MIN_STACK_SIZE)
            .with_timer(TimerMode::Disabled)
            .with_lottery_seed(42)
    }

    fn scheduler(policy: SchedulingPolicy) -> (Scheduler, ManualClock) {
        let clock = ManualClock::new(0);
        let mut sched =
            Scheduler::new(&config(policy), Box::new(clock.clone()), never_started).unwrap();
        sched.install_bootstrap().unwrap();
        (sched, clock)
    }

    fn spawn(sched: &mut Scheduler, priority: Priority) -> ThreadId {
        sched.create(Box::new(|| {}), priority).unwrap()
    }

    fn ranges(sched: &Scheduler) -> Vec<(u32, u32)> {
        sched
            .threads()
            .iter()
            .filter_map(|t| t.tickets())
            .map(|r| (r.start, r.end))
            .collect()
    }

    fn assert_partition(sched: &Scheduler) {
        let mut rs = ranges(sched);
        rs.sort();
        let mut next = 1;
        for (start, end) in rs {
            assert_eq!(start, next, "gap or overlap in ticket ranges");
            next = end + 1;
        }
        assert_eq!(next - 1, sched.total_tickets());
    }

    #[test]
    fn test_bootstrap_is_running() {
        let (sched, _) = scheduler(SchedulingPolicy::RoundRobin);
        let boot = sched.thread(BOOTSTRAP_ID).unwrap();
        assert_eq!(boot.state(), ThreadState::Running);
        assert_eq!(boot.base_priority(), 20);
        assert_eq!(sched.total_tickets(), 20);
    }

    #[test]
    fn test_create_clamps_priority() {
        let (mut sched, _) = scheduler(SchedulingPolicy::RoundRobin);
        let a = spawn(&mut sched, 0);
        let b = spawn(&mut sched, 21);
        let c = spawn(&mut sched, 7);
        assert_eq!(sched.thread(a).unwrap().base_priority(), 10);
        assert_eq!(sched.thread(b).unwrap().base_priority(), 10);
        assert_eq!(sched.thread(c).unwrap().current_priority(), 7);
        assert_eq!(sched.thread(c).unwrap().state(), ThreadState::Ready);
    }

    #[test]
    fn test_table_full() {
        let (mut sched, _) = scheduler(SchedulingPolicy::RoundRobin);
        for _ in 0..4 {
            spawn(&mut sched, 5);
        }
        let tickets = sched.total_tickets();
        let err = sched.create(Box::new(|| {}), 5).unwrap_err();
        assert_eq!(
            err,
            SchedulerError::ResourceExhausted { resource: Resource::ThreadSlot { capacity: 5 } }
        );
        assert_eq!(sched.total_tickets(), tickets);
        assert_eq!(sched.counters().total_spawns, 4);
    }

    #[test]
    fn test_stack_failure_leaves_slot_unused() {
        let clock = ManualClock::new(0);
        let config = config(SchedulingPolicy::RoundRobin).with_stack_size(usize::MAX - 64);
        let mut sched = Scheduler::new(&config, Box::new(clock), never_started).unwrap();
        sched.install_bootstrap().unwrap();

        let err = sched.create(Box::new(|| {}), 5).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::ResourceExhausted { resource: Resource::Stack { .. } }
        ));
        assert_eq!(sched.thread(1).unwrap().state(), ThreadState::Unused);
        assert_eq!(sched.total_tickets(), 20);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let bad = [
            config(SchedulingPolicy::RoundRobin).with_capacity(0),
            config(SchedulingPolicy::Lottery).with_max_priority(Priority::MAX),
        ];
        for config in bad {
            let result = Scheduler::new(&config, Box::new(ManualClock::new(0)), never_started);
            assert!(matches!(result, Err(SchedulerError::InvalidConfig { .. })));
        }
    }

    #[test]
    fn test_largest_priority_range_fills_ticket_pool() {
        let config = config(SchedulingPolicy::PriorityBased)
            .with_capacity(2)
            .with_max_priority(Priority::MAX);
        let mut sched =
            Scheduler::new(&config, Box::new(ManualClock::new(0)), never_started).unwrap();
        sched.install_bootstrap().unwrap();

        let id = sched.create(Box::new(|| {}), Priority::MAX).unwrap();
        assert_eq!(sched.total_tickets(), 2 * Priority::MAX as u32);
        assert_eq!(
            sched.thread(id).unwrap().tickets(),
            Some(TicketRange::new(Priority::MAX as u32 + 1, Priority::MAX as u32))
        );

        // Aging at the top of the range saturates instead of overflowing.
        let sw = sched.reschedule(SwitchCause::Yield).unwrap();
        assert_eq!(sw.to, id);
        assert_eq!(sched.thread(BOOTSTRAP_ID).unwrap().current_priority(), Priority::MAX);

        sched.terminate_current().unwrap();
        assert_eq!(sched.total_tickets(), Priority::MAX as u32);
    }

    #[test]
    fn test_round_robin_visits_in_slot_order() {
        let (mut sched, _) = scheduler(SchedulingPolicy::RoundRobin);
        for _ in 0..3 {
            spawn(&mut sched, 10);
        }
        let order: Vec<_> = (0..8)
            .map(|_| sched.reschedule(SwitchCause::Yield).unwrap().to)
            .collect();
        assert_eq!(order, vec![1, 2, 3, 0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_lone_thread_does_not_switch() {
        let (mut sched, clock) = scheduler(SchedulingPolicy::RoundRobin);
        clock.advance(50);
        assert!(sched.reschedule(SwitchCause::Yield).is_none());

        let boot = sched.thread(BOOTSTRAP_ID).unwrap();
        assert_eq!(boot.state(), ThreadState::Running);
        assert_eq!(boot.stats().runtime.count(), 0);
        assert_eq!(sched.counters().total_switches, 0);
    }

    #[test]
    fn test_priority_scenario() {
        let (mut sched, _) = scheduler(SchedulingPolicy::PriorityBased);
        for p in [1, 20, 5, 10] {
            spawn(&mut sched, p);
        }
        let sw = sched.reschedule(SwitchCause::Yield).unwrap();
        assert_eq!(sw.to, 2);

        let prio = |id| sched.thread(id).unwrap().current_priority();
        assert_eq!(prio(2), 20);
        assert_eq!((prio(1), prio(3), prio(4)), (2, 6, 11));
    }

    #[test]
    fn test_lottery_scenario_ranges() {
        let clock = ManualClock::new(0);
        let mut sched =
            Scheduler::new(&config(SchedulingPolicy::Lottery), Box::new(clock), never_started)
                .unwrap();
        for p in [10, 20, 5, 10] {
            spawn(&mut sched, p);
        }
        assert_eq!(ranges(&sched), vec![(1, 10), (11, 30), (31, 35), (36, 45)]);
        assert_eq!(sched.total_tickets(), 45);
        assert_eq!(policy::lottery(sched.threads(), 15), Some(1));
    }

    #[test]
    fn test_exit_compacts_tickets() {
        let (mut sched, _) = scheduler(SchedulingPolicy::RoundRobin);
        for p in [10, 20, 5] {
            spawn(&mut sched, p);
        }
        sched.reschedule(SwitchCause::Yield).unwrap();
        sched.reschedule(SwitchCause::Yield).unwrap();
        assert_eq!(sched.current(), 2);

        let sw = sched.terminate_current().unwrap();
        assert_eq!((sw.from, sw.to), (2, 3));
        assert_eq!(sched.thread(2).unwrap().state(), ThreadState::Unused);
        assert_eq!(ranges(&sched), vec![(1, 20), (21, 30), (31, 35)]);
        assert_eq!(sched.total_tickets(), 35);
        assert!(sched.zombie.is_some());

        sched.reap();
        assert!(sched.zombie.is_none());
        assert_eq!(sched.counters().total_exits, 1);
    }

    #[test]
    fn test_bootstrap_cannot_terminate() {
        let (mut sched, _) = scheduler(SchedulingPolicy::RoundRobin);
        assert!(sched.terminate_current().is_err());
        assert_eq!(sched.thread(BOOTSTRAP_ID).unwrap().state(), ThreadState::Running);
    }

    #[test]
    fn test_switch_statistics() {
        let (mut sched, clock) = scheduler(SchedulingPolicy::RoundRobin);
        let t1 = spawn(&mut sched, 10);

        clock.advance(100);
        sched.reschedule(SwitchCause::Yield).unwrap();
        assert_eq!(sched.thread(0).unwrap().stats().runtime.total(), 100);
        assert_eq!(sched.thread(t1).unwrap().stats().waittime.total(), 100);

        clock.advance(30);
        let report = sched.snapshot();
        assert_eq!(report.thread(t1).unwrap().running_for, 30);
        assert_eq!(report.thread(t1).unwrap().total_runtime(), 30);
        assert_eq!(report.thread(0).unwrap().waiting_for, 30);
        // Snapshot folds nothing.
        assert_eq!(sched.thread(t1).unwrap().stats().runtime.count(), 0);

        sched.reschedule(SwitchCause::Preempt).unwrap();
        assert_eq!(sched.thread(t1).unwrap().stats().runtime.total(), 30);
        assert_eq!(sched.thread(0).unwrap().stats().waittime.total(), 30);
        assert_eq!(sched.counters().preemptions, 1);
        assert_eq!(sched.counters().yields, 1);
    }

    #[test]
    fn test_block_and_wake() {
        let (mut sched, clock) = scheduler(SchedulingPolicy::RoundRobin);
        let t1 = spawn(&mut sched, 10);
        sched.reschedule(SwitchCause::Yield).unwrap();

        let sw = sched.block_current().unwrap();
        assert_eq!(sw.to, BOOTSTRAP_ID);
        assert_eq!(sched.thread(t1).unwrap().state(), ThreadState::Blocked);
        assert!(sched.reschedule(SwitchCause::Yield).is_none());

        clock.advance(500);
        sched.wake(t1).unwrap();
        assert_eq!(sched.thread(t1).unwrap().state(), ThreadState::Ready);
        clock.advance(7);
        // Wait measured from the wake, not from the block.
        assert_eq!(sched.snapshot().thread(t1).unwrap().waiting_for, 7);

        assert!(matches!(
            sched.wake(t1),
            Err(SchedulerError::InvalidStateTransition { .. })
        ));
        assert_eq!(sched.wake(99), Err(SchedulerError::ThreadNotFound { thread_id: 99 }));
        assert_eq!(sched.counters().blocks, 1);
    }

    #[test]
    fn test_block_without_peer_is_deadlock() {
        let (mut sched, _) = scheduler(SchedulingPolicy::RoundRobin);
        assert_eq!(sched.block_current().unwrap_err(), SchedulerError::Deadlock { blocked: 0 });
        assert_eq!(sched.thread(BOOTSTRAP_ID).unwrap().state(), ThreadState::Running);
    }

    #[test]
    fn test_blocked_thread_always_leaves_under_lottery() {
        let (mut sched, _) = scheduler(SchedulingPolicy::Lottery);
        let t1 = spawn(&mut sched, 1);
        for _ in 0..1000 {
            if sched.current() == t1 {
                break;
            }
            sched.reschedule(SwitchCause::Yield);
        }
        assert_eq!(sched.current(), t1);

        let sw = sched.block_current().unwrap();
        assert_eq!(sw.to, BOOTSTRAP_ID);
    }

    #[test]
    fn test_policy_locked_after_create() {
        let (mut sched, _) = scheduler(SchedulingPolicy::RoundRobin);
        sched.select_policy(SchedulingPolicy::Lottery).unwrap();
        spawn(&mut sched, 3);
        assert_eq!(
            sched.select_policy(SchedulingPolicy::PriorityBased),
            Err(SchedulerError::PolicyLocked)
        );
        assert_eq!(sched.policy(), SchedulingPolicy::Lottery);
    }

    #[test]
    fn test_report_lists_exited_threads() {
        let (mut sched, _) = scheduler(SchedulingPolicy::RoundRobin);
        let t1 = spawn(&mut sched, 4);
        sched.reschedule(SwitchCause::Yield).unwrap();
        sched.terminate_current().unwrap();

        let report = sched.snapshot();
        assert_eq!(report.thread(t1).unwrap().state, ThreadState::Unused);
        assert_eq!(report.count_in(ThreadState::Running), 1);
        let text = report.to_string();
        assert!(text.contains("Thread Statistics"));
        assert!(text.contains("RoundRobin"));
        assert!(text.contains("Total tickets: 20"));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Create(Priority),
        Yield,
        Block,
        Wake(ThreadId),
        Exit,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (-5i32..30).prop_map(Op::Create),
            Just(Op::Yield),
            Just(Op::Block),
            (0usize..5).prop_map(Op::Wake),
            Just(Op::Exit),
        ]
    }

    fn policy_strategy() -> impl Strategy<Value = SchedulingPolicy> {
        prop::sample::select(SchedulingPolicy::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_single_running_and_ticket_partition(
            policy in policy_strategy(),
            ops in prop::collection::vec(op(), 0..80),
        ) {
            let (mut sched, clock) = scheduler(policy);
            for op in ops {
                clock.advance(3);
                match op {
                    Op::Create(p) => { let _ = sched.create(Box::new(|| {}), p); }
                    Op::Yield => { sched.reschedule(SwitchCause::Yield); }
                    Op::Block => { let _ = sched.block_current(); }
                    Op::Wake(id) => { let _ = sched.wake(id); }
                    Op::Exit => {
                        let current = sched.current();
                        if current != BOOTSTRAP_ID && sched.count_in(ThreadState::Ready) > 0 {
                            prop_assert!(sched.terminate_current().is_ok());
                            sched.reap();
                        }
                    }
                }

                let running = sched.count_in(ThreadState::Running);
                let ready = sched.count_in(ThreadState::Ready);
                prop_assert!(running <= 1);
                if ready + running > 0 {
                    prop_assert_eq!(running, 1);
                }
                prop_assert_eq!(sched.thread(sched.current()).unwrap().state(), ThreadState::Running);
                assert_partition(&sched);
                for t in sched.threads().iter().filter(|t| t.state().is_live()) {
                    prop_assert_eq!(t.tickets().unwrap().len(), tickets_for(t.base_priority()));
                    prop_assert!(t.current_priority() >= t.base_priority());
                    prop_assert!(t.current_priority() <= 20);
                }
            }
        }

        #[test]
        fn prop_round_robin_visits_each_once(n in 1usize..5) {
            let clock = ManualClock::new(0);
            let config = config(SchedulingPolicy::RoundRobin).with_capacity(n + 1);
            let mut sched = Scheduler::new(&config, Box::new(clock), never_started).unwrap();
            sched.install_bootstrap().unwrap();
            for _ in 0..n {
                spawn(&mut sched, 10);
            }
            let visited: Vec<_> = (0..=n)
                .map(|_| sched.reschedule(SwitchCause::Yield).unwrap().to)
                .collect();
            let expected: Vec<_> = (1..=n).chain(core::iter::once(0)).collect();
            prop_assert_eq!(visited, expected);
        }
    }
}
