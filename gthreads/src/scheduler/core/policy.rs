//! Scheduling Policies
//!
//! Three selection algorithms over the thread table:
//! - RoundRobin: next Ready slot after the current one, cyclically
//! - PriorityBased: highest aged priority, every waiting thread ages by one
//! - Lottery: uniform draw over the ticket space, weighted by base priority
//!
//! Selection functions only choose. State flips, statistics and the priority
//! reset of the winner happen in the scheduler when the switch is committed.

use crate::scheduler::thread::{Priority, Thread, ThreadId, ThreadState};
use core::fmt;
use core::str::FromStr;

/// Scheduling policy, fixed for the lifetime of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SchedulingPolicy {
    /// Cyclic scan from the slot after the current one
    #[default]
    RoundRobin,
    /// Aging priorities, last-scanned thread wins ties
    PriorityBased,
    /// Proportional-share lottery
    Lottery,
}

impl SchedulingPolicy {
    pub const ALL: [SchedulingPolicy; 3] = [Self::RoundRobin, Self::PriorityBased, Self::Lottery];

    /// Canonical command-line spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round-robin",
            Self::PriorityBased => "priority",
            Self::Lottery => "lottery",
        }
    }
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoundRobin => write!(f, "RoundRobin"),
            Self::PriorityBased => write!(f, "PriorityBased"),
            Self::Lottery => write!(f, "LotteryScheduling"),
        }
    }
}

/// Unknown policy name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scheduling policy '{0}' (expected round-robin, priority or lottery)")]
pub struct ParsePolicyError(pub String);

impl FromStr for SchedulingPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "roundrobin" | "rr" => Ok(Self::RoundRobin),
            "prioritybased" | "priority" => Ok(Self::PriorityBased),
            "lottery" | "lotteryscheduling" => Ok(Self::Lottery),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

/// First Ready slot after `current`, wrapping; never `current` itself
pub fn round_robin(threads: &[Thread], current: ThreadId) -> Option<ThreadId> {
    let n = threads.len();
    (1..n)
        .map(|k| (current + k) % n)
        .find(|&i| threads[i].state().is_schedulable())
}

/// Age every Ready thread and return the one with the highest priority
///
/// Ties go to the thread scanned last (`>=`).
pub fn priority_based(threads: &mut [Thread], max_priority: Priority) -> Option<ThreadId> {
    let mut best: Option<(ThreadId, Priority)> = None;
    for thread in threads.iter_mut().filter(|t| t.state().is_schedulable()) {
        thread.age(max_priority);
        let priority = thread.current_priority();
        if best.map_or(true, |(_, p)| priority >= p) {
            best = Some((thread.id(), priority));
        }
    }
    best.map(|(id, _)| id)
}

/// Ready or Running thread whose ticket range holds `draw`
pub fn lottery(threads: &[Thread], draw: u32) -> Option<ThreadId> {
    threads
        .iter()
        .filter(|t| matches!(t.state(), ThreadState::Ready | ThreadState::Running))
        .find(|t| t.tickets().is_some_and(|r| r.contains(draw)))
        .map(Thread::id)
}

/// Default xorshift seed
pub const DEFAULT_LOTTERY_SEED: u64 = 0x853c_49e6_748f_ea9b;

/// Ticket drawing machine (xorshift64)
#[derive(Debug, Clone)]
pub struct Lottery {
    state: u64,
}

impl Lottery {
    /// Zero is a fixed point of xorshift and is replaced by the default seed
    pub fn new(seed: u64) -> Self {
        Self { state: if seed == 0 { DEFAULT_LOTTERY_SEED } else { seed } }
    }

    fn next(&mut self) -> u64 {
        let mut r = self.state;
        r ^= r << 13;
        r ^= r >> 7;
        r ^= r << 17;
        self.state = r;
        r
    }

    /// Uniform draw in `1..=total_tickets`, None when there are no tickets
    pub fn draw(&mut self, total_tickets: u32) -> Option<u32> {
        if total_tickets == 0 {
            return None;
        }
        Some((self.next() % u64::from(total_tickets)) as u32 + 1)
    }
}

impl Default for Lottery {
    fn default() -> Self {
        Self::new(DEFAULT_LOTTERY_SEED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::thread::TicketRange;
    use proptest::prelude::*;

    fn table(priorities: &[Option<Priority>]) -> Vec<Thread> {
        let mut start = 1;
        priorities
            .iter()
            .enumerate()
            .map(|(id, p)| {
                let mut t = Thread::unused(id);
                if let Some(p) = *p {
                    let range = TicketRange::new(start, p as u32);
                    start = range.end + 1;
                    t.spawn(None, None, p, range, 0).unwrap();
                }
                t
            })
            .collect()
    }

    #[test]
    fn test_policy_names() {
        assert_eq!("RoundRobin".parse(), Ok(SchedulingPolicy::RoundRobin));
        assert_eq!("round-robin".parse(), Ok(SchedulingPolicy::RoundRobin));
        assert_eq!("PriorityBased".parse(), Ok(SchedulingPolicy::PriorityBased));
        assert_eq!("LotteryScheduling".parse(), Ok(SchedulingPolicy::Lottery));
        assert!("fifo".parse::<SchedulingPolicy>().is_err());
        for policy in SchedulingPolicy::ALL {
            assert_eq!(policy.as_str().parse(), Ok(policy));
            assert_eq!(policy.to_string().parse(), Ok(policy));
        }
    }

    #[test]
    fn test_round_robin_wraps_and_skips_current() {
        let mut threads = table(&[Some(10), Some(10), None, Some(10)]);
        threads[3].set_state(ThreadState::Running).unwrap();
        assert_eq!(round_robin(&threads, 3), Some(0));
        assert_eq!(round_robin(&threads, 0), Some(1));

        let mut alone = table(&[Some(10), None]);
        alone[0].set_state(ThreadState::Running).unwrap();
        assert_eq!(round_robin(&alone, 0), None);
    }

    #[test]
    fn test_priority_tie_goes_to_last_scanned() {
        let mut threads = table(&[Some(7), Some(7), Some(3)]);
        assert_eq!(priority_based(&mut threads, 20), Some(1));
        assert_eq!(threads[0].current_priority(), 8);
        assert_eq!(threads[1].current_priority(), 8);
        assert_eq!(threads[2].current_priority(), 4);
    }

    #[test]
    fn test_lottery_ignores_blocked_owner() {
        let mut threads = table(&[Some(10), Some(20)]);
        assert_eq!(lottery(&threads, 15), Some(1));
        threads[1].set_state(ThreadState::Running).unwrap();
        threads[1].set_state(ThreadState::Blocked).unwrap();
        assert_eq!(lottery(&threads, 15), None);
        assert_eq!(lottery(&threads, 46), None);
    }

    #[test]
    fn test_empty_ticket_pool_draws_nothing() {
        assert_eq!(Lottery::new(0).draw(0), None);
    }

    proptest! {
        #[test]
        fn prop_draw_in_range(seed in any::<u64>(), total in 1u32..10_000) {
            let mut lottery = Lottery::new(seed);
            for _ in 0..32 {
                let draw = lottery.draw(total).unwrap();
                prop_assert!((1..=total).contains(&draw));
            }
        }

        #[test]
        fn prop_aging_after_k_skips(base in 1i32..=20, k in 0usize..30) {
            // Slot 1 at 20 always wins the ties against the aged slot 0.
            let mut threads = table(&[Some(base), Some(20)]);
            for _ in 0..k {
                prop_assert_eq!(priority_based(&mut threads, 20), Some(1));
                threads[1].reset_priority();
            }
            prop_assert_eq!(threads[0].current_priority(), (base + k as i32).min(20));
        }
    }
}
