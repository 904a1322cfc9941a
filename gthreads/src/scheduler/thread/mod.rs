//! Thread module

pub mod thread;
pub mod state;
pub mod stack;

pub use thread::{tickets_for, Entry, Priority, Thread, ThreadId, TicketRange};
pub use state::ThreadState;
pub use stack::ThreadStack;
