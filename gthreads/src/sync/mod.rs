//! Synchronization primitives for green threads

pub mod critical;
pub mod semaphore;

pub use critical::{critical, CriticalSection};
pub use semaphore::{Acquire, Semaphore, SemaphoreState};
