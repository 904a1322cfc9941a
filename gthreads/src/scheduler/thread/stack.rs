//! Stack - Green thread stack allocation
//!
//! Each thread owns one fixed-size arena, allocated at creation and released
//! after the thread has switched away for the last time.

use crate::scheduler::core::error::{Resource, SchedulerError, SchedulerResult};
use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Default stack size (4MB)
pub const DEFAULT_STACK_SIZE: usize = 4 * 1024 * 1024;

/// Smallest stack accepted by the configuration (64KB)
pub const MIN_STACK_SIZE: usize = 64 * 1024;

/// Stack alignment required by both supported ABIs
pub const STACK_ALIGN: usize = 16;

/// Thread stack
pub struct ThreadStack {
    /// Stack base (lowest address)
    base: NonNull<u8>,

    /// Stack size (bytes)
    size: usize,
}

// The arena is plain memory owned by exactly one thread slot.
unsafe impl Send for ThreadStack {}

impl ThreadStack {
    /// Allocate a new stack
    ///
    /// Pages are not touched, so a large arena only costs address space until
    /// the thread grows into it.
    pub fn new(size: usize) -> SchedulerResult<Self> {
        let exhausted = SchedulerError::ResourceExhausted { resource: Resource::Stack { size } };
        if size == 0 {
            return Err(exhausted);
        }
        let layout = Layout::from_size_align(size, STACK_ALIGN).map_err(|_| exhausted)?;

        // SAFETY: layout has a non-zero size.
        let base = unsafe { alloc::alloc(layout) };
        let base = NonNull::new(base).ok_or(exhausted)?;

        Ok(Self { base, size })
    }

    /// Get stack base address
    pub fn base(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// Get stack top address (one past the end, initial stack pointer)
    pub fn top(&self) -> *mut u8 {
        // SAFETY: base..base+size is the allocated region.
        unsafe { self.base.as_ptr().add(self.size) }
    }

    /// Get stack size
    pub fn size(&self) -> usize {
        self.size
    }

    /// Check if address is within stack
    pub fn contains(&self, addr: usize) -> bool {
        let base = self.base.as_ptr() as usize;
        addr >= base && addr < base + self.size
    }
}

impl Drop for ThreadStack {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with exactly this layout.
        unsafe {
            let layout = Layout::from_size_align_unchecked(self.size, STACK_ALIGN);
            alloc::dealloc(self.base.as_ptr(), layout);
        }
    }
}

impl core::fmt::Debug for ThreadStack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ThreadStack")
            .field("base", &self.base)
            .field("size", &self.size)
            .finish()
    }
}
