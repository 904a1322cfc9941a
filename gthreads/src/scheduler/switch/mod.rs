//! Context switch implementation
//!
//! One assembly routine per architecture, `gthr_switch_context(old, new)`:
//! store the callee-saved registers and stack pointer into `old`, load them
//! from `new`, and return on the new stack.
//!
//! The scheduler only ever sees [`Context`], [`switch`] and [`init_context`].
//!
//! # Safety
//! This relies on the platform C calling convention: everything not in
//! [`Context`] is caller-saved across the `extern "C"` call.

#[cfg(target_arch = "x86_64")]
mod x86_64;
#[cfg(target_arch = "x86_64")]
pub use self::x86_64::Context;

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "aarch64")]
pub use self::aarch64::Context;

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("gthreads: no context switch for this architecture (x86_64 and aarch64 only)");

extern "C" {
    fn gthr_switch_context(old: *mut Context, new: *const Context);
}

/// Save the caller into `old` and resume whatever was saved in `new`
///
/// Returns when some other thread switches back into `old`.
///
/// # Safety
/// - `old` must be valid for writes and stay in place until resumed
/// - `new` must hold a context produced by a previous `switch` or by
///   [`init_context`], whose stack is still alive
#[inline(always)]
pub unsafe fn switch(old: *mut Context, new: *const Context) {
    gthr_switch_context(old, new);
}

/// Seed `ctx` so that the first switch into it runs `entry` on `stack_top`
///
/// `entry` must never return: there is no frame to return into.
///
/// # Safety
/// `stack_top` must be the one-past-the-end pointer of a writable region that
/// outlives every use of `ctx`.
#[inline(always)]
pub unsafe fn init_context(ctx: &mut Context, stack_top: *mut u8, entry: extern "C" fn() -> !) {
    ctx.prepare(stack_top, entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::ptr::{addr_of, addr_of_mut};
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[cfg(target_arch = "x86_64")]
    static_assertions::assert_eq_size!(Context, [u64; 7]);
    #[cfg(target_arch = "aarch64")]
    static_assertions::assert_eq_size!(Context, [u64; 21]);

    static mut HOME: Context = Context::zeroed();
    static mut SIDE: Context = Context::zeroed();
    static BOUNCES: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn side_entry() -> ! {
        loop {
            BOUNCES.fetch_add(1, Ordering::SeqCst);
            unsafe { switch(addr_of_mut!(SIDE), addr_of!(HOME)) };
        }
    }

    #[test]
    fn test_switch_round_trip() {
        let mut stack = vec![0u8; 64 * 1024];
        unsafe {
            let top = stack.as_mut_ptr().add(stack.len());
            init_context(&mut *addr_of_mut!(SIDE), top, side_entry);

            switch(addr_of_mut!(HOME), addr_of!(SIDE));
            assert_eq!(BOUNCES.load(Ordering::SeqCst), 1);

            // Second entry resumes inside the loop, not at the top.
            switch(addr_of_mut!(HOME), addr_of!(SIDE));
            assert_eq!(BOUNCES.load(Ordering::SeqCst), 2);
        }
        drop(stack);
    }
}
