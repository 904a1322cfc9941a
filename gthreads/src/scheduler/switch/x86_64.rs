//! x86_64 (System V) context switch
//!
//! Only the callee-saved registers are stored; everything else is already
//! spilled by the compiler around the `extern "C"` call.

/// Saved register file of a suspended thread
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct Context {
    pub rsp: u64,
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub rbx: u64,
    pub rbp: u64,
}

impl Context {
    pub const fn zeroed() -> Self {
        Self { rsp: 0, r15: 0, r14: 0, r13: 0, r12: 0, rbx: 0, rbp: 0 }
    }

    /// Arrange for the first switch into this context to `ret` into `entry`
    ///
    /// Stack top after setup: `[entry][0]`. Popping `entry` leaves
    /// `rsp % 16 == 8`, the alignment a function sees right after `call`.
    ///
    /// # Safety
    /// `stack_top` must be the one-past-the-end pointer of a writable region
    /// of at least 16 bytes that outlives the thread.
    pub unsafe fn prepare(&mut self, stack_top: *mut u8, entry: extern "C" fn() -> !) {
        let top = (stack_top as usize) & !0xF;
        let slot = top as *mut u64;
        slot.sub(1).write(0);
        slot.sub(2).write(entry as usize as u64);

        *self = Self::zeroed();
        self.rsp = (top - 16) as u64;
    }
}

core::arch::global_asm!(
    ".text",
    ".global gthr_switch_context",
    ".type gthr_switch_context,@function",
    ".p2align 4",
    "gthr_switch_context:",
    // rdi = old, rsi = new
    "mov [rdi + 0x00], rsp",
    "mov [rdi + 0x08], r15",
    "mov [rdi + 0x10], r14",
    "mov [rdi + 0x18], r13",
    "mov [rdi + 0x20], r12",
    "mov [rdi + 0x28], rbx",
    "mov [rdi + 0x30], rbp",
    "mov rsp, [rsi + 0x00]",
    "mov r15, [rsi + 0x08]",
    "mov r14, [rsi + 0x10]",
    "mov r13, [rsi + 0x18]",
    "mov r12, [rsi + 0x20]",
    "mov rbx, [rsi + 0x28]",
    "mov rbp, [rsi + 0x30]",
    "ret",
    ".size gthr_switch_context, .-gthr_switch_context",
);
