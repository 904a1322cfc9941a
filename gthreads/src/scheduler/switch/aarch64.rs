//! AArch64 (AAPCS64) context switch
//!
//! Callee-saved state is x19-x28, the frame pointer x29, the link register
//! x30 and the low halves of v8-v15.

/// Saved register file of a suspended thread
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct Context {
    pub sp: u64,
    /// x19..=x28
    pub x: [u64; 10],
    pub fp: u64,
    pub lr: u64,
    /// d8..=d15
    pub d: [u64; 8],
}

impl Context {
    pub const fn zeroed() -> Self {
        Self { sp: 0, x: [0; 10], fp: 0, lr: 0, d: [0; 8] }
    }

    /// Arrange for the first switch into this context to `ret` into `entry`
    ///
    /// # Safety
    /// `stack_top` must be the one-past-the-end pointer of a writable region
    /// that outlives the thread.
    pub unsafe fn prepare(&mut self, stack_top: *mut u8, entry: extern "C" fn() -> !) {
        *self = Self::zeroed();
        self.sp = ((stack_top as usize) & !0xF) as u64;
        self.lr = entry as usize as u64;
    }
}

core::arch::global_asm!(
    ".text",
    ".global gthr_switch_context",
    ".type gthr_switch_context,%function",
    ".p2align 4",
    "gthr_switch_context:",
    // x0 = old, x1 = new
    "mov x9, sp",
    "str x9, [x0, #0]",
    "stp x19, x20, [x0, #8]",
    "stp x21, x22, [x0, #24]",
    "stp x23, x24, [x0, #40]",
    "stp x25, x26, [x0, #56]",
    "stp x27, x28, [x0, #72]",
    "stp x29, x30, [x0, #88]",
    "stp d8, d9, [x0, #104]",
    "stp d10, d11, [x0, #120]",
    "stp d12, d13, [x0, #136]",
    "stp d14, d15, [x0, #152]",
    "ldr x9, [x1, #0]",
    "mov sp, x9",
    "ldp x19, x20, [x1, #8]",
    "ldp x21, x22, [x1, #24]",
    "ldp x23, x24, [x1, #40]",
    "ldp x25, x26, [x1, #56]",
    "ldp x27, x28, [x1, #72]",
    "ldp x29, x30, [x1, #88]",
    "ldp d8, d9, [x1, #104]",
    "ldp d10, d11, [x1, #120]",
    "ldp d12, d13, [x1, #136]",
    "ldp d14, d15, [x1, #152]",
    "ret",
    ".size gthr_switch_context, .-gthr_switch_context",
);
