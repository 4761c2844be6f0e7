//! # Lynxtask Configuration
//!
//! Compile-time constants for the task switcher and the machine model.
//! Everything that shapes the memory map is fixed here; the few knobs a
//! board may vary are gathered in [`KernelConfig`].

/// Number of tasks in the reference configuration.
pub const TASK_COUNT: usize = 2;

/// Base address of the hardware stack page. The 8-bit stack pointer `S`
/// addresses `STACK_PAGE | S`.
pub const STACK_PAGE: u16 = 0x0100;

/// Zero-page address of the first Task Control Store slot. Slot `i`
/// lives at `TCS_BASE + i`.
pub const TCS_BASE: u8 = 0x00;

/// Zero-page address of the Current Task Index cell used by the
/// generated routines.
pub const CURRENT_TASK_ADDR: u8 = 0x10;

/// Bytes at the top of the stack page left to the startup code.
pub const BOOT_STACK_RESERVE: u8 = 0x40;

/// Default size of each task's private stack region.
pub const TASK_STACK_SIZE: u8 = 0x40;

/// Status byte placed in a freshly initialized task's frame: only the
/// always-set bit, so interrupts come up enabled. Matches what the CPU
/// itself pushes for a task running with all flags clear.
pub const INITIAL_STATUS: u8 = 0x20;

/// CPU vector locations.
pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Default timer period, in executed instructions per interrupt.
pub const TIMER_PERIOD: u32 = 64;

/// Runtime knobs for a [`Kernel`](crate::kernel::Kernel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Instructions between timer interrupts.
    pub timer_period: u32,
    /// Stack bytes kept for the code running before the bootstrap.
    pub boot_stack_reserve: u8,
    /// Bytes per task stack region.
    pub task_stack_size: u8,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            timer_period: TIMER_PERIOD,
            boot_stack_reserve: BOOT_STACK_RESERVE,
            task_stack_size: TASK_STACK_SIZE,
        }
    }
}
