//! # Task Model
//!
//! A task is a fixed execution context: an entry point and a private slice
//! of the hardware stack page. Both are decided when the firmware is built;
//! nothing is created or destroyed at runtime.
//!
//! ## Stack Page Layout (N = 2, default sizes)
//!
//! ```text
//! $01FF ┌───────────────────┐
//!       │ boot reserve      │  startup code before the bootstrap
//! $01BF ├───────────────────┤
//!       │ task 0 region     │  initial S = $BF - 6
//! $017F ├───────────────────┤
//!       │ task 1 region     │  initial S = $7F - 6
//! $013F ├───────────────────┤
//!       │ unused            │
//! $0100 └───────────────────┘
//! ```

use core::ops::RangeInclusive;

use crate::arch::mos65sc02::Cpu;
use crate::context::SavedFrame;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Task Control Store
// ---------------------------------------------------------------------------

/// Saved stack pointer per task, addressed by task index.
///
/// A slot is meaningful only while its task is not running. The store does
/// no range checking of its own beyond a debug assertion; the scheduler
/// keeps indices in `[0, N)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskControlStore<const N: usize> {
    slots: [u8; N],
}

impl<const N: usize> TaskControlStore<N> {
    pub const fn new() -> Self {
        Self { slots: [0; N] }
    }

    #[inline]
    pub fn get_stack_pointer(&self, task_index: usize) -> u8 {
        debug_assert!(task_index < N, "task index {} out of range", task_index);
        self.slots[task_index]
    }

    #[inline]
    pub fn set_stack_pointer(&mut self, task_index: usize, stack_pointer: u8) {
        debug_assert!(task_index < N, "task index {} out of range", task_index);
        self.slots[task_index] = stack_pointer;
    }
}

impl<const N: usize> Default for TaskControlStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Stack regions
// ---------------------------------------------------------------------------

/// A contiguous slice of the stack page owned by one task.
///
/// `top` is the stack-pointer value of an empty stack; the region spans
/// offsets `top - size + 1 ..= top`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackRegion {
    top: u8,
    size: u8,
}

impl StackRegion {
    /// A region ending at `top`. `size` is clamped to what fits between
    /// offset 0 and `top`.
    pub const fn new(top: u8, size: u8) -> Self {
        let room = top as u16 + 1;
        let size = if size as u16 > room { room as u8 } else { size };
        Self { top, size }
    }

    /// Initial stack pointer: the first push lands on this offset.
    #[inline]
    pub const fn top(&self) -> u8 {
        self.top
    }

    /// Lowest offset inside the region.
    #[inline]
    pub const fn bottom(&self) -> u8 {
        (self.top as u16 + 1 - self.size as u16) as u8
    }

    #[inline]
    pub const fn size(&self) -> u8 {
        self.size
    }

    /// Absolute addresses covered by the region.
    pub fn addresses(&self) -> RangeInclusive<u16> {
        Cpu::stack_addr(self.bottom())..=Cpu::stack_addr(self.top)
    }

    /// Whether a stack pointer value stays within this region. A stack
    /// pointer one below the bottom means the region is full.
    #[inline]
    pub fn holds(&self, stack_pointer: u8) -> bool {
        stack_pointer <= self.top && stack_pointer as u16 + 1 >= self.bottom() as u16
    }

    pub fn overlaps(&self, other: &StackRegion) -> bool {
        self.bottom() <= other.top && other.bottom() <= self.top
    }
}

/// The stack regions of all `N` tasks, carved top-down from the stack page
/// below the boot reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackLayout<const N: usize> {
    regions: [StackRegion; N],
}

impl<const N: usize> StackLayout<N> {
    pub fn partition(boot_reserve: u8, region_size: u8) -> Result<Self> {
        if region_size < SavedFrame::SIZE {
            return Err(Error::StackTooSmall {
                size: region_size,
                required: SavedFrame::SIZE,
            });
        }

        let requested = boot_reserve as usize + N * region_size as usize;
        if requested > 0x100 {
            return Err(Error::StackPageExhausted { requested });
        }

        let regions = core::array::from_fn(|i| {
            let top = 0xFF - boot_reserve as usize - i * region_size as usize;
            StackRegion::new(top as u8, region_size)
        });
        Ok(Self { regions })
    }

    #[inline]
    pub fn region(&self, task_index: usize) -> StackRegion {
        self.regions[task_index]
    }

    pub fn regions(&self) -> &[StackRegion; N] {
        &self.regions
    }
}

// ---------------------------------------------------------------------------
// Task descriptor
// ---------------------------------------------------------------------------

/// Build-time description of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    pub id: usize,
    /// Address of the first instruction the task executes.
    pub entry_point: u16,
    pub stack: StackRegion,
}
