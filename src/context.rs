//! # Context Save/Restore
//!
//! A suspended task is fully described by six bytes on its own stack. The
//! CPU pushes the first three on interrupt entry; the handler pushes the
//! other three. Restoring pulls them in exactly the opposite order.
//!
//! ## Saved Frame (stack grows down)
//!
//! ```text
//!   top ─► PCH     ┐
//!          PCL     │ hardware, on IRQ entry
//!          P       ┘
//!          A       ┐
//!          X       │ save_context()
//!          Y       ┘
//!   S  ─►  (next free byte)
//! ```
//!
//! `initialize_task` writes a synthetic frame with this exact layout, so a
//! task that has never run is resumed the same way as one that was
//! interrupted.

use crate::arch::bus::Bus;
use crate::arch::mos65sc02::Cpu;
use crate::config::INITIAL_STATUS;
use crate::sync::CriticalSection;
use crate::task::TaskControlStore;

/// In-memory image of a saved context, lowest address first.
///
/// Field order is the byte order found above the saved stack pointer:
/// `S+1` holds Y, `S+6` holds PCH.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedFrame {
    pub y: u8,
    pub x: u8,
    pub a: u8,
    pub p: u8,
    pub pcl: u8,
    pub pch: u8,
}

impl SavedFrame {
    /// Layout revision. Bump when the push order changes.
    pub const VERSION: u8 = 1;
    pub const SIZE: u8 = 6;
    /// Bytes pushed by the CPU on interrupt entry (PCH, PCL, P).
    pub const HARDWARE_BYTES: u8 = 3;
    /// Bytes pushed by [`save_context`] (A, X, Y).
    pub const SOFTWARE_BYTES: u8 = 3;

    /// Frame for a task that has never run.
    pub const fn initial(entry_point: u16) -> Self {
        Self {
            y: 0,
            x: 0,
            a: 0,
            p: INITIAL_STATUS,
            pcl: entry_point as u8,
            pch: (entry_point >> 8) as u8,
        }
    }

    #[inline]
    pub const fn pc(&self) -> u16 {
        ((self.pch as u16) << 8) | self.pcl as u16
    }

    pub const fn to_bytes(&self) -> [u8; 6] {
        [self.y, self.x, self.a, self.p, self.pcl, self.pch]
    }

    pub const fn from_bytes(bytes: [u8; 6]) -> Self {
        Self {
            y: bytes[0],
            x: bytes[1],
            a: bytes[2],
            p: bytes[3],
            pcl: bytes[4],
            pch: bytes[5],
        }
    }

    /// Read the frame sitting directly above stack pointer `s`.
    pub fn read<B: Bus>(bus: &mut B, s: u8) -> Self {
        let bytes = core::array::from_fn(|i| {
            bus.read(Cpu::stack_addr(s.wrapping_add(1 + i as u8)))
        });
        Self::from_bytes(bytes)
    }

    /// Lay the frame out below `top` as the pushes would, and return the
    /// resulting stack pointer.
    pub fn write<B: Bus>(&self, bus: &mut B, top: u8) -> u8 {
        let s = top.wrapping_sub(Self::SIZE);
        for (i, byte) in self.to_bytes().iter().enumerate() {
            bus.write(Cpu::stack_addr(s.wrapping_add(1 + i as u8)), *byte);
        }
        s
    }
}

/// Push A, X and Y of the running task onto the active stack.
///
/// Runs right after the CPU's own push of PCH, PCL and P.
#[inline]
pub fn save_context<B: Bus>(cpu: &mut Cpu, bus: &mut B, _cs: &CriticalSection) {
    cpu.push(bus, cpu.a);
    cpu.push(bus, cpu.x);
    cpu.push(bus, cpu.y);
}

/// Pull Y, X and A from the active stack.
///
/// P and PC stay on the stack for the final RTI. The top three bytes must
/// come from [`save_context`] or [`initialize_task`].
#[inline]
pub fn load_context<B: Bus>(cpu: &mut Cpu, bus: &mut B, _cs: &CriticalSection) {
    cpu.y = cpu.pull(bus);
    cpu.x = cpu.pull(bus);
    cpu.a = cpu.pull(bus);
}

/// Build the synthetic frame for a task that has never run and record its
/// stack pointer in the Task Control Store.
///
/// `stack_pointer` is the empty-stack value of the task's region. The
/// caller's own stack pointer is left untouched.
pub fn initialize_task<B: Bus, const N: usize>(
    bus: &mut B,
    tcs: &mut TaskControlStore<N>,
    task_index: usize,
    stack_pointer: u8,
    entry_point: u16,
    _cs: &CriticalSection,
) {
    let saved = SavedFrame::initial(entry_point).write(bus, stack_pointer);
    tcs.set_stack_pointer(task_index, saved);
}
