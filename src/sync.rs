//! # Synchronization
//!
//! The 65SC02 has a single source of concurrency: the IRQ line. Masking it
//! with the interrupt-disable flag is the only mutual exclusion the switcher
//! needs. A [`CriticalSection`] token proves that the flag is set, and
//! every function that mutates scheduler state asks for one.

use crate::arch::mos65sc02::{Cpu, Status};

/// Witness that interrupts are masked on the CPU.
///
/// Tokens are handed out by [`interrupt_free`] and by the hardware
/// interrupt entry in [`Cpu::enter_interrupt`]; they cannot be built
/// anywhere else.
#[derive(Debug)]
pub struct CriticalSection {
    _private: (),
}

impl CriticalSection {
    pub(crate) const fn new() -> Self {
        Self { _private: () }
    }
}

/// Run `f` with interrupts masked, restoring the previous mask state on
/// exit.
///
/// Intended for main-line code such as task setup. The IRQ handler must
/// not use it: it leaves the handler through RTI, which restores the flag
/// from the stack.
#[inline]
pub fn interrupt_free<F, R>(cpu: &mut Cpu, f: F) -> R
where
    F: FnOnce(&CriticalSection, &mut Cpu) -> R,
{
    let was_masked = cpu.p.contains(Status::IRQ_DISABLE);
    cpu.sei();
    let cs = CriticalSection::new();
    let result = f(&cs, cpu);
    if !was_masked {
        cpu.cli();
    }
    result
}
