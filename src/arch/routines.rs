//! # Machine-Code Routines
//!
//! 65SC02 renditions of the switching core, for firmware that runs on the
//! real CPU. The byte sequences mirror the native Rust implementation
//! step for step:
//!
//! | Routine            | Sequence                                           |
//! |--------------------|----------------------------------------------------|
//! | `save_context`     | `PHA TXA PHA TYA PHA`                              |
//! | `load_context`     | `PLA TAY PLA TAX PLA`                              |
//! | `switch_tasks`     | `LDY cur TSX STX tcs,Y` advance `STA cur TAY LDX tcs,Y TXS` |
//! | `context_switch`   | save, switch, load, `CLI RTI`                      |
//! | `start_all_tasks`  | `LDY #n STY cur LDX tcs,Y TXS` load, `RTI`         |
//! | `initialize_task`  | build the synthetic frame on the task stack, `RTS` |
//!
//! The Task Control Store and the Current Task Index live in zero page so
//! the indexed `STX zp,Y` / `LDX zp,Y` forms can reach them.
//!
//! The bootstrap returns through RTI rather than `PLP ; RTS`: RTI consumes
//! P, PCL, PCH exactly as laid out by `initialize_task` and lands on the
//! entry point itself, where RTS would land one byte past it.

use arrayvec::ArrayVec;

use super::opcode as op;
use crate::config::{CURRENT_TASK_ADDR, INITIAL_STATUS, TCS_BASE};

/// Room for the longest routine.
pub const ROUTINE_CAPACITY: usize = 48;

pub type Routine = ArrayVec<u8, ROUTINE_CAPACITY>;

/// Zero-page cells used by the generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZeroPage {
    /// First Task Control Store slot; slot `i` is at `tcs_base + i`.
    pub tcs_base: u8,
    /// Current Task Index.
    pub current_task: u8,
}

impl Default for ZeroPage {
    fn default() -> Self {
        Self {
            tcs_base: TCS_BASE,
            current_task: CURRENT_TASK_ADDR,
        }
    }
}

/// How the generated `switch_tasks` advances the task index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// `index ^ 1`, two tasks only.
    Toggle,
    /// `(index + 1) mod task_count`.
    RoundRobin { task_count: u8 },
}

#[inline]
fn emit(out: &mut Routine, bytes: &[u8]) {
    out.extend(bytes.iter().copied());
}

pub fn save_context(out: &mut Routine) {
    emit(out, &[op::PHA, op::TXA, op::PHA, op::TYA, op::PHA]);
}

pub fn load_context(out: &mut Routine) {
    emit(out, &[op::PLA, op::TAY, op::PLA, op::TAX, op::PLA]);
}

/// Leaves the new index in A and Y and the new task's stack active.
pub fn switch_tasks(out: &mut Routine, zp: ZeroPage, rotation: Rotation) {
    emit(out, &[op::LDY_ZP, zp.current_task, op::TSX, op::STX_ZPY, zp.tcs_base]);

    match rotation {
        Rotation::Toggle => emit(out, &[op::LDA_IMM, 1, op::EOR_ZP, zp.current_task]),
        Rotation::RoundRobin { task_count } => emit(
            out,
            &[
                op::LDA_ZP,
                zp.current_task,
                op::CLC,
                op::ADC_IMM,
                1,
                op::CMP_IMM,
                task_count,
                // Skip the wrap when the new index is still below the count.
                op::BCC,
                2,
                op::LDA_IMM,
                0,
            ],
        ),
    }

    emit(
        out,
        &[op::STA_ZP, zp.current_task, op::TAY, op::LDX_ZPY, zp.tcs_base, op::TXS],
    );
}

/// The IRQ handler.
pub fn context_switch(zp: ZeroPage, rotation: Rotation) -> Routine {
    let mut out = Routine::new();
    save_context(&mut out);
    switch_tasks(&mut out, zp, rotation);
    load_context(&mut out);
    emit(&mut out, &[op::CLI, op::RTI]);
    out
}

/// The bootstrap into `first_task`. Never returns to its caller.
pub fn start_all_tasks(zp: ZeroPage, first_task: u8) -> Routine {
    let mut out = Routine::new();
    emit(
        &mut out,
        &[
            op::LDY_IMM,
            first_task,
            op::STY_ZP,
            zp.current_task,
            op::LDX_ZPY,
            zp.tcs_base,
            op::TXS,
        ],
    );
    load_context(&mut out);
    emit(&mut out, &[op::RTI]);
    out
}

/// Subroutine that builds task `task_index`'s first frame below
/// `stack_pointer` and records the result in the Task Control Store. The
/// caller's stack pointer is preserved through Y.
pub fn initialize_task(zp: ZeroPage, task_index: u8, stack_pointer: u8, entry_point: u16) -> Routine {
    let mut out = Routine::new();
    emit(&mut out, &[op::TSX, op::TXA, op::TAY]);
    emit(&mut out, &[op::LDX_IMM, stack_pointer, op::TXS]);
    emit(
        &mut out,
        &[
            op::LDA_IMM,
            (entry_point >> 8) as u8,
            op::PHA,
            op::LDA_IMM,
            entry_point as u8,
            op::PHA,
            op::LDA_IMM,
            INITIAL_STATUS,
            op::PHA,
            op::LDA_IMM,
            0,
            op::PHA,
            op::PHA,
            op::PHA,
        ],
    );
    emit(&mut out, &[op::TSX, op::STX_ZP, zp.tcs_base.wrapping_add(task_index)]);
    emit(&mut out, &[op::TYA, op::TAX, op::TXS, op::RTS]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::bus::{Bus, Ram};
    use crate::arch::mos65sc02::Cpu;

    const ROUTINE: u16 = 0x8000;

    /// Run `code` from `ROUTINE` until it executes `last`.
    fn run_until(cpu: &mut Cpu, ram: &mut Ram, last: u8) {
        for _ in 0..64 {
            let opcode = ram.read(cpu.pc);
            cpu.step(ram).unwrap();
            if opcode == last {
                return;
            }
        }
        panic!("routine did not finish");
    }

    #[test]
    fn test_save_and_load_bytes() {
        let mut out = Routine::new();
        save_context(&mut out);
        load_context(&mut out);
        assert_eq!(
            out.as_slice(),
            &[0x48, 0x8A, 0x48, 0x98, 0x48, 0x68, 0xA8, 0x68, 0xAA, 0x68]
        );
    }

    #[test]
    fn test_initialize_task_builds_frame() {
        let zp = ZeroPage::default();
        let mut ram = Ram::new();
        ram.load(ROUTINE, &initialize_task(zp, 1, 0x7F, 0xC0DE));
        let mut cpu = Cpu::new();
        cpu.pc = ROUTINE;
        cpu.s = 0xF0;
        // Fake return address so RTS has something to pull.
        cpu.push(&mut ram, 0x12);
        cpu.push(&mut ram, 0x33);

        run_until(&mut cpu, &mut ram, op::RTS);

        assert_eq!(cpu.s, 0xF0);
        assert_eq!(cpu.pc, 0x1234);
        assert_eq!(ram.read(TCS_BASE as u16 + 1), 0x79);
        let frame: [u8; 6] = core::array::from_fn(|i| ram.read(0x017A + i as u16));
        assert_eq!(frame, [0, 0, 0, INITIAL_STATUS, 0xDE, 0xC0]);
    }

    fn switch_with(rotation: Rotation, current: u8, count: usize) -> u8 {
        let zp = ZeroPage::default();
        let mut ram = Ram::new();
        let mut out = Routine::new();
        switch_tasks(&mut out, zp, rotation);
        out.push(op::RTS);
        ram.load(ROUTINE, &out);
        ram.write(zp.current_task as u16, current);
        for i in 0..count {
            ram.write(zp.tcs_base as u16 + i as u16, 0x10 * (i as u8 + 1));
        }

        let mut cpu = Cpu::new();
        cpu.pc = ROUTINE;
        cpu.s = 0x55;
        // Return address on the stack the routine switches *to*.
        let next = ram.read(zp.tcs_base as u16 + ((current as u16 + 1) % count as u16));
        ram.write(Cpu::stack_addr(next.wrapping_add(1)), 0xFF);
        ram.write(Cpu::stack_addr(next.wrapping_add(2)), 0x0F);

        run_until(&mut cpu, &mut ram, op::RTS);
        assert_eq!(ram.read(zp.tcs_base as u16 + current as u16), 0x55);
        ram.read(zp.current_task as u16)
    }

    #[test]
    fn test_generated_toggle_alternates() {
        assert_eq!(switch_with(Rotation::Toggle, 0, 2), 1);
        assert_eq!(switch_with(Rotation::Toggle, 1, 2), 0);
    }

    #[test]
    fn test_generated_round_robin_wraps() {
        let rotation = Rotation::RoundRobin { task_count: 4 };
        let seen: [u8; 4] = core::array::from_fn(|i| switch_with(rotation, i as u8, 4));
        assert_eq!(seen, [1, 2, 3, 0]);
    }

    #[test]
    fn test_routines_fit_capacity() {
        let zp = ZeroPage::default();
        assert!(context_switch(zp, Rotation::RoundRobin { task_count: 4 }).len() < ROUTINE_CAPACITY);
        assert!(initialize_task(zp, 0, 0xBF, 0x0200).len() < ROUTINE_CAPACITY);
    }
}
