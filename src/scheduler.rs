//! # Scheduler
//!
//! Owns the Task Control Store and the Current Task Index, and performs
//! the mechanical switch between tasks.
//!
//! ## Switch Sequence
//!
//! Every timer interrupt drives exactly one cycle:
//! 1. The CPU pushes PCH, PCL, P and masks interrupts
//! 2. `save_context()` pushes A, X, Y
//! 3. `switch_tasks()` stores S for the interrupted task, picks the next
//!    task and loads its S
//! 4. `load_context()` pulls Y, X, A of the new task
//! 5. CLI, then RTI pulls P, PCL, PCH of the new task
//!
//! Nothing else ever changes the scheduler state, and all of it happens
//! with interrupts masked, so no task can observe a half-finished switch.
//!
//! ## Selection Policy
//!
//! The next task is chosen by a [`Policy`]. [`RoundRobin`] is the general
//! `(index + 1) mod N` rotation; [`Toggle`] is the two-task XOR flip, the
//! degenerate N = 2 case of the same rotation.

use crate::arch::bus::Bus;
use crate::arch::mos65sc02::Cpu;
use crate::context::{self, SavedFrame};
use crate::sync::CriticalSection;
use crate::task::TaskControlStore;

// ---------------------------------------------------------------------------
// Selection policies
// ---------------------------------------------------------------------------

/// Chooses which task runs after `current`.
pub trait Policy {
    fn next(&self, current: usize, task_count: usize) -> usize;
}

/// Rotate through all tasks in index order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoundRobin;

impl Policy for RoundRobin {
    #[inline]
    fn next(&self, current: usize, task_count: usize) -> usize {
        (current + 1) % task_count
    }
}

/// Flip between exactly two tasks with `index ^ 1`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Toggle;

impl Policy for Toggle {
    #[inline]
    fn next(&self, current: usize, task_count: usize) -> usize {
        debug_assert_eq!(task_count, 2, "toggle only alternates two tasks");
        current ^ 1
    }
}

// ---------------------------------------------------------------------------
// Scheduler struct
// ---------------------------------------------------------------------------

/// Scheduler state for a closed set of `N` tasks.
///
/// The `initialized` and `started` fields back debug assertions only; the
/// release path never branches on them.
pub struct Scheduler<const N: usize, P: Policy = RoundRobin> {
    tcs: TaskControlStore<N>,
    current_task: usize,
    policy: P,
    switch_count: u64,
    initialized: [bool; N],
    started: bool,
}

impl<const N: usize> Scheduler<N, RoundRobin> {
    pub const fn new() -> Self {
        Self::with_policy(RoundRobin)
    }
}

impl<const N: usize> Default for Scheduler<N, RoundRobin> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize, P: Policy> Scheduler<N, P> {
    pub const fn with_policy(policy: P) -> Self {
        Self {
            tcs: TaskControlStore::new(),
            current_task: 0,
            policy,
            switch_count: 0,
            initialized: [false; N],
            started: false,
        }
    }

    #[inline]
    pub fn current_task(&self) -> usize {
        self.current_task
    }

    pub fn task_control_store(&self) -> &TaskControlStore<N> {
        &self.tcs
    }

    /// Number of completed `switch_tasks` calls.
    pub fn switch_count(&self) -> u64 {
        self.switch_count
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Build the first frame of task `task_index` on its stack and record
    /// the resulting stack pointer.
    pub fn initialize_task<B: Bus>(
        &mut self,
        bus: &mut B,
        task_index: usize,
        stack_pointer: u8,
        entry_point: u16,
        cs: &CriticalSection,
    ) {
        debug_assert!(!self.initialized[task_index], "task {} initialized twice", task_index);
        debug_assert!(
            !(self.started && task_index == self.current_task),
            "cannot initialize the running task"
        );
        context::initialize_task(bus, &mut self.tcs, task_index, stack_pointer, entry_point, cs);
        self.initialized[task_index] = true;
    }

    /// Park the running task and make the next task's stack active.
    ///
    /// Must run after `save_context()`. Returns the new task index.
    pub fn switch_tasks(&mut self, cpu: &mut Cpu, _cs: &CriticalSection) -> usize {
        let current = self.current_task;
        self.tcs.set_stack_pointer(current, cpu.s);

        let next = self.policy.next(current, N);
        debug_assert!(next < N, "policy picked task {} of {}", next, N);
        self.current_task = next;

        cpu.s = self.tcs.get_stack_pointer(next);
        self.switch_count += 1;
        next
    }

    /// Timer interrupt handler body.
    ///
    /// Entered right after the CPU's interrupt push, with interrupts masked.
    /// Consumes the critical-section token because the final RTI unmasks
    /// interrupts again.
    pub fn context_switch<B: Bus>(&mut self, cpu: &mut Cpu, bus: &mut B, cs: CriticalSection) {
        debug_assert!(self.started, "context switch before bootstrap");

        let from = self.current_task;
        context::save_context(cpu, bus, &cs);
        let to = self.switch_tasks(cpu, &cs);
        context::load_context(cpu, bus, &cs);
        cpu.cli();
        cpu.rti(bus);

        log::trace!(
            "switch #{}: task {} -> task {} (pc=${:04X}, s=${:02X})",
            self.switch_count,
            from,
            to,
            cpu.pc,
            cpu.s
        );
    }

    /// Hand the CPU to `first_task_index` for the first time.
    ///
    /// Loads the task's saved stack pointer, pulls Y, X, A and returns into
    /// the task through RTI, which restores P from the frame and thereby
    /// enables interrupts. On hardware this never comes back; in the
    /// machine model it returns once the CPU sits at the task's entry.
    pub fn start_all_tasks<B: Bus>(
        &mut self,
        cpu: &mut Cpu,
        bus: &mut B,
        first_task_index: usize,
        cs: &CriticalSection,
    ) {
        debug_assert!(!self.started, "tasks already started");
        debug_assert!(first_task_index < N, "task index {} out of range", first_task_index);
        debug_assert!(
            self.initialized.iter().all(|done| *done),
            "bootstrap before every task was initialized"
        );

        self.current_task = first_task_index;
        cpu.s = self.tcs.get_stack_pointer(first_task_index);
        context::load_context(cpu, bus, cs);
        cpu.rti(bus);
        self.started = true;
    }

    /// Peek at the frame a parked task will resume from.
    pub fn saved_frame<B: Bus>(&self, bus: &mut B, task_index: usize) -> SavedFrame {
        SavedFrame::read(bus, self.tcs.get_stack_pointer(task_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::bus::Ram;
    use crate::config::IRQ_VECTOR;

    const E0: u16 = 0x0200;
    const E1: u16 = 0x0300;
    const HANDLER: u16 = 0x8000;

    fn two_tasks() -> (Scheduler<2>, Cpu, Ram) {
        let mut ram = Ram::new();
        ram.write_word(IRQ_VECTOR, HANDLER);
        let cs = CriticalSection::new();
        let mut scheduler = Scheduler::<2>::new();
        scheduler.initialize_task(&mut ram, 0, 0xBF, E0, &cs);
        scheduler.initialize_task(&mut ram, 1, 0x7F, E1, &cs);
        (scheduler, Cpu::new(), ram)
    }

    fn tick<const N: usize, P: Policy>(scheduler: &mut Scheduler<N, P>, cpu: &mut Cpu, ram: &mut Ram) {
        let cs = cpu.enter_interrupt(ram);
        scheduler.context_switch(cpu, ram, cs);
    }

    #[test]
    fn test_round_robin_policy() {
        let policy = RoundRobin;
        assert_eq!(policy.next(0, 2), 1);
        assert_eq!(policy.next(1, 2), 0);
        assert_eq!(policy.next(3, 4), 0);
    }

    #[test]
    fn test_toggle_matches_round_robin_for_two_tasks() {
        for current in 0..2 {
            assert_eq!(Toggle.next(current, 2), RoundRobin.next(current, 2));
        }
    }

    #[test]
    fn test_switch_tasks_flips_index() {
        let (mut scheduler, mut cpu, _ram) = two_tasks();
        let cs = CriticalSection::new();
        assert_eq!(scheduler.switch_tasks(&mut cpu, &cs), 1);
        assert_eq!(scheduler.switch_tasks(&mut cpu, &cs), 0);
    }

    #[test]
    fn test_round_robin_over_four_tasks() {
        let mut ram = Ram::new();
        let cs = CriticalSection::new();
        let mut scheduler = Scheduler::<4>::new();
        for i in 0..4 {
            scheduler.initialize_task(&mut ram, i, 0xFF - 0x30 * i as u8, 0x0200, &cs);
        }
        let mut cpu = Cpu::new();
        let seen: [usize; 8] = core::array::from_fn(|_| scheduler.switch_tasks(&mut cpu, &cs));
        assert_eq!(seen, [1, 2, 3, 0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_switch_tasks_persists_and_loads_stack_pointer() {
        let (mut scheduler, mut cpu, _ram) = two_tasks();
        let cs = CriticalSection::new();
        cpu.s = 0xA0;
        scheduler.switch_tasks(&mut cpu, &cs);
        assert_eq!(scheduler.task_control_store().get_stack_pointer(0), 0xA0);
        assert_eq!(cpu.s, 0x79);
    }

    #[test]
    fn test_start_lands_on_entry_with_interrupts_enabled() {
        let (mut scheduler, mut cpu, mut ram) = two_tasks();
        let cs = CriticalSection::new();
        scheduler.start_all_tasks(&mut cpu, &mut ram, 0, &cs);

        assert_eq!(cpu.pc, E0);
        assert_eq!((cpu.a, cpu.x, cpu.y), (0, 0, 0));
        assert_eq!(cpu.s, 0xBF);
        assert!(cpu.interrupts_enabled());
        assert_eq!(scheduler.current_task(), 0);
    }

    #[test]
    fn test_first_switch_enters_fresh_task() {
        let (mut scheduler, mut cpu, mut ram) = two_tasks();
        let cs = CriticalSection::new();
        scheduler.start_all_tasks(&mut cpu, &mut ram, 0, &cs);

        cpu.pc = E0 + 5;
        cpu.a = 0xAA;
        cpu.x = 0xBB;
        cpu.y = 0xCC;
        tick(&mut scheduler, &mut cpu, &mut ram);

        assert_eq!(scheduler.current_task(), 1);
        assert_eq!(cpu.pc, E1);
        assert_eq!((cpu.a, cpu.x, cpu.y), (0, 0, 0));
        assert!(cpu.interrupts_enabled());
        assert_eq!(cpu.s, 0x7F);

        let parked = scheduler.saved_frame(&mut ram, 0);
        assert_eq!(parked.pc(), E0 + 5);
        assert_eq!((parked.a, parked.x, parked.y), (0xAA, 0xBB, 0xCC));
    }

    #[test]
    fn test_full_rotation_restores_registers() {
        let (mut scheduler, mut cpu, mut ram) = two_tasks();
        let cs = CriticalSection::new();
        scheduler.start_all_tasks(&mut cpu, &mut ram, 0, &cs);
        cpu.a = 0x12;
        cpu.x = 0x34;
        cpu.y = 0x56;
        cpu.pc = E0 + 3;
        let before = cpu;

        tick(&mut scheduler, &mut cpu, &mut ram);
        tick(&mut scheduler, &mut cpu, &mut ram);

        assert_eq!(cpu, before);
        assert_eq!(scheduler.switch_count(), 2);
    }

    #[test]
    fn test_toggle_scheduler_alternates() {
        let mut ram = Ram::new();
        let cs = CriticalSection::new();
        let mut scheduler = Scheduler::<2, Toggle>::with_policy(Toggle);
        scheduler.initialize_task(&mut ram, 0, 0xBF, E0, &cs);
        scheduler.initialize_task(&mut ram, 1, 0x7F, E1, &cs);
        let mut cpu = Cpu::new();
        scheduler.start_all_tasks(&mut cpu, &mut ram, 0, &cs);

        let mut previous = scheduler.current_task();
        for _ in 0..10 {
            tick(&mut scheduler, &mut cpu, &mut ram);
            assert_ne!(scheduler.current_task(), previous);
            previous = scheduler.current_task();
        }
    }
}
