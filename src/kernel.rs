//! # Kernel
//!
//! Top-level API: owns the CPU, the bus, the tick timer and the scheduler,
//! and runs the machine one instruction at a time. The native
//! [`Scheduler::context_switch`] is installed as the IRQ handler.
//!
//! ## Startup Sequence
//!
//! ```text
//! Kernel::new()              ← carve the stack page into task regions
//!   ├─► create_task() ×N     ← synthetic frame per task
//!   └─► start(first)         ← bootstrap into the first task
//!         ├─► start_all_tasks()
//!         └─► arm the timer
//! step() / run()             ← execute; every expiry switches tasks
//! ```

use crate::arch::bus::Bus;
use crate::arch::mos65sc02::Cpu;
use crate::arch::timer::Timer;
use crate::config::{KernelConfig, TASK_COUNT};
use crate::context::SavedFrame;
use crate::error::{Error, Result};
use crate::scheduler::{Policy, RoundRobin, Scheduler};
use crate::sync;
use crate::task::{StackLayout, Task};

/// What a call to [`Kernel::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// One task instruction was executed.
    Instruction,
    /// A pending timer interrupt was taken and the CPU moved to another task.
    Switch { from: usize, to: usize },
}

pub struct Kernel<B: Bus, const N: usize = TASK_COUNT, P: Policy = RoundRobin> {
    cpu: Cpu,
    bus: B,
    timer: Timer,
    irq_pending: bool,
    scheduler: Scheduler<N, P>,
    layout: StackLayout<N>,
    tasks: [Option<Task>; N],
    created: usize,
}

impl<B: Bus, const N: usize> Kernel<B, N, RoundRobin> {
    pub fn new(bus: B, config: KernelConfig) -> Result<Self> {
        Self::with_policy(bus, config, RoundRobin)
    }
}

impl<B: Bus, const N: usize, P: Policy> Kernel<B, N, P> {
    pub fn with_policy(bus: B, config: KernelConfig, policy: P) -> Result<Self> {
        let layout = StackLayout::partition(config.boot_stack_reserve, config.task_stack_size)?;
        Ok(Self {
            cpu: Cpu::new(),
            bus,
            timer: Timer::new(config.timer_period),
            irq_pending: false,
            scheduler: Scheduler::with_policy(policy),
            layout,
            tasks: [None; N],
            created: 0,
        })
    }

    /// Register the next task, starting at `entry_point`.
    ///
    /// Tasks take indices in creation order and get the matching stack
    /// region. Returns the task index.
    pub fn create_task(&mut self, entry_point: u16) -> Result<usize> {
        if self.created >= N {
            return Err(Error::TooManyTasks);
        }

        let id = self.created;
        let stack = self.layout.region(id);
        let scheduler = &mut self.scheduler;
        let bus = &mut self.bus;
        sync::interrupt_free(&mut self.cpu, |cs, _cpu| {
            scheduler.initialize_task(bus, id, stack.top(), entry_point, cs);
        });

        self.tasks[id] = Some(Task {
            id,
            entry_point,
            stack,
        });
        self.created += 1;

        log::debug!(
            "task {}: entry ${:04X}, stack ${:04X}-${:04X}",
            id,
            entry_point,
            stack.addresses().start(),
            stack.addresses().end()
        );
        Ok(id)
    }

    /// Bootstrap into `first_task` and arm the timer.
    ///
    /// All `N` tasks must exist. After this call the CPU sits on the first
    /// instruction of `first_task`.
    pub fn start(&mut self, first_task: usize) -> Result<()> {
        if self.scheduler.is_started() {
            return Err(Error::AlreadyStarted);
        }
        if self.created < N {
            return Err(Error::TasksMissing {
                created: self.created,
                expected: N,
            });
        }
        if first_task >= N {
            return Err(Error::NoSuchTask { index: first_task });
        }

        let scheduler = &mut self.scheduler;
        let bus = &mut self.bus;
        sync::interrupt_free(&mut self.cpu, |cs, cpu| {
            scheduler.start_all_tasks(cpu, bus, first_task, cs);
        });
        self.timer.arm();

        log::info!(
            "started {} tasks, running task {} at ${:04X}, tick every {} instructions",
            N,
            first_task,
            self.cpu.pc,
            self.timer.period()
        );
        Ok(())
    }

    /// Take a pending interrupt, or execute one instruction of the running
    /// task.
    pub fn step(&mut self) -> Result<Step> {
        if !self.scheduler.is_started() {
            return Err(Error::NotStarted);
        }

        if self.irq_pending && self.cpu.interrupts_enabled() {
            self.irq_pending = false;
            return Ok(self.service_interrupt());
        }

        self.cpu.step(&mut self.bus)?;
        debug_assert!(
            self.layout
                .region(self.scheduler.current_task())
                .holds(self.cpu.s),
            "task {} left its stack region (s=${:02X})",
            self.scheduler.current_task(),
            self.cpu.s
        );

        if self.timer.tick() {
            self.irq_pending = true;
        }
        Ok(Step::Instruction)
    }

    /// Execute `steps` calls to [`step`](Self::step). Returns the number of
    /// task switches performed.
    pub fn run(&mut self, steps: usize) -> Result<usize> {
        let mut switches = 0;
        for _ in 0..steps {
            if let Step::Switch { .. } = self.step()? {
                switches += 1;
            }
        }
        Ok(switches)
    }

    /// Raise the timer interrupt now instead of waiting for the counter.
    ///
    /// Returns `None` while interrupts are masked, in which case nothing
    /// happens. A serviced interrupt also acknowledges a pending timer
    /// expiry.
    pub fn interrupt(&mut self) -> Result<Option<Step>> {
        if !self.scheduler.is_started() {
            return Err(Error::NotStarted);
        }
        if !self.cpu.interrupts_enabled() {
            return Ok(None);
        }
        self.irq_pending = false;
        Ok(Some(self.service_interrupt()))
    }

    fn service_interrupt(&mut self) -> Step {
        let from = self.scheduler.current_task();
        let cs = self.cpu.enter_interrupt(&mut self.bus);
        self.scheduler.context_switch(&mut self.cpu, &mut self.bus, cs);
        Step::Switch {
            from,
            to: self.scheduler.current_task(),
        }
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn scheduler(&self) -> &Scheduler<N, P> {
        &self.scheduler
    }

    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// The frame a parked task will resume from. Meaningless for the
    /// running task.
    pub fn saved_frame(&mut self, task_index: usize) -> SavedFrame {
        self.scheduler.saved_frame(&mut self.bus, task_index)
    }

    pub fn task(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index).and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::bus::Ram;
    use crate::arch::opcode as op;
    use crate::scheduler::Toggle;

    const E0: u16 = 0x0200;
    const E1: u16 = 0x0300;

    /// Task 0: `INX ; JMP E0`. Task 1: `INY ; JMP E1`.
    fn counting_ram() -> Ram {
        let mut ram = Ram::new();
        ram.load(E0, &[op::INX, op::JMP_ABS, E0 as u8, (E0 >> 8) as u8]);
        ram.load(E1, &[op::INY, op::JMP_ABS, E1 as u8, (E1 >> 8) as u8]);
        ram
    }

    fn started(config: KernelConfig) -> Kernel<Ram> {
        let mut kernel = Kernel::new(counting_ram(), config).unwrap();
        kernel.create_task(E0).unwrap();
        kernel.create_task(E1).unwrap();
        kernel.start(0).unwrap();
        kernel
    }

    fn quiet() -> KernelConfig {
        KernelConfig {
            timer_period: 1_000_000,
            ..KernelConfig::default()
        }
    }

    #[test]
    fn test_two_task_scenario() {
        let mut kernel = started(quiet());
        assert_eq!(kernel.cpu().pc, E0);

        // INX, JMP, INX: X = 2, next instruction is the JMP at E0 + 1.
        kernel.run(3).unwrap();
        kernel.cpu_mut().a = 0x5A;
        let interrupted = *kernel.cpu();
        assert_eq!(interrupted.x, 2);
        assert_eq!(interrupted.pc, E0 + 1);

        assert_eq!(kernel.interrupt().unwrap(), Some(Step::Switch { from: 0, to: 1 }));
        let cpu = kernel.cpu();
        assert_eq!(cpu.pc, E1);
        assert_eq!((cpu.a, cpu.x, cpu.y), (0, 0, 0));
        assert!(cpu.interrupts_enabled());

        kernel.run(5).unwrap();
        assert_eq!(kernel.cpu().y, 3);

        assert_eq!(kernel.interrupt().unwrap(), Some(Step::Switch { from: 1, to: 0 }));
        let cpu = kernel.cpu();
        assert_eq!(cpu.pc, interrupted.pc);
        assert_eq!((cpu.a, cpu.x, cpu.y), (0x5A, 2, 0));
        assert_eq!(cpu.s, interrupted.s);
    }

    #[test]
    fn test_timer_drives_strict_alternation() {
        let mut kernel = started(KernelConfig {
            timer_period: 7,
            ..KernelConfig::default()
        });

        let mut order = [usize::MAX; 6];
        let mut seen = 0;
        while seen < order.len() {
            if let Step::Switch { to, .. } = kernel.step().unwrap() {
                order[seen] = to;
                seen += 1;
            }
        }
        assert_eq!(order, [1, 0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_tasks_share_time() {
        let mut kernel = started(KernelConfig {
            timer_period: 10,
            ..KernelConfig::default()
        });
        let switches = kernel.run(1_000).unwrap();
        assert!(switches > 50, "only {} switches", switches);

        // Both counters advanced. Whichever task is parked has its X/Y in
        // its saved frame.
        let cpu = *kernel.cpu();
        let parked = kernel.scheduler().current_task() ^ 1;
        let frame = kernel.saved_frame(parked);
        let (x0, y1) = if parked == 0 { (frame.x, cpu.y) } else { (cpu.x, frame.y) };
        assert!(x0 > 0);
        assert!(y1 > 0);
    }

    #[test]
    fn test_stack_isolation() {
        const PUSHER: u16 = 0x0400;
        let mut ram = counting_ram();
        // LDA #$EE ; PHA ; PHA ; PLA ; PLA ; JMP PUSHER
        ram.load(
            PUSHER,
            &[op::LDA_IMM, 0xEE, op::PHA, op::PHA, op::PLA, op::PLA, op::JMP_ABS, 0x00, 0x04],
        );
        let mut kernel = Kernel::<Ram>::new(ram, quiet()).unwrap();
        kernel.create_task(E0).unwrap();
        kernel.create_task(PUSHER).unwrap();
        kernel.start(0).unwrap();
        kernel.run(4).unwrap();
        kernel.interrupt().unwrap();

        let region0 = kernel.task(0).unwrap().stack.addresses();
        let region0 = *region0.start() as usize..=*region0.end() as usize;
        let region1 = kernel.task(1).unwrap().stack.addresses();
        let region1 = *region1.start() as usize..=*region1.end() as usize;

        let mut before = [0u8; 0x40];
        before.copy_from_slice(&kernel.bus().as_slice()[region0.clone()]);

        kernel.run(500).unwrap();

        assert_eq!(&before[..], &kernel.bus().as_slice()[region0]);
        assert!(kernel.bus().as_slice()[region1].contains(&0xEE));
    }

    #[test]
    fn test_full_rotation_over_four_tasks() {
        let mut ram = counting_ram();
        ram.load(0x0500, &[op::NOP, op::JMP_ABS, 0x00, 0x05]);
        let config = KernelConfig {
            timer_period: 1_000_000,
            boot_stack_reserve: 0x10,
            task_stack_size: 0x30,
        };
        let mut kernel = Kernel::<Ram, 4>::new(ram, config).unwrap();
        for entry in [E0, E1, 0x0500, 0x0500] {
            kernel.create_task(entry).unwrap();
        }
        kernel.start(0).unwrap();
        kernel.run(5).unwrap();
        let before = *kernel.cpu();

        let mut order = [0usize; 4];
        for slot in order.iter_mut() {
            if let Some(Step::Switch { to, .. }) = kernel.interrupt().unwrap() {
                *slot = to;
            }
        }
        assert_eq!(order, [1, 2, 3, 0]);
        assert_eq!(*kernel.cpu(), before);
    }

    #[test]
    fn test_toggle_policy_kernel() {
        let mut kernel = Kernel::<Ram, 2, Toggle>::with_policy(counting_ram(), quiet(), Toggle).unwrap();
        kernel.create_task(E0).unwrap();
        kernel.create_task(E1).unwrap();
        kernel.start(1).unwrap();
        assert_eq!(kernel.cpu().pc, E1);
        assert_eq!(kernel.interrupt().unwrap(), Some(Step::Switch { from: 1, to: 0 }));
        assert_eq!(kernel.cpu().pc, E0);
    }

    #[test]
    fn test_setup_errors() {
        let mut kernel = Kernel::<Ram>::new(counting_ram(), quiet()).unwrap();
        assert_eq!(kernel.step(), Err(Error::NotStarted));
        kernel.create_task(E0).unwrap();
        assert_eq!(
            kernel.start(0),
            Err(Error::TasksMissing { created: 1, expected: 2 })
        );
        kernel.create_task(E1).unwrap();
        assert_eq!(kernel.create_task(E1), Err(Error::TooManyTasks));
        assert_eq!(kernel.start(2), Err(Error::NoSuchTask { index: 2 }));
        kernel.start(0).unwrap();
        assert_eq!(kernel.start(0), Err(Error::AlreadyStarted));
    }

    #[test]
    fn test_masked_interrupt_is_deferred() {
        const MASKER: u16 = 0x0400;
        let mut ram = counting_ram();
        // SEI ; NOP ; CLI ; JMP MASKER
        ram.load(MASKER, &[op::SEI, op::NOP, op::CLI, op::JMP_ABS, 0x00, 0x04]);
        let mut kernel = Kernel::<Ram>::new(
            ram,
            KernelConfig {
                timer_period: 1,
                ..KernelConfig::default()
            },
        )
        .unwrap();
        kernel.create_task(MASKER).unwrap();
        kernel.create_task(E1).unwrap();
        kernel.start(0).unwrap();

        // SEI runs and the timer fires, but the IRQ waits for CLI.
        assert_eq!(kernel.step().unwrap(), Step::Instruction);
        assert_eq!(kernel.interrupt().unwrap(), None);
        assert_eq!(kernel.step().unwrap(), Step::Instruction);
        assert_eq!(kernel.step().unwrap(), Step::Instruction);
        assert_eq!(kernel.step().unwrap(), Step::Switch { from: 0, to: 1 });
    }

    #[test]
    fn test_manual_interrupt_acknowledges_pending_expiry() {
        let mut kernel = started(KernelConfig {
            timer_period: 1,
            ..KernelConfig::default()
        });

        // The timer expires on the first instruction; the manual IRQ
        // takes its place instead of adding a second switch.
        assert_eq!(kernel.step().unwrap(), Step::Instruction);
        assert_eq!(kernel.interrupt().unwrap(), Some(Step::Switch { from: 0, to: 1 }));
        assert_eq!(kernel.step().unwrap(), Step::Instruction);
        assert_eq!(kernel.scheduler().current_task(), 1);
        assert_eq!(kernel.cpu().y, 1);
    }

    #[test]
    fn test_illegal_opcode_surfaces() {
        let mut ram = counting_ram();
        ram.load(0x0600, &[0x02]);
        let mut kernel = Kernel::<Ram>::new(ram, quiet()).unwrap();
        kernel.create_task(0x0600).unwrap();
        kernel.create_task(E1).unwrap();
        kernel.start(0).unwrap();
        assert_eq!(
            kernel.step(),
            Err(Error::IllegalOpcode { pc: 0x0600, opcode: 0x02 })
        );
    }
}
