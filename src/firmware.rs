//! # Firmware Image
//!
//! Assembles a bootable 64 KiB image around the generated routines and runs
//! it on the interpreter alone, with no native scheduler in the loop.
//!
//! ## Image Layout
//!
//! ```text
//! $0000        Task Control Store, Current Task Index (zero page)
//! $0100-$01FF  hardware stack: boot reserve, then one region per task
//! ...          task code, placed by the caller
//! $F000        context_switch, start_all_tasks, initialize_task ×N, boot
//! $FFFA        NMI    → RTI stub
//! $FFFC        RESET  → boot
//! $FFFE        IRQ    → context_switch
//! ```
//!
//! The boot routine masks interrupts, resets the stack, calls each task's
//! `initialize_task` subroutine and jumps to `start_all_tasks`.

use crate::arch::bus::{Bus, Ram};
use crate::arch::mos65sc02::Cpu;
use crate::arch::opcode as op;
use crate::arch::routines::{self, Rotation, ZeroPage};
use crate::arch::timer::Timer;
use crate::config::{KernelConfig, IRQ_VECTOR, NMI_VECTOR, RESET_VECTOR};
use crate::error::{Error, Result};
use crate::task::StackLayout;

/// Start of the routine area.
pub const ROM_BASE: u16 = 0xF000;

/// Upper bound on instructions spent in boot code or one interrupt.
const MAX_ROUTINE_STEPS: usize = 1024;

/// Stack bytes the boot code needs above the task regions: the return
/// address of each `JSR` into an `initialize_task` routine.
pub const BOOT_CALL_BYTES: u8 = 2;

/// Addresses chosen by [`Firmware::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement<const N: usize> {
    pub context_switch: u16,
    pub start_all_tasks: u16,
    pub initialize_task: [u16; N],
    pub boot: u16,
    pub nmi: u16,
    /// First byte past the routine area.
    pub end: u16,
}

/// Builder for a firmware image with `N` tasks.
pub struct Firmware<const N: usize> {
    ram: Ram,
    config: KernelConfig,
    layout: StackLayout<N>,
    zero_page: ZeroPage,
    rotation: Rotation,
    entries: [Option<u16>; N],
}

impl<const N: usize> Firmware<N> {
    pub fn new(config: KernelConfig) -> Result<Self> {
        if config.boot_stack_reserve < BOOT_CALL_BYTES {
            return Err(Error::BootStackTooSmall {
                reserve: config.boot_stack_reserve,
                required: BOOT_CALL_BYTES,
            });
        }
        let layout = StackLayout::partition(config.boot_stack_reserve, config.task_stack_size)?;
        Ok(Self {
            ram: Ram::new(),
            config,
            layout,
            zero_page: ZeroPage::default(),
            rotation: Rotation::RoundRobin {
                task_count: N as u8,
            },
            entries: [None; N],
        })
    }

    pub fn rotation(&mut self, rotation: Rotation) -> &mut Self {
        self.rotation = rotation;
        self
    }

    pub fn zero_page(&mut self, zero_page: ZeroPage) -> &mut Self {
        self.zero_page = zero_page;
        self
    }

    /// Place raw code or data in the image.
    pub fn load(&mut self, addr: u16, bytes: &[u8]) -> &mut Self {
        self.ram.load(addr, bytes);
        self
    }

    pub fn task(&mut self, index: usize, entry_point: u16) -> Result<&mut Self> {
        let slot = self
            .entries
            .get_mut(index)
            .ok_or(Error::NoSuchTask { index })?;
        *slot = Some(entry_point);
        Ok(self)
    }

    /// Emit the routines and vectors and hand back a board ready to boot.
    pub fn build(&self, first_task: usize) -> Result<Board<N>> {
        if first_task >= N {
            return Err(Error::NoSuchTask { index: first_task });
        }
        let rotation_tasks = match self.rotation {
            Rotation::Toggle => 2,
            Rotation::RoundRobin { task_count } => task_count as usize,
        };
        if rotation_tasks != N {
            return Err(Error::RotationMismatch {
                rotation: rotation_tasks,
                tasks: N,
            });
        }
        let zp = self.zero_page;
        if (zp.current_task.wrapping_sub(zp.tcs_base) as usize) < N {
            return Err(Error::ZeroPageOverlap {
                addr: zp.current_task,
            });
        }
        let mut entries = [0u16; N];
        for (i, entry) in self.entries.iter().enumerate() {
            entries[i] = entry.ok_or(Error::TasksMissing {
                created: self.entries.iter().filter(|e| e.is_some()).count(),
                expected: N,
            })?;
        }

        let mut ram = self.ram.clone();
        let mut cursor = ROM_BASE;
        let mut place = |ram: &mut Ram, bytes: &[u8]| {
            let at = cursor;
            ram.load(at, bytes);
            cursor = cursor.wrapping_add(bytes.len() as u16);
            at
        };

        let context_switch = place(&mut ram, routines::context_switch(zp, self.rotation).as_slice());
        let start_all_tasks = place(&mut ram, routines::start_all_tasks(zp, first_task as u8).as_slice());

        let mut initialize_task = [0u16; N];
        for (i, entry) in entries.iter().enumerate() {
            let top = self.layout.region(i).top();
            let routine = routines::initialize_task(zp, i as u8, top, *entry);
            initialize_task[i] = place(&mut ram, routine.as_slice());
        }

        let boot = place(&mut ram, &[op::SEI, op::LDX_IMM, 0xFF, op::TXS]);
        for target in initialize_task {
            place(&mut ram, &[op::JSR, target as u8, (target >> 8) as u8]);
        }
        place(
            &mut ram,
            &[op::JMP_ABS, start_all_tasks as u8, (start_all_tasks >> 8) as u8],
        );
        let nmi = place(&mut ram, &[op::RTI]);
        let end = cursor;

        ram.write_word(NMI_VECTOR, nmi);
        ram.write_word(RESET_VECTOR, boot);
        ram.write_word(IRQ_VECTOR, context_switch);

        log::debug!(
            "firmware: {} tasks, routines ${:04X}-${:04X}, boot at ${:04X}",
            N,
            ROM_BASE,
            end,
            boot
        );

        Ok(Board {
            cpu: Cpu::new(),
            ram,
            timer: Timer::new(self.config.timer_period),
            irq_pending: false,
            booted: false,
            zero_page: zp,
            placement: Placement {
                context_switch,
                start_all_tasks,
                initialize_task,
                boot,
                nmi,
                end,
            },
        })
    }
}

/// A 65SC02, its RAM and a tick timer, running a firmware image.
pub struct Board<const N: usize> {
    cpu: Cpu,
    ram: Ram,
    timer: Timer,
    irq_pending: bool,
    booted: bool,
    zero_page: ZeroPage,
    placement: Placement<N>,
}

impl<const N: usize> Board<N> {
    /// Reset the CPU, run the boot code into the first task and arm the
    /// timer.
    pub fn boot(&mut self) -> Result<()> {
        self.cpu.reset(&mut self.ram);
        self.run_through_rti()?;
        self.timer.arm();
        self.booted = true;
        log::info!(
            "board booted into task {} at ${:04X}",
            self.current_task(),
            self.cpu.pc
        );
        Ok(())
    }

    /// Service a pending interrupt to completion, or execute one task
    /// instruction. Returns `true` when a switch happened.
    pub fn step(&mut self) -> Result<bool> {
        if !self.booted {
            return Err(Error::NotStarted);
        }

        if self.irq_pending && self.cpu.interrupts_enabled() {
            self.irq_pending = false;
            self.service_interrupt()?;
            return Ok(true);
        }

        self.cpu.step(&mut self.ram)?;
        if self.timer.tick() {
            self.irq_pending = true;
        }
        Ok(false)
    }

    pub fn run(&mut self, steps: usize) -> Result<usize> {
        let mut switches = 0;
        for _ in 0..steps {
            if self.step()? {
                switches += 1;
            }
        }
        Ok(switches)
    }

    /// Raise the IRQ line now. Returns `false` while interrupts are masked.
    /// A serviced interrupt also acknowledges a pending timer expiry.
    pub fn interrupt(&mut self) -> Result<bool> {
        if !self.booted {
            return Err(Error::NotStarted);
        }
        if !self.cpu.interrupts_enabled() {
            return Ok(false);
        }
        self.irq_pending = false;
        self.service_interrupt()?;
        Ok(true)
    }

    fn service_interrupt(&mut self) -> Result<()> {
        // The generated handler does the switching; the token is not needed.
        let _cs = self.cpu.enter_interrupt(&mut self.ram);
        self.run_through_rti()
    }

    fn run_through_rti(&mut self) -> Result<()> {
        for _ in 0..MAX_ROUTINE_STEPS {
            let opcode = self.ram.read(self.cpu.pc);
            self.cpu.step(&mut self.ram)?;
            if opcode == op::RTI {
                return Ok(());
            }
        }
        Err(Error::RoutineStuck { pc: self.cpu.pc })
    }

    /// Current Task Index as stored in zero page.
    pub fn current_task(&self) -> u8 {
        self.ram.as_slice()[self.zero_page.current_task as usize]
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn ram(&self) -> &Ram {
        &self.ram
    }

    pub fn placement(&self) -> &Placement<N> {
        &self.placement
    }
}
