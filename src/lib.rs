//! # Lynxtask
//!
//! A timer-preempted task switcher for the 65SC02, the CPU of the Atari
//! Lynx, together with a machine model that runs it on a host.
//!
//! ## Overview
//!
//! A fixed set of tasks share one CPU. Each task owns a slice of the
//! hardware stack page. A periodic timer interrupt parks the running task
//! by pushing its registers onto its own stack, and resumes the next task
//! by popping that task's registers from its stack. The only scheduler
//! state is one saved stack pointer per task plus the index of the running
//! task.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                 Task code (65SC02 bytes)               │
//! ├────────────────────────────────────────────────────────┤
//! │     Kernel API (kernel.rs)   │  Firmware image         │
//! │  create_task · start · run   │  (firmware.rs)          │
//! ├──────────────┬───────────────┴──────┬─────────────────┤
//! │  Scheduler   │  Context protocol    │  Sync           │
//! │  scheduler.rs│  context.rs          │  sync.rs        │
//! │  ─ switch    │  ─ save / load       │  ─ interrupt_   │
//! │  ─ handler   │  ─ initialize_task   │    free         │
//! │  ─ bootstrap │  ─ SavedFrame        │                 │
//! ├──────────────┴──────────────────────┴─────────────────┤
//! │           Task model (task.rs)                         │
//! │   Task Control Store · StackRegion · StackLayout       │
//! ├────────────────────────────────────────────────────────┤
//! │           Arch port (arch/)                            │
//! │   Cpu · Bus · Timer · opcodes · generated routines     │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Switching Model
//!
//! 1. The timer expires and the CPU pushes PCH, PCL, P
//! 2. The handler pushes A, X, Y
//! 3. The running task's S goes into the Task Control Store
//! 4. The index advances (`(i + 1) mod N`; `i ^ 1` for two tasks)
//! 5. The next task's S is loaded, then Y, X, A are pulled
//! 6. CLI and RTI resume the next task where it was interrupted
//!
//! ## Memory Model
//!
//! - **No heap**: all state is fixed-size and owned
//! - **Closed task set**: `N` is a const generic; tasks never exit
//! - **Disjoint stacks**: carved from page 1 below a boot reserve
//! - **No runtime checks in the core**: preconditions are debug assertions

#![no_std]

pub mod arch;
pub mod config;
pub mod context;
pub mod error;
pub mod firmware;
pub mod kernel;
pub mod scheduler;
pub mod sync;
pub mod task;

pub use error::{Error, Result};
