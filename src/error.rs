//! # Errors
//!
//! Setup-time and machine-model failures. The switching core itself never
//! fails at runtime; its preconditions are structural and only checked by
//! debug assertions.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Every task slot has already been initialized.
    TooManyTasks,
    /// `start` was called before all task slots were initialized.
    TasksMissing { created: usize, expected: usize },
    /// A task index outside `[0, N)`.
    NoSuchTask { index: usize },
    /// The bootstrap already ran.
    AlreadyStarted,
    /// The machine was stepped before the bootstrap ran.
    NotStarted,
    /// A task stack region cannot hold one saved frame.
    StackTooSmall { size: u8, required: u8 },
    /// The boot reserve cannot hold the return address of the boot code's
    /// subroutine calls.
    BootStackTooSmall { reserve: u8, required: u8 },
    /// The boot reserve plus all task regions exceed the stack page.
    StackPageExhausted { requested: usize },
    /// The generated handler rotates over a different number of tasks than
    /// the image holds.
    RotationMismatch { rotation: usize, tasks: usize },
    /// The Current Task Index cell lies inside the Task Control Store.
    ZeroPageOverlap { addr: u8 },
    /// Generated boot or interrupt code did not reach its RTI.
    RoutineStuck { pc: u16 },
    /// The CPU model fetched an opcode it does not implement.
    IllegalOpcode { pc: u16, opcode: u8 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TooManyTasks => write!(f, "all task slots are in use"),
            Error::TasksMissing { created, expected } => {
                write!(f, "only {} of {} tasks initialized", created, expected)
            }
            Error::NoSuchTask { index } => write!(f, "no task with index {}", index),
            Error::AlreadyStarted => write!(f, "tasks already started"),
            Error::NotStarted => write!(f, "tasks not started"),
            Error::StackTooSmall { size, required } => write!(
                f,
                "task stack of {} bytes cannot hold a {}-byte frame",
                size, required
            ),
            Error::BootStackTooSmall { reserve, required } => write!(
                f,
                "boot stack reserve of {} bytes, at least {} needed",
                reserve, required
            ),
            Error::StackPageExhausted { requested } => {
                write!(f, "stack layout needs {} bytes, page holds 256", requested)
            }
            Error::RotationMismatch { rotation, tasks } => write!(
                f,
                "handler rotates over {} tasks, image has {}",
                rotation, tasks
            ),
            Error::ZeroPageOverlap { addr } => {
                write!(f, "current task cell ${:02X} overlaps the task control store", addr)
            }
            Error::RoutineStuck { pc } => write!(f, "routine stuck near ${:04X}", pc),
            Error::IllegalOpcode { pc, opcode } => {
                write!(f, "illegal opcode ${:02X} at ${:04X}", opcode, pc)
            }
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use std::string::ToString;

    #[test]
    fn test_display_illegal_opcode() {
        let err = Error::IllegalOpcode { pc: 0x0203, opcode: 0x02 };
        assert_eq!(err.to_string(), "illegal opcode $02 at $0203");
    }

    #[test]
    fn test_display_tasks_missing() {
        let err = Error::TasksMissing { created: 1, expected: 2 };
        assert_eq!(err.to_string(), "only 1 of 2 tasks initialized");
    }

    #[test]
    fn test_display_rotation_mismatch() {
        let err = Error::RotationMismatch { rotation: 3, tasks: 2 };
        assert_eq!(err.to_string(), "handler rotates over 3 tasks, image has 2");
    }
}
