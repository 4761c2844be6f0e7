//! # Architecture Layer
//!
//! The 65SC02 port: register file and interpreter, the memory bus it
//! talks through, the tick timer that preempts tasks, and the generated
//! machine code for running the switcher on the real CPU.

pub mod bus;
pub mod mos65sc02;
pub mod opcode;
pub mod routines;
pub mod timer;
