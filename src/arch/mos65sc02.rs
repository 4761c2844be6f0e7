//! # 65SC02 Port Layer
//!
//! Register file and instruction interpreter for the 65SC02 found in the
//! Atari Lynx.
//!
//! ## Stack Model
//!
//! The hardware stack is fixed to page 1 (`$0100-$01FF`) and grows
//! downwards. `S` is an 8-bit offset into that page: a push stores at
//! `$0100 | S` and then decrements `S`; a pull increments `S` first and
//! then loads.
//!
//! ## Interrupt Entry
//!
//! When the IRQ line is asserted and `I` is clear, the CPU finishes the
//! current instruction, pushes PCH, PCL and P (with the break bit clear),
//! sets `I` and jumps through the vector at `$FFFE`. RTI pulls P, PCL and
//! PCH back in that order.
//!
//! Decimal mode is not modelled: ADC always adds in binary.

use bitflags::bitflags;

use super::bus::Bus;
use super::opcode as op;
use crate::config::{IRQ_VECTOR, RESET_VECTOR, STACK_PAGE};
use crate::error::{Error, Result};
use crate::sync::CriticalSection;

bitflags! {
    /// Processor status register `P`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        const CARRY = 0x01;
        const ZERO = 0x02;
        const IRQ_DISABLE = 0x04;
        const DECIMAL = 0x08;
        /// Only exists in pushed copies of `P`.
        const BREAK = 0x10;
        /// Always reads as 1.
        const UNUSED = 0x20;
        const OVERFLOW = 0x40;
        const NEGATIVE = 0x80;
    }
}

impl Status {
    /// The value `P` takes when pulled from the stack.
    #[inline]
    pub fn from_stack(byte: u8) -> Self {
        (Status::from_bits_retain(byte) - Status::BREAK) | Status::UNUSED
    }
}

/// The 65SC02 register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cpu {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    /// Stack pointer, an offset into [`STACK_PAGE`].
    pub s: u8,
    pub p: Status,
    pub pc: u16,
}

impl Cpu {
    /// Power-on state: interrupts masked, stack at the top of the page.
    pub const fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            s: 0xFF,
            p: Status::UNUSED.union(Status::IRQ_DISABLE),
            pc: 0,
        }
    }

    /// Hardware reset: mask interrupts and fetch PC from the reset vector.
    pub fn reset<B: Bus>(&mut self, bus: &mut B) {
        *self = Self::new();
        self.pc = bus.read_word(RESET_VECTOR);
    }

    #[inline]
    pub const fn stack_addr(s: u8) -> u16 {
        STACK_PAGE | s as u16
    }

    #[inline]
    pub fn push<B: Bus>(&mut self, bus: &mut B, value: u8) {
        bus.write(Self::stack_addr(self.s), value);
        self.s = self.s.wrapping_sub(1);
    }

    #[inline]
    pub fn pull<B: Bus>(&mut self, bus: &mut B) -> u8 {
        self.s = self.s.wrapping_add(1);
        bus.read(Self::stack_addr(self.s))
    }

    #[inline]
    pub fn interrupts_enabled(&self) -> bool {
        !self.p.contains(Status::IRQ_DISABLE)
    }

    #[inline]
    pub fn sei(&mut self) {
        self.p.insert(Status::IRQ_DISABLE);
    }

    #[inline]
    pub fn cli(&mut self) {
        self.p.remove(Status::IRQ_DISABLE);
    }

    /// Hardware IRQ entry.
    ///
    /// Pushes PCH, PCL and P onto the active stack, masks interrupts and
    /// loads PC from the IRQ vector. The returned token is the handler's
    /// proof that it runs with interrupts masked.
    pub fn enter_interrupt<B: Bus>(&mut self, bus: &mut B) -> CriticalSection {
        self.push(bus, (self.pc >> 8) as u8);
        self.push(bus, self.pc as u8);
        let pushed = (self.p | Status::UNUSED) - Status::BREAK;
        self.push(bus, pushed.bits());
        self.sei();
        self.pc = bus.read_word(IRQ_VECTOR);
        CriticalSection::new()
    }

    /// Return from interrupt: pull P, then PCL, then PCH.
    pub fn rti<B: Bus>(&mut self, bus: &mut B) {
        self.p = Status::from_stack(self.pull(bus));
        let lo = self.pull(bus) as u16;
        let hi = self.pull(bus) as u16;
        self.pc = (hi << 8) | lo;
    }

    /// Return from subroutine: pull PCL, then PCH, and resume one past it.
    pub fn rts<B: Bus>(&mut self, bus: &mut B) {
        let lo = self.pull(bus) as u16;
        let hi = self.pull(bus) as u16;
        self.pc = ((hi << 8) | lo).wrapping_add(1);
    }

    /// Execute a single instruction.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> Result<()> {
        let at = self.pc;
        let opcode = self.fetch(bus);

        match opcode {
            op::NOP => {}

            op::LDA_IMM => {
                self.a = self.fetch(bus);
                self.set_nz(self.a);
            }
            op::LDA_ZP => {
                let addr = self.fetch(bus) as u16;
                self.a = bus.read(addr);
                self.set_nz(self.a);
            }
            op::LDA_ABS => {
                let addr = self.fetch_word(bus);
                self.a = bus.read(addr);
                self.set_nz(self.a);
            }
            op::LDX_IMM => {
                self.x = self.fetch(bus);
                self.set_nz(self.x);
            }
            op::LDX_ZP => {
                let addr = self.fetch(bus) as u16;
                self.x = bus.read(addr);
                self.set_nz(self.x);
            }
            op::LDX_ZPY => {
                let addr = self.fetch(bus).wrapping_add(self.y) as u16;
                self.x = bus.read(addr);
                self.set_nz(self.x);
            }
            op::LDY_IMM => {
                self.y = self.fetch(bus);
                self.set_nz(self.y);
            }
            op::LDY_ZP => {
                let addr = self.fetch(bus) as u16;
                self.y = bus.read(addr);
                self.set_nz(self.y);
            }

            op::STA_ZP => {
                let addr = self.fetch(bus) as u16;
                bus.write(addr, self.a);
            }
            op::STA_ABS => {
                let addr = self.fetch_word(bus);
                bus.write(addr, self.a);
            }
            op::STX_ZP => {
                let addr = self.fetch(bus) as u16;
                bus.write(addr, self.x);
            }
            op::STX_ZPY => {
                let addr = self.fetch(bus).wrapping_add(self.y) as u16;
                bus.write(addr, self.x);
            }
            op::STY_ZP => {
                let addr = self.fetch(bus) as u16;
                bus.write(addr, self.y);
            }

            op::EOR_IMM => {
                self.a ^= self.fetch(bus);
                self.set_nz(self.a);
            }
            op::EOR_ZP => {
                let addr = self.fetch(bus) as u16;
                self.a ^= bus.read(addr);
                self.set_nz(self.a);
            }
            op::ADC_IMM => {
                let operand = self.fetch(bus);
                self.adc(operand);
            }
            op::CMP_IMM => {
                let operand = self.fetch(bus);
                let result = self.a.wrapping_sub(operand);
                self.p.set(Status::CARRY, self.a >= operand);
                self.set_nz(result);
            }

            op::INC_ZP => {
                let addr = self.fetch(bus) as u16;
                let value = bus.read(addr).wrapping_add(1);
                bus.write(addr, value);
                self.set_nz(value);
            }
            op::INX => {
                self.x = self.x.wrapping_add(1);
                self.set_nz(self.x);
            }
            op::INY => {
                self.y = self.y.wrapping_add(1);
                self.set_nz(self.y);
            }
            op::DEX => {
                self.x = self.x.wrapping_sub(1);
                self.set_nz(self.x);
            }
            op::DEY => {
                self.y = self.y.wrapping_sub(1);
                self.set_nz(self.y);
            }

            op::TAX => {
                self.x = self.a;
                self.set_nz(self.x);
            }
            op::TAY => {
                self.y = self.a;
                self.set_nz(self.y);
            }
            op::TXA => {
                self.a = self.x;
                self.set_nz(self.a);
            }
            op::TYA => {
                self.a = self.y;
                self.set_nz(self.a);
            }
            op::TSX => {
                self.x = self.s;
                self.set_nz(self.x);
            }
            // TXS leaves the flags alone.
            op::TXS => self.s = self.x,

            op::PHA => self.push(bus, self.a),
            op::PLA => {
                self.a = self.pull(bus);
                self.set_nz(self.a);
            }
            op::PHP => {
                let pushed = self.p | Status::BREAK | Status::UNUSED;
                self.push(bus, pushed.bits());
            }
            op::PLP => {
                let byte = self.pull(bus);
                self.p = Status::from_stack(byte);
            }

            op::CLC => self.p.remove(Status::CARRY),
            op::SEC => self.p.insert(Status::CARRY),
            op::CLI => self.cli(),
            op::SEI => self.sei(),

            op::BNE => self.branch(bus, !self.p.contains(Status::ZERO)),
            op::BEQ => self.branch(bus, self.p.contains(Status::ZERO)),
            op::BCC => self.branch(bus, !self.p.contains(Status::CARRY)),
            op::BCS => self.branch(bus, self.p.contains(Status::CARRY)),

            op::JMP_ABS => self.pc = self.fetch_word(bus),
            op::JSR => {
                let target = self.fetch_word(bus);
                let ret = self.pc.wrapping_sub(1);
                self.push(bus, (ret >> 8) as u8);
                self.push(bus, ret as u8);
                self.pc = target;
            }
            op::RTS => self.rts(bus),
            op::RTI => self.rti(bus),

            _ => {
                self.pc = at;
                return Err(Error::IllegalOpcode { pc: at, opcode });
            }
        }

        Ok(())
    }

    #[inline]
    fn fetch<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let byte = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    #[inline]
    fn fetch_word<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch(bus) as u16;
        let hi = self.fetch(bus) as u16;
        (hi << 8) | lo
    }

    fn branch<B: Bus>(&mut self, bus: &mut B, taken: bool) {
        let offset = self.fetch(bus) as i8;
        if taken {
            self.pc = self.pc.wrapping_add(offset as i16 as u16);
        }
    }

    fn adc(&mut self, operand: u8) {
        let carry = self.p.contains(Status::CARRY) as u16;
        let sum = self.a as u16 + operand as u16 + carry;
        let result = sum as u8;
        let overflow = (!(self.a ^ operand) & (self.a ^ result) & 0x80) != 0;
        self.p.set(Status::CARRY, sum > 0xFF);
        self.p.set(Status::OVERFLOW, overflow);
        self.a = result;
        self.set_nz(result);
    }

    #[inline]
    fn set_nz(&mut self, value: u8) {
        self.p.set(Status::ZERO, value == 0);
        self.p.set(Status::NEGATIVE, value & 0x80 != 0);
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
