//! 65SC02 opcode bytes understood by the interpreter and emitted by the
//! routine generator.

pub const BCC: u8 = 0x90;
pub const BCS: u8 = 0xB0;
pub const BEQ: u8 = 0xF0;
pub const BNE: u8 = 0xD0;

pub const ADC_IMM: u8 = 0x69;
pub const CMP_IMM: u8 = 0xC9;
pub const EOR_IMM: u8 = 0x49;
pub const EOR_ZP: u8 = 0x45;

pub const LDA_IMM: u8 = 0xA9;
pub const LDA_ZP: u8 = 0xA5;
pub const LDA_ABS: u8 = 0xAD;
pub const LDX_IMM: u8 = 0xA2;
pub const LDX_ZP: u8 = 0xA6;
pub const LDX_ZPY: u8 = 0xB6;
pub const LDY_IMM: u8 = 0xA0;
pub const LDY_ZP: u8 = 0xA4;

pub const STA_ZP: u8 = 0x85;
pub const STA_ABS: u8 = 0x8D;
pub const STX_ZP: u8 = 0x86;
pub const STX_ZPY: u8 = 0x96;
pub const STY_ZP: u8 = 0x84;

pub const INC_ZP: u8 = 0xE6;
pub const INX: u8 = 0xE8;
pub const INY: u8 = 0xC8;
pub const DEX: u8 = 0xCA;
pub const DEY: u8 = 0x88;

pub const TAX: u8 = 0xAA;
pub const TAY: u8 = 0xA8;
pub const TXA: u8 = 0x8A;
pub const TYA: u8 = 0x98;
pub const TSX: u8 = 0xBA;
pub const TXS: u8 = 0x9A;

pub const PHA: u8 = 0x48;
pub const PLA: u8 = 0x68;
pub const PHP: u8 = 0x08;
pub const PLP: u8 = 0x28;

pub const CLC: u8 = 0x18;
pub const SEC: u8 = 0x38;
pub const CLI: u8 = 0x58;
pub const SEI: u8 = 0x78;

pub const JMP_ABS: u8 = 0x4C;
pub const JSR: u8 = 0x20;
pub const RTS: u8 = 0x60;
pub const RTI: u8 = 0x40;
pub const NOP: u8 = 0xEA;
