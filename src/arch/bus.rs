//! # Memory Bus
//!
//! The only hardware primitive the switcher consumes: byte reads and
//! writes at fixed 16-bit addresses. Device registers (output ports, timer
//! latches, bank control) are all reached through this trait by whoever
//! implements it.

/// Byte-wide access to the 65SC02 address space.
pub trait Bus {
    fn read(&mut self, addr: u16) -> u8;

    fn write(&mut self, addr: u16, value: u8);

    /// Little-endian 16-bit read, as used for vectors and absolute operands.
    fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    fn write_word(&mut self, addr: u16, value: u16) {
        self.write(addr, value as u8);
        self.write(addr.wrapping_add(1), (value >> 8) as u8);
    }
}

impl<B: Bus + ?Sized> Bus for &mut B {
    fn read(&mut self, addr: u16) -> u8 {
        (**self).read(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        (**self).write(addr, value)
    }
}

/// Flat 64 KiB of RAM with no memory-mapped devices.
#[derive(Clone)]
pub struct Ram {
    bytes: [u8; 0x1_0000],
}

impl Ram {
    pub const fn new() -> Self {
        Self { bytes: [0; 0x1_0000] }
    }

    /// Copy `data` into memory starting at `addr`, wrapping at the top of
    /// the address space.
    pub fn load(&mut self, addr: u16, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.bytes[addr.wrapping_add(i as u16) as usize] = *byte;
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for Ram {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for Ram {
    #[inline]
    fn read(&mut self, addr: u16) -> u8 {
        self.bytes[addr as usize]
    }

    #[inline]
    fn write(&mut self, addr: u16, value: u8) {
        self.bytes[addr as usize] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_access_is_little_endian() {
        let mut ram = Ram::new();
        ram.write_word(0xFFFE, 0x1234);
        assert_eq!(ram.read(0xFFFE), 0x34);
        assert_eq!(ram.read(0xFFFF), 0x12);
        assert_eq!(ram.read_word(0xFFFE), 0x1234);
    }

    #[test]
    fn test_load_wraps_at_top_of_memory() {
        let mut ram = Ram::new();
        ram.load(0xFFFF, &[0xAA, 0xBB]);
        assert_eq!(ram.read(0xFFFF), 0xAA);
        assert_eq!(ram.read(0x0000), 0xBB);
    }
}
