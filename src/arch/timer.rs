//! # Tick Timer
//!
//! Periodic down-counter driving the IRQ line, in the manner of a Mikey
//! timer: a backup (reload) value, a current count, and an enable bit.
//! The machine model counts executed instructions instead of clock cycles.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    backup: u32,
    count: u32,
    armed: bool,
}

impl Timer {
    /// A disarmed timer that fires every `period` instructions once armed.
    /// A zero period is treated as one.
    pub const fn new(period: u32) -> Self {
        let backup = if period == 0 { 1 } else { period };
        Self {
            backup,
            count: backup,
            armed: false,
        }
    }

    /// Reload the counter and start counting.
    pub fn arm(&mut self) {
        self.count = self.backup;
        self.armed = true;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    #[inline]
    pub fn period(&self) -> u32 {
        self.backup
    }

    /// Advance by one instruction. Returns `true` when the counter expires,
    /// at which point it reloads from the backup value.
    pub fn tick(&mut self) -> bool {
        if !self.armed {
            return false;
        }
        self.count -= 1;
        if self.count == 0 {
            self.count = self.backup;
            true
        } else {
            false
        }
    }
}
