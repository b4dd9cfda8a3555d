//! LS-8 register file and condition flags.
//!
//! The LS-8 has 8 general-purpose registers. Three of them carry
//! conventional roles over the same storage:
//! - R7: stack pointer, initialized to 0xF4
//! - R6: interrupt status
//! - R5: interrupt mask
//!
//! Cells are 16 bits wide. Operand bytes are 8-bit, but R7 starts at 0xF4
//! and arithmetic results may exceed a byte, so the storage must be wider
//! than the bus.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The number of registers in the LS-8.
pub const REGISTER_COUNT: usize = 8;

/// Condition flags, encoded `00000LGE`.
///
/// Exactly one of the three bits is set after any comparison.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags(u8);

impl Flags {
    /// Equal bit (`E`).
    pub const EQUAL: u8 = 0b001;
    /// Greater-than bit (`G`).
    pub const GREATER: u8 = 0b010;
    /// Less-than bit (`L`).
    pub const LESS: u8 = 0b100;

    /// All flags clear (machine reset state).
    pub const fn clear() -> Self {
        Self(0)
    }

    /// Compare two values and produce the resulting flags.
    pub fn compare(a: u16, b: u16) -> Self {
        use std::cmp::Ordering;
        match a.cmp(&b) {
            Ordering::Equal => Self(Self::EQUAL),
            Ordering::Greater => Self(Self::GREATER),
            Ordering::Less => Self(Self::LESS),
        }
    }

    /// True if the equal bit is set. JEQ/JNE consult only this bit.
    pub fn is_equal(self) -> bool {
        self.0 & Self::EQUAL != 0
    }

    /// True if the greater-than bit is set.
    pub fn is_greater(self) -> bool {
        self.0 & Self::GREATER != 0
    }

    /// True if the less-than bit is set.
    pub fn is_less(self) -> bool {
        self.0 & Self::LESS != 0
    }

    /// The raw bitfield.
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Flags({}{}{})",
            if self.is_less() { 'L' } else { '-' },
            if self.is_greater() { 'G' } else { '-' },
            if self.is_equal() { 'E' } else { '-' },
        )
    }
}

/// The LS-8 register file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Registers {
    cells: [u16; REGISTER_COUNT],

    /// Condition flags. Written by CMP, and recomputed on every register
    /// write (see [`Registers::set`]).
    pub flags: Flags,
}

impl Registers {
    /// Stack pointer register index.
    pub const SP: u8 = 7;
    /// Interrupt status register index.
    pub const IS: u8 = 6;
    /// Interrupt mask register index.
    pub const IM: u8 = 5;

    /// Initial stack pointer value (top of the free RAM region).
    pub const STACK_INIT: u16 = 0xF4;

    /// Create a new register file in the reset state.
    pub fn new() -> Self {
        let mut cells = [0; REGISTER_COUNT];
        cells[Self::SP as usize] = Self::STACK_INIT;
        Self {
            cells,
            flags: Flags::clear(),
        }
    }

    /// Reset all registers to the power-on state.
    pub fn reset(&mut self) {
        self.cells = [0; REGISTER_COUNT];
        self.cells[Self::SP as usize] = Self::STACK_INIT;
        self.flags = Flags::clear();
    }

    /// Read a register by index.
    ///
    /// Operand bytes are used directly as indices, so a malformed program
    /// can name a register that does not exist; that surfaces here.
    #[inline]
    pub fn get(&self, index: u8) -> Result<u16, RegisterError> {
        self.cells
            .get(index as usize)
            .copied()
            .ok_or(RegisterError::IndexOutOfRange(index))
    }

    /// Write a register by index.
    ///
    /// Every write, to any index, recomputes the flags from R0 and R1.
    /// This is a holdover from an earlier instruction-set revision kept
    /// for compatibility; CMP can overwrite the result at any time, and
    /// conditional jumps see whichever source ran last.
    #[inline]
    pub fn set(&mut self, index: u8, value: u16) -> Result<(), RegisterError> {
        match self.cells.get_mut(index as usize) {
            Some(cell) => {
                *cell = value;
                self.flags = Flags::compare(self.cells[0], self.cells[1]);
                Ok(())
            }
            None => Err(RegisterError::IndexOutOfRange(index)),
        }
    }

    /// Snapshot of all register values (for tracing).
    pub fn snapshot(&self) -> [u16; REGISTER_COUNT] {
        self.cells
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during register file access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// Register index is outside 0-7.
    #[error("register index {0} out of range (0-{})", REGISTER_COUNT - 1)]
    IndexOutOfRange(u8),
}
