//! CPU emulation for the LS-8.
//!
//! This module implements the complete LS-8 architecture:
//! - 256 bytes of flat RAM
//! - 8 general-purpose 16-bit registers (R7 = stack pointer)
//! - condition flags fed by CMP and by the legacy on-write comparison
//! - a fetch-decode-execute loop over the fixed one-byte opcode table

pub mod alu;
pub mod decode;
pub mod execute;
pub mod memory;
pub mod registers;

pub use alu::{AluError, AluOp};
pub use decode::{DecodeError, Instruction, Opcode};
pub use execute::{Cpu, CpuError, CpuState};
pub use memory::{Memory, MemoryError, MEMORY_SIZE};
pub use registers::{Flags, RegisterError, Registers, REGISTER_COUNT};
