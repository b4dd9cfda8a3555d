//! # LS-8 Emulator
//!
//! An emulator for the LS-8, an 8-register, 256-byte virtual CPU with a
//! one-byte opcode encoding. Programs ship as `.ls8` text images (one
//! binary-encoded byte per line) and run until they execute HLT.

pub mod cpu;
pub mod prog;

// Re-export commonly used types
pub use cpu::{
    Cpu, CpuError, CpuState, Flags, Instruction, Memory, Opcode, Registers,
};
pub use prog::{disassemble, load_image, ImageError, ProgramImage};
