//! LS-8 arithmetic/logic unit.
//!
//! A stateless two-operand unit over the register file. Only ADD, MUL and
//! CMP are wired; every other ALU-class opcode is rejected with an
//! unsupported-operation error. Arithmetic wraps modulo the 16-bit
//! register width.

use crate::cpu::decode::Opcode;
use crate::cpu::registers::{Flags, RegisterError, Registers};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The supported ALU operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AluOp {
    /// R\[a\] := R\[a\] + R\[b\] (wrapping)
    Add,
    /// R\[a\] := R\[a\] * R\[b\] (wrapping)
    Mul,
    /// Flags := compare(R\[a\], R\[b\])
    Cmp,
}

impl AluOp {
    /// Map an ALU-class opcode to its operation.
    ///
    /// Opcodes with the ALU bit set but no wired operation (SUB, DIV, AND,
    /// ...) are the unsupported-operation case and abort the run.
    pub fn from_opcode(op: Opcode) -> Result<Self, AluError> {
        match op {
            Opcode::Add => Ok(AluOp::Add),
            Opcode::Mul => Ok(AluOp::Mul),
            Opcode::Cmp => Ok(AluOp::Cmp),
            other => Err(AluError::Unsupported(other)),
        }
    }
}

/// Apply an ALU operation to two register indices.
///
/// ADD and MUL write their result through [`Registers::set`], so the
/// legacy R0/R1 flag recomputation fires on those paths. CMP writes the
/// flags directly from its own operands.
pub fn apply(regs: &mut Registers, op: AluOp, a: u8, b: u8) -> Result<(), AluError> {
    let lhs = regs.get(a)?;
    let rhs = regs.get(b)?;

    match op {
        AluOp::Add => regs.set(a, lhs.wrapping_add(rhs))?,
        AluOp::Mul => regs.set(a, lhs.wrapping_mul(rhs))?,
        AluOp::Cmp => regs.flags = Flags::compare(lhs, rhs),
    }

    Ok(())
}

/// Errors that can occur during ALU operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AluError {
    /// The operation is not one of ADD, MUL, CMP.
    #[error("unsupported ALU operation: {0}")]
    Unsupported(Opcode),

    /// An operand register index was invalid.
    #[error(transparent)]
    Register(#[from] RegisterError),
}
