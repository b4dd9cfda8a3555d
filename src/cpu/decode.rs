//! Instruction decoder for the LS-8.
//!
//! Opcodes are single bytes with structure baked into the encoding:
//! the top two bits give the operand count, bit 5 marks ALU-class
//! instructions, bit 4 marks instructions that set the PC themselves,
//! and the low four bits are the instruction number.
//!
//! The full instruction-set table is recognized here, including opcodes
//! the execution engine does not wire up. Those decode to
//! [`Instruction::Unimplemented`] and fail loudly when executed, instead
//! of being silently skipped.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every opcode in the LS-8 instruction-set table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    // Wired into the execution engine
    Ldi,
    Prn,
    Add,
    Mul,
    Cmp,
    Push,
    Pop,
    Call,
    Ret,
    Jmp,
    Jeq,
    Jne,
    Hlt,
    // Reserved: valid encodings, execution undefined
    Nop,
    And,
    Or,
    Xor,
    Not,
    Sub,
    Div,
    Mod,
    Shl,
    Shr,
    Inc,
    Dec,
    Ld,
    St,
    Pra,
    Int,
    Iret,
    Jgt,
    Jge,
    Jlt,
    Jle,
}

impl Opcode {
    /// Decode an opcode byte by exact match against the table.
    pub fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        let op = match byte {
            0b1000_0010 => Opcode::Ldi,
            0b0100_0111 => Opcode::Prn,
            0b1010_0000 => Opcode::Add,
            0b1010_0010 => Opcode::Mul,
            0b1010_0111 => Opcode::Cmp,
            0b0100_0101 => Opcode::Push,
            0b0100_0110 => Opcode::Pop,
            0b0101_0000 => Opcode::Call,
            0b0001_0001 => Opcode::Ret,
            0b0101_0100 => Opcode::Jmp,
            0b0101_0101 => Opcode::Jeq,
            0b0101_0110 => Opcode::Jne,
            0b0000_0001 => Opcode::Hlt,
            0b0000_0000 => Opcode::Nop,
            0b1010_1000 => Opcode::And,
            0b1010_1010 => Opcode::Or,
            0b1010_1011 => Opcode::Xor,
            0b0110_1001 => Opcode::Not,
            0b1010_0001 => Opcode::Sub,
            0b1010_0011 => Opcode::Div,
            0b1010_0100 => Opcode::Mod,
            0b1010_1100 => Opcode::Shl,
            0b1010_1101 => Opcode::Shr,
            0b0110_0101 => Opcode::Inc,
            0b0110_0110 => Opcode::Dec,
            0b1000_0011 => Opcode::Ld,
            0b1000_0100 => Opcode::St,
            0b0100_1000 => Opcode::Pra,
            0b0101_0010 => Opcode::Int,
            0b0001_0011 => Opcode::Iret,
            0b0101_0111 => Opcode::Jgt,
            0b0101_1010 => Opcode::Jge,
            0b0101_1000 => Opcode::Jlt,
            0b0101_1001 => Opcode::Jle,
            _ => return Err(DecodeError::UnknownOpcode(byte)),
        };
        Ok(op)
    }

    /// Encode back to the opcode byte.
    pub fn to_byte(self) -> u8 {
        match self {
            Opcode::Ldi => 0b1000_0010,
            Opcode::Prn => 0b0100_0111,
            Opcode::Add => 0b1010_0000,
            Opcode::Mul => 0b1010_0010,
            Opcode::Cmp => 0b1010_0111,
            Opcode::Push => 0b0100_0101,
            Opcode::Pop => 0b0100_0110,
            Opcode::Call => 0b0101_0000,
            Opcode::Ret => 0b0001_0001,
            Opcode::Jmp => 0b0101_0100,
            Opcode::Jeq => 0b0101_0101,
            Opcode::Jne => 0b0101_0110,
            Opcode::Hlt => 0b0000_0001,
            Opcode::Nop => 0b0000_0000,
            Opcode::And => 0b1010_1000,
            Opcode::Or => 0b1010_1010,
            Opcode::Xor => 0b1010_1011,
            Opcode::Not => 0b0110_1001,
            Opcode::Sub => 0b1010_0001,
            Opcode::Div => 0b1010_0011,
            Opcode::Mod => 0b1010_0100,
            Opcode::Shl => 0b1010_1100,
            Opcode::Shr => 0b1010_1101,
            Opcode::Inc => 0b0110_0101,
            Opcode::Dec => 0b0110_0110,
            Opcode::Ld => 0b1000_0011,
            Opcode::St => 0b1000_0100,
            Opcode::Pra => 0b0100_1000,
            Opcode::Int => 0b0101_0010,
            Opcode::Iret => 0b0001_0011,
            Opcode::Jgt => 0b0101_0111,
            Opcode::Jge => 0b0101_1010,
            Opcode::Jlt => 0b0101_1000,
            Opcode::Jle => 0b0101_1001,
        }
    }

    /// Number of operand bytes, carried by the top two bits of the opcode.
    pub fn operand_count(self) -> usize {
        (self.to_byte() >> 6) as usize
    }

    /// True for ALU-class opcodes (bit 5 of the encoding).
    pub fn is_alu(self) -> bool {
        self.to_byte() & 0b0010_0000 != 0
    }

    /// The assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Ldi => "LDI",
            Opcode::Prn => "PRN",
            Opcode::Add => "ADD",
            Opcode::Mul => "MUL",
            Opcode::Cmp => "CMP",
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Call => "CALL",
            Opcode::Ret => "RET",
            Opcode::Jmp => "JMP",
            Opcode::Jeq => "JEQ",
            Opcode::Jne => "JNE",
            Opcode::Hlt => "HLT",
            Opcode::Nop => "NOP",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Not => "NOT",
            Opcode::Sub => "SUB",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Shl => "SHL",
            Opcode::Shr => "SHR",
            Opcode::Inc => "INC",
            Opcode::Dec => "DEC",
            Opcode::Ld => "LD",
            Opcode::St => "ST",
            Opcode::Pra => "PRA",
            Opcode::Int => "INT",
            Opcode::Iret => "IRET",
            Opcode::Jgt => "JGT",
            Opcode::Jge => "JGE",
            Opcode::Jlt => "JLT",
            Opcode::Jle => "JLE",
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Decoded LS-8 instruction.
///
/// Operand bytes are carried raw; register-index operands are validated
/// by the register file at execution time, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Load immediate: R\[reg\] := value
    Ldi { reg: u8, value: u8 },

    /// Print the register's value in decimal
    Prn { reg: u8 },

    /// R\[a\] := R\[a\] + R\[b\]
    Add { a: u8, b: u8 },

    /// R\[a\] := R\[a\] * R\[b\]
    Mul { a: u8, b: u8 },

    /// Flags := compare(R\[a\], R\[b\])
    Cmp { a: u8, b: u8 },

    /// SP := SP - 1; RAM\[SP\] := R\[reg\]
    Push { reg: u8 },

    /// R\[reg\] := RAM\[SP\]; SP := SP + 1
    Pop { reg: u8 },

    /// Push the return address, then PC := R\[reg\]
    Call { reg: u8 },

    /// PC := RAM\[SP\]; SP := SP + 1
    Ret,

    /// Unconditional jump: PC := R\[reg\]
    Jmp { reg: u8 },

    /// If the equal flag is set: PC := R\[reg\]
    Jeq { reg: u8 },

    /// If the equal flag is clear: PC := R\[reg\]
    Jne { reg: u8 },

    /// Halt execution
    Hlt,

    /// A recognized encoding with no wired execute path. Operands were
    /// consumed during fetch; execution fails loudly.
    Unimplemented { opcode: Opcode },
}

/// Build an instruction from a decoded opcode and its operand bytes.
///
/// Unused operand slots are passed as zero; the opcode's operand count
/// decides which are meaningful.
pub fn decode(op: Opcode, a: u8, b: u8) -> Instruction {
    match op {
        Opcode::Ldi => Instruction::Ldi { reg: a, value: b },
        Opcode::Prn => Instruction::Prn { reg: a },
        Opcode::Add => Instruction::Add { a, b },
        Opcode::Mul => Instruction::Mul { a, b },
        Opcode::Cmp => Instruction::Cmp { a, b },
        Opcode::Push => Instruction::Push { reg: a },
        Opcode::Pop => Instruction::Pop { reg: a },
        Opcode::Call => Instruction::Call { reg: a },
        Opcode::Ret => Instruction::Ret,
        Opcode::Jmp => Instruction::Jmp { reg: a },
        Opcode::Jeq => Instruction::Jeq { reg: a },
        Opcode::Jne => Instruction::Jne { reg: a },
        Opcode::Hlt => Instruction::Hlt,
        _ => Instruction::Unimplemented { opcode: op },
    }
}

/// Encode an instruction back to its byte sequence.
pub fn encode(instr: &Instruction) -> Vec<u8> {
    match *instr {
        Instruction::Ldi { reg, value } => vec![Opcode::Ldi.to_byte(), reg, value],
        Instruction::Prn { reg } => vec![Opcode::Prn.to_byte(), reg],
        Instruction::Add { a, b } => vec![Opcode::Add.to_byte(), a, b],
        Instruction::Mul { a, b } => vec![Opcode::Mul.to_byte(), a, b],
        Instruction::Cmp { a, b } => vec![Opcode::Cmp.to_byte(), a, b],
        Instruction::Push { reg } => vec![Opcode::Push.to_byte(), reg],
        Instruction::Pop { reg } => vec![Opcode::Pop.to_byte(), reg],
        Instruction::Call { reg } => vec![Opcode::Call.to_byte(), reg],
        Instruction::Ret => vec![Opcode::Ret.to_byte()],
        Instruction::Jmp { reg } => vec![Opcode::Jmp.to_byte(), reg],
        Instruction::Jeq { reg } => vec![Opcode::Jeq.to_byte(), reg],
        Instruction::Jne { reg } => vec![Opcode::Jne.to_byte(), reg],
        Instruction::Hlt => vec![Opcode::Hlt.to_byte()],
        Instruction::Unimplemented { opcode } => {
            let mut bytes = vec![opcode.to_byte()];
            bytes.resize(1 + opcode.operand_count(), 0);
            bytes
        }
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The byte matches no entry in the instruction-set table.
    #[error("unknown opcode byte 0b{0:08b} (0x{0:02X})")]
    UnknownOpcode(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hlt() {
        let op = Opcode::from_byte(0b0000_0001).unwrap();
        assert_eq!(op, Opcode::Hlt);
        assert_eq!(decode(op, 0, 0), Instruction::Hlt);
    }

    #[test]
    fn test_decode_ldi() {
        let op = Opcode::from_byte(130).unwrap();
        assert_eq!(op, Opcode::Ldi);
        assert_eq!(op.operand_count(), 2);
        assert_eq!(decode(op, 0, 8), Instruction::Ldi { reg: 0, value: 8 });
    }

    #[test]
    fn test_operand_counts_match_encoding() {
        assert_eq!(Opcode::Hlt.operand_count(), 0);
        assert_eq!(Opcode::Ret.operand_count(), 0);
        assert_eq!(Opcode::Prn.operand_count(), 1);
        assert_eq!(Opcode::Call.operand_count(), 1);
        assert_eq!(Opcode::Ldi.operand_count(), 2);
        assert_eq!(Opcode::Mul.operand_count(), 2);
    }

    #[test]
    fn test_alu_bit() {
        assert!(Opcode::Add.is_alu());
        assert!(Opcode::Mul.is_alu());
        assert!(Opcode::Cmp.is_alu());
        assert!(Opcode::Xor.is_alu());
        assert!(!Opcode::Ldi.is_alu());
        assert!(!Opcode::Jmp.is_alu());
    }

    #[test]
    fn test_reserved_opcodes_are_recognized() {
        for byte in [
            0b0000_0000, // NOP
            0b1010_0001, // SUB
            0b1010_1011, // XOR
            0b0001_0011, // IRET
            0b0101_1001, // JLE
            0b0100_1000, // PRA
        ] {
            let op = Opcode::from_byte(byte).unwrap();
            assert_eq!(op.to_byte(), byte);
            assert!(matches!(
                decode(op, 0, 0),
                Instruction::Unimplemented { .. }
            ));
        }
    }

    #[test]
    fn test_unknown_byte_rejected() {
        assert_eq!(
            Opcode::from_byte(0xFF),
            Err(DecodeError::UnknownOpcode(0xFF))
        );
    }

    #[test]
    fn test_opcode_byte_roundtrip() {
        let ops = [
            Opcode::Ldi,
            Opcode::Prn,
            Opcode::Add,
            Opcode::Mul,
            Opcode::Cmp,
            Opcode::Push,
            Opcode::Pop,
            Opcode::Call,
            Opcode::Ret,
            Opcode::Jmp,
            Opcode::Jeq,
            Opcode::Jne,
            Opcode::Hlt,
        ];
        for op in ops {
            assert_eq!(Opcode::from_byte(op.to_byte()).unwrap(), op);
        }
    }

    #[test]
    fn test_encode_scenario_program() {
        // LDI R0,8; PRN R0; HLT
        let mut bytes = Vec::new();
        bytes.extend(encode(&Instruction::Ldi { reg: 0, value: 8 }));
        bytes.extend(encode(&Instruction::Prn { reg: 0 }));
        bytes.extend(encode(&Instruction::Hlt));
        assert_eq!(bytes, vec![130, 0, 8, 71, 0, 1]);
    }
}
