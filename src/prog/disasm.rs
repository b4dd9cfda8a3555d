//! Disassembler for LS-8 program images.
//!
//! Walks the byte stream from address 0, decoding each opcode and its
//! operands. Bytes that match no table entry render as data and the walk
//! resynchronizes on the next byte.

use crate::cpu::decode::{decode, Instruction, Opcode};

/// Disassemble a byte slice to readable text, one instruction per line.
pub fn disassemble(bytes: &[u8]) -> String {
    let mut output = String::new();
    let mut addr = 0usize;

    while addr < bytes.len() {
        let raw = bytes[addr];
        match Opcode::from_byte(raw) {
            Ok(op) => {
                let count = op.operand_count();
                let mut operands = [0u8; 2];
                for (i, slot) in operands.iter_mut().enumerate().take(count) {
                    *slot = bytes.get(addr + 1 + i).copied().unwrap_or(0);
                }
                let instr = decode(op, operands[0], operands[1]);
                output.push_str(&format!("{:03}: {}\n", addr, format_instruction(&instr)));
                addr += 1 + count;
            }
            Err(_) => {
                output.push_str(&format!("{:03}: DB 0x{:02X}\n", addr, raw));
                addr += 1;
            }
        }
    }

    output
}

/// Format a decoded instruction as assembly text.
fn format_instruction(instr: &Instruction) -> String {
    match *instr {
        Instruction::Ldi { reg, value } => format!("LDI R{},{}", reg, value),
        Instruction::Prn { reg } => format!("PRN R{}", reg),
        Instruction::Add { a, b } => format!("ADD R{},R{}", a, b),
        Instruction::Mul { a, b } => format!("MUL R{},R{}", a, b),
        Instruction::Cmp { a, b } => format!("CMP R{},R{}", a, b),
        Instruction::Push { reg } => format!("PUSH R{}", reg),
        Instruction::Pop { reg } => format!("POP R{}", reg),
        Instruction::Call { reg } => format!("CALL R{}", reg),
        Instruction::Ret => "RET".to_string(),
        Instruction::Jmp { reg } => format!("JMP R{}", reg),
        Instruction::Jeq { reg } => format!("JEQ R{}", reg),
        Instruction::Jne { reg } => format!("JNE R{}", reg),
        Instruction::Hlt => "HLT".to_string(),
        // Reserved encodings disassemble by name
        Instruction::Unimplemented { opcode } => opcode.mnemonic().to_string(),
    }
}
