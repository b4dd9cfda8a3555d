//! CPU execution engine for the LS-8.
//!
//! Implements the fetch-decode-execute cycle and all wired instruction
//! behaviors. One instruction completes fully (register, memory, flag and
//! output effects) before the next fetch; the machine is a single
//! serially-mutated owner of all state.

use crate::cpu::alu::{self, AluError, AluOp};
use crate::cpu::decode::{self, DecodeError, Instruction, Opcode};
use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::registers::{RegisterError, Registers};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed HLT).
    Halted,
    /// CPU aborted on a fatal error.
    Error,
}

/// The LS-8 CPU.
///
/// Owns all machine state, so independent instances can run side by side
/// and tests get isolated machines for free.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers and flags.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Program counter: address of the next byte to fetch.
    pub pc: u16,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count (for profiling).
    pub cycles: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
    /// Lines emitted by PRN, drained by the embedder.
    output: Vec<String>,
}

impl Cpu {
    /// Create a new CPU in the reset state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            pc: 0,
            state: CpuState::Running,
            cycles: 0,
            last_instr: None,
            output: Vec::new(),
        }
    }

    /// Reset the CPU to initial state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.pc = 0;
        self.state = CpuState::Running;
        self.cycles = 0;
        self.last_instr = None;
        self.output.clear();
    }

    /// Load a program image at address 0.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        self.load_program_at(0, program)
    }

    /// Load a program image at an arbitrary start address.
    pub fn load_program_at(&mut self, start: usize, program: &[u8]) -> Result<(), MemoryError> {
        self.mem.load_program(start, program)
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed. A fatal error moves the
    /// machine into [`CpuState::Error`]; there is no retry at this level.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        match self.fetch_and_execute() {
            Ok(instr) => {
                self.cycles += 1;
                self.last_instr = Some(instr);
                Ok(instr)
            }
            Err(e) => {
                self.state = CpuState::Error;
                Err(e)
            }
        }
    }

    /// Run until halt or error. Returns the number of instructions executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.state == CpuState::Running && self.cycles < limit {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    fn fetch_and_execute(&mut self) -> Result<Instruction, CpuError> {
        // Fetch the opcode byte
        let raw = self.mem.read(self.pc)?;
        self.pc += 1;

        let op = Opcode::from_byte(raw)?;

        // Fetch operand bytes; PC is past the whole instruction before
        // execute runs, so branch targets are independent of this advance.
        let mut operands = [0u8; 2];
        for slot in operands.iter_mut().take(op.operand_count()) {
            *slot = self.mem.read(self.pc)?;
            self.pc += 1;
        }

        let instr = decode::decode(op, operands[0], operands[1]);
        self.execute(instr)?;

        Ok(instr)
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction) -> Result<(), CpuError> {
        match instr {
            Instruction::Ldi { reg, value } => {
                self.regs.set(reg, value as u16)?;
            }

            Instruction::Prn { reg } => {
                let value = self.regs.get(reg)?;
                self.output.push(value.to_string());
            }

            Instruction::Add { a, b } => alu::apply(&mut self.regs, AluOp::Add, a, b)?,
            Instruction::Mul { a, b } => alu::apply(&mut self.regs, AluOp::Mul, a, b)?,
            Instruction::Cmp { a, b } => alu::apply(&mut self.regs, AluOp::Cmp, a, b)?,

            Instruction::Push { reg } => {
                let value = self.regs.get(reg)?;
                self.push_byte(value as u8)?;
            }

            Instruction::Pop { reg } => {
                let value = self.pop_byte()?;
                self.regs.set(reg, value as u16)?;
            }

            Instruction::Call { reg } => {
                // PC already points at the instruction after the operand;
                // that is the return address.
                let target = self.regs.get(reg)?;
                let ret_addr = self.pc;
                self.push_byte(ret_addr as u8)?;
                self.pc = target;
            }

            Instruction::Ret => {
                self.pc = self.pop_byte()? as u16;
            }

            Instruction::Jmp { reg } => {
                self.pc = self.regs.get(reg)?;
            }

            Instruction::Jeq { reg } => {
                if self.regs.flags.is_equal() {
                    self.pc = self.regs.get(reg)?;
                }
            }

            Instruction::Jne { reg } => {
                if !self.regs.flags.is_equal() {
                    self.pc = self.regs.get(reg)?;
                }
            }

            Instruction::Hlt => {
                self.state = CpuState::Halted;
            }

            Instruction::Unimplemented { opcode } => {
                // ALU-class opcodes are rejected by the ALU itself, so SUB
                // and friends surface as unsupported ALU operations; the
                // rest fail as unimplemented.
                if opcode.is_alu() {
                    AluOp::from_opcode(opcode)?;
                }
                return Err(CpuError::UnimplementedOpcode(opcode));
            }
        }

        Ok(())
    }

    /// Push one byte onto the stack. The stack grows downward from R7;
    /// register values wider than a byte store their low 8 bits.
    fn push_byte(&mut self, value: u8) -> Result<(), CpuError> {
        let sp = self.regs.get(Registers::SP)?.wrapping_sub(1);
        self.regs.set(Registers::SP, sp)?;
        self.mem.write(sp, value)?;
        Ok(())
    }

    /// Pop one byte off the stack.
    fn pop_byte(&mut self) -> Result<u8, CpuError> {
        let sp = self.regs.get(Registers::SP)?;
        let value = self.mem.read(sp)?;
        self.regs.set(Registers::SP, sp.wrapping_add(1))?;
        Ok(value)
    }

    /// Drain the lines printed by PRN since the last drain.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Lines printed by PRN so far, without draining.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Render a diagnostic line: PC, the next three memory bytes, and all
    /// eight registers, in hex. Pure observation, no mutation.
    pub fn trace(&self) -> String {
        use std::fmt::Write;

        let mut line = format!(
            "TRACE: {:02X} | {:02X} {:02X} {:02X} |",
            self.pc,
            self.mem.read(self.pc).unwrap_or(0),
            self.mem.read(self.pc.wrapping_add(1)).unwrap_or(0),
            self.mem.read(self.pc.wrapping_add(2)).unwrap_or(0),
        );

        for value in self.regs.snapshot() {
            let _ = write!(line, " {:02X}", value);
        }

        line
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("pc", &self.pc)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("register error: {0}")]
    Register(#[from] RegisterError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("ALU error: {0}")]
    Alu(#[from] AluError),

    #[error("opcode {0} is reserved but not implemented")]
    UnimplementedOpcode(Opcode),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn make_program(instructions: &[Instruction]) -> Vec<u8> {
        instructions.iter().flat_map(decode::encode).collect()
    }

    fn run_to_halt(program: &[u8]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load_program(program).unwrap();
        cpu.run().unwrap();
        cpu
    }

    #[test]
    fn test_cpu_halt() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[1]).unwrap();

        let executed = cpu.run().unwrap();

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
        // PC sits just past the HLT byte
        assert_eq!(cpu.pc, 1);
    }

    #[test]
    fn test_print8_scenario() {
        // LDI R0,8; PRN R0; HLT as raw decimal bytes
        let mut cpu = run_to_halt(&[130, 0, 8, 71, 0, 1]);

        assert_eq!(cpu.take_output(), vec!["8"]);
        assert!(cpu.is_halted());
        assert_eq!(cpu.pc, 6);
    }

    #[test]
    fn test_mul_scenario() {
        // LDI R0,8; LDI R1,9; MUL R0,R1; PRN R0; HLT
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 8 },
            Instruction::Ldi { reg: 1, value: 9 },
            Instruction::Mul { a: 0, b: 1 },
            Instruction::Prn { reg: 0 },
            Instruction::Hlt,
        ]);
        let mut cpu = run_to_halt(&program);

        assert_eq!(cpu.take_output(), vec!["72"]);
    }

    #[test]
    fn test_prn_output_in_program_order() {
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 3 },
            Instruction::Prn { reg: 0 },
            Instruction::Ldi { reg: 0, value: 1 },
            Instruction::Prn { reg: 0 },
            Instruction::Ldi { reg: 2, value: 200 },
            Instruction::Prn { reg: 2 },
            Instruction::Hlt,
        ]);
        let mut cpu = run_to_halt(&program);

        assert_eq!(cpu.take_output(), vec!["3", "1", "200"]);
    }

    #[test]
    fn test_push_pop_identity() {
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 42 },
            Instruction::Push { reg: 0 },
            Instruction::Ldi { reg: 0, value: 0 },
            Instruction::Pop { reg: 0 },
            Instruction::Hlt,
        ]);
        let cpu = run_to_halt(&program);

        assert_eq!(cpu.regs.get(0).unwrap(), 42);
        assert_eq!(cpu.regs.get(Registers::SP).unwrap(), Registers::STACK_INIT);
    }

    #[test]
    fn test_stack_is_lifo() {
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 1 },
            Instruction::Ldi { reg: 1, value: 2 },
            Instruction::Push { reg: 0 },
            Instruction::Push { reg: 1 },
            Instruction::Pop { reg: 2 },
            Instruction::Pop { reg: 3 },
            Instruction::Hlt,
        ]);
        let cpu = run_to_halt(&program);

        assert_eq!(cpu.regs.get(2).unwrap(), 2);
        assert_eq!(cpu.regs.get(3).unwrap(), 1);
    }

    #[test]
    fn test_call_ret_return_address() {
        // 0: LDI R0,10      (130,0,10)
        // 3: LDI R1,13      (130,1,13)   R1 holds the subroutine address
        // 6: CALL R1        (80,1)       return address is 8
        // 8: PRN R0         (71,0)
        // 10: HLT           (1)
        // 11-12: padding
        // 13: ADD R0,R0     (160,0,0)
        // 16: RET           (17)
        let program = [
            130, 0, 10, 130, 1, 13, 80, 1, 71, 0, 1, 0, 0, 160, 0, 0, 17,
        ];
        let mut cpu = run_to_halt(&program);

        assert_eq!(cpu.take_output(), vec!["20"]);
        assert_eq!(cpu.regs.get(Registers::SP).unwrap(), Registers::STACK_INIT);
    }

    #[test]
    fn test_jmp_unconditional() {
        // 0: LDI R0,5 ; 3: JMP R0 -> skips the LDI at 5 ; 5: HLT
        let program = [130, 0, 5, 84, 0, 1];
        let cpu = run_to_halt(&program);

        assert!(cpu.is_halted());
        assert_eq!(cpu.cycles, 3);
    }

    #[test]
    fn test_jeq_taken() {
        // CMP R0,R1 with both zero sets equal; JEQ to R2 jumps over the
        // LDI/PRN pair that would otherwise print.
        let program = make_program(&[
            Instruction::Ldi { reg: 2, value: 13 }, // 0-2: HLT address
            Instruction::Cmp { a: 0, b: 1 },        // 3-5
            Instruction::Jeq { reg: 2 },            // 6-7: taken
            Instruction::Ldi { reg: 3, value: 99 }, // 8-10: skipped
            Instruction::Prn { reg: 3 },            // 11-12: skipped
            Instruction::Hlt,                       // 13
        ]);
        let mut cpu = run_to_halt(&program);

        assert!(cpu.take_output().is_empty());
        assert_eq!(cpu.regs.get(3).unwrap(), 0);
    }

    #[test]
    fn test_jeq_not_taken_falls_through() {
        // LDI R0,1 makes R0 > R1, CMP clears equal, JEQ falls through
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 1 },  // 0-2
            Instruction::Ldi { reg: 2, value: 13 }, // 3-5
            Instruction::Cmp { a: 0, b: 1 },        // 6-8
            Instruction::Jeq { reg: 2 },            // 9-10
            Instruction::Prn { reg: 0 },            // 11-12: executed
            Instruction::Hlt,                       // 13
        ]);
        let mut cpu = run_to_halt(&program);

        assert_eq!(cpu.take_output(), vec!["1"]);
    }

    #[test]
    fn test_jne_taken_when_unequal() {
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 1 },  // 0-2
            Instruction::Ldi { reg: 2, value: 13 }, // 3-5
            Instruction::Cmp { a: 0, b: 1 },        // 6-8
            Instruction::Jne { reg: 2 },            // 9-10: taken
            Instruction::Prn { reg: 0 },            // 11-12: skipped
            Instruction::Hlt,                       // 13
        ]);
        let mut cpu = run_to_halt(&program);

        assert!(cpu.take_output().is_empty());
    }

    #[test]
    fn test_legacy_flag_source_feeds_jeq() {
        // No CMP at all: the LDI writes recompute flags from R0/R1, and
        // JEQ acts on that legacy result.
        let program = make_program(&[
            Instruction::Ldi { reg: 0, value: 7 },  // 0-2
            Instruction::Ldi { reg: 1, value: 7 },  // 3-5: R0 == R1 -> equal
            Instruction::Ldi { reg: 2, value: 13 }, // 6-8: recompute, still equal
            Instruction::Jeq { reg: 2 },            // 9-10: taken
            Instruction::Prn { reg: 0 },            // 11-12: skipped
            Instruction::Hlt,                       // 13
        ]);
        let mut cpu = run_to_halt(&program);

        assert!(cpu.take_output().is_empty());
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_unimplemented_opcode_fails_loudly() {
        let mut cpu = Cpu::new();
        // NOP is a recognized encoding with no execute path
        cpu.load_program(&[0, 1]).unwrap();

        let err = cpu.run().unwrap_err();
        assert_eq!(err, CpuError::UnimplementedOpcode(Opcode::Nop));
        assert_eq!(cpu.state, CpuState::Error);
    }

    #[test]
    fn test_reserved_alu_opcode_is_unsupported_operation() {
        let mut cpu = Cpu::new();
        // SUB R0,R1: valid encoding, but the ALU only wires ADD/MUL/CMP
        cpu.load_program(&[0b1010_0001, 0, 1, 1]).unwrap();

        let err = cpu.run().unwrap_err();
        assert_eq!(err, CpuError::Alu(AluError::Unsupported(Opcode::Sub)));
    }

    #[test]
    fn test_unknown_byte_fails() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0xFF]).unwrap();

        let err = cpu.run().unwrap_err();
        assert_eq!(err, CpuError::Decode(DecodeError::UnknownOpcode(0xFF)));
    }

    #[test]
    fn test_bad_register_index_fails() {
        let mut cpu = Cpu::new();
        // LDI R9,1 names a register that does not exist
        cpu.load_program(&[130, 9, 1]).unwrap();

        let err = cpu.run().unwrap_err();
        assert_eq!(
            err,
            CpuError::Register(RegisterError::IndexOutOfRange(9))
        );
    }

    #[test]
    fn test_zeroed_memory_is_not_silently_nopped() {
        let mut cpu = Cpu::new();
        // Empty RAM decodes as NOP, which has no wired execute path, so a
        // program that runs into it stops with an error instead of spinning.
        let err = cpu.run().unwrap_err();
        assert_eq!(err, CpuError::UnimplementedOpcode(Opcode::Nop));
    }

    #[test]
    fn test_step_after_halt_rejected() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[1]).unwrap();
        cpu.run().unwrap();

        let err = cpu.step().unwrap_err();
        assert_eq!(err, CpuError::NotRunning(CpuState::Halted));
    }

    #[test]
    fn test_run_limited_stops_at_budget() {
        let mut cpu = Cpu::new();
        // Tight infinite loop: LDI R0,0; JMP R0
        cpu.load_program(&[130, 0, 0, 84, 0]).unwrap();

        let executed = cpu.run_limited(10).unwrap();

        assert_eq!(executed, 10);
        assert!(cpu.is_running());
    }

    #[test]
    fn test_trace_shape() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[130, 0, 8, 71, 0, 1]).unwrap();

        let line = cpu.trace();
        assert!(line.starts_with("TRACE: 00 | 82 00 08 |"));
        // 8 register fields follow the second bar
        let regs_part = line.rsplit('|').next().unwrap();
        assert_eq!(regs_part.split_whitespace().count(), 8);
    }

    proptest! {
        #[test]
        fn prop_push_pop_roundtrip(value: u8, reg in 0u8..5) {
            let program = make_program(&[
                Instruction::Ldi { reg, value },
                Instruction::Push { reg },
                Instruction::Ldi { reg, value: 0 },
                Instruction::Pop { reg },
                Instruction::Hlt,
            ]);
            let cpu = run_to_halt(&program);

            prop_assert_eq!(cpu.regs.get(reg).unwrap(), value as u16);
            prop_assert_eq!(
                cpu.regs.get(Registers::SP).unwrap(),
                Registers::STACK_INIT
            );
        }

        #[test]
        fn prop_ldi_prn_echoes_immediates(values in proptest::collection::vec(any::<u8>(), 1..8)) {
            let mut instrs = Vec::new();
            for &v in &values {
                instrs.push(Instruction::Ldi { reg: 2, value: v });
                instrs.push(Instruction::Prn { reg: 2 });
            }
            instrs.push(Instruction::Hlt);

            let mut cpu = run_to_halt(&make_program(&instrs));

            let expected: Vec<String> =
                values.iter().map(|v| v.to_string()).collect();
            prop_assert_eq!(cpu.take_output(), expected);
        }
    }
}
