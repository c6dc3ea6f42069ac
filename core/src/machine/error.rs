use thiserror::Error;

use crate::isa::Opcode;

/// Everything that can stop the machine mid-run.
///
/// `Halt` and `BufferEmpty` are ordinary stop conditions: `simulate`
/// catches them and returns a normal report. The rest are fatal faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("stack overflow")]
    StackOverflow,
    #[error("stack underflow")]
    StackUnderflow,
    #[error("IR latched a data word: {0}")]
    DataAsInstruction(i32),
    #[error("TOS latched an instruction record: {0}")]
    InstructionAsData(Opcode),
    #[error("microcode dispatch failed: IR holds no decodable instruction")]
    MicrocodeJumpFail,
    #[error("input buffer was empty on fetch")]
    BufferEmpty,
    #[error("halt")]
    Halt,
    #[error("address {0} lies outside memory")]
    AddressOutOfRange(i32),
    #[error("division by zero")]
    DivisionByZero,
}
