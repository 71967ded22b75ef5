use thiserror::Error;

use crate::bytecode::Word;

pub type VmResult<T> = std::result::Result<T, VmError>;

/// Faults raised while running bytecode. None of them is recovered in place.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("Stack overflow: capacity of {capacity} words exceeded")]
    StackOverflow { capacity: usize },
    #[error("Stack underflow at address {address}")]
    StackUnderflow { address: usize },
    #[error("Division by zero at address {address}")]
    DivisionByZero { address: usize },
    #[error("Shift amount {amount} out of range at address {address}")]
    InvalidShift { amount: Word, address: usize },
    #[error("Invalid opcode {word} at address {address}")]
    InvalidOpcode { word: Word, address: usize },
    #[error("Truncated instruction at address {address}")]
    TruncatedInstruction { address: usize },
    #[error("Invalid slot {slot} at address {address}")]
    InvalidSlot { slot: Word, address: usize },
    #[error("Invalid stack adjustment {count} at address {address}")]
    InvalidStackAdjust { count: Word, address: usize },
    #[error("Invalid jump target {target} at address {address}")]
    InvalidJumpTarget { target: isize, address: usize },
    #[error("Call depth limit of {limit} exceeded")]
    CallDepthExceeded { limit: usize },
    #[error("Execution ran past the end of the code at address {address} without returning")]
    FellOffEnd { address: usize },
}
