//! Error types for the process subsystem.

use thiserror::Error;

/// Runtime faults raised during instruction execution.
///
/// A fault never escapes [`Process::step`](crate::process::vm::Process::step):
/// the VM renders it as a `Segmentation Fault (Core Dumped)` diagnostic on the
/// process stdout and degrades the process to `Terminated`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Fault {
    /// Memory read whose range leaves the process image.
    #[error("out of bounds read at address {got} (memory size {max})")]
    OutOfBoundsRead { got: usize, max: usize },
    /// Memory write whose range leaves the process image.
    #[error("out of bounds write at address {got} (memory size {max})")]
    OutOfBoundsWrite { got: usize, max: usize },
    /// Negative or non-finite value used as a memory address.
    #[error("invalid address {value}")]
    InvalidAddress { value: f64 },
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Jump target outside the instruction stream.
    #[error("jump target {target} out of range (code length {len})")]
    BadJumpTarget { target: usize, len: usize },
    /// Instruction popped from an empty evaluation stack.
    #[error("evaluation stack underflow on {mnemonic}")]
    StackUnderflow { mnemonic: &'static str },
    /// Instruction encoded without its required argument.
    #[error("missing operand for {mnemonic}")]
    MissingOperand { mnemonic: &'static str },
}

/// Errors raised while encoding or decoding an executable artifact.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ArtifactError {
    /// Input ended before the magic header was read.
    #[error("truncated")]
    Truncated,
    /// Magic header does not identify an executable artifact.
    #[error("bad magic")]
    BadMagic,
    /// Artifact was written by an incompatible format version.
    #[error("unsupported version")]
    UnsupportedVersion,
    /// Unknown opcode byte in the instruction stream.
    #[error("invalid opcode: {opcode:#04x}")]
    InvalidOpcode { opcode: u8 },
    /// Payload failed to decode.
    #[error("malformed artifact payload")]
    Malformed,
    /// Bytes remained after the payload was decoded.
    #[error("trailing bytes")]
    TrailingBytes,
}
