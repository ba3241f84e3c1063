//! VM fault conditions.

use nexus_derive::Error;

/// Errors that can occur during script execution.
///
/// Every variant is a checked fault: the VM stops, the transaction's storage
/// changes are discarded, and the reason propagates into the failed result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// Unknown opcode byte encountered in the script.
    #[error("invalid opcode: {0}")]
    InvalidOpcode(u8),
    /// Script ended in the middle of an instruction.
    #[error("unexpected end of script")]
    EndOfScript,
    /// Register index outside the frame's register file.
    #[error("register index {0} out of bounds")]
    InvalidRegister(u8),
    /// Pop from an empty evaluation stack.
    #[error("stack underflow")]
    StackUnderflow,
    /// A value had the wrong type for the attempted operation.
    #[error("expected {expected} value, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Jump or call target outside the script.
    #[error("jump target {0} out of range")]
    JumpOutOfRange(i64),
    /// Operand payload exceeded its opcode-specific limit.
    #[error("{opcode} payload of {len} bytes exceeds limit of {max}")]
    OperandTooLarge {
        opcode: &'static str,
        len: usize,
        max: usize,
    },
    /// A numeric operand did not fit the operation (shift counts, lengths).
    #[error("numeric operand out of range")]
    NumberOutOfRange,
    /// Byte-slice operation past the end of the value.
    #[error("slice of {requested} bytes exceeds value of {available} bytes")]
    SliceOutOfRange { requested: usize, available: usize },
    /// Struct field lookup failed.
    #[error("struct has no field named {0}")]
    MissingField(String),
    /// Call stack exceeded its depth limit.
    #[error("call stack overflow")]
    CallStackOverflow,
    /// Cumulative gas exceeded the transaction limit.
    #[error("out of gas: used {used}, limit {limit}")]
    OutOfGas { used: u64, limit: u64 },
    /// EXTCALL named a method the host does not provide.
    #[error("unknown interop method: {0}")]
    UnknownInterop(String),
    /// CTX referenced an address with no contract behind it.
    #[error("no contract found at context address {0}")]
    UnknownContext(String),
    /// A contract was called with a method it does not expose.
    #[error("contract has no method named {0}")]
    UnknownMethod(String),
    /// Explicit abort: THROW payloads and failed runtime assertions.
    #[error("{0}")]
    Aborted(String),
}
