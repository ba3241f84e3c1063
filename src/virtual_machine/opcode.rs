//! Instruction set definitions.
//!
//! The [`for_each_opcode!`](crate::for_each_opcode) macro holds the canonical
//! opcode table (value, mnemonic, gas cost) and invokes a callback macro for
//! code generation, so the interpreter, the disassembler, and the script
//! builder share one definition.
//!
//! # Bytecode Format
//!
//! Scripts are flat byte streams. Each instruction is one opcode byte
//! followed by its operands: register indices are single bytes, jump offsets
//! are signed 16-bit little-endian, call targets unsigned 16-bit, and
//! variable-length payloads use the 0xFD/0xFE/0xFF count prefix convention.

use crate::virtual_machine::errors::VmError;

/// Invokes a callback macro with the complete opcode definition list.
#[macro_export]
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            /// NOP ; does nothing
            Nop = 0x00, "NOP", 0,
            /// MOVE src, dst ; dst = src, src becomes none
            Move = 0x01, "MOVE", 1,
            /// COPY src, dst ; dst = src
            Copy = 0x02, "COPY", 1,
            /// SWAP a, b ; exchanges two registers
            Swap = 0x03, "SWAP", 1,
            /// PUSH src ; pushes src onto the evaluation stack
            Push = 0x04, "PUSH", 1,
            /// POP dst ; pops the top of the evaluation stack into dst
            Pop = 0x05, "POP", 1,
            /// LOAD dst, type, payload ; loads a literal into dst
            Load = 0x06, "LOAD", 2,
            /// ADD a, b, dst ; dst = a + b
            Add = 0x10, "ADD", 1,
            /// SUB a, b, dst ; dst = a - b
            Sub = 0x11, "SUB", 1,
            /// MUL a, b, dst ; dst = a * b
            Mul = 0x12, "MUL", 1,
            /// DIV a, b, dst ; dst = a / b, faults when b = 0
            Div = 0x13, "DIV", 1,
            /// MOD a, b, dst ; dst = a % b, faults when b = 0
            Mod = 0x14, "MOD", 1,
            /// SHL a, b, dst ; dst = a << b
            Shl = 0x15, "SHL", 1,
            /// SHR a, b, dst ; dst = a >> b
            Shr = 0x16, "SHR", 1,
            /// MIN a, b, dst ; dst = min(a, b)
            Min = 0x17, "MIN", 1,
            /// MAX a, b, dst ; dst = max(a, b)
            Max = 0x18, "MAX", 1,
            /// INC reg ; reg = reg + 1
            Inc = 0x20, "INC", 1,
            /// DEC reg ; reg = reg - 1
            Dec = 0x21, "DEC", 1,
            /// NEGATE src, dst ; dst = -src
            Negate = 0x22, "NEGATE", 1,
            /// ABS src, dst ; dst = |src|
            Abs = 0x23, "ABS", 1,
            /// SIGN src, dst ; dst = -1, 0 or 1
            Sign = 0x24, "SIGN", 1,
            /// NOT src, dst ; dst = !src
            Not = 0x25, "NOT", 1,
            /// SIZE src, dst ; dst = byte length of src
            Size = 0x26, "SIZE", 1,
            /// AND a, b, dst ; dst = a && b
            And = 0x30, "AND", 1,
            /// OR a, b, dst ; dst = a || b
            Or = 0x31, "OR", 1,
            /// XOR a, b, dst ; dst = a ^ b
            Xor = 0x32, "XOR", 1,
            /// EQUAL a, b, dst ; dst = (a == b)
            Equal = 0x33, "EQUAL", 1,
            /// LT a, b, dst ; dst = (a < b)
            Lt = 0x34, "LT", 1,
            /// LTE a, b, dst ; dst = (a <= b)
            Lte = 0x35, "LTE", 1,
            /// GT a, b, dst ; dst = (a > b)
            Gt = 0x36, "GT", 1,
            /// GTE a, b, dst ; dst = (a >= b)
            Gte = 0x37, "GTE", 1,
            /// CAT a, b, dst ; dst = a ++ b as bytes
            Cat = 0x40, "CAT", 1,
            /// LEFT src, dst, len ; dst = first len bytes of src
            Left = 0x41, "LEFT", 1,
            /// RIGHT src, dst, len ; dst = last len bytes of src
            Right = 0x42, "RIGHT", 1,
            /// JMP offset ; relative jump
            Jmp = 0x50, "JMP", 1,
            /// JMPIF cond, offset ; jump when cond is true
            JmpIf = 0x51, "JMPIF", 1,
            /// JMPNOT cond, offset ; jump when cond is false
            JmpNot = 0x52, "JMPNOT", 1,
            /// CALL regcount, target ; pushes a frame copying the first regcount registers
            Call = 0x53, "CALL", 2,
            /// RET ; unwinds one frame, halts when none remain
            Ret = 0x54, "RET", 0,
            /// THROW payload ; faults with the payload as reason
            Throw = 0x55, "THROW", 1,
            /// CTX src, dst ; builds a context from the 33-byte key in src
            Ctx = 0x60, "CTX", 5,
            /// SWITCH src ; transfers control to the context in src
            Switch = 0x61, "SWITCH", 10,
            /// EXTCALL src ; invokes the host method named in src
            ExtCall = 0x62, "EXTCALL", 3,
            /// THIS dst ; dst = context of the active contract
            This = 0x63, "THIS", 1,
            /// PUT value, map, key ; map[key] = value
            Put = 0x70, "PUT", 2,
            /// GET map, dst, key ; dst = map[key]
            Get = 0x71, "GET", 2,
        }
    };
}

macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $value:literal, $mnemonic:literal, $gas:expr
        ),* $(,)?
    ) => {
        /// A single VM instruction.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $value,
            )*
        }

        impl TryFrom<u8> for Opcode {
            type Error = VmError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok(Opcode::$name), )*
                    other => Err(VmError::InvalidOpcode(other)),
                }
            }
        }

        impl Opcode {
            /// Returns the assembly mnemonic for this opcode.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Returns the gas charged before dispatching this opcode.
            pub const fn gas_cost(&self) -> u64 {
                match self {
                    $( Opcode::$name => $gas, )*
                }
            }
        }
    };
}

for_each_opcode!(define_opcodes);
