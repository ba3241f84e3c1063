//! Script disassembler for inspection and debugging.
//!
//! Decodes the same flat byte stream the interpreter executes into a list of
//! [`Instruction`]s with structured operands.

use crate::virtual_machine::errors::VmError;
use crate::virtual_machine::opcode::Opcode;
use crate::virtual_machine::script::ScriptReader;
use std::fmt;

/// A decoded operand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    /// Register index.
    Reg(u8),
    /// Literal type tag (LOAD).
    Type(u8),
    /// Signed jump offset.
    Offset(i16),
    /// Absolute call target.
    Target(u16),
    /// Small immediate (lengths, register counts).
    Imm(u64),
    /// Raw payload bytes.
    Data(Vec<u8>),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "r{}", reg),
            Operand::Type(tag) => write!(f, "t{}", tag),
            Operand::Offset(offset) => write!(f, "{:+}", offset),
            Operand::Target(target) => write!(f, "@{}", target),
            Operand::Imm(value) => write!(f, "{}", value),
            Operand::Data(bytes) => {
                write!(f, "0x")?;
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// One decoded instruction with its script offset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub offset: usize,
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}: {}", self.offset, self.opcode.mnemonic())?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " {}", operand)?;
            } else {
                write!(f, ", {}", operand)?;
            }
        }
        Ok(())
    }
}

/// Decodes a whole script.
///
/// Fails on the same conditions that would fault the interpreter while
/// fetching: unknown opcodes and truncated operands.
pub fn disassemble(code: &[u8]) -> Result<Vec<Instruction>, VmError> {
    let mut reader = ScriptReader::new(code);
    let mut instructions = Vec::new();

    while !reader.at_end() {
        let offset = reader.ip();
        let opcode = Opcode::try_from(reader.read_u8()?)?;
        let operands = decode_operands(opcode, &mut reader)?;
        instructions.push(Instruction {
            offset,
            opcode,
            operands,
        });
    }

    Ok(instructions)
}

fn decode_operands(opcode: Opcode, reader: &mut ScriptReader) -> Result<Vec<Operand>, VmError> {
    use Opcode::*;

    let operands = match opcode {
        Nop | Ret => vec![],

        Push | Pop | Switch | ExtCall | This | Inc | Dec => {
            vec![Operand::Reg(reader.read_u8()?)]
        }

        Move | Copy | Swap | Negate | Abs | Sign | Not | Size | Ctx => vec![
            Operand::Reg(reader.read_u8()?),
            Operand::Reg(reader.read_u8()?),
        ],

        Add | Sub | Mul | Div | Mod | Shl | Shr | Min | Max | And | Or | Xor | Equal | Lt
        | Lte | Gt | Gte | Cat | Put | Get => vec![
            Operand::Reg(reader.read_u8()?),
            Operand::Reg(reader.read_u8()?),
            Operand::Reg(reader.read_u8()?),
        ],

        Load => {
            let reg = Operand::Reg(reader.read_u8()?);
            let ty = Operand::Type(reader.read_u8()?);
            let payload = reader.read_var_bytes(crate::virtual_machine::vm::MAX_LOAD_PAYLOAD, "LOAD")?;
            vec![reg, ty, Operand::Data(payload.to_vec())]
        }

        Left | Right => {
            let src = Operand::Reg(reader.read_u8()?);
            let dst = Operand::Reg(reader.read_u8()?);
            let len = Operand::Imm(reader.read_var_len()?);
            vec![src, dst, len]
        }

        Jmp => vec![Operand::Offset(reader.read_i16()?)],

        JmpIf | JmpNot => vec![
            Operand::Reg(reader.read_u8()?),
            Operand::Offset(reader.read_i16()?),
        ],

        Call => vec![
            Operand::Imm(reader.read_u8()? as u64),
            Operand::Target(reader.read_u16()?),
        ],

        Throw => {
            let payload = reader.read_var_bytes(crate::virtual_machine::vm::MAX_THROW_PAYLOAD, "THROW")?;
            vec![Operand::Data(payload.to_vec())]
        }
    };

    Ok(operands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::builder::ScriptBuilder;
    use crate::virtual_machine::value::VmValue;

    #[test]
    fn disassembles_builder_output() {
        let script = ScriptBuilder::new()
            .load(1, &VmValue::from(7u64))
            .load(2, &VmValue::from(3u64))
            .op3(Opcode::Add, 1, 2, 3)
            .push_reg(3)
            .emit(Opcode::Ret)
            .to_script();

        let instructions = disassemble(&script).unwrap();
        let opcodes: Vec<Opcode> = instructions.iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![
                Opcode::Load,
                Opcode::Load,
                Opcode::Add,
                Opcode::Push,
                Opcode::Ret
            ]
        );
    }

    #[test]
    fn offsets_are_monotonic() {
        let script = ScriptBuilder::new()
            .load(1, &VmValue::from(1u64))
            .push_reg(1)
            .to_script();
        let instructions = disassemble(&script).unwrap();
        assert_eq!(instructions[0].offset, 0);
        assert!(instructions[1].offset > instructions[0].offset);
    }

    #[test]
    fn rejects_unknown_opcode() {
        assert!(matches!(
            disassemble(&[0xEE]),
            Err(VmError::InvalidOpcode(0xEE))
        ));
    }

    #[test]
    fn rejects_truncated_instruction() {
        // ADD with only one of three register operands.
        assert!(matches!(
            disassemble(&[Opcode::Add as u8, 1]),
            Err(VmError::EndOfScript)
        ));
    }

    #[test]
    fn renders_readable_text() {
        let script = ScriptBuilder::new().op3(Opcode::Add, 1, 2, 3).to_script();
        let instructions = disassemble(&script).unwrap();
        assert_eq!(instructions[0].to_string(), "0000: ADD r1, r2, r3");
    }

    #[test]
    fn decodes_jump_offsets() {
        let script = ScriptBuilder::new().emit_jump(Opcode::Jmp, -4).to_script();
        let instructions = disassemble(&script).unwrap();
        assert_eq!(instructions[0].operands, vec![Operand::Offset(-4)]);
    }
}
