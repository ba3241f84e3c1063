//! Core virtual machine implementation.
//!
//! The VM executes scripts using a register architecture: each call frame
//! holds 32 registers, an auxiliary evaluation stack carries values between
//! frames and into host calls, and every opcode is gas-metered through the
//! host before dispatch. All integer arithmetic is arbitrary-precision.

use crate::types::address::Address;
use crate::virtual_machine::errors::VmError;
use crate::virtual_machine::opcode::Opcode;
use crate::virtual_machine::script::ScriptReader;
use crate::virtual_machine::value::{VmType, VmValue};
use num_bigint::Sign;
use num_traits::Signed;

/// Registers per call frame.
pub const REGISTER_COUNT: usize = 32;

/// Maximum depth of the in-script call stack.
pub const MAX_CALL_DEPTH: usize = 128;

/// Maximum LOAD literal payload in bytes.
pub const MAX_LOAD_PAYLOAD: usize = 4095;

/// Maximum THROW payload in bytes.
pub const MAX_THROW_PAYLOAD: usize = 1024;

/// Execution outcome of a script run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionState {
    Running,
    /// Normal completion; storage changes commit.
    Halt,
    /// Terminal failure; storage changes are discarded.
    Fault,
}

/// Host capabilities surfaced to executing scripts.
///
/// The transaction runtime implements this; unit tests provide lightweight
/// stand-ins. Gas metering lives here so the host decides when metering is
/// bypassed.
pub trait InteropHost {
    /// Charges gas before an opcode dispatches. Errors fault the script.
    fn consume_gas(&mut self, amount: u64) -> Result<(), VmError>;

    /// Invokes a named host method (EXTCALL); arguments and results travel
    /// over the evaluation stack.
    fn invoke_interop(&mut self, name: &str, vm: &mut VM) -> Result<(), VmError>;

    /// Validates that a contract exists at `address` (CTX).
    fn resolve_context(&mut self, address: &Address) -> Result<(), VmError>;

    /// Transfers control into the context at `address` (SWITCH) and runs it
    /// to completion.
    fn enter_context(&mut self, address: &Address, vm: &mut VM) -> Result<(), VmError>;

    /// Address of the contract currently executing (THIS).
    fn active_address(&self) -> Address;
}

/// Call stack frame: return position plus a fresh register file.
struct Frame {
    return_ip: usize,
    registers: Vec<VmValue>,
}

impl Frame {
    fn new(return_ip: usize) -> Self {
        Self {
            return_ip,
            registers: vec![VmValue::None; REGISTER_COUNT],
        }
    }

    fn get(&self, idx: u8) -> Result<&VmValue, VmError> {
        self.registers
            .get(idx as usize)
            .ok_or(VmError::InvalidRegister(idx))
    }

    fn get_mut(&mut self, idx: u8) -> Result<&mut VmValue, VmError> {
        self.registers
            .get_mut(idx as usize)
            .ok_or(VmError::InvalidRegister(idx))
    }

    fn set(&mut self, idx: u8, value: VmValue) -> Result<(), VmError> {
        *self.get_mut(idx)? = value;
        Ok(())
    }

    fn take(&mut self, idx: u8) -> Result<VmValue, VmError> {
        Ok(std::mem::replace(self.get_mut(idx)?, VmValue::None))
    }
}

fn current(frames: &mut Vec<Frame>) -> Result<&mut Frame, VmError> {
    frames.last_mut().ok_or(VmError::StackUnderflow)
}

/// Bytecode virtual machine.
///
/// Owns the evaluation stack shared across frames and context switches; all
/// other execution state lives on the interpreter loop's own stack so nested
/// context entry is plain recursion through the host.
#[derive(Debug)]
pub struct VM {
    /// Evaluation stack, shared with host calls and switched-to contexts.
    pub stack: Vec<VmValue>,
    state: ExecutionState,
}

impl VM {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            state: ExecutionState::Running,
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn push(&mut self, value: VmValue) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Result<VmValue, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    pub fn peek(&self) -> Option<&VmValue> {
        self.stack.last()
    }

    /// Executes a script until completion or fault.
    ///
    /// On success the machine is in [`ExecutionState::Halt`]; any error leaves
    /// it in [`ExecutionState::Fault`] and the caller discards pending writes.
    pub fn run<H: InteropHost + ?Sized>(
        &mut self,
        code: &[u8],
        host: &mut H,
    ) -> Result<(), VmError> {
        let result = self.execute(code, host);
        self.state = match result {
            Ok(()) => ExecutionState::Halt,
            Err(_) => ExecutionState::Fault,
        };
        result
    }

    fn execute<H: InteropHost + ?Sized>(
        &mut self,
        code: &[u8],
        host: &mut H,
    ) -> Result<(), VmError> {
        let mut reader = ScriptReader::new(code);
        let mut frames: Vec<Frame> = vec![Frame::new(0)];

        while !reader.at_end() {
            let opcode_pos = reader.ip();
            let op = Opcode::try_from(reader.read_u8()?)?;
            host.consume_gas(op.gas_cost())?;

            match op {
                Opcode::Nop => {}

                Opcode::Move => {
                    let src = reader.read_u8()?;
                    let dst = reader.read_u8()?;
                    let frame = current(&mut frames)?;
                    let value = frame.take(src)?;
                    frame.set(dst, value)?;
                }

                Opcode::Copy => {
                    let src = reader.read_u8()?;
                    let dst = reader.read_u8()?;
                    let frame = current(&mut frames)?;
                    let value = frame.get(src)?.clone();
                    frame.set(dst, value)?;
                }

                Opcode::Swap => {
                    let a = reader.read_u8()?;
                    let b = reader.read_u8()?;
                    let frame = current(&mut frames)?;
                    frame.get(a)?;
                    frame.get(b)?;
                    frame.registers.swap(a as usize, b as usize);
                }

                Opcode::Push => {
                    let src = reader.read_u8()?;
                    let value = current(&mut frames)?.get(src)?.clone();
                    self.stack.push(value);
                }

                Opcode::Pop => {
                    let dst = reader.read_u8()?;
                    let value = self.pop()?;
                    current(&mut frames)?.set(dst, value)?;
                }

                Opcode::Load => {
                    let dst = reader.read_u8()?;
                    let ty = VmType::try_from(reader.read_u8()?)?;
                    let payload = reader.read_var_bytes(MAX_LOAD_PAYLOAD, "LOAD")?;
                    let value = VmValue::from_literal(ty, payload)?;
                    current(&mut frames)?.set(dst, value)?;
                }

                Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Mod
                | Opcode::Shl
                | Opcode::Shr
                | Opcode::Min
                | Opcode::Max => {
                    let src_a = reader.read_u8()?;
                    let src_b = reader.read_u8()?;
                    let dst = reader.read_u8()?;
                    let frame = current(&mut frames)?;
                    let a = frame.get(src_a)?.as_number()?;
                    let b_value = frame.get(src_b)?;
                    let result = match op {
                        Opcode::Add => a + b_value.as_number()?,
                        Opcode::Sub => a - b_value.as_number()?,
                        Opcode::Mul => a * b_value.as_number()?,
                        Opcode::Div => {
                            let b = b_value.as_number()?;
                            if b.sign() == Sign::NoSign {
                                return Err(VmError::DivisionByZero);
                            }
                            a / b
                        }
                        Opcode::Mod => {
                            let b = b_value.as_number()?;
                            if b.sign() == Sign::NoSign {
                                return Err(VmError::DivisionByZero);
                            }
                            a % b
                        }
                        Opcode::Shl => a << b_value.as_shift_amount()?,
                        Opcode::Shr => a >> b_value.as_shift_amount()?,
                        Opcode::Min => a.min(b_value.as_number()?),
                        Opcode::Max => a.max(b_value.as_number()?),
                        _ => unreachable!(),
                    };
                    frame.set(dst, VmValue::Number(result))?;
                }

                Opcode::Inc | Opcode::Dec => {
                    let reg = reader.read_u8()?;
                    let frame = current(&mut frames)?;
                    let n = frame.get(reg)?.as_number()?;
                    let n = if op == Opcode::Inc { n + 1 } else { n - 1 };
                    frame.set(reg, VmValue::Number(n))?;
                }

                Opcode::Negate | Opcode::Abs | Opcode::Sign => {
                    let src = reader.read_u8()?;
                    let dst = reader.read_u8()?;
                    let frame = current(&mut frames)?;
                    let n = frame.get(src)?.as_number()?;
                    let result = match op {
                        Opcode::Negate => -n,
                        Opcode::Abs => n.abs(),
                        Opcode::Sign => match n.sign() {
                            Sign::Minus => (-1).into(),
                            Sign::NoSign => 0.into(),
                            Sign::Plus => 1.into(),
                        },
                        _ => unreachable!(),
                    };
                    frame.set(dst, VmValue::Number(result))?;
                }

                Opcode::Not => {
                    let src = reader.read_u8()?;
                    let dst = reader.read_u8()?;
                    let frame = current(&mut frames)?;
                    let b = frame.get(src)?.as_bool()?;
                    frame.set(dst, VmValue::Bool(!b))?;
                }

                Opcode::Size => {
                    let src = reader.read_u8()?;
                    let dst = reader.read_u8()?;
                    let frame = current(&mut frames)?;
                    let len = frame.get(src)?.as_bytes()?.len();
                    frame.set(dst, VmValue::from(len as u64))?;
                }

                Opcode::And | Opcode::Or | Opcode::Xor => {
                    let src_a = reader.read_u8()?;
                    let src_b = reader.read_u8()?;
                    let dst = reader.read_u8()?;
                    let frame = current(&mut frames)?;
                    let a = frame.get(src_a)?.as_bool()?;
                    let b = frame.get(src_b)?.as_bool()?;
                    let result = match op {
                        Opcode::And => a && b,
                        Opcode::Or => a || b,
                        Opcode::Xor => a != b,
                        _ => unreachable!(),
                    };
                    frame.set(dst, VmValue::Bool(result))?;
                }

                Opcode::Equal => {
                    let src_a = reader.read_u8()?;
                    let src_b = reader.read_u8()?;
                    let dst = reader.read_u8()?;
                    let frame = current(&mut frames)?;
                    let equal = frame.get(src_a)? == frame.get(src_b)?;
                    frame.set(dst, VmValue::Bool(equal))?;
                }

                Opcode::Lt | Opcode::Lte | Opcode::Gt | Opcode::Gte => {
                    let src_a = reader.read_u8()?;
                    let src_b = reader.read_u8()?;
                    let dst = reader.read_u8()?;
                    let frame = current(&mut frames)?;
                    let a = frame.get(src_a)?.as_number()?;
                    let b = frame.get(src_b)?.as_number()?;
                    let result = match op {
                        Opcode::Lt => a < b,
                        Opcode::Lte => a <= b,
                        Opcode::Gt => a > b,
                        Opcode::Gte => a >= b,
                        _ => unreachable!(),
                    };
                    frame.set(dst, VmValue::Bool(result))?;
                }

                Opcode::Cat => {
                    let src_a = reader.read_u8()?;
                    let src_b = reader.read_u8()?;
                    let dst = reader.read_u8()?;
                    let frame = current(&mut frames)?;
                    let mut bytes = frame.get(src_a)?.as_bytes()?;
                    bytes.extend(frame.get(src_b)?.as_bytes()?);
                    frame.set(dst, VmValue::Bytes(bytes))?;
                }

                Opcode::Left | Opcode::Right => {
                    let src = reader.read_u8()?;
                    let dst = reader.read_u8()?;
                    let len = reader.read_var_len()? as usize;
                    let frame = current(&mut frames)?;
                    let bytes = frame.get(src)?.as_bytes()?;
                    if len > bytes.len() {
                        return Err(VmError::SliceOutOfRange {
                            requested: len,
                            available: bytes.len(),
                        });
                    }
                    let slice = if op == Opcode::Left {
                        bytes[..len].to_vec()
                    } else {
                        bytes[bytes.len() - len..].to_vec()
                    };
                    frame.set(dst, VmValue::Bytes(slice))?;
                }

                Opcode::Jmp => {
                    let offset = reader.read_i16()?;
                    Self::jump(&mut reader, opcode_pos, offset)?;
                }

                Opcode::JmpIf | Opcode::JmpNot => {
                    let cond_reg = reader.read_u8()?;
                    let offset = reader.read_i16()?;
                    let cond = current(&mut frames)?.get(cond_reg)?.as_bool()?;
                    if cond == (op == Opcode::JmpIf) {
                        Self::jump(&mut reader, opcode_pos, offset)?;
                    }
                }

                Opcode::Call => {
                    let reg_count = reader.read_u8()?;
                    let target = reader.read_u16()? as usize;
                    if reg_count as usize > REGISTER_COUNT {
                        return Err(VmError::InvalidRegister(reg_count));
                    }
                    if frames.len() >= MAX_CALL_DEPTH {
                        return Err(VmError::CallStackOverflow);
                    }
                    let mut frame = Frame::new(reader.ip());
                    {
                        let caller = current(&mut frames)?;
                        for i in 0..reg_count as usize {
                            frame.registers[i] = caller.registers[i].clone();
                        }
                    }
                    frames.push(frame);
                    reader.seek(target)?;
                }

                Opcode::Ret => {
                    match frames.pop() {
                        Some(frame) => {
                            if frames.is_empty() {
                                return Ok(());
                            }
                            // Register 0 is the result register; copy it back
                            // into the caller's frame.
                            let result = frame.registers[0].clone();
                            if let Some(caller) = frames.last_mut() {
                                caller.registers[0] = result;
                            }
                            reader.seek(frame.return_ip)?;
                        }
                        None => return Ok(()),
                    }
                }

                Opcode::Throw => {
                    let payload = reader.read_var_bytes(MAX_THROW_PAYLOAD, "THROW")?;
                    let reason = String::from_utf8_lossy(payload).into_owned();
                    return Err(VmError::Aborted(reason));
                }

                Opcode::Ctx => {
                    let src = reader.read_u8()?;
                    let dst = reader.read_u8()?;
                    let address = current(&mut frames)?.get(src)?.as_address()?;
                    host.resolve_context(&address)?;
                    current(&mut frames)?.set(dst, VmValue::Context(address))?;
                }

                Opcode::Switch => {
                    let src = reader.read_u8()?;
                    let address = match current(&mut frames)?.get(src)? {
                        VmValue::Context(address) => *address,
                        other => {
                            return Err(VmError::TypeMismatch {
                                expected: "context",
                                actual: other.kind(),
                            })
                        }
                    };
                    host.enter_context(&address, self)?;
                }

                Opcode::ExtCall => {
                    let src = reader.read_u8()?;
                    let name = current(&mut frames)?.get(src)?.as_string()?;
                    host.invoke_interop(&name, self)?;
                }

                Opcode::This => {
                    let dst = reader.read_u8()?;
                    let address = host.active_address();
                    current(&mut frames)?.set(dst, VmValue::Context(address))?;
                }

                Opcode::Put => {
                    let value_reg = reader.read_u8()?;
                    let map_reg = reader.read_u8()?;
                    let key_reg = reader.read_u8()?;
                    let frame = current(&mut frames)?;
                    let value = frame.get(value_reg)?.clone();
                    let key = frame.get(key_reg)?.as_string()?;
                    let map = frame.get_mut(map_reg)?;
                    if map.is_none() {
                        *map = VmValue::Struct(Vec::new());
                    }
                    map.set_field(&key, value)?;
                }

                Opcode::Get => {
                    let map_reg = reader.read_u8()?;
                    let dst = reader.read_u8()?;
                    let key_reg = reader.read_u8()?;
                    let frame = current(&mut frames)?;
                    let key = frame.get(key_reg)?.as_string()?;
                    let value = frame.get(map_reg)?.field(&key)?.clone();
                    frame.set(dst, value)?;
                }
            }
        }

        Ok(())
    }

    fn jump(reader: &mut ScriptReader, opcode_pos: usize, offset: i16) -> Result<(), VmError> {
        let target = opcode_pos as i64 + offset as i64;
        if target < 0 {
            return Err(VmError::JumpOutOfRange(target));
        }
        reader.seek(target as usize)
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::builder::ScriptBuilder;
    use num_bigint::BigInt;

    /// Minimal host: plain gas counter, one echo interop, no contexts.
    struct TestHost {
        used_gas: u64,
        max_gas: u64,
    }

    impl TestHost {
        fn new() -> Self {
            Self {
                used_gas: 0,
                max_gas: 10_000,
            }
        }

        fn with_limit(max_gas: u64) -> Self {
            Self { used_gas: 0, max_gas }
        }
    }

    impl InteropHost for TestHost {
        fn consume_gas(&mut self, amount: u64) -> Result<(), VmError> {
            self.used_gas += amount;
            if self.used_gas > self.max_gas {
                return Err(VmError::OutOfGas {
                    used: self.used_gas,
                    limit: self.max_gas,
                });
            }
            Ok(())
        }

        fn invoke_interop(&mut self, name: &str, vm: &mut VM) -> Result<(), VmError> {
            match name {
                "Test.Double" => {
                    let n = vm.pop()?.as_number()?;
                    vm.push(VmValue::Number(n * 2));
                    Ok(())
                }
                other => Err(VmError::UnknownInterop(other.to_string())),
            }
        }

        fn resolve_context(&mut self, address: &Address) -> Result<(), VmError> {
            Err(VmError::UnknownContext(address.to_string()))
        }

        fn enter_context(&mut self, address: &Address, _vm: &mut VM) -> Result<(), VmError> {
            Err(VmError::UnknownContext(address.to_string()))
        }

        fn active_address(&self) -> Address {
            Address::NULL
        }
    }

    fn run_script(script: &[u8]) -> Result<VM, VmError> {
        let mut vm = VM::new();
        let mut host = TestHost::new();
        vm.run(script, &mut host)?;
        Ok(vm)
    }

    fn result_number(vm: &VM) -> BigInt {
        vm.peek().expect("empty stack").as_number().expect("not a number")
    }

    #[test]
    fn empty_script_halts() {
        let vm = run_script(&[]).unwrap();
        assert_eq!(vm.state(), ExecutionState::Halt);
        assert!(vm.stack.is_empty());
    }

    #[test]
    fn load_push_roundtrip() {
        let script = ScriptBuilder::new()
            .load(1, &VmValue::from(1234u64))
            .push_reg(1)
            .to_script();
        let vm = run_script(&script).unwrap();
        assert_eq!(result_number(&vm), BigInt::from(1234));
    }

    #[test]
    fn arithmetic_add_sub_mul() {
        let script = ScriptBuilder::new()
            .load(1, &VmValue::from(20u64))
            .load(2, &VmValue::from(7u64))
            .op3(Opcode::Add, 1, 2, 3)
            .op3(Opcode::Sub, 3, 2, 4)
            .op3(Opcode::Mul, 4, 2, 5)
            .push_reg(5)
            .to_script();
        let vm = run_script(&script).unwrap();
        assert_eq!(result_number(&vm), BigInt::from(140));
    }

    #[test]
    fn division_by_zero_faults() {
        let script = ScriptBuilder::new()
            .load(1, &VmValue::from(1u64))
            .load(2, &VmValue::from(0u64))
            .op3(Opcode::Div, 1, 2, 3)
            .to_script();
        assert_eq!(run_script(&script).unwrap_err(), VmError::DivisionByZero);
    }

    #[test]
    fn bignum_multiplication_does_not_overflow() {
        let huge = BigInt::from(u64::MAX) * BigInt::from(u64::MAX);
        let script = ScriptBuilder::new()
            .load(1, &VmValue::Number(huge.clone()))
            .op3(Opcode::Mul, 1, 1, 2)
            .push_reg(2)
            .to_script();
        let vm = run_script(&script).unwrap();
        assert_eq!(result_number(&vm), &huge * &huge);
    }

    #[test]
    fn comparison_and_logic() {
        let script = ScriptBuilder::new()
            .load(1, &VmValue::from(3u64))
            .load(2, &VmValue::from(5u64))
            .op3(Opcode::Lt, 1, 2, 3)
            .op3(Opcode::Gte, 1, 2, 4)
            .op3(Opcode::Xor, 3, 4, 5)
            .push_reg(5)
            .to_script();
        let vm = run_script(&script).unwrap();
        assert_eq!(vm.peek().unwrap(), &VmValue::Bool(true));
    }

    #[test]
    fn move_clears_source_register() {
        let script = ScriptBuilder::new()
            .load(1, &VmValue::from(9u64))
            .op2(Opcode::Move, 1, 2)
            .push_reg(1)
            .to_script();
        let vm = run_script(&script).unwrap();
        assert_eq!(vm.peek().unwrap(), &VmValue::None);
    }

    #[test]
    fn bytes_cat_left_right() {
        let script = ScriptBuilder::new()
            .load(1, &VmValue::Bytes(vec![1, 2]))
            .load(2, &VmValue::Bytes(vec![3, 4, 5]))
            .op3(Opcode::Cat, 1, 2, 3)
            .op_slice(Opcode::Left, 3, 4, 4)
            .op_slice(Opcode::Right, 3, 5, 2)
            .push_reg(4)
            .push_reg(5)
            .to_script();
        let mut vm = run_script(&script).unwrap();
        assert_eq!(vm.pop().unwrap(), VmValue::Bytes(vec![4, 5]));
        assert_eq!(vm.pop().unwrap(), VmValue::Bytes(vec![1, 2, 3, 4]));
    }

    #[test]
    fn left_past_end_faults() {
        let script = ScriptBuilder::new()
            .load(1, &VmValue::Bytes(vec![1, 2]))
            .op_slice(Opcode::Left, 1, 2, 3)
            .to_script();
        assert!(matches!(
            run_script(&script).unwrap_err(),
            VmError::SliceOutOfRange { requested: 3, available: 2 }
        ));
    }

    #[test]
    fn jmp_skips_instructions() {
        // JMP (+offset over the THROW), leaving a clean halt.
        let mut builder = ScriptBuilder::new();
        builder.load(1, &VmValue::from(1u64));
        let jmp_pos = builder.len();
        // skip the jump itself (3 bytes) plus the THROW (6 bytes)
        builder.emit_jump(Opcode::Jmp, 3 + 6);
        builder.throw(b"dead");
        builder.push_reg(1);
        let vm = run_script(&builder.to_script()).unwrap();
        assert_eq!(result_number(&vm), BigInt::from(1));
        assert!(jmp_pos > 0);
    }

    #[test]
    fn jmpif_takes_branch_only_when_true() {
        // cond=false: fall through into pushing 7.
        let script = ScriptBuilder::new()
            .load(1, &VmValue::Bool(false))
            .load(2, &VmValue::from(7u64))
            .emit_cond_jump(Opcode::JmpIf, 1, 5 + 3)
            .push_reg(2)
            .to_script();
        let vm = run_script(&script).unwrap();
        assert_eq!(result_number(&vm), BigInt::from(7));
    }

    #[test]
    fn jump_out_of_range_faults() {
        let script = ScriptBuilder::new().emit_jump(Opcode::Jmp, -5).to_script();
        assert!(matches!(
            run_script(&script).unwrap_err(),
            VmError::JumpOutOfRange(_)
        ));
    }

    #[test]
    fn call_and_ret() {
        // Entry: load r0, call subroutine, push result, RET.
        // Subroutine at `target`: doubles r0 into r0 and returns.
        let mut builder = ScriptBuilder::new();
        builder.load(0, &VmValue::from(21u64));
        let call_pos = builder.len();
        builder.emit_call(1, 0); // target patched below
        builder.push_reg(0);
        builder.emit(Opcode::Ret);
        let target = builder.len();
        builder.op3(Opcode::Add, 0, 0, 0);
        builder.emit(Opcode::Ret);
        builder.patch_call_target(call_pos, target as u16);

        let vm = run_script(&builder.to_script()).unwrap();
        assert_eq!(result_number(&vm), BigInt::from(42));
    }

    #[test]
    fn call_copies_only_requested_registers() {
        let mut builder = ScriptBuilder::new();
        builder.load(0, &VmValue::from(1u64));
        builder.load(1, &VmValue::from(2u64));
        let call_pos = builder.len();
        builder.emit_call(1, 0); // copy just r0
        builder.emit(Opcode::Ret);
        let target = builder.len();
        builder.push_reg(0);
        builder.push_reg(1);
        builder.emit(Opcode::Ret);
        builder.patch_call_target(call_pos, target as u16);

        let mut vm = run_script(&builder.to_script()).unwrap();
        assert_eq!(vm.pop().unwrap(), VmValue::None);
        assert_eq!(vm.pop().unwrap().as_number().unwrap(), BigInt::from(1));
    }

    #[test]
    fn throw_faults_with_reason() {
        let script = ScriptBuilder::new().throw(b"boom").to_script();
        assert_eq!(
            run_script(&script).unwrap_err(),
            VmError::Aborted("boom".to_string())
        );
    }

    #[test]
    fn throw_payload_limit_enforced() {
        let mut builder = ScriptBuilder::new();
        builder.throw(&vec![b'x'; MAX_THROW_PAYLOAD + 1]);
        assert!(matches!(
            run_script(&builder.to_script()).unwrap_err(),
            VmError::OperandTooLarge { .. }
        ));
    }

    #[test]
    fn extcall_dispatches_to_host() {
        let script = ScriptBuilder::new()
            .push_value(&VmValue::from(21u64))
            .load(0, &VmValue::from("Test.Double"))
            .emit_extcall(0)
            .to_script();
        let vm = run_script(&script).unwrap();
        assert_eq!(result_number(&vm), BigInt::from(42));
    }

    #[test]
    fn unknown_interop_faults() {
        let script = ScriptBuilder::new()
            .load(0, &VmValue::from("No.Such.Method"))
            .emit_extcall(0)
            .to_script();
        assert!(matches!(
            run_script(&script).unwrap_err(),
            VmError::UnknownInterop(_)
        ));
    }

    #[test]
    fn unknown_context_faults() {
        let script = ScriptBuilder::new()
            .load(0, &VmValue::Address(Address::system("ghost")))
            .op2(Opcode::Ctx, 0, 1)
            .to_script();
        assert!(matches!(
            run_script(&script).unwrap_err(),
            VmError::UnknownContext(_)
        ));
    }

    #[test]
    fn put_get_struct_fields() {
        let script = ScriptBuilder::new()
            .load(1, &VmValue::from(99u64))
            .load(2, &VmValue::from("amount"))
            .op3(Opcode::Put, 1, 3, 2)
            .op3(Opcode::Get, 3, 4, 2)
            .push_reg(4)
            .to_script();
        let vm = run_script(&script).unwrap();
        assert_eq!(result_number(&vm), BigInt::from(99));
    }

    #[test]
    fn get_missing_field_faults() {
        let script = ScriptBuilder::new()
            .load(1, &VmValue::from(1u64))
            .load(2, &VmValue::from("a"))
            .load(3, &VmValue::from("b"))
            .op3(Opcode::Put, 1, 4, 2)
            .op3(Opcode::Get, 4, 5, 3)
            .to_script();
        assert!(matches!(
            run_script(&script).unwrap_err(),
            VmError::MissingField(_)
        ));
    }

    #[test]
    fn gas_exhaustion_faults() {
        let mut builder = ScriptBuilder::new();
        for _ in 0..100 {
            builder.load(1, &VmValue::from(1u64));
        }
        let mut vm = VM::new();
        let mut host = TestHost::with_limit(10);
        let err = vm.run(&builder.to_script(), &mut host).unwrap_err();
        assert!(matches!(err, VmError::OutOfGas { limit: 10, .. }));
        assert_eq!(vm.state(), ExecutionState::Fault);
    }

    #[test]
    fn nop_and_ret_are_free() {
        let script = ScriptBuilder::new().emit(Opcode::Nop).emit(Opcode::Nop).to_script();
        let mut vm = VM::new();
        let mut host = TestHost::new();
        vm.run(&script, &mut host).unwrap();
        assert_eq!(host.used_gas, 0);
    }

    #[test]
    fn stack_underflow_faults() {
        let script = ScriptBuilder::new().emit_op1(Opcode::Pop, 1).to_script();
        assert_eq!(run_script(&script).unwrap_err(), VmError::StackUnderflow);
    }

    #[test]
    fn invalid_opcode_faults() {
        assert_eq!(run_script(&[0xEE]).unwrap_err(), VmError::InvalidOpcode(0xEE));
    }

    #[test]
    fn truncated_operand_faults() {
        // LOAD with no operands.
        assert_eq!(run_script(&[Opcode::Load as u8]).unwrap_err(), VmError::EndOfScript);
    }
}
