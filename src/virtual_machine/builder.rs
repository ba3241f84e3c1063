//! Script construction helpers.
//!
//! [`ScriptBuilder`] emits well-formed opcode streams for genesis
//! transactions, wallets, and tests. The calling conventions live here:
//! contract calls push arguments in reverse followed by the method name, then
//! CTX/SWITCH into the contract; interop calls do the same through EXTCALL.

use crate::types::address::Address;
use crate::types::encoding::write_var_len;
use crate::virtual_machine::opcode::Opcode;
use crate::virtual_machine::value::{VmType, VmValue};

/// Incremental builder for VM scripts.
///
/// Register 0 is used as scratch for pushed literals and interop names,
/// register 1 and 2 for contract context loading.
#[derive(Debug, Default, Clone)]
pub struct ScriptBuilder {
    data: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current script length; the position the next instruction lands at.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Emits a bare opcode with no operands.
    pub fn emit(&mut self, op: Opcode) -> &mut Self {
        self.data.push(op as u8);
        self
    }

    /// Emits an opcode with a single register operand.
    pub fn emit_op1(&mut self, op: Opcode, reg: u8) -> &mut Self {
        self.emit(op);
        self.data.push(reg);
        self
    }

    /// Emits an opcode with two register operands.
    pub fn op2(&mut self, op: Opcode, a: u8, b: u8) -> &mut Self {
        self.emit(op);
        self.data.push(a);
        self.data.push(b);
        self
    }

    /// Emits an opcode with three register operands.
    pub fn op3(&mut self, op: Opcode, a: u8, b: u8, c: u8) -> &mut Self {
        self.emit(op);
        self.data.push(a);
        self.data.push(b);
        self.data.push(c);
        self
    }

    /// Loads a literal into `reg`.
    ///
    /// Values without a literal form (structs, contexts) load as none.
    pub fn load(&mut self, reg: u8, value: &VmValue) -> &mut Self {
        let (ty, payload) = value
            .to_literal()
            .unwrap_or((VmType::None, Vec::new()));
        self.emit(Opcode::Load);
        self.data.push(reg);
        self.data.push(ty as u8);
        write_var_len(&mut self.data, payload.len() as u64);
        self.data.extend_from_slice(&payload);
        self
    }

    /// Pushes the value in `reg` onto the evaluation stack.
    pub fn push_reg(&mut self, reg: u8) -> &mut Self {
        self.emit_op1(Opcode::Push, reg)
    }

    /// Loads a literal through the scratch register and pushes it.
    pub fn push_value(&mut self, value: &VmValue) -> &mut Self {
        self.load(0, value);
        self.push_reg(0)
    }

    /// Emits LEFT/RIGHT with a var-length length operand.
    pub fn op_slice(&mut self, op: Opcode, src: u8, dst: u8, len: u64) -> &mut Self {
        self.emit(op);
        self.data.push(src);
        self.data.push(dst);
        write_var_len(&mut self.data, len);
        self
    }

    /// Emits JMP with a signed offset relative to the opcode byte.
    pub fn emit_jump(&mut self, op: Opcode, offset: i16) -> &mut Self {
        self.emit(op);
        self.data.extend_from_slice(&offset.to_le_bytes());
        self
    }

    /// Emits JMPIF/JMPNOT with a condition register and relative offset.
    pub fn emit_cond_jump(&mut self, op: Opcode, cond_reg: u8, offset: i16) -> &mut Self {
        self.emit(op);
        self.data.push(cond_reg);
        self.data.extend_from_slice(&offset.to_le_bytes());
        self
    }

    /// Emits CALL copying the first `reg_count` registers into the new frame.
    pub fn emit_call(&mut self, reg_count: u8, target: u16) -> &mut Self {
        self.emit(Opcode::Call);
        self.data.push(reg_count);
        self.data.extend_from_slice(&target.to_le_bytes());
        self
    }

    /// Rewrites the target of a CALL emitted at `call_pos`.
    pub fn patch_call_target(&mut self, call_pos: usize, target: u16) -> &mut Self {
        let bytes = target.to_le_bytes();
        self.data[call_pos + 2] = bytes[0];
        self.data[call_pos + 3] = bytes[1];
        self
    }

    /// Emits THROW with the given payload as the fault reason.
    pub fn throw(&mut self, payload: &[u8]) -> &mut Self {
        self.emit(Opcode::Throw);
        write_var_len(&mut self.data, payload.len() as u64);
        self.data.extend_from_slice(payload);
        self
    }

    /// Emits EXTCALL reading the method name from `reg`.
    pub fn emit_extcall(&mut self, reg: u8) -> &mut Self {
        self.emit_op1(Opcode::ExtCall, reg)
    }

    /// Emits a full contract call: arguments, method name, CTX and SWITCH.
    pub fn call_contract(&mut self, contract: &str, method: &str, args: &[VmValue]) -> &mut Self {
        for arg in args.iter().rev() {
            self.push_value(arg);
        }
        self.push_value(&VmValue::String(method.to_string()));
        self.load(1, &VmValue::Address(Address::system(contract)));
        self.op2(Opcode::Ctx, 1, 2);
        self.emit_op1(Opcode::Switch, 2)
    }

    /// Emits a host interop call: arguments, then EXTCALL by name.
    pub fn call_interop(&mut self, name: &str, args: &[VmValue]) -> &mut Self {
        for arg in args.iter().rev() {
            self.push_value(arg);
        }
        self.load(0, &VmValue::String(name.to_string()));
        self.emit_extcall(0)
    }

    /// Finishes the script.
    pub fn to_script(&self) -> Vec<u8> {
        self.data.clone()
    }
}
