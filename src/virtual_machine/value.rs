//! Dynamically typed VM values.
//!
//! A [`VmValue`] is a tagged union over every type a script can manipulate.
//! Conversion rules are explicit; anything lossy faults with a type mismatch
//! instead of guessing.

use crate::types::address::{Address, ADDRESS_LEN};
use crate::virtual_machine::errors::VmError;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

/// Literal type tags used by the LOAD opcode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum VmType {
    None = 0,
    Number = 1,
    Bool = 2,
    String = 3,
    Bytes = 4,
    Address = 5,
}

impl TryFrom<u8> for VmType {
    type Error = VmError;

    fn try_from(value: u8) -> Result<Self, VmError> {
        match value {
            0 => Ok(VmType::None),
            1 => Ok(VmType::Number),
            2 => Ok(VmType::Bool),
            3 => Ok(VmType::String),
            4 => Ok(VmType::Bytes),
            5 => Ok(VmType::Address),
            _ => Err(VmError::TypeMismatch {
                expected: "literal type tag",
                actual: "unknown tag",
            }),
        }
    }
}

/// A value held in a register or on the evaluation stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VmValue {
    /// Empty register.
    None,
    /// Arbitrary-precision signed integer.
    Number(BigInt),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Address(Address),
    /// Ordered field map.
    Struct(Vec<(String, VmValue)>),
    /// Reference to a contract context, produced by CTX.
    Context(Address),
}

impl VmValue {
    /// Returns the type name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            VmValue::None => "none",
            VmValue::Number(_) => "number",
            VmValue::Bool(_) => "bool",
            VmValue::String(_) => "string",
            VmValue::Bytes(_) => "bytes",
            VmValue::Address(_) => "address",
            VmValue::Struct(_) => "struct",
            VmValue::Context(_) => "context",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, VmValue::None)
    }

    fn mismatch(&self, expected: &'static str) -> VmError {
        VmError::TypeMismatch {
            expected,
            actual: self.kind(),
        }
    }

    /// Converts to a number. Bools map to 0/1, byte strings of up to 32 bytes
    /// decode as signed little-endian, decimal strings parse.
    pub fn as_number(&self) -> Result<BigInt, VmError> {
        match self {
            VmValue::Number(n) => Ok(n.clone()),
            VmValue::Bool(b) => Ok(BigInt::from(u8::from(*b))),
            VmValue::Bytes(bytes) => {
                if bytes.len() > 32 {
                    return Err(self.mismatch("number"));
                }
                Ok(BigInt::from_signed_bytes_le(bytes))
            }
            VmValue::String(s) => s.parse::<BigInt>().map_err(|_| self.mismatch("number")),
            _ => Err(self.mismatch("number")),
        }
    }

    /// Converts to a bool. Numbers are true when non-zero.
    pub fn as_bool(&self) -> Result<bool, VmError> {
        match self {
            VmValue::Bool(b) => Ok(*b),
            VmValue::Number(n) => Ok(!n.is_zero()),
            _ => Err(self.mismatch("bool")),
        }
    }

    /// Converts to a string.
    pub fn as_string(&self) -> Result<String, VmError> {
        match self {
            VmValue::String(s) => Ok(s.clone()),
            VmValue::Number(n) => Ok(n.to_string()),
            VmValue::Bool(b) => Ok(b.to_string()),
            VmValue::Bytes(bytes) => {
                String::from_utf8(bytes.clone()).map_err(|_| self.mismatch("string"))
            }
            _ => Err(self.mismatch("string")),
        }
    }

    /// Converts to raw bytes.
    pub fn as_bytes(&self) -> Result<Vec<u8>, VmError> {
        match self {
            VmValue::Bytes(bytes) => Ok(bytes.clone()),
            VmValue::String(s) => Ok(s.as_bytes().to_vec()),
            VmValue::Address(addr) => Ok(addr.to_vec()),
            VmValue::Number(n) => Ok(n.to_signed_bytes_le()),
            _ => Err(self.mismatch("bytes")),
        }
    }

    /// Converts to an address. Raw 33-byte values qualify.
    pub fn as_address(&self) -> Result<Address, VmError> {
        match self {
            VmValue::Address(addr) => Ok(*addr),
            VmValue::Bytes(bytes) if bytes.len() == ADDRESS_LEN => {
                Ok(Address::from_slice(bytes).ok_or(self.mismatch("address"))?)
            }
            _ => Err(self.mismatch("address")),
        }
    }

    /// Reads a struct field, faulting when absent or not a struct.
    pub fn field(&self, name: &str) -> Result<&VmValue, VmError> {
        match self {
            VmValue::Struct(fields) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value)
                .ok_or_else(|| VmError::MissingField(name.to_string())),
            _ => Err(self.mismatch("struct")),
        }
    }

    /// Sets a struct field, replacing an existing entry of the same name.
    pub fn set_field(&mut self, name: &str, value: VmValue) -> Result<(), VmError> {
        match self {
            VmValue::Struct(fields) => {
                if let Some(entry) = fields.iter_mut().find(|(field, _)| field == name) {
                    entry.1 = value;
                } else {
                    fields.push((name.to_string(), value));
                }
                Ok(())
            }
            _ => Err(self.mismatch("struct")),
        }
    }

    /// Decodes a literal payload as emitted by LOAD.
    pub fn from_literal(ty: VmType, payload: &[u8]) -> Result<VmValue, VmError> {
        match ty {
            VmType::None => Ok(VmValue::None),
            VmType::Number => Ok(VmValue::Number(BigInt::from_signed_bytes_le(payload))),
            VmType::Bool => match payload {
                [byte] => Ok(VmValue::Bool(*byte != 0)),
                _ => Err(VmError::TypeMismatch {
                    expected: "single-byte bool literal",
                    actual: "bytes",
                }),
            },
            VmType::String => String::from_utf8(payload.to_vec())
                .map(VmValue::String)
                .map_err(|_| VmError::TypeMismatch {
                    expected: "utf-8 string literal",
                    actual: "bytes",
                }),
            VmType::Bytes => Ok(VmValue::Bytes(payload.to_vec())),
            VmType::Address => Address::from_slice(payload)
                .map(VmValue::Address)
                .ok_or(VmError::TypeMismatch {
                    expected: "33-byte address literal",
                    actual: "bytes",
                }),
        }
    }

    /// Encodes this value as a LOAD literal: `(type tag, payload)`.
    ///
    /// Structs and contexts have no literal form.
    pub fn to_literal(&self) -> Result<(VmType, Vec<u8>), VmError> {
        match self {
            VmValue::None => Ok((VmType::None, Vec::new())),
            VmValue::Number(n) => Ok((VmType::Number, n.to_signed_bytes_le())),
            VmValue::Bool(b) => Ok((VmType::Bool, vec![u8::from(*b)])),
            VmValue::String(s) => Ok((VmType::String, s.as_bytes().to_vec())),
            VmValue::Bytes(bytes) => Ok((VmType::Bytes, bytes.clone())),
            VmValue::Address(addr) => Ok((VmType::Address, addr.to_vec())),
            _ => Err(VmError::TypeMismatch {
                expected: "literal value",
                actual: self.kind(),
            }),
        }
    }

    /// Shift amount helper for SHL/SHR: non-negative and bounded.
    pub fn as_shift_amount(&self) -> Result<u32, VmError> {
        let n = self.as_number()?;
        if n.is_negative() {
            return Err(VmError::NumberOutOfRange);
        }
        let amount = n.to_u32().ok_or(VmError::NumberOutOfRange)?;
        if amount > 8 * 1024 {
            return Err(VmError::NumberOutOfRange);
        }
        Ok(amount)
    }
}

impl From<BigInt> for VmValue {
    fn from(n: BigInt) -> Self {
        VmValue::Number(n)
    }
}

impl From<u64> for VmValue {
    fn from(n: u64) -> Self {
        VmValue::Number(BigInt::from(n))
    }
}

impl From<bool> for VmValue {
    fn from(b: bool) -> Self {
        VmValue::Bool(b)
    }
}

impl From<&str> for VmValue {
    fn from(s: &str) -> Self {
        VmValue::String(s.to_string())
    }
}

impl From<Address> for VmValue {
    fn from(addr: Address) -> Self {
        VmValue::Address(addr)
    }
}
