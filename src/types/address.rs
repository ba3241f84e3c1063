//! 33-byte addresses for users, contracts, and chains.

use crate::types::encoding::{read_exact, Decode, DecodeError, Encode, EncodeSink};
use crate::types::hash::Hash;
use std::fmt;

/// Address length in bytes: a compressed secp256r1 public key.
pub const ADDRESS_LEN: usize = 33;

/// Prefix byte for system addresses derived from symbolic names.
///
/// Compressed public keys start with 0x02 or 0x03, so 0x01 can never collide
/// with a user address.
const SYSTEM_PREFIX: u8 = 0x01;

/// A 33-byte account identifier.
///
/// User addresses are compressed secp256r1 public keys. System addresses
/// (contracts, chains) are derived deterministically from a symbolic name.
/// Equality is byte-wise.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// The all-zero address, used where no account applies.
    pub const NULL: Address = Address([0u8; ADDRESS_LEN]);

    /// Derives a system address from a symbolic name.
    ///
    /// Layout: one domain-separator byte followed by the SHA-256 of the name.
    pub fn system(name: &str) -> Address {
        let digest = Hash::of(name.as_bytes());
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[0] = SYSTEM_PREFIX;
        bytes[1..].copy_from_slice(digest.as_slice());
        Address(bytes)
    }

    /// Creates an address from a byte slice.
    ///
    /// Returns `None` if the slice length is not exactly [`ADDRESS_LEN`].
    pub fn from_slice(slice: &[u8]) -> Option<Address> {
        if slice.len() != ADDRESS_LEN {
            return None;
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(slice);
        Some(Address(bytes))
    }

    pub const fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn to_vec(self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Returns true for addresses derived from a symbolic name.
    pub fn is_system(&self) -> bool {
        self.0[0] == SYSTEM_PREFIX
    }

    /// Returns true for addresses backed by a keypair.
    pub fn is_user(&self) -> bool {
        matches!(self.0[0], 0x02 | 0x03)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Encode for Address {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&self.0);
    }
}

impl Decode for Address {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let bytes = read_exact(input, ADDRESS_LEN)?;
        let mut buf = [0u8; ADDRESS_LEN];
        buf.copy_from_slice(bytes);
        Ok(Address(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encoding::{Decode, Encode};

    #[test]
    fn system_address_is_deterministic() {
        assert_eq!(Address::system("token"), Address::system("token"));
        assert_ne!(Address::system("token"), Address::system("stake"));
    }

    #[test]
    fn system_address_has_prefix() {
        let addr = Address::system("gas");
        assert!(addr.is_system());
        assert!(!addr.is_user());
    }

    #[test]
    fn null_address_is_neither_system_nor_user() {
        assert!(!Address::NULL.is_system());
        assert!(!Address::NULL.is_user());
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(Address::from_slice(&[0u8; 32]).is_none());
        assert!(Address::from_slice(&[0u8; 33]).is_some());
    }

    #[test]
    fn encode_roundtrip() {
        let addr = Address::system("account");
        let bytes = addr.to_bytes();
        assert_eq!(bytes.len(), ADDRESS_LEN);
        assert_eq!(Address::from_bytes(&bytes).unwrap(), addr);
    }
}
