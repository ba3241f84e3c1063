//! 32-byte SHA-256 hash type with zero-allocation operations.

use crate::types::encoding::{read_exact, Decode, DecodeError, Encode, EncodeSink};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 hash length in bytes.
pub const HASH_LEN: usize = 32;

/// Fixed-size 32-byte hash used throughout the ledger.
///
/// This type is `Copy` - hashes are passed frequently during block validation
/// and should live on the stack to avoid heap allocations.
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash, Ord, PartialOrd)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// Creates a zero-valued hash (all bytes are 0x00).
    ///
    /// Used as a sentinel for genesis blocks and uninitialized storage.
    pub const fn zero() -> Hash {
        Hash([0u8; HASH_LEN])
    }

    /// Returns the hash as a byte slice.
    pub const fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Returns the hash as a byte Vec.
    pub fn to_vec(self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Creates a hash from a byte slice.
    ///
    /// Returns `None` if the slice length is not exactly [`HASH_LEN`] bytes.
    pub fn from_slice(slice: &[u8]) -> Option<Hash> {
        if slice.len() != HASH_LEN {
            return None;
        }
        let mut bytes = [0u8; HASH_LEN];
        bytes.copy_from_slice(slice);
        Some(Hash(bytes))
    }

    /// Hashes the given bytes in one shot.
    pub fn of(data: &[u8]) -> Hash {
        Hash::sha256().chain(data).finalize()
    }

    /// Creates a new SHA-256 hash builder for incremental hashing.
    pub fn sha256() -> HashBuilder {
        HashBuilder::new()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

impl Encode for Hash {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&self.0);
    }
}

impl Decode for Hash {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let bytes = read_exact(input, HASH_LEN)?;
        let mut buf = [0u8; HASH_LEN];
        buf.copy_from_slice(bytes);
        Ok(Hash(buf))
    }
}

/// Incremental SHA-256 hash builder.
///
/// Allows feeding data in chunks and finalizing to produce a [`Hash`].
/// Implements [`EncodeSink`] so encodable types can be hashed directly
/// without intermediate byte buffers.
pub struct HashBuilder {
    hasher: Sha256,
}

impl HashBuilder {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Feeds data into the hash computation.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    pub fn chain(mut self, data: &[u8]) -> Self {
        self.hasher.update(data);
        self
    }

    /// Consumes the builder and returns the final hash.
    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

impl Default for HashBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeSink for HashBuilder {
    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encoding::{Decode, Encode};

    #[test]
    fn of_matches_incremental() {
        let mut builder = Hash::sha256();
        builder.update(b"he");
        builder.update(b"llo");
        assert_eq!(builder.finalize(), Hash::of(b"hello"));
    }

    #[test]
    fn different_input_different_hash() {
        assert_ne!(Hash::of(b"a"), Hash::of(b"b"));
    }

    #[test]
    fn zero_hash_is_all_zeroes() {
        assert!(Hash::zero().as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(Hash::from_slice(&[0u8; 31]).is_none());
        assert!(Hash::from_slice(&[0u8; 33]).is_none());
        assert!(Hash::from_slice(&[0u8; 32]).is_some());
    }

    #[test]
    fn encode_roundtrip() {
        let hash = Hash::of(b"roundtrip");
        let bytes = hash.to_bytes();
        assert_eq!(bytes.len(), HASH_LEN);
        assert_eq!(Hash::from_bytes(&bytes).unwrap(), hash);
    }

    #[test]
    fn display_is_hex() {
        let text = Hash::zero().to_string();
        assert_eq!(text.len(), 64);
        assert!(text.chars().all(|c| c == '0'));
    }
}
