//! Reference-counted byte buffer with copy-on-write semantics.

use crate::types::encoding::{read_exact, read_var_len, write_var_len, Decode, DecodeError, Encode, EncodeSink};
use std::ops::Deref;
use std::sync::Arc;

/// A reference-counted, immutable byte buffer.
///
/// Wraps `Arc<Vec<u8>>` to provide cheap cloning and shared ownership.
/// Scripts are immutable after signing and referenced from transactions,
/// blocks, and the VM at once.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct Bytes(Arc<Vec<u8>>);

impl Bytes {
    /// Creates a new buffer from any type convertible to `Vec<u8>`.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self(Arc::new(data.into()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl Clone for Bytes {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl Deref for Bytes {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl Encode for Bytes {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        write_var_len(out, self.len() as u64);
        out.write(self.as_slice());
    }
}

impl Decode for Bytes {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let len = read_var_len(input)?;
        let len = usize::try_from(len).map_err(|_| DecodeError::LengthOverflow)?;
        let bytes = read_exact(input, len)?;
        Ok(Bytes::new(bytes.to_vec()))
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Self::new(v)
    }
}

impl From<&[u8]> for Bytes {
    fn from(s: &[u8]) -> Self {
        Self::new(s)
    }
}

impl<const N: usize> From<[u8; N]> for Bytes {
    fn from(arr: [u8; N]) -> Self {
        Self::new(arr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_shares_storage() {
        let a = Bytes::new(vec![1, 2, 3]);
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.as_slice().as_ptr(), b.as_slice().as_ptr());
    }

    #[test]
    fn encode_roundtrip() {
        let bytes = Bytes::new(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let encoded = bytes.to_bytes();
        assert_eq!(Bytes::from_bytes(&encoded).unwrap(), bytes);
    }

    #[test]
    fn empty_roundtrip() {
        let bytes = Bytes::default();
        let encoded = bytes.to_bytes();
        assert_eq!(encoded, vec![0]);
        assert_eq!(Bytes::from_bytes(&encoded).unwrap(), bytes);
    }
}
