//! ECDSA key pairs on secp256r1.

use crate::types::address::{Address, ADDRESS_LEN};
use crate::types::encoding::{read_exact, Decode, DecodeError, Encode, EncodeSink};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;

/// Encoded ECDSA signature length (r || s).
const SIGNATURE_LEN: usize = 64;

/// Private key for signing transactions.
///
/// Generated from OS-provided entropy. Never serialized or stored by the core.
#[derive(Clone)]
pub struct PrivateKey {
    key: SigningKey,
}

impl PrivateKey {
    /// Generates a new random private key.
    pub fn new() -> Self {
        Self {
            key: SigningKey::random(&mut OsRng),
        }
    }

    /// Creates a private key from raw bytes.
    ///
    /// Returns `None` if the bytes do not represent a valid secp256r1 scalar.
    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        SigningKey::from_slice(bytes).ok().map(|key| Self { key })
    }

    /// Derives the corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::new(self)
    }

    /// The address of this key's public half.
    pub fn address(&self) -> Address {
        self.public_key().address
    }

    /// Signs arbitrary data, producing an ECDSA signature.
    pub fn sign(&self, data: &[u8]) -> SerializableSignature {
        SerializableSignature(self.key.sign(data))
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

/// Public key for signature verification and address derivation.
///
/// The address is the 33-byte compressed SEC1 encoding of the curve point, so
/// key and address are interconvertible without hashing.
#[derive(Clone, Debug)]
pub struct PublicKey {
    key: VerifyingKey,
    pub address: Address,
}

impl PublicKey {
    pub(crate) fn new(private: &PrivateKey) -> Self {
        let key = private.key.verifying_key().clone();
        let point = key.to_encoded_point(true);
        let address = Address::from_slice(point.as_bytes())
            .unwrap_or(Address::NULL);

        PublicKey { key, address }
    }

    /// Verifies an ECDSA signature against the given data.
    pub fn verify(&self, data: &[u8], signature: &SerializableSignature) -> bool {
        self.key.verify(data, &signature.0).is_ok()
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for PublicKey {}

impl Encode for PublicKey {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(self.address.as_slice());
    }
}

impl Decode for PublicKey {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let bytes = read_exact(input, ADDRESS_LEN)?;
        let key = VerifyingKey::from_sec1_bytes(bytes).map_err(|_| DecodeError::InvalidValue)?;
        let address = Address::from_slice(bytes).ok_or(DecodeError::InvalidValue)?;
        Ok(PublicKey { key, address })
    }
}

/// ECDSA signature wrapper with a fixed 64-byte wire encoding.
#[derive(Clone, Debug)]
pub struct SerializableSignature(pub Signature);

impl PartialEq for SerializableSignature {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bytes() == other.0.to_bytes()
    }
}

impl Eq for SerializableSignature {}

impl Encode for SerializableSignature {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        out.write(&self.0.to_bytes());
    }
}

impl Decode for SerializableSignature {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let bytes = read_exact(input, SIGNATURE_LEN)?;
        let signature = Signature::from_slice(bytes).map_err(|_| DecodeError::InvalidValue)?;
        Ok(SerializableSignature(signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_success() {
        let private = PrivateKey::new();
        let public = private.public_key();

        let data = b"Hello World";
        let signature = private.sign(data);
        assert!(public.verify(data, &signature));
    }

    #[test]
    fn verify_fails_for_wrong_signer() {
        let private = PrivateKey::new();
        let other = PrivateKey::new();

        let data = b"Hello World";
        let signature = other.sign(data);
        assert!(!private.public_key().verify(data, &signature));
    }

    #[test]
    fn verify_fails_for_tampered_data() {
        let private = PrivateKey::new();
        let public = private.public_key();

        let signature = private.sign(b"original");
        assert!(!public.verify(b"tampered", &signature));
    }

    #[test]
    fn address_is_compressed_point() {
        let public = PrivateKey::new().public_key();
        assert!(public.address.is_user());
        assert!(!public.address.is_system());
    }

    #[test]
    fn address_is_deterministic() {
        let private = PrivateKey::new();
        assert_eq!(private.public_key().address, private.public_key().address);
    }

    #[test]
    fn addresses_are_unique() {
        let a = PrivateKey::new().address();
        let b = PrivateKey::new().address();
        assert_ne!(a, b);
    }

    #[test]
    fn from_bytes_deterministic() {
        let bytes: [u8; 32] = [
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
            0x0f, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x1b, 0x1c,
            0x1d, 0x1e, 0x1f, 0x20,
        ];
        let key1 = PrivateKey::from_bytes(&bytes).unwrap();
        let key2 = PrivateKey::from_bytes(&bytes).unwrap();
        assert_eq!(key1.address(), key2.address());
    }

    #[test]
    fn from_bytes_rejects_zero_scalar() {
        assert!(PrivateKey::from_bytes(&[0u8; 32]).is_none());
    }

    #[test]
    fn public_key_roundtrip() {
        let public = PrivateKey::new().public_key();
        let encoded = public.to_bytes();
        let decoded = PublicKey::from_bytes(&encoded).expect("decode failed");
        assert_eq!(public, decoded);
    }

    #[test]
    fn signature_roundtrip() {
        let private = PrivateKey::new();
        let signature = private.sign(b"data");
        let encoded = signature.to_bytes();
        assert_eq!(encoded.len(), 64);
        let decoded = SerializableSignature::from_bytes(&encoded).expect("decode failed");
        assert!(private.public_key().verify(b"data", &decoded));
    }
}
