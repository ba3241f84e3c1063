//! Cryptographic primitives: hashing and secp256r1 key pairs.

pub mod key_pair;

pub use key_pair::{PrivateKey, PublicKey, SerializableSignature};

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Computes the SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes the RIPEMD-160 digest of `data`.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256 of the empty string.
        let digest = sha256(b"");
        assert_eq!(
            digest[..4],
            [0xe3, 0xb0, 0xc4, 0x42],
            "unexpected empty-string digest prefix"
        );
    }

    #[test]
    fn ripemd160_known_vector() {
        // RIPEMD-160 of the empty string starts with 9c1185a5.
        let digest = ripemd160(b"");
        assert_eq!(digest[..4], [0x9c, 0x11, 0x85, 0xa5]);
    }

    #[test]
    fn digests_differ_for_different_input() {
        assert_ne!(sha256(b"a"), sha256(b"b"));
        assert_ne!(ripemd160(b"a"), ripemd160(b"b"));
    }
}
