//! Signed transactions: a payer, a script, gas parameters, and witnesses.

use crate::crypto::key_pair::{PrivateKey, PublicKey, SerializableSignature};
use crate::types::address::Address;
use crate::types::bytes::Bytes;
use crate::types::encoding::{Decode, DecodeError, Encode, EncodeSink};
use crate::types::hash::Hash;
use crate::types::timestamp::Timestamp;
use nexus_derive::BinaryCodec;
use num_bigint::BigInt;

/// One witness signature: the signer's public key and the signature over the
/// transaction hash.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct Witness {
    pub public_key: PublicKey,
    pub signature: SerializableSignature,
}

/// A signed script plus gas parameters, bound to one chain of one nexus.
///
/// The hash covers every field except the signatures, so witnesses all sign
/// the same message and can be attached in any order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub nexus_name: String,
    pub chain_name: String,
    /// Account that settles the gas bill.
    pub payer: Address,
    pub script: Bytes,
    pub gas_price: BigInt,
    pub gas_limit: u64,
    /// Latest block timestamp this transaction may be included at.
    pub expiration: Timestamp,
    /// Payer-chosen discriminator so identical scripts hash differently.
    pub nonce: u64,
    pub signatures: Vec<Witness>,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nexus_name: &str,
        chain_name: &str,
        payer: Address,
        script: impl Into<Bytes>,
        gas_price: BigInt,
        gas_limit: u64,
        expiration: Timestamp,
        nonce: u64,
    ) -> Self {
        Self {
            nexus_name: nexus_name.to_string(),
            chain_name: chain_name.to_string(),
            payer,
            script: script.into(),
            gas_price,
            gas_limit,
            expiration,
            nonce,
            signatures: Vec::new(),
        }
    }

    fn encode_unsigned<S: EncodeSink>(&self, out: &mut S) {
        self.nexus_name.encode(out);
        self.chain_name.encode(out);
        self.payer.encode(out);
        self.script.encode(out);
        self.gas_price.encode(out);
        self.gas_limit.encode(out);
        self.expiration.encode(out);
        self.nonce.encode(out);
    }

    /// The transaction identity: a domain-separated hash over every field
    /// except the signatures.
    pub fn hash(&self) -> Hash {
        let mut h = Hash::sha256().chain(b"TX");
        self.encode_unsigned(&mut h);
        h.finalize()
    }

    /// Appends a witness signature from `key`.
    pub fn sign(&mut self, key: &PrivateKey) {
        let hash = self.hash();
        self.signatures.push(Witness {
            public_key: key.public_key(),
            signature: key.sign(hash.as_slice()),
        });
    }

    /// Returns true when `address` has a valid signature on this transaction.
    ///
    /// This is the witness oracle consulted by `IsWitness` checks during
    /// execution.
    pub fn is_signed_by(&self, address: &Address) -> bool {
        let hash = self.hash();
        self.signatures.iter().any(|witness| {
            witness.public_key.address == *address
                && witness
                    .public_key
                    .verify(hash.as_slice(), &witness.signature)
        })
    }

    /// Verifies that every attached signature is valid.
    pub fn verify_signatures(&self) -> bool {
        if self.signatures.is_empty() {
            return false;
        }
        let hash = self.hash();
        self.signatures
            .iter()
            .all(|witness| witness.public_key.verify(hash.as_slice(), &witness.signature))
    }
}

impl Encode for Transaction {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.encode_unsigned(out);
        self.signatures.encode(out);
    }
}

impl Decode for Transaction {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Transaction {
            nexus_name: String::decode(input)?,
            chain_name: String::decode(input)?,
            payer: Address::decode(input)?,
            script: Bytes::decode(input)?,
            gas_price: BigInt::decode(input)?,
            gas_limit: u64::decode(input)?,
            expiration: Timestamp::decode(input)?,
            nonce: u64::decode(input)?,
            signatures: Vec::<Witness>::decode(input)?,
        })
    }
}
