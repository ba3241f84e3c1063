//! Events emitted during transaction execution.
//!
//! Every event pairs a kind with an address and an opaque payload. Payloads
//! are not reflective: each kind has a fixed schema struct defined here, and
//! readers decode by kind.

use crate::types::address::Address;
use crate::types::encoding::Decode;
use nexus_derive::BinaryCodec;
use num_bigint::BigInt;

/// Discriminates event payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BinaryCodec)]
pub enum EventKind {
    ChainCreate = 0,
    TokenCreate = 1,
    TokenSend = 2,
    TokenReceive = 3,
    TokenClaim = 4,
    TokenMint = 5,
    TokenBurn = 6,
    TokenEscrow = 7,
    TokenStake = 8,
    TokenUnstake = 9,
    AddressRegister = 10,
    AddressAdd = 11,
    AddressRemove = 12,
    GasEscrow = 13,
    GasPayment = 14,
    AuctionCreated = 15,
    AuctionCancelled = 16,
    AuctionFilled = 17,
    Metadata = 18,
}

/// A typed, addressed record appended during execution.
///
/// Events are append-only within a transaction; the enclosing block stores
/// them keyed by transaction hash.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct Event {
    pub kind: EventKind,
    pub address: Address,
    pub data: Vec<u8>,
}

impl Event {
    pub fn new(kind: EventKind, address: Address, data: Vec<u8>) -> Self {
        Self {
            kind,
            address,
            data,
        }
    }

    /// Decodes the payload as `T`, returning `None` on schema mismatch.
    pub fn decode_data<T: Decode>(&self) -> Option<T> {
        T::from_bytes(&self.data).ok()
    }
}

/// Payload for token movement events (send, receive, mint, burn, stake,
/// unstake, claim).
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct TokenEventData {
    pub symbol: String,
    pub value: BigInt,
    pub chain_name: String,
}

impl TokenEventData {
    pub fn new(symbol: &str, value: BigInt, chain_name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            value,
            chain_name: chain_name.to_string(),
        }
    }
}

/// Payload for cross-chain escrow events; carries the NFT content when the
/// escrowed value is a token id.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct TokenEscrowData {
    pub symbol: String,
    pub value: BigInt,
    /// Name of the chain the escrow settles on.
    pub chain_name: String,
    pub content: Option<crate::core::tokens::TokenContent>,
}

/// Payload for GasEscrow and GasPayment events.
///
/// For escrows `amount` is the gas limit; for payments it is the gas spent.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct GasEventData {
    pub address: Address,
    pub price: BigInt,
    pub amount: BigInt,
}

/// Payload for NFT auction events.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct MarketEventData {
    pub base_symbol: String,
    pub quote_symbol: String,
    pub id: BigInt,
    pub price: BigInt,
}

/// Payload for Metadata events.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct MetadataEventData {
    pub key: String,
    pub value: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encoding::{Decode, Encode};

    #[test]
    fn event_roundtrip() {
        let data = TokenEventData::new("KCAL", BigInt::from(500), "main");
        let event = Event::new(EventKind::TokenSend, Address::system("token"), data.to_bytes());

        let encoded = event.to_bytes();
        let decoded = Event::from_bytes(&encoded).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(decoded.decode_data::<TokenEventData>(), Some(data));
    }

    #[test]
    fn kind_discriminants_are_stable() {
        assert_eq!(EventKind::ChainCreate.to_bytes(), vec![0]);
        assert_eq!(EventKind::GasPayment.to_bytes(), vec![14]);
        assert_eq!(EventKind::Metadata.to_bytes(), vec![18]);
    }

    #[test]
    fn decode_data_rejects_mismatched_schema() {
        let event = Event::new(EventKind::Metadata, Address::NULL, vec![0xFF, 0x01]);
        assert_eq!(event.decode_data::<TokenEventData>(), None);
    }

    #[test]
    fn gas_event_roundtrip() {
        let data = GasEventData {
            address: Address::system("gas"),
            price: BigInt::from(1),
            amount: BigInt::from(123),
        };
        let decoded = GasEventData::from_bytes(&data.to_bytes()).unwrap();
        assert_eq!(decoded, data);
    }
}
