//! Blocks: immutable, hash-chained batches of transactions.

use crate::core::events::Event;
use crate::types::address::Address;
use crate::types::encoding::Encode;
use crate::types::hash::Hash;
use crate::types::timestamp::Timestamp;
use nexus_derive::BinaryCodec;

/// The events one transaction emitted, stored inside its block.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct TransactionEvents {
    pub hash: Hash,
    pub events: Vec<Event>,
}

/// A batch of transactions cryptographically linked to its predecessor.
///
/// Blocks are assembled by a producer, filled with per-transaction events
/// during execution, and immutable once appended to a chain. The hash covers
/// every field, so it is only meaningful after execution has populated the
/// event lists.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct Block {
    pub height: u32,
    pub timestamp: Timestamp,
    pub previous_hash: Hash,
    /// Block producer; receives the gas payments of every transaction.
    pub validator: Address,
    pub transaction_hashes: Vec<Hash>,
    /// Parallel to `transaction_hashes` after execution.
    pub events: Vec<TransactionEvents>,
}

impl Block {
    pub fn new(
        height: u32,
        timestamp: Timestamp,
        previous_hash: Hash,
        validator: Address,
        transaction_hashes: Vec<Hash>,
    ) -> Self {
        Self {
            height,
            timestamp,
            previous_hash,
            validator,
            transaction_hashes,
            events: Vec::new(),
        }
    }

    /// Domain-separated hash over all fields.
    pub fn hash(&self) -> Hash {
        let mut h = Hash::sha256().chain(b"BLOCK");
        self.encode(&mut h);
        h.finalize()
    }

    /// Events emitted by the transaction with the given hash.
    pub fn events_for(&self, tx_hash: &Hash) -> &[Event] {
        self.events
            .iter()
            .find(|entry| entry.hash == *tx_hash)
            .map(|entry| entry.events.as_slice())
            .unwrap_or(&[])
    }

    /// Iterates over every event in the block in emit order.
    pub fn all_events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().flat_map(|entry| entry.events.iter())
    }
}
