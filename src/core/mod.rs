//! Ledger structures: events, transactions, blocks, chains, and the nexus.

pub mod block;
pub mod chain;
pub mod events;
pub mod nexus;
pub mod tokens;
pub mod transaction;


pub use block::Block;
pub use chain::{Chain, ChainId};
pub use events::{Event, EventKind};
pub use nexus::Nexus;
pub use tokens::{Token, TokenFlags};
pub use transaction::Transaction;

use crate::types::hash::Hash;
use nexus_derive::Error;

/// Ledger-level errors.
///
/// These reject a block or transaction without mutating any state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("invalid block height: expected {expected}, got {actual}")]
    InvalidHeight { expected: u32, actual: u32 },
    #[error("block does not extend tip: expected previous hash {expected}, got {actual}")]
    InvalidPreviousHash { expected: Hash, actual: Hash },
    #[error("block timestamp precedes the chain tip")]
    InvalidTimestamp,
    #[error("block lists {listed} transaction hashes but carries {provided} transactions")]
    TransactionCountMismatch { listed: usize, provided: usize },
    #[error("transaction {0} carries an invalid signature")]
    InvalidSignature(Hash),
    #[error("transaction {0} expired before the block timestamp")]
    ExpiredTransaction(Hash),
    #[error("transaction {0} targets a different chain")]
    WrongChain(Hash),
    #[error("transaction {0} does not match the block's listing")]
    TransactionMismatch(Hash),
    #[error("duplicate transaction {0}")]
    DuplicateTransaction(Hash),
    #[error("transaction {hash} failed: {reason}")]
    TransactionFailed { hash: Hash, reason: String },
    #[error("unknown chain: {0}")]
    UnknownChain(String),
    #[error("duplicate chain name: {0}")]
    DuplicateChain(String),
    #[error("invalid chain name: {0}")]
    InvalidChainName(String),
    #[error("unknown token: {0}")]
    UnknownToken(String),
    #[error("duplicate token symbol: {0}")]
    DuplicateToken(String),
    #[error("invalid token symbol: {0}")]
    InvalidTokenSymbol(String),
    #[error("invalid token decimals: {0}")]
    InvalidTokenDecimals(u32),
    #[error("genesis block already exists")]
    GenesisAlreadyExists,
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

impl From<crate::virtual_machine::VmError> for ChainError {
    fn from(err: crate::virtual_machine::VmError) -> Self {
        ChainError::ExecutionFailed(err.to_string())
    }
}
