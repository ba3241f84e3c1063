//! A chain: an append-only block sequence with its own storage space.

use crate::contracts::NativeContractKind;
use crate::core::block::Block;
use crate::core::events::{EventKind, GasEventData};
use crate::core::tokens::{BalanceSheet, OwnershipSheet, TokenContent};
use crate::core::transaction::Transaction;
use crate::storage::MemoryStorage;
use crate::types::address::Address;
use crate::types::hash::Hash;
use num_bigint::BigInt;
use num_traits::Zero;
use std::collections::HashMap;

/// Index of a chain inside the nexus arena.
pub type ChainId = usize;

/// An append-only sequence of blocks plus the key-value space their
/// transactions mutate.
///
/// Chains are owned by the nexus arena and reference their parent and
/// children by [`ChainId`], so the tree carries no cyclic ownership.
pub struct Chain {
    pub name: String,
    /// Derived deterministically from the name.
    pub address: Address,
    pub parent: Option<ChainId>,
    pub children: Vec<ChainId>,
    pub blocks: Vec<Block>,
    pub transactions: HashMap<Hash, Transaction>,
    pub storage: MemoryStorage,
    contracts: Vec<NativeContractKind>,
}

impl Chain {
    pub fn new(name: &str, parent: Option<ChainId>) -> Self {
        Self {
            name: name.to_string(),
            address: Address::system(name),
            parent,
            children: Vec::new(),
            blocks: Vec::new(),
            transactions: HashMap::new(),
            storage: MemoryStorage::new(),
            contracts: NativeContractKind::all().to_vec(),
        }
    }

    /// Number of blocks; the next block's height.
    pub fn height(&self) -> u32 {
        self.blocks.len() as u32
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn get_block_by_height(&self, height: u32) -> Option<&Block> {
        self.blocks.get(height as usize)
    }

    pub fn get_block(&self, hash: &Hash) -> Option<&Block> {
        self.blocks.iter().find(|block| block.hash() == *hash)
    }

    pub fn contains_transaction(&self, hash: &Hash) -> bool {
        self.transactions.contains_key(hash)
    }

    /// Contracts installed on this chain.
    pub fn contracts(&self) -> &[NativeContractKind] {
        &self.contracts
    }

    /// Resolves a contract by its derived address; how CTX finds its target.
    pub fn find_contract(&self, address: &Address) -> Option<NativeContractKind> {
        self.contracts
            .iter()
            .copied()
            .find(|contract| contract.address() == *address)
    }

    pub fn find_contract_by_name(&self, name: &str) -> Option<NativeContractKind> {
        self.contracts
            .iter()
            .copied()
            .find(|contract| contract.name() == name)
    }

    /// Fungible balance of `address` for `symbol` on this chain.
    pub fn get_token_balance(&self, symbol: &str, address: &Address) -> BigInt {
        BalanceSheet::new(symbol).get(&self.storage, address)
    }

    /// Supply of `symbol` circulating on this chain.
    pub fn get_token_supply(&self, symbol: &str) -> BigInt {
        BalanceSheet::new(symbol).supply(&self.storage)
    }

    /// NFT ids of `symbol` held by `address` on this chain.
    pub fn get_token_ownerships(&self, symbol: &str, address: &Address) -> Vec<BigInt> {
        OwnershipSheet::new(symbol).get(&self.storage, address)
    }

    pub fn get_token_owner(&self, symbol: &str, id: &BigInt) -> Option<Address> {
        OwnershipSheet::new(symbol).owner_of(&self.storage, id)
    }

    pub fn get_token_content(&self, symbol: &str, id: &BigInt) -> Option<TokenContent> {
        OwnershipSheet::new(symbol).content_of(&self.storage, id)
    }

    /// Sums every balance cell of `symbol` on this chain.
    ///
    /// Together with [`Chain::get_token_supply`] this checks the balance
    /// invariant at block boundaries.
    pub fn sum_token_balances(&self, symbol: &str) -> BigInt {
        let prefix = BalanceSheet::cell_prefix(symbol);
        let mut total = BigInt::zero();
        for (_, value) in self.storage.iter_prefix(&prefix) {
            if let Ok(balance) = <BigInt as crate::types::encoding::Decode>::from_bytes(value) {
                total += balance;
            }
        }
        total
    }

    /// Total fuel paid by the transaction, derived from its GasPayment
    /// events: the sum of `price * amount` over each payment.
    pub fn get_transaction_fee(&self, tx_hash: &Hash) -> BigInt {
        let mut fee = BigInt::zero();
        for block in &self.blocks {
            for event in block.events_for(tx_hash) {
                if event.kind == EventKind::GasPayment {
                    if let Some(payment) = event.decode_data::<GasEventData>() {
                        fee += payment.price * payment.amount;
                    }
                }
            }
        }
        fee
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chain_is_empty() {
        let chain = Chain::new("main", None);
        assert_eq!(chain.height(), 0);
        assert!(chain.last_block().is_none());
        assert_eq!(chain.address, Address::system("main"));
    }

    #[test]
    fn contracts_resolve_by_address_and_name() {
        let chain = Chain::new("main", None);
        let token = NativeContractKind::Token;
        assert_eq!(chain.find_contract(&token.address()), Some(token));
        assert_eq!(chain.find_contract_by_name("token"), Some(token));
        assert_eq!(chain.find_contract(&Address::system("nothing")), None);
    }

    #[test]
    fn balances_default_to_zero() {
        let chain = Chain::new("main", None);
        let nobody = Address::system("nobody");
        assert_eq!(chain.get_token_balance("KCAL", &nobody), BigInt::zero());
        assert!(chain.get_token_ownerships("COOL", &nobody).is_empty());
    }

    #[test]
    fn fee_of_unknown_transaction_is_zero() {
        let chain = Chain::new("main", None);
        assert_eq!(chain.get_transaction_fee(&Hash::of(b"tx")), BigInt::zero());
    }
}
