//! The nexus: a tree of chains, the token registry, and genesis bootstrap.

use crate::core::block::{Block, TransactionEvents};
use crate::core::chain::{Chain, ChainId};
use crate::core::tokens::{to_fixed, Token, TokenFlags};
use crate::core::transaction::Transaction;
use crate::core::ChainError;
use crate::crypto::key_pair::PrivateKey;
use crate::info;
use crate::runtime::{BlockInfo, Runtime};
use crate::storage::ChangeSet;
use crate::types::address::Address;
use crate::types::hash::Hash;
use crate::types::timestamp::Timestamp;
use crate::virtual_machine::{ScriptBuilder, VmValue};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use std::collections::{HashMap, HashSet};

/// Name of the root chain every nexus starts with.
pub const ROOT_CHAIN_NAME: &str = "main";

/// Symbol of the staking token.
pub const STAKING_TOKEN_SYMBOL: &str = "SOUL";

/// Symbol of the fuel token that pays for gas.
pub const FUEL_TOKEN_SYMBOL: &str = "KCAL";

const STAKING_TOKEN_DECIMALS: u32 = 8;
const FUEL_TOKEN_DECIMALS: u32 = 10;

/// Whole-unit staking token cap, fully premined to the owner at genesis.
const STAKING_TOKEN_MAX_UNITS: u64 = 100_000_000;

/// Whole-unit fuel premine so the owner can pay for the first transactions.
const GENESIS_FUEL_UNITS: u64 = 100_000;

/// Child chains installed by the genesis transaction.
const GENESIS_CHAIN_NAMES: [&str; 4] = ["account", "privacy", "apps", "market"];

/// Top-level container: an arena of chains rooted at one root chain plus the
/// registry of tokens keyed by symbol.
///
/// Chains reference each other by arena index, contracts are stateless, and
/// runtimes borrow the nexus per transaction, so there is no cyclic
/// ownership anywhere in the tree.
pub struct Nexus {
    pub name: String,
    pub owner: Address,
    chains: Vec<Chain>,
    chain_lookup: HashMap<String, ChainId>,
    tokens: HashMap<String, Token>,
    genesis_hash: Option<Hash>,
}

impl Nexus {
    /// Creates a nexus with an empty root chain and no tokens.
    pub fn new(name: &str, owner: Address) -> Self {
        let root = Chain::new(ROOT_CHAIN_NAME, None);
        let mut chain_lookup = HashMap::new();
        chain_lookup.insert(root.name.clone(), 0);

        Self {
            name: name.to_string(),
            owner,
            chains: vec![root],
            chain_lookup,
            tokens: HashMap::new(),
            genesis_hash: None,
        }
    }

    pub fn genesis_hash(&self) -> Option<Hash> {
        self.genesis_hash
    }

    pub fn root_chain_id(&self) -> ChainId {
        0
    }

    pub fn chain(&self, id: ChainId) -> &Chain {
        &self.chains[id]
    }

    pub fn chain_mut(&mut self, id: ChainId) -> &mut Chain {
        &mut self.chains[id]
    }

    pub fn find_chain(&self, name: &str) -> Option<ChainId> {
        self.chain_lookup.get(name).copied()
    }

    pub fn chains(&self) -> impl Iterator<Item = &Chain> {
        self.chains.iter()
    }

    /// True when the chains are parent and child in the tree.
    pub fn are_chains_adjacent(&self, a: ChainId, b: ChainId) -> bool {
        self.chains[a].parent == Some(b) || self.chains[b].parent == Some(a)
    }

    /// Registers a new chain under `parent`.
    pub fn create_chain(&mut self, name: &str, parent: ChainId) -> Result<ChainId, ChainError> {
        let valid = (3..=15).contains(&name.len())
            && name.bytes().all(|byte| byte.is_ascii_lowercase());
        if !valid {
            return Err(ChainError::InvalidChainName(name.to_string()));
        }
        if self.chain_lookup.contains_key(name) {
            return Err(ChainError::DuplicateChain(name.to_string()));
        }

        let id = self.chains.len();
        self.chains.push(Chain::new(name, Some(parent)));
        self.chains[parent].children.push(id);
        self.chain_lookup.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn token(&self, symbol: &str) -> Option<&Token> {
        self.tokens.get(symbol)
    }

    pub(crate) fn token_mut(&mut self, symbol: &str) -> Option<&mut Token> {
        self.tokens.get_mut(symbol)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }

    /// True once the fuel token exists with non-zero supply; gates gas
    /// metering.
    pub fn fuel_token_minted(&self) -> bool {
        self.tokens
            .get(FUEL_TOKEN_SYMBOL)
            .map(|token| token.current_supply.is_positive())
            .unwrap_or(false)
    }

    /// Registers a new token. Symbols are 1 to 8 uppercase ASCII letters and
    /// unique across the nexus.
    pub fn create_token(
        &mut self,
        symbol: &str,
        name: &str,
        max_supply: BigInt,
        decimals: u32,
        flags: TokenFlags,
        owner: Address,
    ) -> Result<(), ChainError> {
        let valid = (1..=8).contains(&symbol.len())
            && symbol.bytes().all(|byte| byte.is_ascii_uppercase());
        if !valid {
            return Err(ChainError::InvalidTokenSymbol(symbol.to_string()));
        }
        if self.tokens.contains_key(symbol) {
            return Err(ChainError::DuplicateToken(symbol.to_string()));
        }
        if decimals > 18 {
            return Err(ChainError::InvalidTokenDecimals(decimals));
        }
        if max_supply.is_negative() {
            return Err(ChainError::InvalidTokenSymbol(symbol.to_string()));
        }

        self.tokens.insert(
            symbol.to_string(),
            Token {
                symbol: symbol.to_string(),
                name: name.to_string(),
                decimals,
                max_supply,
                current_supply: BigInt::zero(),
                flags,
                owner,
                mint_counter: 0,
            },
        );
        Ok(())
    }

    /// Allocates the next NFT id of `symbol`, bumping its supply.
    pub(crate) fn allocate_token_id(&mut self, symbol: &str) -> Result<BigInt, ChainError> {
        let token = self
            .tokens
            .get_mut(symbol)
            .ok_or_else(|| ChainError::UnknownToken(symbol.to_string()))?;
        if token.is_capped() && &token.current_supply + 1u32 > token.max_supply {
            return Err(ChainError::ExecutionFailed("mint exceeds max supply".to_string()));
        }
        token.mint_counter += 1;
        token.current_supply += 1u32;
        Ok(BigInt::from(token.mint_counter))
    }

    /// True when `address` is registered with the consensus contract on the
    /// root chain.
    pub fn is_validator(&self, address: &Address) -> bool {
        crate::contracts::consensus::is_validator(&self.chains[0].storage, address)
    }

    /// Validates and executes a block on `chain_id`.
    ///
    /// Each transaction replays against a change set forked from the chain's
    /// storage plus the writes of earlier transactions in the same block. A
    /// single fault rejects the whole block and restores the token and chain
    /// registries, so partial state is never observable.
    pub fn add_block(
        &mut self,
        chain_id: ChainId,
        mut block: Block,
        transactions: Vec<Transaction>,
    ) -> Result<Hash, ChainError> {
        {
            let chain = &self.chains[chain_id];
            let expected = chain.height();
            if block.height != expected {
                return Err(ChainError::InvalidHeight {
                    expected,
                    actual: block.height,
                });
            }
            match chain.last_block() {
                Some(tip) => {
                    let tip_hash = tip.hash();
                    if block.previous_hash != tip_hash {
                        return Err(ChainError::InvalidPreviousHash {
                            expected: tip_hash,
                            actual: block.previous_hash,
                        });
                    }
                    if block.timestamp < tip.timestamp {
                        return Err(ChainError::InvalidTimestamp);
                    }
                }
                None => {
                    if block.previous_hash != Hash::zero() {
                        return Err(ChainError::InvalidPreviousHash {
                            expected: Hash::zero(),
                            actual: block.previous_hash,
                        });
                    }
                }
            }
            if block.transaction_hashes.len() != transactions.len() {
                return Err(ChainError::TransactionCountMismatch {
                    listed: block.transaction_hashes.len(),
                    provided: transactions.len(),
                });
            }
        }

        let mut seen = HashSet::new();
        for (listed, tx) in block.transaction_hashes.iter().zip(&transactions) {
            let hash = tx.hash();
            if *listed != hash {
                return Err(ChainError::TransactionMismatch(hash));
            }
            if !seen.insert(hash) || self.chains[chain_id].contains_transaction(&hash) {
                return Err(ChainError::DuplicateTransaction(hash));
            }
            if !tx.verify_signatures() {
                return Err(ChainError::InvalidSignature(hash));
            }
            if tx.expiration < block.timestamp {
                return Err(ChainError::ExpiredTransaction(hash));
            }
            if tx.chain_name != self.chains[chain_id].name || tx.nexus_name != self.name {
                return Err(ChainError::WrongChain(hash));
            }
        }

        // Registry snapshots: contract code mutates token supplies and may
        // create chains, and a later fault must discard all of it.
        let tokens_snapshot = self.tokens.clone();
        let chain_count = self.chains.len();

        let block_info = BlockInfo {
            height: block.height,
            timestamp: block.timestamp,
            validator: block.validator,
        };
        let mut block_changes = ChangeSet::new();
        let mut executed: Vec<TransactionEvents> = Vec::with_capacity(transactions.len());

        for tx in &transactions {
            let hash = tx.hash();
            let mut runtime = Runtime::new(
                self,
                chain_id,
                Some(block_info),
                Some(tx),
                block_changes.clone(),
            );
            match runtime.execute(&tx.script) {
                Ok(_) => {
                    let changes = std::mem::take(&mut runtime.changes);
                    let events = std::mem::take(&mut runtime.events);
                    drop(runtime);
                    block_changes.merge(changes);
                    executed.push(TransactionEvents { hash, events });
                }
                Err(err) => {
                    drop(runtime);
                    self.tokens = tokens_snapshot;
                    self.rollback_chains(chain_count);
                    return Err(ChainError::TransactionFailed {
                        hash,
                        reason: err.to_string(),
                    });
                }
            }
        }

        block.events = executed;
        let block_hash = block.hash();

        let chain = &mut self.chains[chain_id];
        chain.storage.commit(block_changes);
        for tx in transactions {
            chain.transactions.insert(tx.hash(), tx);
        }
        info!(
            "chain {}: appended block {} with {} transactions",
            chain.name,
            block.height,
            block.transaction_hashes.len()
        );
        chain.blocks.push(block);

        Ok(block_hash)
    }

    /// Read-only contract call: runs against a throwaway change set and
    /// restores the registries afterwards, returning the top of the stack.
    pub fn invoke_contract(
        &mut self,
        chain_id: ChainId,
        contract: &str,
        method: &str,
        args: &[VmValue],
    ) -> Result<VmValue, ChainError> {
        if self.chains[chain_id].find_contract_by_name(contract).is_none() {
            return Err(ChainError::ExecutionFailed(format!(
                "unknown contract: {}",
                contract
            )));
        }

        let tokens_snapshot = self.tokens.clone();
        let chain_count = self.chains.len();

        let script = ScriptBuilder::new()
            .call_contract(contract, method, args)
            .to_script();

        let mut runtime = Runtime::new(self, chain_id, None, None, ChangeSet::new());
        let outcome = runtime.execute(&script);
        drop(runtime);

        self.tokens = tokens_snapshot;
        self.rollback_chains(chain_count);

        let mut vm = outcome.map_err(ChainError::from)?;
        Ok(vm.stack.pop().unwrap_or(VmValue::None))
    }

    /// Executes the genesis transaction: creates the staking and fuel
    /// tokens, premines both for the owner, spawns the built-in child
    /// chains, and registers the owner as validator. Fails atomically.
    pub fn create_genesis(
        &mut self,
        owner_key: &PrivateKey,
        timestamp: Timestamp,
    ) -> Result<Hash, ChainError> {
        if self.genesis_hash.is_some() {
            return Err(ChainError::GenesisAlreadyExists);
        }
        if owner_key.address() != self.owner {
            return Err(ChainError::ExecutionFailed(
                "genesis key does not match the nexus owner".to_string(),
            ));
        }

        let owner = VmValue::Address(self.owner);
        let staking_flags = TokenFlags::FUNGIBLE
            | TokenFlags::TRADABLE
            | TokenFlags::DIVISIBLE
            | TokenFlags::TRANSFERABLE;
        let fuel_flags = TokenFlags::FUNGIBLE
            | TokenFlags::BURNABLE
            | TokenFlags::DIVISIBLE
            | TokenFlags::TRANSFERABLE;

        let mut script = ScriptBuilder::new();
        script.call_contract(
            "token",
            "Create",
            &[
                owner.clone(),
                VmValue::from(STAKING_TOKEN_SYMBOL),
                VmValue::from("Soul"),
                VmValue::Number(to_fixed(STAKING_TOKEN_MAX_UNITS, STAKING_TOKEN_DECIMALS)),
                VmValue::from(STAKING_TOKEN_DECIMALS as u64),
                VmValue::from(staking_flags.0 as u64),
            ],
        );
        script.call_contract(
            "token",
            "Mint",
            &[
                owner.clone(),
                VmValue::from(STAKING_TOKEN_SYMBOL),
                VmValue::Number(to_fixed(STAKING_TOKEN_MAX_UNITS, STAKING_TOKEN_DECIMALS)),
            ],
        );
        script.call_contract(
            "token",
            "Create",
            &[
                owner.clone(),
                VmValue::from(FUEL_TOKEN_SYMBOL),
                VmValue::from("Kcal"),
                VmValue::Number(BigInt::zero()),
                VmValue::from(FUEL_TOKEN_DECIMALS as u64),
                VmValue::from(fuel_flags.0 as u64),
            ],
        );
        script.call_contract(
            "token",
            "Mint",
            &[
                owner.clone(),
                VmValue::from(FUEL_TOKEN_SYMBOL),
                VmValue::Number(to_fixed(GENESIS_FUEL_UNITS, FUEL_TOKEN_DECIMALS)),
            ],
        );
        for chain_name in GENESIS_CHAIN_NAMES {
            script.call_interop(
                "Nexus.CreateChain",
                &[
                    owner.clone(),
                    VmValue::from(ROOT_CHAIN_NAME),
                    VmValue::from(chain_name),
                ],
            );
        }
        script.call_contract("consensus", "AddValidator", &[owner]);

        let mut tx = Transaction::new(
            &self.name,
            ROOT_CHAIN_NAME,
            self.owner,
            script.to_script(),
            BigInt::zero(),
            0,
            timestamp.offset(3_600),
            0,
        );
        tx.sign(owner_key);

        let block = Block::new(0, timestamp, Hash::zero(), self.owner, vec![tx.hash()]);
        let hash = self.add_block(self.root_chain_id(), block, vec![tx])?;
        self.genesis_hash = Some(hash);
        info!("nexus {}: genesis block {}", self.name, hash);
        Ok(hash)
    }

    /// Drops chains created past `count` and repairs the lookup tables.
    fn rollback_chains(&mut self, count: usize) {
        while self.chains.len() > count {
            if let Some(chain) = self.chains.pop() {
                self.chain_lookup.remove(&chain.name);
            }
        }
        for chain in &mut self.chains {
            chain.children.retain(|&child| child < count);
        }
    }
}
