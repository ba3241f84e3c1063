//! End-to-end simulation helpers for tests.
//!
//! A [`Simulator`] owns a nexus bootstrapped through genesis, a manual clock,
//! and a block-producer key, and provides shorthand for building signed,
//! gas-bracketed transactions and single-transaction blocks.

use crate::core::chain::ChainId;
use crate::core::nexus::Nexus;
use crate::core::{Block, ChainError, Transaction};
use crate::crypto::key_pair::PrivateKey;
use crate::types::address::Address;
use crate::types::hash::Hash;
use crate::types::timestamp::Timestamp;
use crate::utils::clock::{Clock, ManualClock};
use crate::virtual_machine::{ScriptBuilder, VmValue};
use num_bigint::BigInt;

pub const GAS_PRICE: u64 = 1;
pub const GAS_LIMIT: u64 = 9_999;

const START_TIME: Timestamp = Timestamp(1_700_000_000);

pub struct Simulator {
    pub nexus: Nexus,
    pub owner: PrivateKey,
    /// Block producer; kept distinct from the owner so gas payments are
    /// visible in balances.
    pub validator: PrivateKey,
    pub clock: ManualClock,
    nonce: u64,
}

impl Simulator {
    /// Builds a nexus with a fresh owner key and executes genesis.
    pub fn new(name: &str) -> Self {
        let owner = PrivateKey::new();
        let validator = PrivateKey::new();
        let mut nexus = Nexus::new(name, owner.address());
        let clock = ManualClock::new(START_TIME);
        nexus
            .create_genesis(&owner, clock.now())
            .expect("genesis failed");

        Self {
            nexus,
            owner,
            validator,
            clock,
            nonce: 0,
        }
    }

    pub fn owner_address(&self) -> Address {
        self.owner.address()
    }

    pub fn advance(&self, secs: u64) {
        self.clock.advance(secs);
    }

    pub fn chain_id(&self, name: &str) -> ChainId {
        self.nexus.find_chain(name).expect("unknown chain")
    }

    pub fn balance(&self, chain: &str, symbol: &str, address: &Address) -> BigInt {
        self.nexus
            .chain(self.chain_id(chain))
            .get_token_balance(symbol, address)
    }

    pub fn fee(&self, chain: &str, tx_hash: &Hash) -> BigInt {
        self.nexus
            .chain(self.chain_id(chain))
            .get_transaction_fee(tx_hash)
    }

    /// Wraps the calls emitted by `build` in the AllowGas/SpendGas bracket.
    pub fn gas_bracketed(payer: Address, build: impl FnOnce(&mut ScriptBuilder)) -> Vec<u8> {
        let mut script = ScriptBuilder::new();
        script.call_contract(
            "gas",
            "AllowGas",
            &[
                VmValue::Address(payer),
                VmValue::from(GAS_PRICE),
                VmValue::from(GAS_LIMIT),
            ],
        );
        build(&mut script);
        script.call_contract("gas", "SpendGas", &[VmValue::Address(payer)]);
        script.to_script()
    }

    /// Builds and signs a transaction for `chain`, paid by `payer`.
    pub fn build_tx(
        &mut self,
        chain: &str,
        payer: &PrivateKey,
        script: Vec<u8>,
        extra_signers: &[&PrivateKey],
    ) -> Transaction {
        self.nonce += 1;
        let mut tx = Transaction::new(
            &self.nexus.name,
            chain,
            payer.address(),
            script,
            BigInt::from(GAS_PRICE),
            GAS_LIMIT,
            self.clock.now().offset(3_600),
            self.nonce,
        );
        tx.sign(payer);
        for signer in extra_signers {
            tx.sign(signer);
        }
        tx
    }

    /// Produces a block with the given transactions at the current time.
    pub fn run_block(&mut self, chain: &str, txs: Vec<Transaction>) -> Result<Hash, ChainError> {
        let chain_id = self.chain_id(chain);
        let (height, previous_hash) = {
            let chain = self.nexus.chain(chain_id);
            (
                chain.height(),
                chain
                    .last_block()
                    .map(|block| block.hash())
                    .unwrap_or_else(Hash::zero),
            )
        };
        let hashes = txs.iter().map(|tx| tx.hash()).collect();
        let block = Block::new(
            height,
            self.clock.now(),
            previous_hash,
            self.validator.address(),
            hashes,
        );
        self.nexus.add_block(chain_id, block, txs)
    }

    /// One gas-bracketed contract call as a single-transaction block.
    ///
    /// Returns the transaction hash for fee lookups.
    pub fn run_contract_call(
        &mut self,
        chain: &str,
        payer: &PrivateKey,
        contract: &str,
        method: &str,
        args: &[VmValue],
    ) -> Result<Hash, ChainError> {
        let script = Self::gas_bracketed(payer.address(), |builder| {
            builder.call_contract(contract, method, args);
        });
        let tx = self.build_tx(chain, payer, script, &[]);
        let tx_hash = tx.hash();
        self.run_block(chain, vec![tx])?;
        Ok(tx_hash)
    }

    /// Fungible transfer as a single-transaction block.
    pub fn transfer(
        &mut self,
        chain: &str,
        from: &PrivateKey,
        to: Address,
        symbol: &str,
        amount: BigInt,
    ) -> Result<Hash, ChainError> {
        self.run_contract_call(
            chain,
            from,
            "token",
            "Transfer",
            &[
                VmValue::Address(from.address()),
                VmValue::Address(to),
                VmValue::from(symbol),
                VmValue::Number(amount),
            ],
        )
    }

    /// Asserts that the sum of all balances of `symbol` on `chain` equals
    /// the chain-local supply.
    pub fn assert_supply_invariant(&self, chain: &str, symbol: &str) {
        let chain = self.nexus.chain(self.chain_id(chain));
        assert_eq!(
            chain.sum_token_balances(symbol),
            chain.get_token_supply(symbol),
            "balance sum diverged from supply for {} on {}",
            symbol,
            chain.name
        );
    }
}
