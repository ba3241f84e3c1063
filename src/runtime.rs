//! Per-transaction execution host.
//!
//! A [`Runtime`] borrows the nexus for the duration of one script run. It
//! layers the transaction's change set over the block's accumulated changes
//! over the chain's committed storage, collects events, tracks gas, and
//! dispatches interop and contract calls for the VM.

use crate::contracts;
use crate::core::chain::ChainId;
use crate::core::events::{Event, EventKind, GasEventData};
use crate::core::nexus::Nexus;
use crate::core::transaction::Transaction;
use crate::crypto::key_pair::{PublicKey, SerializableSignature};
use crate::crypto::{ripemd160, sha256};
use crate::info;
use crate::storage::{ChangeSet, StorageContext};
use crate::types::address::Address;
use crate::types::encoding::Decode;
use crate::types::timestamp::Timestamp;
use crate::virtual_machine::{InteropHost, VmError, VmValue, VM};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Maximum nesting of contract contexts within one transaction.
pub const MAX_CONTEXT_DEPTH: usize = 16;

/// Coordinates of the block a transaction executes inside.
///
/// Absent for read-only invocations.
#[derive(Clone, Copy, Debug)]
pub struct BlockInfo {
    pub height: u32,
    pub timestamp: Timestamp,
    pub validator: Address,
}

/// Gas counters for one transaction.
///
/// `max` and `price` start from the transaction's own declaration and are
/// overwritten when the gas contract's escrow event arrives; `paid` is set by
/// the payment event.
#[derive(Clone, Debug)]
pub struct GasTracker {
    /// False while the fuel token has no supply (pre-minting bootstrap);
    /// sampled once when the runtime is created.
    pub enabled: bool,
    pub used: u64,
    pub max: u64,
    pub price: BigInt,
    pub paid: BigInt,
}

/// Execution state for one transaction on one chain.
pub struct Runtime<'a> {
    pub nexus: &'a mut Nexus,
    pub chain_id: ChainId,
    pub block: Option<BlockInfo>,
    pub tx: Option<&'a Transaction>,
    /// Writes performed by this transaction; merged on Halt, dropped on
    /// Fault.
    pub changes: ChangeSet,
    /// Snapshot of the changes committed by earlier transactions of the same
    /// block. Read-only during this transaction.
    block_changes: ChangeSet,
    pub events: Vec<Event>,
    pub gas: GasTracker,
    context_stack: Vec<Address>,
}

impl<'a> Runtime<'a> {
    pub fn new(
        nexus: &'a mut Nexus,
        chain_id: ChainId,
        block: Option<BlockInfo>,
        tx: Option<&'a Transaction>,
        block_changes: ChangeSet,
    ) -> Self {
        let enabled = nexus.fuel_token_minted();
        let max = tx.map(|tx| tx.gas_limit).unwrap_or(u64::MAX);
        let price = tx
            .map(|tx| tx.gas_price.clone())
            .unwrap_or_else(|| BigInt::from(0));

        Self {
            nexus,
            chain_id,
            block,
            tx,
            changes: ChangeSet::new(),
            block_changes,
            events: Vec::new(),
            gas: GasTracker {
                enabled,
                used: 0,
                max,
                price,
                paid: BigInt::from(0),
            },
            context_stack: Vec::new(),
        }
    }

    /// Runs a script to completion.
    ///
    /// At Halt, a transaction that consumed more gas than it paid for is
    /// flipped to a fault, which enforces the gas contract bracket.
    pub fn execute(&mut self, script: &[u8]) -> Result<VM, VmError> {
        let mut vm = VM::new();
        vm.run(script, self)?;

        if self.tx.is_some() && self.gas.enabled && BigInt::from(self.gas.used) > self.gas.paid {
            return Err(VmError::Aborted(format!(
                "gas payment of {} does not cover {} units used",
                self.gas.paid, self.gas.used
            )));
        }

        Ok(vm)
    }

    /// The current time: the enclosing block's timestamp, falling back to the
    /// chain tip for read-only invocations.
    pub fn time(&self) -> Timestamp {
        if let Some(block) = &self.block {
            return block.timestamp;
        }
        self.chain()
            .last_block()
            .map(|block| block.timestamp)
            .unwrap_or_default()
    }

    /// Witness oracle.
    ///
    /// Before genesis exists only the nexus owner counts as witnessed; after
    /// that the transaction's signature set decides.
    pub fn is_witness(&self, address: &Address) -> bool {
        if self.nexus.genesis_hash().is_none() {
            return *address == self.nexus.owner;
        }
        match self.tx {
            Some(tx) => tx.is_signed_by(address),
            None => false,
        }
    }

    /// Aborts the transaction with `reason` unless `condition` holds.
    pub fn expect(&self, condition: bool, reason: &str) -> Result<(), VmError> {
        if condition {
            Ok(())
        } else {
            Err(VmError::Aborted(reason.to_string()))
        }
    }

    pub fn expect_witness(&self, address: &Address) -> Result<(), VmError> {
        self.expect(
            self.is_witness(address),
            &format!("missing witness for {}", address),
        )
    }

    /// Appends an event to the transaction log.
    ///
    /// GasEscrow and GasPayment are intercepted to update the gas counters.
    pub fn notify(&mut self, kind: EventKind, address: Address, data: Vec<u8>) {
        match kind {
            EventKind::GasEscrow => {
                if let Ok(escrow) = GasEventData::from_bytes(&data) {
                    self.gas.price = escrow.price;
                    self.gas.max = escrow.amount.to_u64().unwrap_or(u64::MAX);
                }
            }
            EventKind::GasPayment => {
                if let Ok(payment) = GasEventData::from_bytes(&data) {
                    self.gas.paid = payment.amount;
                }
            }
            _ => {}
        }
        self.events.push(Event::new(kind, address, data));
    }

    pub fn chain(&self) -> &crate::core::chain::Chain {
        self.nexus.chain(self.chain_id)
    }

    pub fn chain_name(&self) -> String {
        self.chain().name.clone()
    }

    pub fn chain_address(&self) -> Address {
        self.chain().address
    }

    /// Recipient of gas payments: the block producer, or the chain itself for
    /// read-only invocations.
    pub fn validator_address(&self) -> Address {
        self.block
            .as_ref()
            .map(|block| block.validator)
            .unwrap_or_else(|| self.chain_address())
    }
}

impl StorageContext for Runtime<'_> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(value) = self.changes.get(key) {
            return value;
        }
        if let Some(value) = self.block_changes.get(key) {
            return value;
        }
        self.chain().storage.get(key)
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) {
        self.changes.put(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.changes.delete(key);
    }
}

impl InteropHost for Runtime<'_> {
    fn consume_gas(&mut self, amount: u64) -> Result<(), VmError> {
        if !self.gas.enabled || amount == 0 {
            return Ok(());
        }
        self.gas.used += amount;
        if self.gas.used > self.gas.max {
            return Err(VmError::OutOfGas {
                used: self.gas.used,
                limit: self.gas.max,
            });
        }
        Ok(())
    }

    fn invoke_interop(&mut self, name: &str, vm: &mut VM) -> Result<(), VmError> {
        match name {
            "Runtime.Time" => {
                vm.push(VmValue::from(self.time().0));
                Ok(())
            }
            "Runtime.IsWitness" => {
                let address = vm.pop()?.as_address()?;
                let witnessed = self.is_witness(&address);
                vm.push(VmValue::Bool(witnessed));
                Ok(())
            }
            "Runtime.Log" => {
                let message = vm.pop()?.as_string()?;
                info!("script: {}", message);
                Ok(())
            }
            "Runtime.Notify" => {
                let kind_raw = self.pop_u8(vm)?;
                let address = vm.pop()?.as_address()?;
                let data = vm.pop()?.as_bytes()?;
                let kind = EventKind::from_bytes(&[kind_raw])
                    .map_err(|_| VmError::Aborted("unknown event kind".to_string()))?;
                self.notify(kind, address, data);
                Ok(())
            }
            "Crypto.Sha256" => {
                let data = vm.pop()?.as_bytes()?;
                vm.push(VmValue::Bytes(sha256(&data).to_vec()));
                Ok(())
            }
            "Crypto.Ripemd160" => {
                let data = vm.pop()?.as_bytes()?;
                vm.push(VmValue::Bytes(ripemd160(&data).to_vec()));
                Ok(())
            }
            "Crypto.Secp256r1Verify" => {
                let key = vm.pop()?.as_bytes()?;
                let message = vm.pop()?.as_bytes()?;
                let signature = vm.pop()?.as_bytes()?;
                // Malformed keys or signatures verify as false rather than
                // faulting, so scripts can probe untrusted input.
                let valid = match (
                    PublicKey::from_bytes(&key),
                    SerializableSignature::from_bytes(&signature),
                ) {
                    (Ok(key), Ok(signature)) => key.verify(&message, &signature),
                    _ => false,
                };
                vm.push(VmValue::Bool(valid));
                Ok(())
            }
            "Nexus.TokenExists" => {
                let symbol = vm.pop()?.as_string()?;
                let exists = self.nexus.token(&symbol).is_some();
                vm.push(VmValue::Bool(exists));
                Ok(())
            }
            "Nexus.CreateChain" => {
                let owner = vm.pop()?.as_address()?;
                let parent = vm.pop()?.as_string()?;
                let name = vm.pop()?.as_string()?;
                self.expect_witness(&owner)?;
                self.expect(
                    owner == self.nexus.owner,
                    "only the nexus owner may create chains",
                )?;
                let parent_id = self
                    .nexus
                    .find_chain(&parent)
                    .ok_or_else(|| VmError::Aborted(format!("unknown chain: {}", parent)))?;
                self.nexus
                    .create_chain(&name, parent_id)
                    .map_err(|err| VmError::Aborted(err.to_string()))?;
                self.notify(EventKind::ChainCreate, owner, name.into_bytes());
                Ok(())
            }
            other => Err(VmError::UnknownInterop(other.to_string())),
        }
    }

    fn resolve_context(&mut self, address: &Address) -> Result<(), VmError> {
        if self.chain().find_contract(address).is_some() {
            Ok(())
        } else {
            Err(VmError::UnknownContext(address.to_string()))
        }
    }

    fn enter_context(&mut self, address: &Address, vm: &mut VM) -> Result<(), VmError> {
        let contract = self
            .chain()
            .find_contract(address)
            .ok_or_else(|| VmError::UnknownContext(address.to_string()))?;

        if self.context_stack.len() >= MAX_CONTEXT_DEPTH {
            return Err(VmError::CallStackOverflow);
        }

        self.context_stack.push(*address);
        let result = contracts::dispatch(contract, self, vm);
        self.context_stack.pop();
        result
    }

    fn active_address(&self) -> Address {
        self.context_stack
            .last()
            .copied()
            .unwrap_or_else(|| self.chain_address())
    }
}

impl Runtime<'_> {
    fn pop_u8(&self, vm: &mut VM) -> Result<u8, VmError> {
        let n = vm.pop()?.as_number()?;
        n.to_u8().ok_or(VmError::NumberOutOfRange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key_pair::PrivateKey;
    use crate::types::encoding::Encode;
    use crate::virtual_machine::ScriptBuilder;

    fn read_only_runtime(nexus: &mut Nexus) -> Runtime<'_> {
        Runtime::new(nexus, 0, None, None, ChangeSet::new())
    }

    fn run_interop(runtime: &mut Runtime<'_>, name: &str, args: &[VmValue]) -> VmValue {
        let script = ScriptBuilder::new().call_interop(name, args).to_script();
        let mut vm = VM::new();
        vm.run(&script, runtime).expect("interop faulted");
        vm.pop().expect("interop left no result")
    }

    #[test]
    fn sha256_interop_matches_host_digest() {
        let mut nexus = Nexus::new("tests", Address::NULL);
        let mut runtime = read_only_runtime(&mut nexus);

        let result = run_interop(
            &mut runtime,
            "Crypto.Sha256",
            &[VmValue::Bytes(b"payload".to_vec())],
        );
        assert_eq!(result, VmValue::Bytes(sha256(b"payload").to_vec()));
    }

    #[test]
    fn ripemd160_interop_matches_host_digest() {
        let mut nexus = Nexus::new("tests", Address::NULL);
        let mut runtime = read_only_runtime(&mut nexus);

        let result = run_interop(
            &mut runtime,
            "Crypto.Ripemd160",
            &[VmValue::Bytes(b"payload".to_vec())],
        );
        assert_eq!(result, VmValue::Bytes(ripemd160(b"payload").to_vec()));
    }

    #[test]
    fn secp256r1_verify_interop_checks_signatures() {
        let mut nexus = Nexus::new("tests", Address::NULL);
        let mut runtime = read_only_runtime(&mut nexus);

        let key = PrivateKey::new();
        let signature = key.sign(b"message").to_bytes();
        let public = key.address().to_vec();

        let valid = run_interop(
            &mut runtime,
            "Crypto.Secp256r1Verify",
            &[
                VmValue::Bytes(public.clone()),
                VmValue::Bytes(b"message".to_vec()),
                VmValue::Bytes(signature.clone()),
            ],
        );
        assert_eq!(valid, VmValue::Bool(true));

        let tampered = run_interop(
            &mut runtime,
            "Crypto.Secp256r1Verify",
            &[
                VmValue::Bytes(public),
                VmValue::Bytes(b"other".to_vec()),
                VmValue::Bytes(signature),
            ],
        );
        assert_eq!(tampered, VmValue::Bool(false));
    }

    #[test]
    fn secp256r1_verify_rejects_malformed_input() {
        let mut nexus = Nexus::new("tests", Address::NULL);
        let mut runtime = read_only_runtime(&mut nexus);

        let key = PrivateKey::new();
        let signature = key.sign(b"message").to_bytes();

        // 0x00 is not a valid compressed-point prefix.
        let result = run_interop(
            &mut runtime,
            "Crypto.Secp256r1Verify",
            &[
                VmValue::Bytes(vec![0u8; 33]),
                VmValue::Bytes(b"message".to_vec()),
                VmValue::Bytes(signature),
            ],
        );
        assert_eq!(result, VmValue::Bool(false));
    }

    #[test]
    fn unknown_interop_name_faults() {
        let mut nexus = Nexus::new("tests", Address::NULL);
        let mut runtime = read_only_runtime(&mut nexus);

        let script = ScriptBuilder::new()
            .call_interop("Crypto.Missing", &[])
            .to_script();
        let mut vm = VM::new();
        assert!(matches!(
            vm.run(&script, &mut runtime),
            Err(VmError::UnknownInterop(_))
        ));
    }
}
