//! Native contracts reachable via CTX/SWITCH.
//!
//! Contracts are stateless dispatch tables: all state lives in chain storage
//! behind the runtime's change set, and the runtime is passed explicitly into
//! every call. Arguments arrive on the evaluation stack, method name on top.

pub mod account;
pub mod consensus;
pub mod gas;
pub mod market;
pub mod stake;
pub mod token;

use crate::runtime::Runtime;
use crate::types::address::Address;
use crate::virtual_machine::{VmError, VM};

/// The built-in contracts installed on every chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeContractKind {
    Token,
    Account,
    Stake,
    Gas,
    Consensus,
    Market,
}

impl NativeContractKind {
    pub const fn name(&self) -> &'static str {
        match self {
            NativeContractKind::Token => "token",
            NativeContractKind::Account => "account",
            NativeContractKind::Stake => "stake",
            NativeContractKind::Gas => "gas",
            NativeContractKind::Consensus => "consensus",
            NativeContractKind::Market => "market",
        }
    }

    /// The contract's derived system address; the key CTX resolves.
    pub fn address(&self) -> Address {
        Address::system(self.name())
    }

    pub const fn all() -> [NativeContractKind; 6] {
        [
            NativeContractKind::Token,
            NativeContractKind::Account,
            NativeContractKind::Stake,
            NativeContractKind::Gas,
            NativeContractKind::Consensus,
            NativeContractKind::Market,
        ]
    }
}

/// Entry point for SWITCH: pops the method name and routes to the contract.
pub fn dispatch(
    kind: NativeContractKind,
    rt: &mut Runtime<'_>,
    vm: &mut VM,
) -> Result<(), VmError> {
    let method = vm.pop()?.as_string()?;
    match kind {
        NativeContractKind::Token => token::dispatch(&method, rt, vm),
        NativeContractKind::Account => account::dispatch(&method, rt, vm),
        NativeContractKind::Stake => stake::dispatch(&method, rt, vm),
        NativeContractKind::Gas => gas::dispatch(&method, rt, vm),
        NativeContractKind::Consensus => consensus::dispatch(&method, rt, vm),
        NativeContractKind::Market => market::dispatch(&method, rt, vm),
    }
}
