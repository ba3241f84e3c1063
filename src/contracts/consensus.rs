//! Consensus contract: the validator registry.
//!
//! Validator election itself is an external collaborator; the chain only
//! records who is eligible to produce blocks.

use crate::core::events::EventKind;
use crate::runtime::Runtime;
use crate::storage::{StorageContext, StorageList};
use crate::types::address::Address;
use crate::virtual_machine::{VmError, VmValue, VM};

fn validators() -> StorageList {
    StorageList::new(&b"consensus.validators"[..])
}

/// True when `address` is a registered validator.
pub fn is_validator<S: StorageContext + ?Sized>(store: &S, address: &Address) -> bool {
    validators()
        .all::<Address, _>(store)
        .iter()
        .any(|validator| validator == address)
}

/// All registered validators in registration order.
pub fn get_validators<S: StorageContext + ?Sized>(store: &S) -> Vec<Address> {
    validators().all(store)
}

pub(super) fn dispatch(method: &str, rt: &mut Runtime<'_>, vm: &mut VM) -> Result<(), VmError> {
    match method {
        "AddValidator" => {
            let address = vm.pop()?.as_address()?;

            let owner = rt.nexus.owner;
            rt.expect_witness(&owner)?;
            rt.expect(!is_validator(rt, &address), "already a validator")?;

            validators().add(rt, &address);
            rt.notify(EventKind::AddressAdd, address, Vec::new());
            Ok(())
        }

        "IsValidator" => {
            let address = vm.pop()?.as_address()?;
            let result = is_validator(rt, &address);
            vm.push(VmValue::Bool(result));
            Ok(())
        }

        other => Err(VmError::UnknownMethod(other.to_string())),
    }
}
