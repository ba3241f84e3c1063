//! Account contract: bidirectional address/name registration.

use crate::core::events::EventKind;
use crate::runtime::Runtime;
use crate::storage::{StorageContext, StorageMap};
use crate::types::address::Address;
use crate::virtual_machine::{VmError, VmValue, VM};

/// Shortest and longest registrable names.
pub const MIN_NAME_LENGTH: usize = 4;
pub const MAX_NAME_LENGTH: usize = 15;

fn names() -> StorageMap {
    StorageMap::new(&b"account.names"[..])
}

fn addresses() -> StorageMap {
    StorageMap::new(&b"account.addresses"[..])
}

/// Names are 4 to 15 lowercase ASCII letters.
pub fn is_valid_name(name: &str) -> bool {
    name.len() >= MIN_NAME_LENGTH
        && name.len() <= MAX_NAME_LENGTH
        && name.bytes().all(|byte| byte.is_ascii_lowercase())
}

/// The name registered for `address`, if any.
pub fn look_up_address<S: StorageContext + ?Sized>(store: &S, address: &Address) -> Option<String> {
    addresses().get(store, address.as_slice())
}

/// The address a name is registered to, if any.
pub fn look_up_name<S: StorageContext + ?Sized>(store: &S, name: &str) -> Option<Address> {
    names().get(store, name.as_bytes())
}

pub(super) fn dispatch(method: &str, rt: &mut Runtime<'_>, vm: &mut VM) -> Result<(), VmError> {
    match method {
        "Register" => {
            let from = vm.pop()?.as_address()?;
            let name = vm.pop()?.as_string()?;

            rt.expect_witness(&from)?;
            rt.expect(is_valid_name(&name), "name must be 4-15 lowercase letters")?;
            rt.expect(
                look_up_name(rt, &name).is_none(),
                "name is already registered",
            )?;
            rt.expect(
                look_up_address(rt, &from).is_none(),
                "address already has a name",
            )?;

            names().put(rt, name.as_bytes(), &from);
            addresses().put(rt, from.as_slice(), &name);
            rt.notify(EventKind::AddressRegister, from, name.into_bytes());
            Ok(())
        }

        "LookUpName" => {
            let name = vm.pop()?.as_string()?;
            let value = match look_up_name(rt, &name) {
                Some(address) => VmValue::Address(address),
                None => VmValue::None,
            };
            vm.push(value);
            Ok(())
        }

        "LookUpAddress" => {
            let address = vm.pop()?.as_address()?;
            let value = match look_up_address(rt, &address) {
                Some(name) => VmValue::String(name),
                None => VmValue::None,
            };
            vm.push(value);
            Ok(())
        }

        other => Err(VmError::UnknownMethod(other.to_string())),
    }
}
