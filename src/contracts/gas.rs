//! Gas contract: the escrow/payment bracket around every metered script.
//!
//! `AllowGas` locks the worst-case fuel cost before the payload runs;
//! `SpendGas` settles the actual cost afterwards, refunding the difference
//! and paying the block producer. The runtime intercepts both events to keep
//! its gas counters in sync.

use crate::contracts::token::move_fungible;
use crate::core::events::{EventKind, GasEventData};
use crate::core::nexus::FUEL_TOKEN_SYMBOL;
use crate::runtime::Runtime;
use crate::types::encoding::Encode;
use crate::virtual_machine::{VmError, VM};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};

pub(super) fn dispatch(method: &str, rt: &mut Runtime<'_>, vm: &mut VM) -> Result<(), VmError> {
    match method {
        "AllowGas" => {
            let from = vm.pop()?.as_address()?;
            let price = vm.pop()?.as_number()?;
            let limit = vm.pop()?.as_number()?;

            rt.expect_witness(&from)?;
            rt.expect(price.is_positive(), "gas price must be positive")?;
            rt.expect(limit.is_positive(), "gas limit must be positive")?;
            limit
                .to_u64()
                .ok_or(VmError::NumberOutOfRange)?;

            let escrow = &price * &limit;
            let chain_address = rt.chain_address();
            move_fungible(rt, &from, &chain_address, FUEL_TOKEN_SYMBOL, &escrow)?;

            rt.notify(
                EventKind::GasEscrow,
                from,
                GasEventData {
                    address: from,
                    price,
                    amount: limit,
                }
                .to_bytes(),
            );
            Ok(())
        }

        "SpendGas" => {
            let from = vm.pop()?.as_address()?;

            rt.expect_witness(&from)?;
            rt.expect(
                rt.gas.max > 0 && rt.gas.price.is_positive(),
                "no gas escrow to settle",
            )?;

            let used = BigInt::from(rt.gas.used);
            let limit = BigInt::from(rt.gas.max);
            rt.expect(used <= limit, "gas usage exceeds the escrow")?;

            let price = rt.gas.price.clone();
            let spent = &used * &price;
            let refund = (&limit - &used) * &price;

            let chain_address = rt.chain_address();
            let validator = rt.validator_address();
            if refund.is_positive() {
                move_fungible(rt, &chain_address, &from, FUEL_TOKEN_SYMBOL, &refund)?;
            }
            if spent.is_positive() {
                move_fungible(rt, &chain_address, &validator, FUEL_TOKEN_SYMBOL, &spent)?;
            }

            rt.notify(
                EventKind::GasPayment,
                from,
                GasEventData {
                    address: from,
                    price,
                    amount: used,
                }
                .to_bytes(),
            );
            Ok(())
        }

        other => Err(VmError::UnknownMethod(other.to_string())),
    }
}
