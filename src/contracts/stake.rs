//! Staking contract: locking the staking token accrues fuel.
//!
//! Each staked SOUL-second yields `1 / ENERGY_RATIO_DIVISOR` KCAL per day.
//! Claims may be delegated through a proxy list: every registered proxy
//! receives its percentage of the generated fuel, the residue accrues to the
//! stake owner.

use crate::contracts::token;
use crate::core::events::{EventKind, TokenEventData};
use crate::core::nexus::{FUEL_TOKEN_SYMBOL, STAKING_TOKEN_SYMBOL};
use crate::runtime::Runtime;
use crate::storage::{StorageContext, StorageList, StorageMap};
use crate::types::address::Address;
use crate::types::encoding::Encode;
use crate::types::timestamp::{Timestamp, SECONDS_PER_DAY};
use crate::virtual_machine::{VmError, VmValue, VM};
use nexus_derive::BinaryCodec;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

/// Staked SOUL units per unit of daily KCAL generation; also the minimum
/// stake.
pub const ENERGY_RATIO_DIVISOR: u64 = 500;

/// A stake or claim ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct EnergyAction {
    pub amount: BigInt,
    pub timestamp: Timestamp,
}

/// One claim delegation: `address` receives `percentage` of generated fuel.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct EnergyProxy {
    pub address: Address,
    pub percentage: u8,
}

fn stakes() -> StorageMap {
    StorageMap::new(&b"stake.stakes"[..])
}

fn claims() -> StorageMap {
    StorageMap::new(&b"stake.claims"[..])
}

fn proxies_of(address: &Address) -> StorageList {
    StorageList::new(format!("stake.proxies.{}", address).into_bytes())
}

/// The current stake entry of `address`.
pub fn get_stake<S: StorageContext + ?Sized>(store: &S, address: &Address) -> Option<EnergyAction> {
    stakes().get(store, address.as_slice())
}

/// The last claim entry of `address`.
pub fn get_claim<S: StorageContext + ?Sized>(store: &S, address: &Address) -> Option<EnergyAction> {
    claims().get(store, address.as_slice())
}

/// The proxy list of `address` in registration order.
pub fn get_proxies<S: StorageContext + ?Sized>(store: &S, address: &Address) -> Vec<EnergyProxy> {
    proxies_of(address).all(store)
}

pub(super) fn dispatch(method: &str, rt: &mut Runtime<'_>, vm: &mut VM) -> Result<(), VmError> {
    match method {
        "Stake" => {
            let from = vm.pop()?.as_address()?;
            let amount = vm.pop()?.as_number()?;

            rt.expect_witness(&from)?;
            rt.expect(
                amount >= BigInt::from(ENERGY_RATIO_DIVISOR),
                "stake is below the minimum",
            )?;

            let chain_address = rt.chain_address();
            token::move_fungible(rt, &from, &chain_address, STAKING_TOKEN_SYMBOL, &amount)?;

            // Re-staking replaces the entry and restarts the clock.
            let entry = EnergyAction {
                amount: amount.clone(),
                timestamp: rt.time(),
            };
            stakes().put(rt, from.as_slice(), &entry);

            let chain_name = rt.chain_name();
            rt.notify(
                EventKind::TokenStake,
                from,
                TokenEventData::new(STAKING_TOKEN_SYMBOL, amount, &chain_name).to_bytes(),
            );
            Ok(())
        }

        "Unstake" => {
            let from = vm.pop()?.as_address()?;

            rt.expect_witness(&from)?;
            let entry = get_stake(rt, &from)
                .ok_or_else(|| VmError::Aborted("nothing staked".to_string()))?;
            rt.expect(
                rt.time() - entry.timestamp >= SECONDS_PER_DAY as i64,
                "stake is still locked",
            )?;

            let chain_address = rt.chain_address();
            token::move_fungible(
                rt,
                &chain_address,
                &from,
                STAKING_TOKEN_SYMBOL,
                &entry.amount,
            )?;
            stakes().remove(rt, from.as_slice());
            claims().remove(rt, from.as_slice());

            let chain_name = rt.chain_name();
            rt.notify(
                EventKind::TokenUnstake,
                from,
                TokenEventData::new(STAKING_TOKEN_SYMBOL, entry.amount, &chain_name).to_bytes(),
            );
            Ok(())
        }

        "Claim" => {
            let from = vm.pop()?.as_address()?;
            let stake_address = vm.pop()?.as_address()?;

            rt.expect_witness(&from)?;
            claim(rt, &from, &stake_address)
        }

        "AddProxy" => {
            let from = vm.pop()?.as_address()?;
            let to = vm.pop()?.as_address()?;
            let percentage = vm
                .pop()?
                .as_number()?
                .to_u8()
                .ok_or(VmError::NumberOutOfRange)?;

            rt.expect_witness(&from)?;
            rt.expect(
                percentage > 0 && percentage <= 100,
                "percentage must be between 1 and 100",
            )?;
            rt.expect(from != to, "cannot delegate to yourself")?;

            let list = proxies_of(&from);
            let existing: Vec<EnergyProxy> = list.all(rt);

            // Replacement counts the new percentage instead of the old one.
            let mut total: u32 = percentage as u32;
            for proxy in existing.iter().filter(|proxy| proxy.address != to) {
                total += proxy.percentage as u32;
            }
            rt.expect(total <= 100, "proxy percentages exceed 100")?;

            let entry = EnergyProxy {
                address: to,
                percentage,
            };
            match existing.iter().position(|proxy| proxy.address == to) {
                Some(index) => list.replace(rt, index as u64, &entry),
                None => list.add(rt, &entry),
            }

            rt.notify(EventKind::AddressAdd, from, to.to_vec());
            Ok(())
        }

        "RemoveProxy" => {
            let from = vm.pop()?.as_address()?;
            let to = vm.pop()?.as_address()?;

            rt.expect_witness(&from)?;
            let list = proxies_of(&from);
            let existing: Vec<EnergyProxy> = list.all(rt);
            let index = existing
                .iter()
                .position(|proxy| proxy.address == to)
                .ok_or_else(|| VmError::Aborted("no such proxy".to_string()))?;

            list.remove_at(rt, index as u64);
            rt.notify(EventKind::AddressRemove, from, to.to_vec());
            Ok(())
        }

        "ClearProxies" => {
            let from = vm.pop()?.as_address()?;

            rt.expect_witness(&from)?;
            proxies_of(&from).clear(rt);
            rt.notify(EventKind::AddressRemove, from, Vec::new());
            Ok(())
        }

        "GetProxies" => {
            let address = vm.pop()?.as_address()?;
            let fields = get_proxies(rt, &address)
                .into_iter()
                .map(|proxy| {
                    (
                        proxy.address.to_string(),
                        VmValue::from(proxy.percentage as u64),
                    )
                })
                .collect();
            vm.push(VmValue::Struct(fields));
            Ok(())
        }

        "GetStake" => {
            let address = vm.pop()?.as_address()?;
            let amount = get_stake(rt, &address)
                .map(|entry| entry.amount)
                .unwrap_or_else(BigInt::zero);
            vm.push(VmValue::Number(amount));
            Ok(())
        }

        other => Err(VmError::UnknownMethod(other.to_string())),
    }
}

/// Settles the accrued fuel of `stake_address`.
///
/// The recorded claim stores the staked amount rather than the paid amount,
/// so repeated claims within the same day find nothing left to collect.
fn claim(rt: &mut Runtime<'_>, from: &Address, stake_address: &Address) -> Result<(), VmError> {
    let stake = get_stake(rt, stake_address)
        .ok_or_else(|| VmError::Aborted("nothing staked".to_string()))?;
    let last = get_claim(rt, stake_address);
    let now = rt.time();

    let already_claimed = match &last {
        Some(last) if now.days_since(last.timestamp) < 1 => last.amount.clone(),
        _ => BigInt::zero(),
    };
    let unclaimed = &stake.amount - already_claimed;
    rt.expect(unclaimed.is_positive(), "nothing to claim")?;

    let fuel = unclaimed / ENERGY_RATIO_DIVISOR;
    rt.expect(fuel.is_positive(), "stake too small to generate fuel")?;

    let proxies = get_proxies(rt, stake_address);
    if from != stake_address {
        rt.expect(
            proxies.iter().any(|proxy| proxy.address == *from),
            "not a proxy of the stake owner",
        )?;
    }

    // Integer division truncates each share; the residue accrues to the
    // stake owner.
    let mut distributed = BigInt::zero();
    for proxy in &proxies {
        let share = &fuel * proxy.percentage / 100u32;
        if share.is_positive() {
            token::mint(rt, &proxy.address, FUEL_TOKEN_SYMBOL, &share)?;
            distributed += share;
        }
    }
    let residue = &fuel - distributed;
    if residue.is_positive() {
        token::mint(rt, stake_address, FUEL_TOKEN_SYMBOL, &residue)?;
    }

    claims().put(
        rt,
        stake_address.as_slice(),
        &EnergyAction {
            amount: stake.amount,
            timestamp: now,
        },
    );

    let chain_name = rt.chain_name();
    rt.notify(
        EventKind::TokenClaim,
        *stake_address,
        TokenEventData::new(FUEL_TOKEN_SYMBOL, fuel, &chain_name).to_bytes(),
    );
    Ok(())
}
