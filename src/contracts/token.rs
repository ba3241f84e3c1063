//! Token contract: creation, minting, transfers, burning, and the two-phase
//! cross-chain escrow protocol.

use crate::core::events::{EventKind, MetadataEventData, TokenEscrowData, TokenEventData};
use crate::core::tokens::{BalanceSheet, OwnershipSheet, TokenContent, TokenFlags};
use crate::runtime::Runtime;
use crate::storage::StorageMap;
use crate::types::address::Address;
use crate::types::encoding::Encode;
use crate::types::hash::Hash;
use crate::virtual_machine::{VmError, VM};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

/// Tracks consumed cross-chain receipts on the settling chain.
fn settlements() -> StorageMap {
    StorageMap::new(&b"token.settled"[..])
}

fn metadata(symbol: &str) -> StorageMap {
    StorageMap::new(format!("token.meta.{}", symbol).into_bytes())
}

pub(super) fn dispatch(method: &str, rt: &mut Runtime<'_>, vm: &mut VM) -> Result<(), VmError> {
    match method {
        "Create" => {
            let owner = vm.pop()?.as_address()?;
            let symbol = vm.pop()?.as_string()?;
            let name = vm.pop()?.as_string()?;
            let max_supply = vm.pop()?.as_number()?;
            let decimals = vm
                .pop()?
                .as_number()?
                .to_u32()
                .ok_or(VmError::NumberOutOfRange)?;
            let flags = TokenFlags(
                vm.pop()?
                    .as_number()?
                    .to_u32()
                    .ok_or(VmError::NumberOutOfRange)?,
            );

            rt.expect_witness(&owner)?;
            rt.expect(
                owner == rt.nexus.owner,
                "only the nexus owner may create tokens",
            )?;
            rt.nexus
                .create_token(&symbol, &name, max_supply, decimals, flags, owner)
                .map_err(|err| VmError::Aborted(err.to_string()))?;
            rt.notify(EventKind::TokenCreate, owner, symbol.into_bytes());
            Ok(())
        }

        "Mint" => {
            let to = vm.pop()?.as_address()?;
            let symbol = vm.pop()?.as_string()?;
            let amount = vm.pop()?.as_number()?;

            let owner = token_owner(rt, &symbol)?;
            rt.expect_witness(&owner)?;
            mint(rt, &to, &symbol, &amount)
        }

        "Burn" => {
            let from = vm.pop()?.as_address()?;
            let symbol = vm.pop()?.as_string()?;
            let amount = vm.pop()?.as_number()?;

            rt.expect_witness(&from)?;
            let (fungible, burnable) = {
                let token = require_token(rt, &symbol)?;
                (token.is_fungible(), token.is_burnable())
            };
            rt.expect(fungible, "token is not fungible")?;
            rt.expect(burnable, "token is not burnable")?;
            rt.expect(amount.is_positive(), "burn amount must be positive")?;

            let sheet = BalanceSheet::new(&symbol);
            let debited = sheet.subtract(rt, &from, &amount);
            rt.expect(debited, "insufficient balance to burn")?;
            let shrunk = sheet.subtract_supply(rt, &amount);
            rt.expect(shrunk, "chain supply underflow")?;
            if let Some(token) = rt.nexus.token_mut(&symbol) {
                token.current_supply -= &amount;
            }
            let chain_name = rt.chain_name();
            rt.notify(
                EventKind::TokenBurn,
                from,
                TokenEventData::new(&symbol, amount, &chain_name).to_bytes(),
            );
            Ok(())
        }

        "Transfer" => {
            let from = vm.pop()?.as_address()?;
            let to = vm.pop()?.as_address()?;
            let symbol = vm.pop()?.as_string()?;
            let amount = vm.pop()?.as_number()?;

            rt.expect_witness(&from)?;
            rt.expect(from != to, "sender and receiver are the same")?;
            let (fungible, transferable) = {
                let token = require_token(rt, &symbol)?;
                (token.is_fungible(), token.is_transferable())
            };
            rt.expect(fungible, "token is not fungible")?;
            rt.expect(transferable, "token is not transferable")?;
            rt.expect(amount.is_positive(), "transfer amount must be positive")?;

            move_fungible(rt, &from, &to, &symbol, &amount)?;

            let chain_name = rt.chain_name();
            let data = TokenEventData::new(&symbol, amount, &chain_name).to_bytes();
            rt.notify(EventKind::TokenSend, from, data.clone());
            rt.notify(EventKind::TokenReceive, to, data);
            Ok(())
        }

        "MintToken" => {
            let to = vm.pop()?.as_address()?;
            let symbol = vm.pop()?.as_string()?;
            let rom = vm.pop()?.as_bytes()?;
            let ram = vm.pop()?.as_bytes()?;

            let owner = token_owner(rt, &symbol)?;
            rt.expect_witness(&owner)?;
            let fungible = require_token(rt, &symbol)?.is_fungible();
            rt.expect(!fungible, "token is fungible")?;

            let id = rt
                .nexus
                .allocate_token_id(&symbol)
                .map_err(|err| VmError::Aborted(err.to_string()))?;
            let content = TokenContent { rom, ram };
            OwnershipSheet::new(&symbol).give(rt, &to, &id, Some(&content));

            let chain_name = rt.chain_name();
            rt.notify(
                EventKind::TokenMint,
                to,
                TokenEventData::new(&symbol, id, &chain_name).to_bytes(),
            );
            Ok(())
        }

        "BurnToken" => {
            let from = vm.pop()?.as_address()?;
            let symbol = vm.pop()?.as_string()?;
            let id = vm.pop()?.as_number()?;

            rt.expect_witness(&from)?;
            require_token(rt, &symbol)?;

            // Ownership is destroyed; the content record survives so the
            // burned id's ROM/RAM remain inspectable.
            let sheet = OwnershipSheet::new(&symbol);
            let taken = sheet.take(rt, &from, &id);
            rt.expect(taken, "address does not hold the token")?;
            if let Some(token) = rt.nexus.token_mut(&symbol) {
                token.current_supply -= BigInt::from(1u32);
            }
            let chain_name = rt.chain_name();
            rt.notify(
                EventKind::TokenBurn,
                from,
                TokenEventData::new(&symbol, id, &chain_name).to_bytes(),
            );
            Ok(())
        }

        "TransferToken" => {
            let from = vm.pop()?.as_address()?;
            let to = vm.pop()?.as_address()?;
            let symbol = vm.pop()?.as_string()?;
            let id = vm.pop()?.as_number()?;

            rt.expect_witness(&from)?;
            rt.expect(from != to, "sender and receiver are the same")?;
            require_token(rt, &symbol)?;

            move_nft(rt, &from, &to, &symbol, &id)?;

            let chain_name = rt.chain_name();
            let data = TokenEventData::new(&symbol, id, &chain_name).to_bytes();
            rt.notify(EventKind::TokenSend, from, data.clone());
            rt.notify(EventKind::TokenReceive, to, data);
            Ok(())
        }

        "SetMetadata" => {
            let from = vm.pop()?.as_address()?;
            let symbol = vm.pop()?.as_string()?;
            let key = vm.pop()?.as_string()?;
            let value = vm.pop()?.as_bytes()?;

            let owner = token_owner(rt, &symbol)?;
            rt.expect_witness(&from)?;
            rt.expect(from == owner, "only the token owner may set metadata")?;

            metadata(&symbol).put(rt, key.as_bytes(), &value);
            rt.notify(
                EventKind::Metadata,
                from,
                MetadataEventData { key, value }.to_bytes(),
            );
            Ok(())
        }

        "SideChainSend" => {
            let from = vm.pop()?.as_address()?;
            let to = vm.pop()?.as_address()?;
            let target_chain = vm.pop()?.as_string()?;
            let symbol = vm.pop()?.as_string()?;
            let amount = vm.pop()?.as_number()?;
            let cross_fee = vm.pop()?.as_number()?;

            rt.expect_witness(&from)?;
            rt.expect(amount.is_positive(), "escrow amount must be positive")?;
            rt.expect(!cross_fee.is_negative(), "cross-chain fee must not be negative")?;
            require_token(rt, &symbol)?;
            expect_adjacent(rt, &target_chain)?;

            // The escrowed amount leaves this chain's circulation entirely;
            // settlement re-creates it on the target chain.
            let sheet = BalanceSheet::new(&symbol);
            let debited = sheet.subtract(rt, &from, &amount);
            rt.expect(debited, "insufficient balance for escrow")?;
            let shrunk = sheet.subtract_supply(rt, &amount);
            rt.expect(shrunk, "chain supply underflow")?;

            if cross_fee.is_positive() {
                let validator = rt.validator_address();
                move_fungible(rt, &from, &validator, &symbol, &cross_fee)?;
            }

            rt.notify(
                EventKind::TokenEscrow,
                to,
                TokenEscrowData {
                    symbol,
                    value: amount,
                    chain_name: target_chain,
                    content: None,
                }
                .to_bytes(),
            );
            Ok(())
        }

        "SideChainSendToken" => {
            let from = vm.pop()?.as_address()?;
            let to = vm.pop()?.as_address()?;
            let target_chain = vm.pop()?.as_string()?;
            let symbol = vm.pop()?.as_string()?;
            let id = vm.pop()?.as_number()?;

            rt.expect_witness(&from)?;
            require_token(rt, &symbol)?;
            expect_adjacent(rt, &target_chain)?;

            let sheet = OwnershipSheet::new(&symbol);
            let taken = sheet.take(rt, &from, &id);
            rt.expect(taken, "address does not hold the token")?;
            let content = sheet
                .remove_content(rt, &id)
                .ok_or_else(|| VmError::Aborted("token content is missing".to_string()))?;

            rt.notify(
                EventKind::TokenEscrow,
                to,
                TokenEscrowData {
                    symbol,
                    value: id,
                    chain_name: target_chain,
                    content: Some(content),
                }
                .to_bytes(),
            );
            Ok(())
        }

        "SettleBlock" => {
            let source_chain = vm.pop()?.as_string()?;
            let block_hash = Hash::from_slice(&vm.pop()?.as_bytes()?)
                .ok_or_else(|| VmError::Aborted("malformed block hash".to_string()))?;
            let to = vm.pop()?.as_address()?;

            settle_block(rt, &source_chain, &block_hash, &to)
        }

        other => Err(VmError::UnknownMethod(other.to_string())),
    }
}

/// Second phase of a cross-chain transfer: credits every escrow in the
/// finalized source block destined for `to` on this chain, consuming the
/// receipt `(source block hash, destination)` exactly once.
fn settle_block(
    rt: &mut Runtime<'_>,
    source_chain: &str,
    block_hash: &Hash,
    to: &Address,
) -> Result<(), VmError> {
    expect_adjacent(rt, source_chain)?;

    let this_chain = rt.chain_name();
    let source_id = rt
        .nexus
        .find_chain(source_chain)
        .ok_or_else(|| VmError::Aborted(format!("unknown chain: {}", source_chain)))?;

    // Receipts keyed by (block hash, destination): double settlement faults.
    let mut receipt_key = block_hash.to_vec();
    receipt_key.extend_from_slice(to.as_slice());
    rt.expect(
        !settlements().contains(rt, &receipt_key),
        "escrow already settled",
    )?;

    let escrows: Vec<TokenEscrowData> = {
        let source = rt.nexus.chain(source_id);
        let block = source
            .get_block(block_hash)
            .ok_or_else(|| VmError::Aborted("source block not finalized".to_string()))?;
        block
            .all_events()
            .filter(|event| event.kind == EventKind::TokenEscrow && event.address == *to)
            .filter_map(|event| event.decode_data::<TokenEscrowData>())
            .filter(|escrow| escrow.chain_name == this_chain)
            .collect()
    };

    rt.expect(!escrows.is_empty(), "escrow not found")?;

    for escrow in escrows {
        match escrow.content {
            None => {
                let sheet = BalanceSheet::new(&escrow.symbol);
                sheet.add(rt, to, &escrow.value);
                sheet.add_supply(rt, &escrow.value);
            }
            Some(content) => {
                OwnershipSheet::new(&escrow.symbol).give(rt, to, &escrow.value, Some(&content));
            }
        }
        let data = TokenEventData::new(&escrow.symbol, escrow.value, &this_chain).to_bytes();
        rt.notify(EventKind::TokenReceive, *to, data);
    }

    settlements().put(rt, &receipt_key, &true);
    Ok(())
}

/// Moves fungible balance between two accounts on the current chain without
/// touching the supply. Shared by the gas, stake, and market contracts.
pub(crate) fn move_fungible(
    rt: &mut Runtime<'_>,
    from: &Address,
    to: &Address,
    symbol: &str,
    amount: &BigInt,
) -> Result<(), VmError> {
    if amount.is_zero() {
        return Ok(());
    }
    let sheet = BalanceSheet::new(symbol);
    let debited = sheet.subtract(rt, from, amount);
    rt.expect(debited, &format!("insufficient {} balance", symbol))?;
    sheet.add(rt, to, amount);
    Ok(())
}

/// Moves one NFT between two holders on the current chain.
pub(crate) fn move_nft(
    rt: &mut Runtime<'_>,
    from: &Address,
    to: &Address,
    symbol: &str,
    id: &BigInt,
) -> Result<(), VmError> {
    let sheet = OwnershipSheet::new(symbol);
    let taken = sheet.take(rt, from, id);
    rt.expect(taken, "address does not hold the token")?;
    sheet.give(rt, to, id, None);
    Ok(())
}

/// Creates new fungible supply for `to`. The caller is responsible for the
/// minting authority check; the stake contract mints fuel without one.
pub(crate) fn mint(
    rt: &mut Runtime<'_>,
    to: &Address,
    symbol: &str,
    amount: &BigInt,
) -> Result<(), VmError> {
    rt.expect(amount.is_positive(), "mint amount must be positive")?;
    let (fungible, capped, max_supply, current_supply) = {
        let token = require_token(rt, symbol)?;
        (
            token.is_fungible(),
            token.is_capped(),
            token.max_supply.clone(),
            token.current_supply.clone(),
        )
    };
    rt.expect(fungible, "token is not fungible")?;
    if capped {
        rt.expect(
            current_supply + amount <= max_supply,
            "mint exceeds max supply",
        )?;
    }

    let sheet = BalanceSheet::new(symbol);
    sheet.add(rt, to, amount);
    sheet.add_supply(rt, amount);
    if let Some(token) = rt.nexus.token_mut(symbol) {
        token.current_supply += amount;
    }

    let chain_name = rt.chain_name();
    rt.notify(
        EventKind::TokenMint,
        *to,
        TokenEventData::new(symbol, amount.clone(), &chain_name).to_bytes(),
    );
    Ok(())
}

fn require_token<'r>(
    rt: &'r Runtime<'_>,
    symbol: &str,
) -> Result<&'r crate::core::tokens::Token, VmError> {
    rt.nexus
        .token(symbol)
        .ok_or_else(|| VmError::Aborted(format!("unknown token: {}", symbol)))
}

fn token_owner(rt: &Runtime<'_>, symbol: &str) -> Result<Address, VmError> {
    Ok(require_token(rt, symbol)?.owner)
}

fn expect_adjacent(rt: &Runtime<'_>, other_chain: &str) -> Result<(), VmError> {
    let other = rt
        .nexus
        .find_chain(other_chain)
        .ok_or_else(|| VmError::Aborted(format!("unknown chain: {}", other_chain)))?;
    rt.expect(
        rt.nexus.are_chains_adjacent(rt.chain_id, other),
        "chains are not adjacent in the chain tree",
    )
}
