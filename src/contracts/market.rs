//! Market contract: fixed-price NFT auctions.
//!
//! Listing escrows the token with the chain; filling pays the seller in the
//! quote token and releases the escrow to the buyer.

use crate::contracts::token::{move_fungible, move_nft};
use crate::core::events::{EventKind, MarketEventData};
use crate::runtime::Runtime;
use crate::storage::{StorageContext, StorageMap};
use crate::types::address::Address;
use crate::types::encoding::Encode;
use crate::virtual_machine::{VmError, VM};
use nexus_derive::BinaryCodec;
use num_bigint::BigInt;
use num_traits::Signed;

/// One open listing.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct Auction {
    pub creator: Address,
    pub base_symbol: String,
    pub quote_symbol: String,
    pub token_id: BigInt,
    pub price: BigInt,
}

fn auctions() -> StorageMap {
    StorageMap::new(&b"market.auctions"[..])
}

fn auction_key(symbol: &str, id: &BigInt) -> Vec<u8> {
    let mut key = symbol.as_bytes().to_vec();
    key.push(b'.');
    key.extend_from_slice(&id.to_bytes());
    key
}

/// The open auction for `(symbol, id)`, if any.
pub fn get_auction<S: StorageContext + ?Sized>(
    store: &S,
    symbol: &str,
    id: &BigInt,
) -> Option<Auction> {
    auctions().get(store, &auction_key(symbol, id))
}

pub(super) fn dispatch(method: &str, rt: &mut Runtime<'_>, vm: &mut VM) -> Result<(), VmError> {
    match method {
        "SellToken" => {
            let from = vm.pop()?.as_address()?;
            let base_symbol = vm.pop()?.as_string()?;
            let quote_symbol = vm.pop()?.as_string()?;
            let id = vm.pop()?.as_number()?;
            let price = vm.pop()?.as_number()?;

            rt.expect_witness(&from)?;
            rt.expect(price.is_positive(), "price must be positive")?;
            rt.expect(
                rt.nexus.token(&base_symbol).is_some(),
                "unknown base token",
            )?;
            rt.expect(
                rt.nexus.token(&quote_symbol).is_some(),
                "unknown quote token",
            )?;
            rt.expect(
                get_auction(rt, &base_symbol, &id).is_none(),
                "token is already listed",
            )?;

            let chain_address = rt.chain_address();
            move_nft(rt, &from, &chain_address, &base_symbol, &id)?;

            let auction = Auction {
                creator: from,
                base_symbol: base_symbol.clone(),
                quote_symbol: quote_symbol.clone(),
                token_id: id.clone(),
                price: price.clone(),
            };
            auctions().put(rt, &auction_key(&base_symbol, &id), &auction);

            rt.notify(
                EventKind::AuctionCreated,
                from,
                MarketEventData {
                    base_symbol,
                    quote_symbol,
                    id,
                    price,
                }
                .to_bytes(),
            );
            Ok(())
        }

        "BuyToken" => {
            let from = vm.pop()?.as_address()?;
            let symbol = vm.pop()?.as_string()?;
            let id = vm.pop()?.as_number()?;

            rt.expect_witness(&from)?;
            let auction = get_auction(rt, &symbol, &id)
                .ok_or_else(|| VmError::Aborted("no such auction".to_string()))?;

            move_fungible(
                rt,
                &from,
                &auction.creator,
                &auction.quote_symbol,
                &auction.price,
            )?;
            let chain_address = rt.chain_address();
            move_nft(rt, &chain_address, &from, &symbol, &id)?;
            auctions().remove(rt, &auction_key(&symbol, &id));

            rt.notify(
                EventKind::AuctionFilled,
                from,
                MarketEventData {
                    base_symbol: auction.base_symbol,
                    quote_symbol: auction.quote_symbol,
                    id,
                    price: auction.price,
                }
                .to_bytes(),
            );
            Ok(())
        }

        "CancelSale" => {
            let from = vm.pop()?.as_address()?;
            let symbol = vm.pop()?.as_string()?;
            let id = vm.pop()?.as_number()?;

            let auction = get_auction(rt, &symbol, &id)
                .ok_or_else(|| VmError::Aborted("no such auction".to_string()))?;
            rt.expect(auction.creator == from, "only the seller may cancel")?;
            rt.expect_witness(&from)?;

            let chain_address = rt.chain_address();
            move_nft(rt, &chain_address, &from, &symbol, &id)?;
            auctions().remove(rt, &auction_key(&symbol, &id));

            rt.notify(
                EventKind::AuctionCancelled,
                from,
                MarketEventData {
                    base_symbol: auction.base_symbol,
                    quote_symbol: auction.quote_symbol,
                    id,
                    price: auction.price,
                }
                .to_bytes(),
            );
            Ok(())
        }

        other => Err(VmError::UnknownMethod(other.to_string())),
    }
}
