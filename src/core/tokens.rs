//! Token registry entries, balance sheets, and NFT ownership sheets.

use crate::storage::{StorageContext, StorageList, StorageMap};
use crate::types::address::Address;
use crate::types::encoding::{Decode, DecodeError, Encode, EncodeSink};
use nexus_derive::BinaryCodec;
use num_bigint::BigInt;
use num_traits::{pow, Signed, Zero};

/// Token capability flags, stored as a bitset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokenFlags(pub u32);

impl TokenFlags {
    pub const NONE: TokenFlags = TokenFlags(0);
    pub const FUNGIBLE: TokenFlags = TokenFlags(1 << 0);
    pub const BURNABLE: TokenFlags = TokenFlags(1 << 1);
    pub const TRADABLE: TokenFlags = TokenFlags(1 << 2);
    pub const DIVISIBLE: TokenFlags = TokenFlags(1 << 3);
    pub const TRANSFERABLE: TokenFlags = TokenFlags(1 << 4);

    pub fn has(self, flag: TokenFlags) -> bool {
        self.0 & flag.0 == flag.0
    }
}

impl std::ops::BitOr for TokenFlags {
    type Output = TokenFlags;

    fn bitor(self, rhs: TokenFlags) -> TokenFlags {
        TokenFlags(self.0 | rhs.0)
    }
}

impl Encode for TokenFlags {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.0.encode(out);
    }
}

impl Decode for TokenFlags {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(TokenFlags(u32::decode(input)?))
    }
}

/// A registered token.
///
/// Immutable after creation except for the supply counters and the NFT mint
/// counter, which only contract code updates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub symbol: String,
    pub name: String,
    /// 0 for indivisible (non-fungible) tokens, up to 18.
    pub decimals: u32,
    /// Zero means uncapped.
    pub max_supply: BigInt,
    pub current_supply: BigInt,
    pub flags: TokenFlags,
    pub owner: Address,
    /// Next NFT id to mint; fungible tokens leave this at zero.
    pub mint_counter: u64,
}

impl Token {
    pub fn is_fungible(&self) -> bool {
        self.flags.has(TokenFlags::FUNGIBLE)
    }

    pub fn is_burnable(&self) -> bool {
        self.flags.has(TokenFlags::BURNABLE)
    }

    pub fn is_transferable(&self) -> bool {
        self.flags.has(TokenFlags::TRANSFERABLE)
    }

    pub fn is_capped(&self) -> bool {
        self.max_supply.is_positive()
    }
}

/// Immutable ROM plus mutable RAM of one minted NFT.
#[derive(Clone, Debug, PartialEq, Eq, BinaryCodec)]
pub struct TokenContent {
    pub rom: Vec<u8>,
    pub ram: Vec<u8>,
}

/// Converts a whole-unit amount into base units for a token with the given
/// number of decimal places.
pub fn to_fixed(amount: u64, decimals: u32) -> BigInt {
    BigInt::from(amount) * pow(BigInt::from(10), decimals as usize)
}

/// Per-chain fungible balances of one token.
///
/// Invariant: the sum of all balances on a chain equals that chain's supply
/// cell for the token.
pub struct BalanceSheet {
    map: StorageMap,
    supply_key: Vec<u8>,
}

impl BalanceSheet {
    pub fn new(symbol: &str) -> Self {
        Self {
            map: StorageMap::new(format!("balances.{}", symbol).into_bytes()),
            supply_key: format!("supply.{}", symbol).into_bytes(),
        }
    }

    /// Prefix under which all balance cells of `symbol` live; used by
    /// invariant checks that sum a whole sheet.
    pub fn cell_prefix(symbol: &str) -> Vec<u8> {
        format!("balances.{}.", symbol).into_bytes()
    }

    pub fn get<S: StorageContext + ?Sized>(&self, store: &S, address: &Address) -> BigInt {
        self.map
            .get(store, address.as_slice())
            .unwrap_or_else(BigInt::zero)
    }

    pub fn add<S: StorageContext + ?Sized>(&self, store: &mut S, address: &Address, amount: &BigInt) {
        let balance = self.get(store, address) + amount;
        self.map.put(store, address.as_slice(), &balance);
    }

    /// Debits `amount`, returning false when the balance is insufficient.
    #[must_use]
    pub fn subtract<S: StorageContext + ?Sized>(
        &self,
        store: &mut S,
        address: &Address,
        amount: &BigInt,
    ) -> bool {
        let balance = self.get(store, address);
        if &balance < amount {
            return false;
        }
        let balance = balance - amount;
        if balance.is_zero() {
            self.map.remove(store, address.as_slice());
        } else {
            self.map.put(store, address.as_slice(), &balance);
        }
        true
    }

    /// The token supply circulating on this chain.
    pub fn supply<S: StorageContext + ?Sized>(&self, store: &S) -> BigInt {
        store
            .get(&self.supply_key)
            .and_then(|bytes| BigInt::from_bytes(&bytes).ok())
            .unwrap_or_else(BigInt::zero)
    }

    pub fn add_supply<S: StorageContext + ?Sized>(&self, store: &mut S, amount: &BigInt) {
        let supply = self.supply(store) + amount;
        store.put(&self.supply_key, supply.to_bytes());
    }

    #[must_use]
    pub fn subtract_supply<S: StorageContext + ?Sized>(&self, store: &mut S, amount: &BigInt) -> bool {
        let supply = self.supply(store);
        if &supply < amount {
            return false;
        }
        store.put(&self.supply_key, (supply - amount).to_bytes());
        true
    }
}

/// Per-chain NFT ownership of one token: which ids each address holds, who
/// owns a given id, and the id's content record.
///
/// Invariant: each minted id appears in exactly one owner's list on exactly
/// one chain.
pub struct OwnershipSheet {
    symbol: String,
    owner_map: StorageMap,
    content_map: StorageMap,
}

impl OwnershipSheet {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            owner_map: StorageMap::new(format!("ownerof.{}", symbol).into_bytes()),
            content_map: StorageMap::new(format!("nft.{}", symbol).into_bytes()),
        }
    }

    fn list_of(&self, address: &Address) -> StorageList {
        StorageList::new(format!("ids.{}.{}", self.symbol, address).into_bytes())
    }

    /// All ids held by `address` on this chain.
    pub fn get<S: StorageContext + ?Sized>(&self, store: &S, address: &Address) -> Vec<BigInt> {
        self.list_of(address).all(store)
    }

    pub fn owner_of<S: StorageContext + ?Sized>(&self, store: &S, id: &BigInt) -> Option<Address> {
        self.owner_map.get(store, &id.to_bytes())
    }

    pub fn content_of<S: StorageContext + ?Sized>(&self, store: &S, id: &BigInt) -> Option<TokenContent> {
        self.content_map.get(store, &id.to_bytes())
    }

    /// Records `id` as held by `address`, with its content when first landing
    /// on this chain.
    pub fn give<S: StorageContext + ?Sized>(
        &self,
        store: &mut S,
        address: &Address,
        id: &BigInt,
        content: Option<&TokenContent>,
    ) {
        self.list_of(address).add(store, id);
        self.owner_map.put(store, &id.to_bytes(), address);
        if let Some(content) = content {
            self.content_map.put(store, &id.to_bytes(), content);
        }
    }

    /// Removes `id` from `address`, returning false when not held.
    #[must_use]
    pub fn take<S: StorageContext + ?Sized>(
        &self,
        store: &mut S,
        address: &Address,
        id: &BigInt,
    ) -> bool {
        if self.owner_of(store, id).as_ref() != Some(address) {
            return false;
        }
        let list = self.list_of(address);
        let ids: Vec<BigInt> = list.all(store);
        match ids.iter().position(|held| held == id) {
            Some(index) => {
                list.remove_at(store, index as u64);
                self.owner_map.remove(store, &id.to_bytes());
                true
            }
            None => false,
        }
    }

    /// Deletes the content record, returning it; used when an id leaves the
    /// chain or is burned.
    pub fn remove_content<S: StorageContext + ?Sized>(
        &self,
        store: &mut S,
        id: &BigInt,
    ) -> Option<TokenContent> {
        let content = self.content_of(store, id)?;
        self.content_map.remove(store, &id.to_bytes());
        Some(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn addr(tag: &str) -> Address {
        Address::system(tag)
    }

    #[test]
    fn flags_combine() {
        let flags = TokenFlags::FUNGIBLE | TokenFlags::BURNABLE;
        assert!(flags.has(TokenFlags::FUNGIBLE));
        assert!(flags.has(TokenFlags::BURNABLE));
        assert!(!flags.has(TokenFlags::TRADABLE));
    }

    #[test]
    fn to_fixed_scales_by_decimals() {
        assert_eq!(to_fixed(400, 0), BigInt::from(400));
        assert_eq!(to_fixed(400, 2), BigInt::from(40_000));
        assert_eq!(
            to_fixed(1, 18),
            "1000000000000000000".parse::<BigInt>().unwrap()
        );
    }

    #[test]
    fn balance_sheet_add_subtract() {
        let mut store = MemoryStorage::new();
        let sheet = BalanceSheet::new("KCAL");
        let alice = addr("alice");

        sheet.add(&mut store, &alice, &BigInt::from(100));
        assert_eq!(sheet.get(&store, &alice), BigInt::from(100));

        assert!(sheet.subtract(&mut store, &alice, &BigInt::from(40)));
        assert_eq!(sheet.get(&store, &alice), BigInt::from(60));

        assert!(!sheet.subtract(&mut store, &alice, &BigInt::from(61)));
        assert_eq!(sheet.get(&store, &alice), BigInt::from(60));
    }

    #[test]
    fn balance_sheet_missing_account_is_zero() {
        let store = MemoryStorage::new();
        let sheet = BalanceSheet::new("KCAL");
        assert_eq!(sheet.get(&store, &addr("nobody")), BigInt::zero());
    }

    #[test]
    fn supply_tracking() {
        let mut store = MemoryStorage::new();
        let sheet = BalanceSheet::new("SOUL");

        sheet.add_supply(&mut store, &BigInt::from(1000));
        assert_eq!(sheet.supply(&store), BigInt::from(1000));
        assert!(sheet.subtract_supply(&mut store, &BigInt::from(300)));
        assert_eq!(sheet.supply(&store), BigInt::from(700));
        assert!(!sheet.subtract_supply(&mut store, &BigInt::from(701)));
    }

    #[test]
    fn ownership_give_and_take() {
        let mut store = MemoryStorage::new();
        let sheet = OwnershipSheet::new("COOL");
        let alice = addr("alice");
        let bob = addr("bob");
        let id = BigInt::from(1);
        let content = TokenContent {
            rom: vec![1, 3, 3, 7],
            ram: vec![1, 4, 4, 6],
        };

        sheet.give(&mut store, &alice, &id, Some(&content));
        assert_eq!(sheet.owner_of(&store, &id), Some(alice));
        assert_eq!(sheet.get(&store, &alice), vec![id.clone()]);
        assert_eq!(sheet.content_of(&store, &id), Some(content));

        // Bob does not hold the id.
        assert!(!sheet.take(&mut store, &bob, &id));

        assert!(sheet.take(&mut store, &alice, &id));
        assert_eq!(sheet.owner_of(&store, &id), None);
        assert!(sheet.get(&store, &alice).is_empty());
    }
}
