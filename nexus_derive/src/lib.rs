//! Derive macros for the nexus-ledger crate.
//!
//! Provides:
//! - `#[derive(BinaryCodec)]` - deterministic binary serialization for the
//!   shapes the ledger persists (named-field structs and enums)
//! - `#[derive(Error)]` - `Display`/`Error` boilerplate for error enums

mod binary_codec;
mod error;

use proc_macro::TokenStream;

/// Implements `Encode` and `Decode` against the ledger's wire format.
#[proc_macro_derive(BinaryCodec)]
pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    binary_codec::derive_binary_codec(input)
}

/// Implements `Display` and `Error` from `#[error("...")]` attributes.
#[proc_macro_derive(Error, attributes(error))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    error::derive_error(input)
}
