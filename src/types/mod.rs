//! Core value types shared across the ledger.

pub mod address;
pub mod bytes;
pub mod encoding;
pub mod hash;
pub mod timestamp;

pub use address::{Address, ADDRESS_LEN};
pub use bytes::Bytes;
pub use hash::{Hash, HASH_LEN};
pub use timestamp::Timestamp;
