//! Unix timestamps with second resolution.

use crate::types::encoding::{Decode, DecodeError, Encode, EncodeSink};
use std::fmt;
use std::ops::Sub;

/// Seconds in one day; the staking lockup and claim window.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Unsigned seconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Returns this timestamp moved forward by `secs` seconds.
    pub fn offset(self, secs: u64) -> Timestamp {
        Timestamp(self.0 + secs)
    }

    /// Whole days elapsed since `earlier`, clamping negative spans to zero.
    pub fn days_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0) / SECONDS_PER_DAY
    }
}

impl Sub for Timestamp {
    type Output = i64;

    fn sub(self, rhs: Timestamp) -> i64 {
        self.0 as i64 - rhs.0 as i64
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Encode for Timestamp {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.0.encode(out);
    }
}

impl Decode for Timestamp {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Timestamp(u64::decode(input)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtraction_yields_signed_seconds() {
        let a = Timestamp(100);
        let b = Timestamp(40);
        assert_eq!(a - b, 60);
        assert_eq!(b - a, -60);
    }

    #[test]
    fn days_since_floors() {
        let start = Timestamp(1_000);
        assert_eq!(start.offset(SECONDS_PER_DAY - 1).days_since(start), 0);
        assert_eq!(start.offset(SECONDS_PER_DAY).days_since(start), 1);
        assert_eq!(start.offset(3 * SECONDS_PER_DAY + 5).days_since(start), 3);
    }

    #[test]
    fn days_since_clamps_negative() {
        let later = Timestamp(SECONDS_PER_DAY * 10);
        assert_eq!(Timestamp(0).days_since(later), 0);
    }
}
