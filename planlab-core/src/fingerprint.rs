//! Sequence fingerprinting — deterministic identity for caching and dedup.
//!
//! A fingerprint hashes the ordered (instrument, side, quantity) tuples of a
//! sequence. Two sequences with the same trades in the same order share a
//! fingerprint regardless of when or by which calculator they were produced,
//! which is what lets the evaluation cache survive regeneration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::Side;

/// Deterministic identity hash of a sequence (blake3, hex-encoded).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    /// Hash an ordered list of (instrument, side, quantity) tuples.
    ///
    /// Quantities are hashed via their IEEE-754 bit pattern, so the identity
    /// is exact — no formatting or rounding is involved.
    pub fn of_steps<'a, I>(steps: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Side, f64)>,
    {
        let mut hasher = blake3::Hasher::new();
        for (instrument, side, quantity) in steps {
            hasher.update(instrument.as_bytes());
            hasher.update(&[side_byte(side)]);
            hasher.update(&quantity.to_bits().to_le_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines and tables.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn side_byte(side: Side) -> u8 {
    match side {
        Side::Buy => 0,
        Side::Sell => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_steps_identical_fingerprint() {
        let a = Fingerprint::of_steps(vec![("AAPL", Side::Buy, 10.0), ("MSFT", Side::Sell, 5.0)]);
        let b = Fingerprint::of_steps(vec![("AAPL", Side::Buy, 10.0), ("MSFT", Side::Sell, 5.0)]);
        assert_eq!(a, b);
    }

    #[test]
    fn order_matters() {
        let a = Fingerprint::of_steps(vec![("AAPL", Side::Buy, 10.0), ("MSFT", Side::Sell, 5.0)]);
        let b = Fingerprint::of_steps(vec![("MSFT", Side::Sell, 5.0), ("AAPL", Side::Buy, 10.0)]);
        assert_ne!(a, b);
    }

    #[test]
    fn side_matters() {
        let a = Fingerprint::of_steps(vec![("AAPL", Side::Buy, 10.0)]);
        let b = Fingerprint::of_steps(vec![("AAPL", Side::Sell, 10.0)]);
        assert_ne!(a, b);
    }

    #[test]
    fn quantity_matters_exactly() {
        let a = Fingerprint::of_steps(vec![("AAPL", Side::Buy, 10.0)]);
        let b = Fingerprint::of_steps(vec![("AAPL", Side::Buy, 10.000001)]);
        assert_ne!(a, b);
    }

    #[test]
    fn instrument_boundary_is_unambiguous() {
        // "AB" + side byte differs from "A" + different tuple layout
        let a = Fingerprint::of_steps(vec![("AB", Side::Buy, 1.0)]);
        let b = Fingerprint::of_steps(vec![("A", Side::Buy, 1.0), ("B", Side::Buy, 1.0)]);
        assert_ne!(a, b);
    }

    #[test]
    fn short_is_a_prefix() {
        let fp = Fingerprint::of_steps(vec![("AAPL", Side::Buy, 10.0)]);
        assert_eq!(fp.short().len(), 12);
        assert!(fp.as_str().starts_with(fp.short()));
    }

    #[test]
    fn serialization_roundtrip() {
        let fp = Fingerprint::of_steps(vec![("AAPL", Side::Buy, 10.0)]);
        let json = serde_json::to_string(&fp).unwrap();
        let deser: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(fp, deser);
    }
}
