//! Binary outcome and order-side enums.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One side of a binary prediction market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    /// Parse the wire form ("YES" / "NO").
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "YES" => Ok(Self::Yes),
            "NO" => Ok(Self::No),
            other => Err(Error::InvalidOutcome {
                value: other.to_string(),
            }),
        }
    }

    /// The complementary outcome.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Yes => Self::No,
            Self::No => Self::Yes,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yes => write!(f, "YES"),
            Self::No => write!(f, "NO"),
        }
    }
}

/// Which side of the book an order is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Parse the wire form ("buy" / "sell").
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(Error::InvalidSide {
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_parse() {
        assert_eq!(Outcome::parse("YES").unwrap(), Outcome::Yes);
        assert_eq!(Outcome::parse("NO").unwrap(), Outcome::No);
        assert!(Outcome::parse("MAYBE").is_err());
        assert!(Outcome::parse("yes").is_err(), "wire form is uppercase");
    }

    #[test]
    fn outcome_opposite() {
        assert_eq!(Outcome::Yes.opposite(), Outcome::No);
        assert_eq!(Outcome::No.opposite(), Outcome::Yes);
    }

    #[test]
    fn side_parse() {
        assert_eq!(Side::parse("buy").unwrap(), Side::Buy);
        assert_eq!(Side::parse("sell").unwrap(), Side::Sell);
        assert!(Side::parse("BUY").is_err(), "wire form is lowercase");
    }

    #[test]
    fn serde_wire_forms() {
        assert_eq!(serde_json::to_string(&Outcome::Yes).unwrap(), "\"YES\"");
        assert_eq!(serde_json::to_string(&Side::Sell).unwrap(), "\"sell\"");
        let back: Outcome = serde_json::from_str("\"NO\"").unwrap();
        assert_eq!(back, Outcome::No);
    }
}
