//! Core type definitions

use chrono::{DateTime, Utc};
use ruint::aliases::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{CoreError, CoreResult};

/// Unsigned on-chain integer (token amounts, gauge weights)
pub type Int = U256;

/// Number of fractional digits of the remote chain's fixed-point decimals
pub const SDK_DEC_PRECISION: u32 = 18;

/// Token amount tagged with its denomination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "crate::codec::int_string")]
    pub amount: Int,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount: Int::from(amount),
        }
    }

    pub fn amount_dec(&self) -> CoreResult<Decimal> {
        int_to_dec(self.amount)
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Revision-aware block height of a remote chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Height {
    pub revision_number: u64,
    pub revision_height: u64,
}

impl Height {
    pub fn new(revision_number: u64, revision_height: u64) -> Self {
        Self { revision_number, revision_height }
    }

    pub fn is_zero(&self) -> bool {
        self.revision_number == 0 && self.revision_height == 0
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.revision_number, self.revision_height)
    }
}

impl FromStr for Height {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, height) = s
            .split_once('-')
            .ok_or_else(|| CoreError::InvalidParams(format!("invalid height {s}")))?;
        let parse = |v: &str| {
            v.parse::<u64>()
                .map_err(|e| CoreError::InvalidParams(format!("invalid height {s}: {e}")))
        };
        Ok(Self::new(parse(number)?, parse(height)?))
    }
}

/// Header of the block being executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub height: i64,
    pub time: DateTime<Utc>,
}

impl BlockHeader {
    pub fn new(height: i64, time: DateTime<Utc>) -> Self {
        Self { height, time }
    }
}

/// Convert an on-chain integer into a decimal, failing when it does not fit
pub fn int_to_dec(value: Int) -> CoreResult<Decimal> {
    Decimal::from_str_exact(&value.to_string())
        .map_err(|e| CoreError::Overflow(format!("{value}: {e}")))
}

/// Parse a base-10 on-chain integer
pub fn parse_int(s: &str) -> CoreResult<Int> {
    if s.is_empty() {
        return Ok(Int::ZERO);
    }
    Int::from_str_radix(s, 10).map_err(|e| CoreError::SerializationError(format!("invalid integer {s}: {e}")))
}

/// Decode a remote fixed-point decimal from its raw integer form (value * 10^18).
///
/// Rounds to the precision `Decimal` can hold.
pub fn parse_sdk_dec(raw: &str) -> CoreResult<Decimal> {
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::SerializationError(format!("invalid decimal {raw}")));
    }

    let precision = SDK_DEC_PRECISION as usize;
    let padded = format!("{digits:0>width$}", width = precision + 1);
    let (whole, frac) = padded.split_at(padded.len() - precision);
    let text = format!("{}{}.{}", if negative { "-" } else { "" }, whole, frac);

    Decimal::from_str(&text).map_err(|e| CoreError::Overflow(format!("{raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_height_parsing() {
        let height: Height = "1-200".parse().unwrap();
        assert_eq!(height, Height::new(1, 200));
        assert!("0-0".parse::<Height>().unwrap().is_zero());
        assert!("12".parse::<Height>().is_err());
    }

    #[test]
    fn test_sdk_dec_parsing() {
        assert_eq!(parse_sdk_dec("250000000000000000").unwrap(), dec!(0.25));
        assert_eq!(parse_sdk_dec("821917808219178082191780").unwrap(), dec!(821917.808219178082191780));
        assert_eq!(parse_sdk_dec("5").unwrap(), dec!(0.000000000000000005));
        assert_eq!(parse_sdk_dec("").unwrap(), Decimal::ZERO);
        assert!(parse_sdk_dec("1.5").is_err());
    }

    #[test]
    fn test_int_conversion() {
        let coin = Coin::new("uosmo", 1_500_000);
        assert_eq!(coin.amount_dec().unwrap(), dec!(1500000));
        assert_eq!(parse_int("42").unwrap(), Int::from(42u64));
        assert!(int_to_dec(Int::MAX).is_err());
    }

    #[test]
    fn test_coin_json_amount_is_decimal_string() {
        let json = serde_json::to_string(&Coin::new("uband", 30)).unwrap();
        assert_eq!(json, r#"{"denom":"uband","amount":"30"}"#);
        let coin: Coin = serde_json::from_str(r#"{"denom":"uband","amount":30}"#).unwrap();
        assert_eq!(coin.amount, Int::from(30u64));
    }
}
