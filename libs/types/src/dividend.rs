//! Dividend rows
//!
//! - `DivStatus`: upcoming or recorded ex-dates published by the exchange
//! - `CurrencyDiv`: per-share payment in its original currency, either
//!   entered by hand (`raw_div`) or scraped from an external source
//! - `Dividend`: payments converted to rubles and consolidated per date

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DataError;
use crate::table::Dated;

/// Suffix of foreign shares traded in rubles.
pub const FOREIGN_SUFFIX: &str = "-RM";

/// Whether a ticker is a foreign share with dividends paid abroad.
pub fn is_foreign_ticker(ticker: &str) -> bool {
    ticker.ends_with(FOREIGN_SUFFIX)
}

/// Dividend record date announced for a ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivStatus {
    pub ticker: String,
    #[serde(with = "crate::ext_json")]
    pub date: DateTime<Utc>,
}

impl Dated for DivStatus {
    fn date(&self) -> DateTime<Utc> {
        self.date
    }
}

/// Currency of a dividend payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    RUR,
    USD,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::RUR => "RUR",
            Currency::USD => "USD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUR" => Ok(Currency::RUR),
            "USD" => Ok(Currency::USD),
            other => Err(DataError::Validation(format!("unknown currency {other}"))),
        }
    }
}

/// Dividend in its original currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyDiv {
    #[serde(with = "crate::ext_json")]
    pub date: DateTime<Utc>,
    pub value: Decimal,
    pub currency: Currency,
}

impl Dated for CurrencyDiv {
    fn date(&self) -> DateTime<Utc> {
        self.date
    }
}

/// Row of a manually maintained `raw_div/{ticker}` table.
pub type RawDiv = CurrencyDiv;

/// Dividend in rubles, one row per record date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dividend {
    #[serde(with = "crate::ext_json")]
    pub date: DateTime<Utc>,
    pub value: Decimal,
}

impl Dated for Dividend {
    fn date(&self) -> DateTime<Utc> {
        self.date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_ticker() {
        assert!(is_foreign_ticker("AAPL-RM"));
        assert!(!is_foreign_ticker("SBER"));
        assert!(!is_foreign_ticker("RM"));
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("USD".parse::<Currency>().unwrap(), Currency::USD);
        assert_eq!("RUR".parse::<Currency>().unwrap(), Currency::RUR);
        assert!("EUR".parse::<Currency>().is_err());
    }

    #[test]
    fn test_currency_serialized_as_code() {
        assert_eq!(serde_json::to_value(Currency::RUR).unwrap(), "RUR");
    }
}
