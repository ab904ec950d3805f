//! Daily candles and index history rows

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::table::Dated;

/// Daily OHLC candle with traded value and volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(with = "crate::ext_json")]
    pub begin: DateTime<Utc>,
    #[serde(with = "crate::ext_json")]
    pub end: DateTime<Utc>,
    pub open: Decimal,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub value: Decimal,
    pub volume: Decimal,
}

impl Dated for Candle {
    fn date(&self) -> DateTime<Utc> {
        self.begin
    }
}

/// Row of the `usd` table: USD/RUB day candles.
pub type Usd = Candle;

/// Row of a `quotes/{ticker}` table.
pub type Quote = Candle;

/// Daily history of a market index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    #[serde(with = "crate::ext_json")]
    pub date: DateTime<Utc>,
    pub open: Decimal,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub turnover: Decimal,
}

impl Dated for Index {
    fn date(&self) -> DateTime<Utc> {
        self.date
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_candle_stored_shape() {
        let day = Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap();
        let candle = Candle {
            begin: day,
            end: day,
            open: Decimal::new(975, 1),
            close: Decimal::from(98),
            high: Decimal::new(9825, 2),
            low: Decimal::new(9725, 2),
            value: Decimal::from(1000),
            volume: Decimal::from(10),
        };

        let value = serde_json::to_value(&candle).unwrap();
        assert_eq!(value["begin"], json!({"$date": "2024-01-09T00:00:00.000Z"}));
        assert_eq!(value["close"], json!(98.0));

        let back: Candle = serde_json::from_value(value).unwrap();
        assert_eq!(back, candle);
    }
}
