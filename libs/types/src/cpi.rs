//! Consumer price index row

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::table::Dated;

/// Monthly inflation: price level relative to the previous month,
/// dated at the last day of the month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpi {
    #[serde(with = "crate::ext_json")]
    pub date: DateTime<Utc>,
    pub value: Decimal,
}

impl Dated for Cpi {
    fn date(&self) -> DateTime<Utc> {
        self.date
    }
}
