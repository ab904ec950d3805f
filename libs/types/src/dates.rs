//! Trading dates row
//!
//! The `dates` table is a singleton with exactly one row: the interval of
//! dates for which the exchange has published trading results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::table::Dated;

/// First and last trading dates with published results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingDate {
    #[serde(with = "crate::ext_json")]
    pub from: DateTime<Utc>,
    #[serde(with = "crate::ext_json")]
    pub till: DateTime<Utc>,
}

impl Dated for TradingDate {
    fn date(&self) -> DateTime<Utc> {
        self.till
    }
}
