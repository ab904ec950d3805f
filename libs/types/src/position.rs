//! Portfolio position row

use serde::{Deserialize, Serialize};

/// Ticker held in the user's portfolio.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
}

impl Position {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
        }
    }
}
