//! Security listing row

use serde::{Deserialize, Serialize};

/// Board of ordinary and preferred shares.
pub const BOARD_SHARES: &str = "TQBR";
/// Board of exchange traded funds.
pub const BOARD_FUNDS: &str = "TQTF";
/// Board of foreign shares.
pub const BOARD_FOREIGN: &str = "FQBR";

/// ISS security type of preferred shares.
const PREFERRED_TYPE: &str = "2";

/// One listed security from the `securities` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    pub ticker: String,
    pub lot: u32,
    pub isin: String,
    pub board: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub instrument: String,
}

impl Security {
    /// ISS market the security's board belongs to.
    pub fn market(&self) -> &'static str {
        market_of(&self.board)
    }

    pub fn is_preferred(&self) -> bool {
        self.kind == PREFERRED_TYPE
    }
}

/// ISS market of a trading board.
pub fn market_of(board: &str) -> &'static str {
    match board {
        BOARD_FOREIGN => "foreignshares",
        _ => "shares",
    }
}
