//! Listed securities
//!
//! Triggered by new USD candles. Collects the securities of the share, fund
//! and foreign share boards into the singleton `securities` table.

use std::sync::Arc;

use async_trait::async_trait;
use types::errors::DataError;
use types::ids::Group;
use types::security::{market_of, Security, BOARD_FOREIGN, BOARD_FUNDS, BOARD_SHARES};
use types::table::Table;

use super::RuleContext;
use crate::clients::IssClient;
use crate::ports::{Gateway, OnUpdate};
use crate::rule::{UpdateRule, WriteMode};
use crate::validators;

pub const NAME: &str = "SecuritiesRule";

const BOARDS: [&str; 3] = [BOARD_SHARES, BOARD_FUNDS, BOARD_FOREIGN];

pub struct SecuritiesGateway {
    iss: IssClient,
}

impl SecuritiesGateway {
    pub fn new(iss: IssClient) -> Self {
        Self { iss }
    }
}

#[async_trait]
impl Gateway<Security> for SecuritiesGateway {
    async fn get(&self, _table: &Table<Security>) -> Result<Vec<Security>, DataError> {
        let mut rows = Vec::new();
        for board in BOARDS {
            rows.extend(self.iss.board_securities(market_of(board), board).await?);
        }
        // Stable sort keeps the first board's listing of a repeated ticker.
        rows.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        rows.dedup_by(|next, kept| next.ticker == kept.ticker);

        Ok(rows)
    }
}

pub fn rule(ctx: &RuleContext) -> UpdateRule<Security> {
    UpdateRule::new(
        NAME,
        Arc::new(ctx.repo::<Security>()),
        OnUpdate::singleton(Group::Usd, Group::Securities),
        SecuritiesGateway::new(ctx.iss()),
        validators::increasing_tickers,
        WriteMode::Replace,
        ctx.timeout,
        ctx.clock.clone(),
    )
}
