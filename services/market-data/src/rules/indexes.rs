//! Market indexes
//!
//! Triggered by new trading dates. Appends daily history of every tracked
//! index to `indexes/{code}`.

use std::sync::Arc;

use async_trait::async_trait;
use types::candle::Index;
use types::errors::DataError;
use types::ids::{Group, TableId};
use types::table::Table;

use super::{resume_from, RuleContext};
use crate::clients::IssClient;
use crate::clock::{Clock, TradingCalendar};
use crate::ports::{Gateway, OnUpdate};
use crate::rule::{UpdateRule, WriteMode};
use crate::validators;

pub const NAME: &str = "IndexesRule";

/// Total return indexes of the broad market and of oil & gas, the main
/// index and the volatility index.
pub const INDEXES: [&str; 4] = ["MCFTRR", "MEOGTRR", "IMOEX", "RVI"];

pub struct IndexGateway {
    iss: IssClient,
    clock: Arc<dyn Clock>,
    calendar: TradingCalendar,
}

impl IndexGateway {
    pub fn new(iss: IssClient, clock: Arc<dyn Clock>, calendar: TradingCalendar) -> Self {
        Self {
            iss,
            clock,
            calendar,
        }
    }
}

#[async_trait]
impl Gateway<Index> for IndexGateway {
    async fn get(&self, table: &Table<Index>) -> Result<Vec<Index>, DataError> {
        let till = self.calendar.last_trading_date(self.clock.now()).date_naive();
        self.iss
            .index_history(table.name().as_str(), resume_from(table), till)
            .await
    }
}

pub fn rule(ctx: &RuleContext) -> UpdateRule<Index> {
    let ids = INDEXES
        .iter()
        .map(|code| TableId::new(Group::Indexes, *code))
        .collect();

    UpdateRule::new(
        NAME,
        Arc::new(ctx.repo::<Index>()),
        OnUpdate::new(Group::Dates, ids),
        IndexGateway::new(ctx.iss(), ctx.clock.clone(), ctx.calendar),
        validators::anchored_dates::<Index>,
        WriteMode::Append,
        ctx.timeout,
        ctx.clock.clone(),
    )
}
