//! USD/RUB day candles
//!
//! Triggered by new trading dates. Appends candles of the `USD000UTSTOM`
//! instrument to the singleton `usd` table.

use std::sync::Arc;

use async_trait::async_trait;
use types::candle::Usd;
use types::errors::DataError;
use types::ids::Group;
use types::table::Table;

use super::{resume_from, RuleContext};
use crate::clients::IssClient;
use crate::clock::{Clock, TradingCalendar};
use crate::ports::{Gateway, OnUpdate};
use crate::rule::{UpdateRule, WriteMode};
use crate::validators;

pub const NAME: &str = "USDRule";

const ENGINE: &str = "currency";
const MARKET: &str = "selt";
const TICKER: &str = "USD000UTSTOM";

pub struct UsdGateway {
    iss: IssClient,
    clock: Arc<dyn Clock>,
    calendar: TradingCalendar,
}

impl UsdGateway {
    pub fn new(iss: IssClient, clock: Arc<dyn Clock>, calendar: TradingCalendar) -> Self {
        Self {
            iss,
            clock,
            calendar,
        }
    }
}

#[async_trait]
impl Gateway<Usd> for UsdGateway {
    async fn get(&self, table: &Table<Usd>) -> Result<Vec<Usd>, DataError> {
        let till = self.calendar.last_trading_date(self.clock.now()).date_naive();
        self.iss
            .candles(ENGINE, MARKET, TICKER, resume_from(table), till)
            .await
    }
}

pub fn rule(ctx: &RuleContext) -> UpdateRule<Usd> {
    UpdateRule::new(
        NAME,
        Arc::new(ctx.repo::<Usd>()),
        OnUpdate::singleton(Group::Dates, Group::Usd),
        UsdGateway::new(ctx.iss(), ctx.clock.clone(), ctx.calendar),
        validators::anchored_dates::<Usd>,
        WriteMode::Append,
        ctx.timeout,
        ctx.clock.clone(),
    )
}
