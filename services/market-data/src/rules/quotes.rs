//! Day candles of listed securities
//!
//! Triggered by an update of `securities`; appends candles to
//! `quotes/{ticker}` for every listed ticker.

use std::sync::Arc;

use async_trait::async_trait;
use persistence::TableRead;
use types::candle::Quote;
use types::errors::DataError;
use types::event::Event;
use types::ids::{Group, TableId};
use types::security::Security;
use types::table::Table;

use super::{resume_from, RuleContext};
use crate::clients::IssClient;
use crate::clock::{Clock, TradingCalendar};
use crate::ports::{completed_in, Gateway, Selector};
use crate::rule::{UpdateRule, WriteMode};
use crate::validators;

pub const NAME: &str = "QuotesRule";

const ENGINE: &str = "stock";

async fn listed(securities: &dyn TableRead<Security>) -> Result<Table<Security>, DataError> {
    securities.get(&TableId::singleton(Group::Securities)).await
}

/// One quotes table per listed security.
pub struct ListedSelector {
    securities: Arc<dyn TableRead<Security>>,
}

impl ListedSelector {
    pub fn new(securities: Arc<dyn TableRead<Security>>) -> Self {
        Self { securities }
    }
}

#[async_trait]
impl Selector for ListedSelector {
    async fn select(&self, event: &Event) -> Result<Vec<TableId>, DataError> {
        if !completed_in(event, Group::Securities) {
            return Ok(Vec::new());
        }

        let table = listed(self.securities.as_ref()).await?;
        Ok(table
            .rows
            .iter()
            .map(|security| TableId::new(Group::Quotes, security.ticker.as_str()))
            .collect())
    }
}

pub struct QuotesGateway {
    iss: IssClient,
    securities: Arc<dyn TableRead<Security>>,
    clock: Arc<dyn Clock>,
    calendar: TradingCalendar,
}

impl QuotesGateway {
    pub fn new(
        iss: IssClient,
        securities: Arc<dyn TableRead<Security>>,
        clock: Arc<dyn Clock>,
        calendar: TradingCalendar,
    ) -> Self {
        Self {
            iss,
            securities,
            clock,
            calendar,
        }
    }
}

#[async_trait]
impl Gateway<Quote> for QuotesGateway {
    async fn get(&self, table: &Table<Quote>) -> Result<Vec<Quote>, DataError> {
        let ticker = table.name().as_str();
        let securities = listed(self.securities.as_ref()).await?;
        let security = securities
            .rows
            .iter()
            .find(|security| security.ticker == ticker)
            .ok_or_else(|| DataError::Gateway(format!("{ticker} is not listed")))?;

        let till = self.calendar.last_trading_date(self.clock.now()).date_naive();
        self.iss
            .candles(ENGINE, security.market(), ticker, resume_from(table), till)
            .await
    }
}

pub fn rule(ctx: &RuleContext) -> UpdateRule<Quote> {
    let securities: Arc<dyn TableRead<Security>> = Arc::new(ctx.repo::<Security>());

    UpdateRule::new(
        NAME,
        Arc::new(ctx.repo::<Quote>()),
        ListedSelector::new(securities.clone()),
        QuotesGateway::new(ctx.iss(), securities, ctx.clock.clone(), ctx.calendar),
        validators::anchored_dates::<Quote>,
        WriteMode::Append,
        ctx.timeout,
        ctx.clock.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use persistence::{MemoryStore, Repo, TableWrite};
    use types::security::{BOARD_FOREIGN, BOARD_SHARES};

    fn security(ticker: &str, board: &str) -> Security {
        Security {
            ticker: ticker.to_string(),
            lot: 1,
            isin: String::new(),
            board: board.to_string(),
            kind: "1".to_string(),
            instrument: String::new(),
        }
    }

    #[tokio::test]
    async fn test_selects_every_listed_ticker() {
        let repo = Repo::<Security>::new(Arc::new(MemoryStore::new()));
        repo.replace(&Table::new(
            TableId::singleton(Group::Securities),
            Utc::now(),
            vec![security("AAPL-RM", BOARD_FOREIGN), security("SBER", BOARD_SHARES)],
        ))
        .await
        .unwrap();
        let selector = ListedSelector::new(Arc::new(repo));

        let ids = selector
            .select(&Event::completed(TableId::singleton(Group::Securities)))
            .await
            .unwrap();
        assert_eq!(
            ids,
            vec![
                TableId::new(Group::Quotes, "AAPL-RM"),
                TableId::new(Group::Quotes, "SBER"),
            ]
        );

        let ids = selector
            .select(&Event::completed(TableId::singleton(Group::Usd)))
            .await
            .unwrap();
        assert!(ids.is_empty());
    }
}
