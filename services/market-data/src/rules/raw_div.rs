//! Check of manually entered dividends
//!
//! Triggered by new record dates. For every held ticker with a record date,
//! the user's `raw_div/{ticker}` table must already have a row for that date.
//! The gateway never returns rows, so nothing is written here.

use std::sync::Arc;

use async_trait::async_trait;
use persistence::TableRead;
use types::dividend::{DivStatus, RawDiv};
use types::errors::DataError;
use types::event::Event;
use types::ids::{Group, TableId};
use types::position::Position;
use types::table::Table;

use super::div_status::{positions, statuses};
use super::RuleContext;
use crate::ports::{completed_in, Gateway, Selector};
use crate::rule::{UpdateRule, WriteMode};
use crate::validators;

pub const NAME: &str = "RawDivCheckRule";

/// Held tickers that have a record date.
pub struct HeldStatusSelector {
    statuses: Arc<dyn TableRead<DivStatus>>,
    positions: Arc<dyn TableRead<Position>>,
}

impl HeldStatusSelector {
    pub fn new(statuses: Arc<dyn TableRead<DivStatus>>, positions: Arc<dyn TableRead<Position>>) -> Self {
        Self { statuses, positions }
    }

    async fn tickers(&self) -> Result<Vec<TableId>, DataError> {
        let held = positions(self.positions.as_ref()).await?;
        let mut ids: Vec<TableId> = statuses(self.statuses.as_ref())
            .await?
            .rows
            .iter()
            .filter(|status| held.contains(&status.ticker))
            .map(|status| TableId::new(Group::RawDiv, status.ticker.as_str()))
            .collect();
        ids.dedup();

        Ok(ids)
    }
}

#[async_trait]
impl Selector for HeldStatusSelector {
    async fn select(&self, event: &Event) -> Result<Vec<TableId>, DataError> {
        if !completed_in(event, Group::DivStatus) {
            return Ok(Vec::new());
        }

        self.tickers()
            .await
            .map_err(|err| DataError::Selector(err.to_string()))
    }
}

pub struct CheckGateway {
    statuses: Arc<dyn TableRead<DivStatus>>,
}

impl CheckGateway {
    pub fn new(statuses: Arc<dyn TableRead<DivStatus>>) -> Self {
        Self { statuses }
    }
}

#[async_trait]
impl Gateway<RawDiv> for CheckGateway {
    async fn get(&self, table: &Table<RawDiv>) -> Result<Vec<RawDiv>, DataError> {
        let ticker = table.name().as_str();
        let statuses = statuses(self.statuses.as_ref()).await?;

        for status in statuses.rows.iter().filter(|status| status.ticker == ticker) {
            if !table.rows.iter().any(|row| row.date == status.date) {
                return Err(DataError::Validation(format!(
                    "{ticker} missed dividend at {}",
                    status.date.format("%Y-%m-%d")
                )));
            }
        }

        Ok(Vec::new())
    }
}

pub fn rule(ctx: &RuleContext) -> UpdateRule<RawDiv> {
    let statuses: Arc<dyn TableRead<DivStatus>> = Arc::new(ctx.repo::<DivStatus>());

    UpdateRule::new(
        NAME,
        Arc::new(ctx.repo::<RawDiv>()),
        HeldStatusSelector::new(statuses.clone(), Arc::new(ctx.repo::<Position>())),
        CheckGateway::new(statuses),
        validators::accept_all::<RawDiv>,
        WriteMode::Replace,
        ctx.timeout,
        ctx.clock.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use persistence::{MemoryStore, Repo, TableWrite};
    use rust_decimal::Decimal;
    use types::dividend::Currency;

    fn day(m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, m, d, 0, 0, 0).unwrap()
    }

    fn status(ticker: &str, date: DateTime<Utc>) -> DivStatus {
        DivStatus {
            ticker: ticker.to_string(),
            date,
        }
    }

    fn raw(date: DateTime<Utc>) -> RawDiv {
        RawDiv {
            date,
            value: Decimal::from(10),
            currency: Currency::RUR,
        }
    }

    async fn status_repo(rows: Vec<DivStatus>) -> Arc<dyn TableRead<DivStatus>> {
        let repo = Repo::<DivStatus>::new(Arc::new(MemoryStore::new()));
        repo.replace(&Table::new(TableId::singleton(Group::DivStatus), Utc::now(), rows))
            .await
            .unwrap();
        Arc::new(repo)
    }

    #[tokio::test]
    async fn test_missed_dividend() {
        let gateway = CheckGateway::new(status_repo(vec![status("SBER", day(5, 10))]).await);
        let table = Table::new(TableId::new(Group::RawDiv, "SBER"), Utc::now(), vec![raw(day(5, 9))]);

        let err = gateway.get(&table).await.unwrap_err();
        assert_eq!(
            err,
            DataError::Validation("SBER missed dividend at 2024-05-10".to_string())
        );
    }

    #[tokio::test]
    async fn test_covered_dividend_writes_nothing() {
        let gateway = CheckGateway::new(
            status_repo(vec![status("AKRN", day(5, 1)), status("SBER", day(5, 10))]).await,
        );
        let table = Table::new(TableId::new(Group::RawDiv, "SBER"), Utc::now(), vec![raw(day(5, 10))]);

        assert!(gateway.get(&table).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_selects_only_held_tickers() {
        let store = Arc::new(MemoryStore::new());
        let positions = Repo::<Position>::new(store);
        positions
            .replace(&Table::new(
                TableId::singleton(Group::Positions),
                Utc::now(),
                vec![Position::new("SBER")],
            ))
            .await
            .unwrap();
        let statuses = status_repo(vec![
            status("AKRN", day(5, 1)),
            status("SBER", day(5, 10)),
            status("SBER", day(7, 10)),
        ])
        .await;

        let selector = HeldStatusSelector::new(statuses, Arc::new(positions));
        let ids = selector
            .select(&Event::completed(TableId::singleton(Group::DivStatus)))
            .await
            .unwrap();

        assert_eq!(ids, vec![TableId::new(Group::RawDiv, "SBER")]);
    }
}
