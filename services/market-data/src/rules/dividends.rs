//! Consolidated dividends in rubles
//!
//! Recomputed after new quotes or an edit of the raw dividends of a ticker.
//! Payments of one date are summed; USD payments are converted at the close
//! of the last USD candle that began before the payment date. The table
//! mirrors the raw dividends: clearing them clears it.

use std::sync::Arc;

use async_trait::async_trait;
use persistence::TableRead;
use types::candle::Usd;
use types::dividend::{Currency, Dividend, RawDiv};
use types::errors::DataError;
use types::event::Event;
use types::ids::{Group, TableId};
use types::table::Table;

use super::RuleContext;
use crate::ports::{Gateway, Selector};
use crate::rule::{UpdateRule, WriteMode};
use crate::validators;

pub const NAME: &str = "DividendsRule";

/// `dividends/{ticker}` after an update of `quotes/{ticker}` or `raw_div/{ticker}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickerSelector;

#[async_trait]
impl Selector for TickerSelector {
    async fn select(&self, event: &Event) -> Result<Vec<TableId>, DataError> {
        match event {
            Event::UpdateCompleted { id } if matches!(id.group(), Group::Quotes | Group::RawDiv) => {
                Ok(vec![TableId::new(Group::Dividends, id.name().as_str())])
            }
            _ => Ok(Vec::new()),
        }
    }
}

pub struct DividendsGateway {
    raw: Arc<dyn TableRead<RawDiv>>,
    usd: Arc<dyn TableRead<Usd>>,
}

impl DividendsGateway {
    pub fn new(raw: Arc<dyn TableRead<RawDiv>>, usd: Arc<dyn TableRead<Usd>>) -> Self {
        Self { raw, usd }
    }
}

#[async_trait]
impl Gateway<Dividend> for DividendsGateway {
    async fn get(&self, table: &Table<Dividend>) -> Result<Vec<Dividend>, DataError> {
        let raw = self
            .raw
            .get(&TableId::new(Group::RawDiv, table.name().as_str()))
            .await?;
        let usd = self.usd.get(&TableId::singleton(Group::Usd)).await?;

        consolidate(&raw.rows, &usd.rows)
    }
}

/// Sum payments by date in rubles, in the order of `raw`.
pub fn consolidate(raw: &[RawDiv], usd: &[Usd]) -> Result<Vec<Dividend>, DataError> {
    let mut rows: Vec<Dividend> = Vec::with_capacity(raw.len());

    for div in raw {
        let value = match div.currency {
            Currency::RUR => div.value,
            Currency::USD => {
                let n = usd.partition_point(|candle| candle.begin < div.date);
                let rate = n
                    .checked_sub(1)
                    .map(|last| usd[last].close)
                    .ok_or_else(|| {
                        DataError::Gateway(format!("no USD rate before {}", div.date.format("%Y-%m-%d")))
                    })?;
                div.value * rate
            }
        };

        match rows.iter_mut().rev().find(|row| row.date == div.date) {
            Some(row) => row.value += value,
            None => rows.push(Dividend {
                date: div.date,
                value,
            }),
        }
    }

    Ok(rows)
}

pub fn rule(ctx: &RuleContext) -> UpdateRule<Dividend> {
    UpdateRule::new(
        NAME,
        Arc::new(ctx.repo::<Dividend>()),
        TickerSelector,
        DividendsGateway::new(Arc::new(ctx.repo::<RawDiv>()), Arc::new(ctx.repo::<Usd>())),
        validators::increasing_dates::<Dividend>,
        WriteMode::Mirror,
        ctx.timeout,
        ctx.clock.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use persistence::{DocumentStore, MemoryStore, Repo, TableWrite};
    use rust_decimal::Decimal;
    use std::time::Duration;
    use types::candle::Candle;

    use crate::clock::FixedClock;

    fn day(m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, m, d, 0, 0, 0).unwrap()
    }

    fn candle(date: DateTime<Utc>, close: i64) -> Candle {
        let close = Decimal::from(close);
        Candle {
            begin: date,
            end: date,
            open: close,
            close,
            high: close,
            low: close,
            value: Decimal::ZERO,
            volume: Decimal::ZERO,
        }
    }

    fn raw(date: DateTime<Utc>, value: Decimal, currency: Currency) -> RawDiv {
        RawDiv {
            date,
            value,
            currency,
        }
    }

    #[test]
    fn test_consolidation_of_mixed_currencies() {
        let raw = vec![
            raw(day(3, 1), Decimal::ONE, Currency::USD),
            raw(day(3, 1), Decimal::new(5, 1), Currency::USD),
            raw(day(6, 1), Decimal::new(3, 1), Currency::RUR),
        ];
        let usd = vec![candle(day(2, 28), 90), candle(day(5, 30), 95)];

        assert_eq!(
            consolidate(&raw, &usd).unwrap(),
            vec![
                Dividend {
                    date: day(3, 1),
                    value: Decimal::from(135),
                },
                Dividend {
                    date: day(6, 1),
                    value: Decimal::new(3, 1),
                },
            ]
        );
    }

    #[test]
    fn test_rate_of_payment_day_is_not_used() {
        let raw = vec![raw(day(3, 1), Decimal::ONE, Currency::USD)];
        let usd = vec![candle(day(2, 29), 90), candle(day(3, 1), 91)];

        assert_eq!(consolidate(&raw, &usd).unwrap()[0].value, Decimal::from(90));
    }

    #[test]
    fn test_missing_rate_is_error() {
        let raw = vec![raw(day(3, 1), Decimal::ONE, Currency::USD)];
        let usd = vec![candle(day(3, 1), 91)];

        assert!(matches!(consolidate(&raw, &usd), Err(DataError::Gateway(_))));
    }

    fn mirror_rule(store: Arc<dyn DocumentStore>) -> UpdateRule<Dividend> {
        UpdateRule::new(
            NAME,
            Arc::new(Repo::<Dividend>::new(Arc::clone(&store))),
            TickerSelector,
            DividendsGateway::new(
                Arc::new(Repo::<RawDiv>::new(Arc::clone(&store))),
                Arc::new(Repo::<Usd>::new(store)),
            ),
            validators::increasing_dates::<Dividend>,
            WriteMode::Mirror,
            Duration::from_secs(5),
            Arc::new(FixedClock::new(day(7, 1))),
        )
    }

    #[tokio::test]
    async fn test_emptied_raw_dividends_clear_table() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let raw_id = TableId::new(Group::RawDiv, "SBER");
        let id = TableId::new(Group::Dividends, "SBER");
        let raw_repo = Repo::<RawDiv>::new(Arc::clone(&store));
        let repo = Repo::<Dividend>::new(Arc::clone(&store));
        raw_repo
            .replace(&Table::new(
                raw_id.clone(),
                day(6, 1),
                vec![raw(day(6, 1), Decimal::ONE, Currency::RUR)],
            ))
            .await
            .unwrap();
        let rule = mirror_rule(Arc::clone(&store));

        assert!(rule.update(&id).await.unwrap());
        assert_eq!(repo.get(&id).await.unwrap().rows.len(), 1);
        assert!(!rule.update(&id).await.unwrap());

        raw_repo
            .replace(&Table::new(raw_id, day(6, 2), Vec::new()))
            .await
            .unwrap();

        assert!(rule.update(&id).await.unwrap());
        let table = repo.get(&id).await.unwrap();
        assert!(table.rows.is_empty());
        assert_eq!(table.date, day(7, 1));
        assert!(!rule.update(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_selector() {
        let selector = TickerSelector;

        for group in [Group::Quotes, Group::RawDiv] {
            let ids = selector
                .select(&Event::completed(TableId::new(group, "SBER")))
                .await
                .unwrap();
            assert_eq!(ids, vec![TableId::new(Group::Dividends, "SBER")]);
        }

        let ids = selector
            .select(&Event::completed(TableId::new(Group::ReestryDiv, "SBER")))
            .await
            .unwrap();
        assert!(ids.is_empty());
    }
}
