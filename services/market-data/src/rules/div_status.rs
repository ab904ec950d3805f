//! Dividend record dates
//!
//! Triggered by an update of `securities`. MOEX publishes upcoming register
//! closings as a windows-1251 CSV:
//!
//! ```text
//! Эмитент, ...;Дата
//! ПАО Сбербанк, SBER [RU0009029540],10.05.2024 00:00:00
//! ```
//!
//! Only tickers of the portfolio are kept, and only dates from the last
//! trading day on. The shared helpers here drive the rules that react to new
//! statuses.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use encoding_rs::WINDOWS_1251;
use persistence::TableRead;
use regex::Regex;
use reqwest::Client;
use types::dividend::{CurrencyDiv, DivStatus};
use types::errors::DataError;
use types::event::Event;
use types::ids::{Group, TableId};
use types::position::Position;
use types::table::Table;

use super::RuleContext;
use crate::clients::http::fetch_bytes;
use crate::clock::{Clock, TradingCalendar};
use crate::ports::{completed_in, Gateway, OnUpdate, Selector};
use crate::rule::{UpdateRule, WriteMode};
use crate::validators;

pub const NAME: &str = "DivStatusRule";

const DATE_FORMAT: &str = "%d.%m.%Y %H:%M:%S";
/// `nompp` is not traded but shows up in the reports.
const TICKER_PATTERN: &str = r", ([A-Z]+-[A-Z]+|[A-Z]+|nompp) \[";

// ── Shared helpers ──────────────────────────────────────────

pub(crate) async fn statuses(repo: &dyn TableRead<DivStatus>) -> Result<Table<DivStatus>, DataError> {
    repo.get(&TableId::singleton(Group::DivStatus)).await
}

pub(crate) async fn positions(repo: &dyn TableRead<Position>) -> Result<BTreeSet<String>, DataError> {
    let table = repo.get(&TableId::singleton(Group::Positions)).await?;

    Ok(table.rows.into_iter().map(|position| position.ticker).collect())
}

/// Whether some record date of `ticker` has no row in `rows`.
pub(crate) fn uncovered(statuses: &[DivStatus], ticker: &str, rows: &[CurrencyDiv]) -> bool {
    statuses
        .iter()
        .filter(|status| status.ticker == ticker)
        .any(|status| !rows.iter().any(|row| row.date == status.date))
}

/// Selects `target/{ticker}` for every ticker with a record date.
pub struct StatusSelector {
    statuses: Arc<dyn TableRead<DivStatus>>,
    target: Group,
    accept: fn(&str) -> bool,
}

impl StatusSelector {
    pub fn new(statuses: Arc<dyn TableRead<DivStatus>>, target: Group, accept: fn(&str) -> bool) -> Self {
        Self {
            statuses,
            target,
            accept,
        }
    }
}

#[async_trait]
impl Selector for StatusSelector {
    async fn select(&self, event: &Event) -> Result<Vec<TableId>, DataError> {
        if !completed_in(event, Group::DivStatus) {
            return Ok(Vec::new());
        }

        let table = statuses(self.statuses.as_ref())
            .await
            .map_err(|err| DataError::Selector(err.to_string()))?;
        let tickers: BTreeSet<&str> = table
            .rows
            .iter()
            .map(|status| status.ticker.as_str())
            .filter(|ticker| (self.accept)(ticker))
            .collect();

        Ok(tickers
            .into_iter()
            .map(|ticker| TableId::new(self.target, ticker))
            .collect())
    }
}

// ── Gateway ─────────────────────────────────────────────────

pub struct StatusGateway {
    http: Client,
    url: String,
    ticker: Regex,
    positions: Arc<dyn TableRead<Position>>,
    clock: Arc<dyn Clock>,
    calendar: TradingCalendar,
}

impl StatusGateway {
    pub fn new(
        http: Client,
        url: impl Into<String>,
        positions: Arc<dyn TableRead<Position>>,
        clock: Arc<dyn Clock>,
        calendar: TradingCalendar,
    ) -> Result<Self, DataError> {
        let ticker = Regex::new(TICKER_PATTERN)
            .map_err(|err| DataError::gateway("bad ticker pattern", err))?;

        Ok(Self {
            http,
            url: url.into(),
            ticker,
            positions,
            clock,
            calendar,
        })
    }
}

#[async_trait]
impl Gateway<DivStatus> for StatusGateway {
    async fn get(&self, _table: &Table<DivStatus>) -> Result<Vec<DivStatus>, DataError> {
        let positions = positions(self.positions.as_ref()).await?;
        let bytes = fetch_bytes(self.http.get(&self.url)).await?;
        let (text, _, _) = WINDOWS_1251.decode(&bytes);
        let since = self.calendar.last_trading_date(self.clock.now());

        parse_csv(&text, &self.ticker, since, &positions)
    }
}

fn parse_date(s: &str) -> Result<DateTime<Utc>, DataError> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|err| DataError::gateway(&format!("can't parse date {s}"), err))?;
    Ok(Utc.from_utc_datetime(&naive))
}

/// Sorted unique statuses of `positions` dated from `since` on.
pub fn parse_csv(
    text: &str,
    ticker_re: &Regex,
    since: DateTime<Utc>,
    positions: &BTreeSet<String>,
) -> Result<Vec<DivStatus>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| DataError::gateway("can't parse row", err))?;
        let (Some(issuer), Some(date)) = (record.get(0), record.get(1)) else {
            return Err(DataError::Gateway(format!("short row {record:?}")));
        };

        let date = parse_date(date)?;
        if date < since {
            continue;
        }

        let ticker = ticker_re
            .captures(issuer)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| DataError::Gateway(format!("can't parse ticker {issuer}")))?
            .as_str();

        if positions.contains(ticker) {
            rows.push(DivStatus {
                ticker: ticker.to_string(),
                date,
            });
        }
    }

    rows.sort_by(|a, b| (&a.ticker, a.date).cmp(&(&b.ticker, b.date)));
    rows.dedup();

    Ok(rows)
}

pub fn rule(ctx: &RuleContext) -> Result<UpdateRule<DivStatus>, DataError> {
    Ok(UpdateRule::new(
        NAME,
        Arc::new(ctx.repo::<DivStatus>()),
        OnUpdate::singleton(Group::Securities, Group::DivStatus),
        StatusGateway::new(
            ctx.http.clone(),
            ctx.sources.moex_csv.clone(),
            Arc::new(ctx.repo::<Position>()),
            ctx.clock.clone(),
            ctx.calendar,
        )?,
        validators::increasing_statuses,
        WriteMode::Replace,
        ctx.timeout,
        ctx.clock.clone(),
    ))
}
