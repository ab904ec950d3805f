//! Raw dividend editor
//!
//! Opens a copy of `raw_div/{ticker}` alongside the rows the scrapers found
//! but the user has not entered yet. Rows are added to the copy; save
//! writes it back sorted by date.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use market_data::{Clock, TradingCalendar};
use persistence::{DocumentStore, Repo, TableRead, TableWrite};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use types::dividend::{is_foreign_ticker, Currency, CurrencyDiv, RawDiv};
use types::ids::{Group, TableId};
use types::table::Table;
use uuid::Uuid;

use super::{Announce, Step};
use crate::error::AppError;
use crate::sessions::{SessionStore, SESSION_TTL};

const DATE_FORMAT: &str = "%Y-%m-%d";

struct DivSession {
    ticker: String,
    rows: Vec<RawDiv>,
    missed: Vec<CurrencyDiv>,
}

/// Editor state sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DivView {
    pub session_id: Uuid,
    pub ticker: String,
    pub rows: Vec<RawDiv>,
    /// Scraped rows absent from `rows`.
    pub missed: Vec<CurrencyDiv>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddRow {
    pub date: String,
    pub value: Decimal,
    pub currency: Currency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub ticker: String,
    pub steps: Vec<Step>,
}

pub struct DividendEditor {
    repo: Repo<RawDiv>,
    clock: Arc<dyn Clock>,
    calendar: TradingCalendar,
    announce: Arc<dyn Announce>,
    sessions: SessionStore<DivSession>,
}

fn raw_id(ticker: &str) -> TableId {
    TableId::new(Group::RawDiv, ticker)
}

/// Scraped table the user's rows are compared against.
fn source_id(ticker: &str) -> TableId {
    let group = if is_foreign_ticker(ticker) {
        Group::NasdaqDiv
    } else {
        Group::ReestryDiv
    };
    TableId::new(group, ticker)
}

fn parse_row(row: AddRow) -> Result<RawDiv, AppError> {
    let date = NaiveDate::parse_from_str(row.date.trim(), DATE_FORMAT)
        .map_err(|err| AppError::BadRequest(format!("can't parse date {} -> {err}", row.date)))?;
    if row.value <= Decimal::ZERO {
        return Err(AppError::BadRequest(format!("dividend must be positive - {}", row.value)));
    }

    Ok(RawDiv {
        date: Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)),
        value: row.value,
        currency: row.currency,
    })
}

impl DividendEditor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        calendar: TradingCalendar,
        announce: Arc<dyn Announce>,
    ) -> Self {
        Self {
            repo: Repo::new(store),
            clock,
            calendar,
            announce,
            sessions: SessionStore::new(SESSION_TTL),
        }
    }

    async fn load(&self, ticker: &str) -> Result<(Vec<RawDiv>, Vec<CurrencyDiv>), AppError> {
        let rows = self.repo.get(&raw_id(ticker)).await?.rows;
        let missed = self
            .repo
            .get(&source_id(ticker))
            .await?
            .rows
            .into_iter()
            .filter(|row| !rows.contains(row))
            .collect();

        Ok((rows, missed))
    }

    fn view(&self, id: Uuid) -> Result<DivView, AppError> {
        let view = self.sessions.with(id, |session| DivView {
            session_id: id,
            ticker: session.ticker.clone(),
            rows: session.rows.clone(),
            missed: session.missed.clone(),
        })?;
        Ok(view)
    }

    pub async fn open(&self, ticker: &str) -> Result<DivView, AppError> {
        let ticker = ticker.to_uppercase();
        let (rows, missed) = self.load(&ticker).await?;

        let id = self.sessions.open(DivSession {
            ticker,
            rows,
            missed,
        });
        self.view(id)
    }

    pub async fn add(&self, id: Uuid, row: AddRow) -> Result<DivView, AppError> {
        let row = parse_row(row)?;
        self.sessions.with(id, |session| {
            session.missed.retain(|missed| *missed != row);
            session.rows.push(row);
        })?;
        self.view(id)
    }

    /// Drop unsaved rows and read the stored table again.
    pub async fn reload(&self, id: Uuid) -> Result<DivView, AppError> {
        let ticker = self.sessions.with(id, |session| session.ticker.clone())?;
        let (rows, missed) = self.load(&ticker).await?;

        self.sessions.with(id, |session| {
            session.rows = rows;
            session.missed = missed;
        })?;
        self.view(id)
    }

    /// Commit the rows and close the session.
    pub async fn save(&self, id: Uuid) -> Result<SaveReport, AppError> {
        let DivSession {
            ticker, mut rows, ..
        } = self.sessions.take(id)?;
        let mut steps = vec![Step::ok("Loaded from cache")];

        rows.sort_by_key(|row| row.date);
        let date = self.calendar.last_trading_date(self.clock.now());
        let table = Table::new(raw_id(&ticker), date, rows);

        let saved = self.repo.replace(&table).await;
        steps.push(Step::new("Saved to repo", &saved));
        if saved.is_ok() {
            let sent = self.announce.announce(table.id.clone()).await;
            steps.push(Step::new("Sent update event", &sent));
        }

        let ok = steps.iter().all(Step::is_ok);
        info!(%ticker, rows = table.rows.len(), ok, "raw dividends saved");
        Ok(SaveReport { ticker, steps })
    }

    pub fn sweep(&self) -> usize {
        self.sessions.sweep()
    }
}
