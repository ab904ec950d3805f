//! Concrete rules
//!
//! The update flow is encoded by which event each rule reacts to:
//!
//! ```text
//! day_timer ─▶ dates ─┬─▶ usd ─▶ securities ─┬─▶ quotes ─▶ dividends
//!                     ├─▶ indexes            └─▶ div_status ─┬─▶ raw_div check
//!                     └─▶ cpi                                ├─▶ nasdaq
//!                                                            └─▶ reestry
//! editors ─▶ raw_div / positions ─▶ backup, dividends
//! any ErrorOccurred ─▶ error_sink
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use persistence::{CollectionBackup, DocumentStore, Repo};
use reqwest::Client;
use types::errors::DataError;
use types::table::{Dated, Row, Table};

use crate::clients::{IssClient, Notifier};
use crate::clock::{Clock, TradingCalendar};
use crate::fatal::FatalSwitch;
use crate::rule::Rule;
use crate::sources::Sources;

pub mod backup;
pub mod cpi;
pub mod dates;
pub mod day_timer;
pub mod div_status;
pub mod dividends;
pub mod error_sink;
pub mod indexes;
pub mod nasdaq;
pub mod quotes;
pub mod raw_div;
pub mod reestry;
pub mod securities;
pub mod usd;

/// Everything the rules are built from.
#[derive(Clone)]
pub struct RuleContext {
    pub store: Arc<dyn DocumentStore>,
    pub http: Client,
    pub sources: Sources,
    pub clock: Arc<dyn Clock>,
    pub calendar: TradingCalendar,
    /// Deadline of the work triggered by one event.
    pub timeout: Duration,
    pub backup_timeout: Duration,
    /// Day timer period.
    pub tick: Duration,
    pub backup: Arc<dyn CollectionBackup>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub fatal: FatalSwitch,
}

impl RuleContext {
    pub fn repo<R: Row>(&self) -> Repo<R> {
        Repo::new(Arc::clone(&self.store))
    }

    pub fn iss(&self) -> IssClient {
        IssClient::new(self.http.clone(), self.sources.iss.clone())
    }

    /// Last trading date with published results.
    pub fn last_trading_day(&self) -> NaiveDate {
        self.calendar.last_trading_date(self.clock.now()).date_naive()
    }
}

/// First date to download for an append-mode table: the stored last row,
/// which comes back as the anchor.
pub(crate) fn resume_from<R: Dated>(table: &Table<R>) -> Option<NaiveDate> {
    table.last_row().map(|row| row.date().date_naive())
}

/// The full rule set, one rule per table group.
pub fn all(ctx: &RuleContext) -> Result<Vec<Arc<dyn Rule>>, DataError> {
    Ok(vec![
        Arc::new(error_sink::ErrorSink::new(ctx)),
        Arc::new(day_timer::DayTimer::new(ctx)),
        Arc::new(dates::rule(ctx)),
        Arc::new(indexes::rule(ctx)),
        Arc::new(usd::rule(ctx)),
        Arc::new(securities::rule(ctx)),
        Arc::new(quotes::rule(ctx)),
        Arc::new(cpi::rule(ctx)?),
        Arc::new(div_status::rule(ctx)?),
        Arc::new(raw_div::rule(ctx)),
        Arc::new(nasdaq::rule(ctx)),
        Arc::new(reestry::rule(ctx)?),
        Arc::new(dividends::rule(ctx)),
        Arc::new(backup::BackupRule::new(ctx)),
    ])
}
