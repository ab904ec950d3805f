//! Rules and the generic update rule
//!
//! A rule is a long-lived task: it reads events from its inbox and writes new
//! events to the bus. `UpdateRule<R>` implements the common update flow for
//! tables of row type `R`:
//!
//! ```text
//! event ─▶ selector ─▶ ids ─┬─▶ job(id): get ─▶ gateway ─▶ validate ─▶ commit ─▶ UpdateCompleted(id)
//!                           └─▶ job(id): ...
//! ```
//!
//! Jobs of one event run concurrently under a shared deadline. Every job ends
//! with at most one event; errors become `ErrorOccurred` and nothing is written.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use persistence::TableWrite;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use types::errors::DataError;
use types::event::Event;
use types::ids::TableId;
use types::table::{Row, Table};

use crate::clock::Clock;
use crate::ports::{Gateway, Selector, Validator};

/// Event handler plugged into the bus.
#[async_trait]
pub trait Rule: Send + Sync {
    fn name(&self) -> &str;

    /// Process events until `inbox` closes, then finish in-flight work.
    ///
    /// `out` is dropped on return, which tells the bus the rule is done.
    async fn activate(&self, inbox: mpsc::Receiver<Event>, out: mpsc::Sender<Event>);
}

/// Send an event to the bus, logging if the bus is already gone.
pub(crate) async fn emit(rule: &str, out: &mpsc::Sender<Event>, event: Event) {
    if let Err(err) = out.send(event).await {
        warn!(rule, event = %err.0, "bus closed, event dropped");
    }
}

/// How a successful gateway result is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// First row anchors to the stored last row; only the tail is appended.
    Append,
    /// New rows supersede the stored ones.
    Replace,
    /// Stored rows become exactly the gateway result, which may be empty.
    /// A result equal to the stored rows is not an update.
    Mirror,
}

struct Inner<R: Row> {
    name: String,
    repo: Arc<dyn TableWrite<R>>,
    selector: Box<dyn Selector>,
    gateway: Box<dyn Gateway<R>>,
    validator: Validator<R>,
    mode: WriteMode,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

/// Generic rule: selector → per-id update → gateway → validate → commit → emit.
pub struct UpdateRule<R: Row> {
    inner: Arc<Inner<R>>,
}

impl<R: Row> Clone for UpdateRule<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Row> UpdateRule<R> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        repo: Arc<dyn TableWrite<R>>,
        selector: impl Selector + 'static,
        gateway: impl Gateway<R> + 'static,
        validator: Validator<R>,
        mode: WriteMode,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                repo,
                selector: Box::new(selector),
                gateway: Box::new(gateway),
                validator,
                mode,
                timeout,
                clock,
            }),
        }
    }

    async fn handle_event(&self, event: Event, out: mpsc::Sender<Event>) {
        let name = self.name();
        let deadline = Instant::now() + self.inner.timeout;

        let ids = match timeout_at(deadline, self.inner.selector.select(&event)).await {
            Ok(Ok(ids)) => ids,
            Ok(Err(err)) => {
                emit(name, &out, Event::failed(event.id().clone(), err)).await;
                return;
            }
            Err(_) => {
                let err = DataError::Timeout(self.inner.timeout);
                emit(name, &out, Event::failed(event.id().clone(), err)).await;
                return;
            }
        };

        if ids.is_empty() {
            return;
        }
        debug!(rule = name, trigger = %event, tables = ids.len(), "selected");

        let mut jobs = JoinSet::new();
        for id in ids {
            let rule = self.clone();
            let out = out.clone();
            jobs.spawn(async move {
                let result = match timeout_at(deadline, rule.update(&id)).await {
                    Ok(result) => result,
                    Err(_) => Err(DataError::Timeout(rule.inner.timeout)),
                };
                match result {
                    Ok(true) => emit(rule.name(), &out, Event::completed(id)).await,
                    Ok(false) => {}
                    Err(err) => emit(rule.name(), &out, Event::failed(id, err)).await,
                }
            });
        }

        while let Some(joined) = jobs.join_next().await {
            if let Err(err) = joined {
                error!(rule = name, error = %err, "update job panicked");
            }
        }
    }

    /// Run one table update. Returns whether a new version was committed.
    pub async fn update(&self, id: &TableId) -> Result<bool, DataError> {
        let table = self.inner.repo.get(id).await?;
        let rows = self.inner.gateway.get(&table).await?;

        if !self.have_new_rows(&table, &rows) {
            return Ok(false);
        }

        (self.inner.validator)(&table, &rows)?;

        let date = self.inner.clock.now();
        match self.inner.mode {
            WriteMode::Append => {
                let tail = if table.is_empty() {
                    rows
                } else {
                    rows[1..].to_vec()
                };
                self.inner
                    .repo
                    .append(&Table::new(id.clone(), date, tail))
                    .await?;
            }
            WriteMode::Replace | WriteMode::Mirror => {
                self.inner
                    .repo
                    .replace(&Table::new(id.clone(), date, rows))
                    .await?;
            }
        }

        Ok(true)
    }

    fn have_new_rows(&self, table: &Table<R>, rows: &[R]) -> bool {
        match self.inner.mode {
            WriteMode::Mirror => rows != table.rows.as_slice(),
            _ if rows.is_empty() => false,
            WriteMode::Append => table.is_empty() || rows.len() > 1,
            WriteMode::Replace => true,
        }
    }
}

#[async_trait]
impl<R: Row> Rule for UpdateRule<R> {
    fn name(&self) -> &str {
        &self.inner.name
    }

    async fn activate(&self, mut inbox: mpsc::Receiver<Event>, out: mpsc::Sender<Event>) {
        info!(rule = self.name(), "started");

        let tracker = TaskTracker::new();
        while let Some(event) = inbox.recv().await {
            let rule = self.clone();
            let out = out.clone();
            tracker.spawn(async move { rule.handle_event(event, out).await });
        }

        tracker.close();
        tracker.wait().await;

        info!(rule = self.name(), "stopped");
    }
}
