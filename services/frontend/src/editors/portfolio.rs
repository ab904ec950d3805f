//! Portfolio editor
//!
//! Edits the set of held tickers. Only listed securities can be added.

use std::collections::BTreeSet;
use std::sync::Arc;

use market_data::Clock;
use persistence::{DocumentStore, Repo, TableRead, TableWrite};
use serde::{Deserialize, Serialize};
use tracing::info;
use types::ids::{Group, TableId};
use types::position::Position;
use types::security::Security;
use types::table::Table;
use uuid::Uuid;

use super::Announce;
use crate::error::AppError;
use crate::sessions::{SessionStore, SESSION_TTL};

struct PortfolioSession {
    held: BTreeSet<String>,
    listed: BTreeSet<String>,
}

impl PortfolioSession {
    /// Listed tickers not yet held.
    fn addable(&self) -> impl Iterator<Item = &String> {
        self.listed.difference(&self.held)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortfolioView {
    pub session_id: Uuid,
    pub tickers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub pattern: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TickerRequest {
    pub ticker: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveSummary {
    pub count: usize,
}

pub struct PortfolioEditor {
    positions: Repo<Position>,
    securities: Repo<Security>,
    clock: Arc<dyn Clock>,
    announce: Arc<dyn Announce>,
    sessions: SessionStore<PortfolioSession>,
}

fn positions_id() -> TableId {
    TableId::singleton(Group::Positions)
}

impl PortfolioEditor {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, announce: Arc<dyn Announce>) -> Self {
        Self {
            positions: Repo::new(Arc::clone(&store)),
            securities: Repo::new(store),
            clock,
            announce,
            sessions: SessionStore::new(SESSION_TTL),
        }
    }

    fn view(&self, id: Uuid) -> Result<PortfolioView, AppError> {
        let tickers: Vec<String> = self
            .sessions
            .with(id, |session| session.held.iter().cloned().collect())?;
        Ok(PortfolioView {
            session_id: id,
            tickers,
        })
    }

    pub async fn open(&self) -> Result<PortfolioView, AppError> {
        let held = self
            .positions
            .get(&positions_id())
            .await?
            .rows
            .into_iter()
            .map(|position| position.ticker)
            .collect();
        let listed = self
            .securities
            .get(&TableId::singleton(Group::Securities))
            .await?
            .rows
            .into_iter()
            .map(|security| security.ticker)
            .collect();

        let id = self.sessions.open(PortfolioSession { held, listed });
        self.view(id)
    }

    /// Addable tickers starting with `pattern`.
    pub fn search(&self, id: Uuid, pattern: &str) -> Result<Vec<String>, AppError> {
        let prefix = pattern.trim().to_uppercase();
        let found: Vec<String> = self.sessions.with(id, |session| {
            session
                .addable()
                .filter(|ticker| ticker.starts_with(&prefix))
                .cloned()
                .collect()
        })?;
        Ok(found)
    }

    pub fn add(&self, id: Uuid, ticker: &str) -> Result<PortfolioView, AppError> {
        let ticker = ticker.trim().to_uppercase();
        let added = self.sessions.with(id, |session| {
            session.listed.contains(&ticker) && session.held.insert(ticker.clone())
        })?;
        if !added {
            return Err(AppError::BadRequest(format!("incorrect ticker to add - {ticker}")));
        }
        self.view(id)
    }

    pub fn remove(&self, id: Uuid, ticker: &str) -> Result<PortfolioView, AppError> {
        let ticker = ticker.trim().to_uppercase();
        let removed = self.sessions.with(id, |session| session.held.remove(&ticker))?;
        if !removed {
            return Err(AppError::BadRequest(format!("incorrect ticker to remove - {ticker}")));
        }
        self.view(id)
    }

    /// Replace `positions` and close the session.
    pub async fn save(&self, id: Uuid) -> Result<SaveSummary, AppError> {
        let session = self.sessions.take(id)?;
        let rows: Vec<Position> = session.held.into_iter().map(Position::new).collect();
        let table = Table::new(positions_id(), self.clock.now(), rows);

        self.positions.replace(&table).await?;
        self.announce.announce(table.id.clone()).await?;

        info!(count = table.rows.len(), "portfolio saved");
        Ok(SaveSummary {
            count: table.rows.len(),
        })
    }

    pub fn sweep(&self) -> usize {
        self.sessions.sweep()
    }
}
