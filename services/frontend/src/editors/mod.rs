//! Editors of the user-owned tables
//!
//! `raw_div/{ticker}` and `positions` are written only here. After a save
//! the editor announces the commit on the bus so dependent rules run.

use async_trait::async_trait;
use market_data::{BusError, Publisher};
use serde::Serialize;
use types::event::Event;
use types::ids::TableId;

pub mod dividends;
pub mod portfolio;

pub use dividends::DividendEditor;
pub use portfolio::PortfolioEditor;

/// Announces committed tables.
#[async_trait]
pub trait Announce: Send + Sync {
    async fn announce(&self, id: TableId) -> Result<(), BusError>;
}

#[async_trait]
impl Announce for Publisher {
    async fn announce(&self, id: TableId) -> Result<(), BusError> {
        self.publish(Event::completed(id)).await
    }
}

pub const STATUS_OK: &str = "OK";

/// Outcome of one step of a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub name: &'static str,
    pub status: String,
}

impl Step {
    fn ok(name: &'static str) -> Self {
        Self {
            name,
            status: STATUS_OK.to_string(),
        }
    }

    fn new<E: ToString>(name: &'static str, result: &Result<(), E>) -> Self {
        let status = match result {
            Ok(()) => STATUS_OK.to_string(),
            Err(err) => err.to_string(),
        };
        Self { name, status }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Keeps announced ids instead of sending them.
    #[derive(Default)]
    pub struct Recorder {
        pub ids: Mutex<Vec<TableId>>,
    }

    #[async_trait]
    impl Announce for Recorder {
        async fn announce(&self, id: TableId) -> Result<(), BusError> {
            self.ids.lock().unwrap().push(id);
            Ok(())
        }
    }

    impl Recorder {
        pub fn announced(&self) -> Vec<TableId> {
            self.ids.lock().unwrap().clone()
        }
    }
}
