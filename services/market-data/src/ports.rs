//! Ports of the update rule
//!
//! A rule is assembled from three parts:
//! - `Selector`: which tables an inbound event affects
//! - `Gateway`: candidate rows for one table from an external source
//! - `Validator`: whether the candidate rows may be committed

use async_trait::async_trait;
use types::errors::DataError;
use types::event::Event;
use types::ids::{Group, TableId};
use types::table::{Row, Table};

/// Maps an inbound event to the ids of the tables to recompute.
#[async_trait]
pub trait Selector: Send + Sync {
    async fn select(&self, event: &Event) -> Result<Vec<TableId>, DataError>;
}

/// Fetches candidate rows for one table.
///
/// In append mode the first returned row must be the stored last row.
#[async_trait]
pub trait Gateway<R: Row>: Send + Sync {
    async fn get(&self, table: &Table<R>) -> Result<Vec<R>, DataError>;
}

/// Checks candidate rows against the stored table.
pub type Validator<R> = fn(&Table<R>, &[R]) -> Result<(), DataError>;

/// Selects fixed tables whenever any table of the trigger group is updated.
#[derive(Debug, Clone)]
pub struct OnUpdate {
    trigger: Group,
    targets: Vec<TableId>,
}

impl OnUpdate {
    pub fn new(trigger: Group, targets: Vec<TableId>) -> Self {
        Self { trigger, targets }
    }

    /// Singleton table recomputed after the trigger group.
    pub fn singleton(trigger: Group, target: Group) -> Self {
        Self::new(trigger, vec![TableId::singleton(target)])
    }
}

/// Whether the event reports a successful update of a table in `group`.
pub fn completed_in(event: &Event, group: Group) -> bool {
    matches!(event, Event::UpdateCompleted { id } if id.group() == group)
}

#[async_trait]
impl Selector for OnUpdate {
    async fn select(&self, event: &Event) -> Result<Vec<TableId>, DataError> {
        if completed_in(event, self.trigger) {
            return Ok(self.targets.clone());
        }
        Ok(Vec::new())
    }
}
