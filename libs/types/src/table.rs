//! Versioned table of rows
//!
//! A table is the unit of storage and of update: one document per
//! `(group, name)` holding the commit timestamp and the ordered rows.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::ids::{Group, Name, TableId};

/// Bound shared by every row type stored in a table.
pub trait Row: Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Row for T where T: Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{}

/// Rows that carry their own point in time.
///
/// Used by validators that check chronological order.
pub trait Dated {
    fn date(&self) -> DateTime<Utc>;
}

/// Ordered rows of one table together with the time of the latest commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<R> {
    pub id: TableId,
    pub date: DateTime<Utc>,
    pub rows: Vec<R>,
}

impl<R> Table<R> {
    pub fn new(id: TableId, date: DateTime<Utc>, rows: Vec<R>) -> Self {
        Self { id, date, rows }
    }

    /// Table materialized on a read miss: no rows, epoch timestamp.
    pub fn empty(id: TableId) -> Self {
        Self {
            id,
            date: DateTime::UNIX_EPOCH,
            rows: Vec::new(),
        }
    }

    pub fn group(&self) -> Group {
        self.id.group()
    }

    pub fn name(&self) -> &Name {
        self.id.name()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Last row; defined only for non-empty tables.
    pub fn last_row(&self) -> Option<&R> {
        self.rows.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_has_no_last_row() {
        let table: Table<u32> = Table::empty(TableId::singleton(Group::Cpi));
        assert!(table.is_empty());
        assert_eq!(table.last_row(), None);
        assert_eq!(table.date, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_last_row() {
        let table = Table::new(TableId::singleton(Group::Cpi), Utc::now(), vec![1, 2, 3]);
        assert_eq!(table.last_row(), Some(&3));
        assert_eq!(table.group(), Group::Cpi);
    }
}
