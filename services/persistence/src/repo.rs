//! Typed table repository
//!
//! `Repo<R>` maps `Table<R>` onto documents of a `DocumentStore`. A missing
//! document reads as an empty table; only the JSON view reports a miss.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use types::errors::DataError;
use types::ids::TableId;
use types::table::{Row, Table};

use crate::store::{DocumentStore, StoreError};

/// Read access to tables of one row type.
#[async_trait]
pub trait TableRead<R: Row>: Send + Sync {
    /// Load a table; a missing document yields an empty table.
    async fn get(&self, id: &TableId) -> Result<Table<R>, DataError>;
}

/// Write access to tables of one row type.
#[async_trait]
pub trait TableWrite<R: Row>: TableRead<R> {
    /// Upsert the whole row sequence and the date.
    async fn replace(&self, table: &Table<R>) -> Result<(), DataError>;

    /// Upsert by pushing `table.rows` onto the stored rows and setting the date.
    async fn append(&self, table: &Table<R>) -> Result<(), DataError>;
}

/// Raw projection of stored tables, independent of the row type.
#[async_trait]
pub trait JsonView: Send + Sync {
    /// `{"rows": [...]}` in extended-JSON form; a miss is `TableNotFound`.
    async fn get_json(&self, id: &TableId) -> Result<Vec<u8>, DataError>;
}

fn store_error(id: &TableId, err: StoreError) -> DataError {
    DataError::repo(id, err)
}

fn encode_rows<R: Row>(table: &Table<R>) -> Result<Vec<Value>, DataError> {
    table
        .rows
        .iter()
        .map(|row| serde_json::to_value(row).map_err(|err| DataError::repo(&table.id, err)))
        .collect()
}

/// Repository of tables with rows of type `R`.
pub struct Repo<R> {
    store: Arc<dyn DocumentStore>,
    _rows: PhantomData<fn() -> R>,
}

impl<R> Repo<R> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _rows: PhantomData,
        }
    }
}

impl<R> Clone for Repo<R> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.store))
    }
}

#[async_trait]
impl<R: Row> TableRead<R> for Repo<R> {
    async fn get(&self, id: &TableId) -> Result<Table<R>, DataError> {
        let doc = self
            .store
            .find(id.group().as_str(), id.name().as_str())
            .await
            .map_err(|err| store_error(id, err))?;

        let Some(doc) = doc else {
            return Ok(Table::empty(id.clone()));
        };

        let rows = doc
            .rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<R>, _>>()
            .map_err(|err| DataError::repo(id, err))?;

        Ok(Table::new(id.clone(), doc.date, rows))
    }
}

#[async_trait]
impl<R: Row> TableWrite<R> for Repo<R> {
    async fn replace(&self, table: &Table<R>) -> Result<(), DataError> {
        let rows = encode_rows(table)?;
        debug!(table = %table.id, rows = rows.len(), "replace");
        self.store
            .set_rows(
                table.id.group().as_str(),
                table.id.name().as_str(),
                table.date,
                rows,
            )
            .await
            .map_err(|err| store_error(&table.id, err))
    }

    async fn append(&self, table: &Table<R>) -> Result<(), DataError> {
        let rows = encode_rows(table)?;
        debug!(table = %table.id, rows = rows.len(), "append");
        self.store
            .push_rows(
                table.id.group().as_str(),
                table.id.name().as_str(),
                table.date,
                rows,
            )
            .await
            .map_err(|err| store_error(&table.id, err))
    }
}

/// Untyped view over the same store, used by the HTTP surface.
#[derive(Clone)]
pub struct JsonRepo {
    store: Arc<dyn DocumentStore>,
}

impl JsonRepo {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JsonView for JsonRepo {
    async fn get_json(&self, id: &TableId) -> Result<Vec<u8>, DataError> {
        let doc = self
            .store
            .find(id.group().as_str(), id.name().as_str())
            .await
            .map_err(|err| store_error(id, err))?
            .ok_or_else(|| DataError::TableNotFound(id.clone()))?;

        serde_json::to_vec(&json!({ "rows": doc.rows })).map_err(|err| DataError::repo(id, err))
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use types::ids::Group;
    use types::position::Position;

    proptest! {
        #[test]
        fn prop_append_concatenates(
            head in proptest::collection::vec("[A-Z]{4}", 0..8),
            tail in proptest::collection::vec("[A-Z]{4}", 0..8),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let repo: Repo<Position> = Repo::new(Arc::new(MemoryStore::new()));
            let id = TableId::singleton(Group::Positions);
            let rows = |tickers: &[String]| tickers.iter().map(Position::new).collect::<Vec<_>>();

            let loaded = rt.block_on(async {
                let first = Utc.timestamp_millis_opt(1_000).unwrap();
                let second = Utc.timestamp_millis_opt(2_000).unwrap();
                repo.append(&Table::new(id.clone(), first, rows(&head))).await.unwrap();
                repo.append(&Table::new(id.clone(), second, rows(&tail))).await.unwrap();
                repo.get(&id).await.unwrap()
            });

            let expected: Vec<Position> = rows(&head).into_iter().chain(rows(&tail)).collect();
            prop_assert_eq!(loaded.rows, expected);
        }
    }
}
