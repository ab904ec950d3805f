//! Document store port
//!
//! Layout: one collection per group, one document per table name, shaped as
//! `{ _id: name, date: {"$date": ...}, rows: [...] }`. Rows are kept as JSON
//! values in extended-JSON form, so the stored array is also the projection
//! served to HTTP clients.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Codec error in {collection}/{name}: {reason}")]
    Codec {
        collection: String,
        name: String,
        reason: String,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

// ── Document ────────────────────────────────────────────────────────

/// Stored form of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub name: String,
    #[serde(with = "types::ext_json")]
    pub date: DateTime<Utc>,
    pub rows: Vec<Value>,
}

// ── Port ────────────────────────────────────────────────────────────

/// Minimal document-store contract used by the repository and the dumps.
///
/// Writes are upserts. Every write is idempotent with respect to a retry of
/// the same payload.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Document `name` of `collection`, if any.
    async fn find(&self, collection: &str, name: &str) -> Result<Option<Document>, StoreError>;

    /// Replace the whole row array and the date.
    async fn set_rows(
        &self,
        collection: &str,
        name: &str,
        date: DateTime<Utc>,
        rows: Vec<Value>,
    ) -> Result<(), StoreError>;

    /// Push rows onto the row array and set the date.
    async fn push_rows(
        &self,
        collection: &str,
        name: &str,
        date: DateTime<Utc>,
        rows: Vec<Value>,
    ) -> Result<(), StoreError>;

    /// Every document of a collection, ordered by name.
    async fn collection(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Replace the content of a collection with `docs`.
    async fn restore(&self, collection: &str, docs: Vec<Document>) -> Result<(), StoreError>;

    /// Names of non-empty collections.
    async fn collections(&self) -> Result<Vec<String>, StoreError>;
}

// ── In-memory store ─────────────────────────────────────────────────

/// `DashMap`-backed document store.
///
/// Documents inside a collection live in a `BTreeMap`, so listings come out
/// sorted by name.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: DashMap<String, BTreeMap<String, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, name: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.get(name).cloned()))
    }

    async fn set_rows(
        &self,
        collection: &str,
        name: &str,
        date: DateTime<Utc>,
        rows: Vec<Value>,
    ) -> Result<(), StoreError> {
        self.collections.entry(collection.to_string()).or_default().insert(
            name.to_string(),
            Document {
                name: name.to_string(),
                date,
                rows,
            },
        );
        Ok(())
    }

    async fn push_rows(
        &self,
        collection: &str,
        name: &str,
        date: DateTime<Utc>,
        rows: Vec<Value>,
    ) -> Result<(), StoreError> {
        let mut docs = self.collections.entry(collection.to_string()).or_default();
        let doc = docs.entry(name.to_string()).or_insert_with(|| Document {
            name: name.to_string(),
            date,
            rows: Vec::new(),
        });

        // A retried push of the same payload is already applied.
        if doc.date == date && !rows.is_empty() && doc.rows.ends_with(&rows) {
            return Ok(());
        }

        doc.date = date;
        doc.rows.extend(rows);
        Ok(())
    }

    async fn collection(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn restore(&self, collection: &str, docs: Vec<Document>) -> Result<(), StoreError> {
        let docs = docs
            .into_iter()
            .map(|doc| (doc.name.clone(), doc))
            .collect::<BTreeMap<_, _>>();
        self.collections.insert(collection.to_string(), docs);
        Ok(())
    }

    async fn collections(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self
            .collections
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
