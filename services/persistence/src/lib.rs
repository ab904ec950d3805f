//! Persistence for the market data tables
//!
//! One collection per group, one document per table name. The document store
//! itself sits behind `DocumentStore`; `Repo<R>` gives typed access to
//! tables on top of it and `Backup` dumps and restores whole collections.
//!
//! # Modules
//! - `store`: Document store port and the in-memory implementation
//! - `repo`: Typed repository (`TableRead`, `TableWrite`, `JsonView`)
//! - `dump`: Collection dumps with integrity checks, compression and retention

pub mod store;
pub mod repo;
pub mod dump;

pub use dump::{Backup, CollectionBackup, DumpError};
pub use repo::{JsonRepo, JsonView, Repo, TableRead, TableWrite};
pub use store::{Document, DocumentStore, MemoryStore, StoreError};
