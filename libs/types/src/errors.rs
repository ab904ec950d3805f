//! Error types for table updates
//!
//! A single taxonomy shared by the repository, the rules and the HTTP layer.
//! Errors travel inside events, so every variant is cheap to clone and compare.

use std::time::Duration;

use thiserror::Error;

use crate::ids::TableId;

/// Failure of any step of a table update.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("table not found: {0}")]
    TableNotFound(TableId),

    #[error("unknown group: {0}")]
    UnknownGroup(String),

    #[error("repository failure for {id}: {reason}")]
    RepoInternal { id: TableId, reason: String },

    #[error("gateway failure: {0}")]
    Gateway(String),

    #[error("validation failure: {0}")]
    Validation(String),

    #[error("selector failure: {0}")]
    Selector(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("backup failure: {0}")]
    Backup(String),
}

impl DataError {
    /// Wrap a lower-level error that happened while talking to an external source.
    pub fn gateway(context: &str, err: impl std::fmt::Display) -> Self {
        DataError::Gateway(format!("{context} -> {err}"))
    }

    /// Wrap a repository failure for a concrete table.
    pub fn repo(id: &TableId, err: impl std::fmt::Display) -> Self {
        DataError::RepoInternal {
            id: id.clone(),
            reason: err.to_string(),
        }
    }
}
