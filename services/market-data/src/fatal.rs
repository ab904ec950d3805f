//! Process-wide fatal switch
//!
//! Tripped by the error sink. Cancels the root token so the bus and the HTTP
//! server drain and stop; the binary then exits with a failure code.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;
use tracing::error;

#[derive(Debug, Clone)]
pub struct FatalSwitch {
    token: CancellationToken,
    reason: Arc<OnceLock<String>>,
}

impl FatalSwitch {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            reason: Arc::new(OnceLock::new()),
        }
    }

    /// Record the first fatal reason and cancel the root token.
    pub fn trip(&self, reason: impl Into<String>) {
        let reason = reason.into();
        error!(%reason, "fatal error, shutting down");
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    pub fn is_tripped(&self) -> bool {
        self.reason.get().is_some()
    }

    /// First reason the switch was tripped with.
    pub fn reason(&self) -> Option<&str> {
        self.reason.get().map(String::as_str)
    }
}
