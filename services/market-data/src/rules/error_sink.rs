//! Error sink
//!
//! Any `ErrorOccurred` on the bus is unrecoverable: the sink logs it, sends a
//! notification if configured and trips the fatal switch, which stops the
//! service with a failure code.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use types::event::Event;

use super::RuleContext;
use crate::clients::Notifier;
use crate::fatal::FatalSwitch;
use crate::rule::Rule;

pub const NAME: &str = "ErrorSink";

pub struct ErrorSink {
    notifier: Option<Arc<dyn Notifier>>,
    fatal: FatalSwitch,
}

impl ErrorSink {
    pub fn new(ctx: &RuleContext) -> Self {
        Self::with_notifier(ctx.notifier.clone(), ctx.fatal.clone())
    }

    pub fn with_notifier(notifier: Option<Arc<dyn Notifier>>, fatal: FatalSwitch) -> Self {
        Self { notifier, fatal }
    }
}

#[async_trait]
impl Rule for ErrorSink {
    fn name(&self) -> &str {
        NAME
    }

    async fn activate(&self, mut inbox: mpsc::Receiver<Event>, _out: mpsc::Sender<Event>) {
        info!(rule = NAME, "started");

        let tracker = TaskTracker::new();
        while let Some(event) = inbox.recv().await {
            let Event::ErrorOccurred { id, error } = &event else {
                continue;
            };
            error!(rule = NAME, %id, %error, "error occurred");

            if let Some(notifier) = self.notifier.clone() {
                let text = event.to_string();
                tracker.spawn(async move {
                    if let Err(err) = notifier.notify(&text).await {
                        warn!(rule = NAME, error = %err, "can't send notification");
                    }
                });
            }

            self.fatal.trip(event.to_string());
        }

        tracker.close();
        tracker.wait().await;

        info!(rule = NAME, "stopped");
    }
}
