//! Event bus
//!
//! In-process fan-out of events between rules.
//!
//! ```text
//!  rules ──out──▶ inbox ──▶ main loop ──▶ broadcast ──▶ broadcaster ──┬─▶ consumer 1 ─▶ rule 1
//!  editors ─────▶ (Publisher)                                         ├─▶ consumer 2 ─▶ rule 2
//!                                                                     └─▶ ...
//! ```
//!
//! All channels hold a single event, so a slow consumer stalls the
//! broadcaster and ultimately the producers.
//!
//! Lifecycle: `Running` until the shutdown token is cancelled, then
//! `Draining`: the broadcast channel is closed, consumers are closed after
//! it, rules finish their in-flight jobs and return. Every event that reaches
//! the inbox after cancellation is counted as unprocessed.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};
use types::event::Event;

use crate::rule::Rule;

const CHANNEL_CAPACITY: usize = 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("unprocessed event: count {count}")]
    UnprocessedEvent { count: usize },

    #[error("bus is closed")]
    Closed,
}

/// Handle for services outside the rule set to put events on the bus.
#[derive(Debug, Clone)]
pub struct Publisher {
    inbox: mpsc::Sender<Event>,
}

impl Publisher {
    pub async fn publish(&self, event: Event) -> Result<(), BusError> {
        self.inbox.send(event).await.map_err(|_| BusError::Closed)
    }
}

pub struct EventBus {
    rules: Vec<Arc<dyn Rule>>,
    inbox_tx: mpsc::Sender<Event>,
    inbox_rx: mpsc::Receiver<Event>,
}

impl EventBus {
    pub fn new(rules: Vec<Arc<dyn Rule>>) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            rules,
            inbox_tx,
            inbox_rx,
        }
    }

    pub fn publisher(&self) -> Publisher {
        Publisher {
            inbox: self.inbox_tx.clone(),
        }
    }

    /// Route events until `shutdown` is cancelled, then drain.
    ///
    /// Fails if any event reached the inbox after the rules stopped listening.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), BusError> {
        let EventBus {
            rules,
            inbox_tx,
            mut inbox_rx,
        } = self;

        let tracker = TaskTracker::new();
        let mut consumers = Vec::with_capacity(rules.len());

        for rule in rules {
            let (consumer_tx, consumer_rx) = mpsc::channel(CHANNEL_CAPACITY);
            consumers.push(consumer_tx);

            let out = inbox_tx.clone();
            tracker.spawn(async move { rule.activate(consumer_rx, out).await });
        }
        drop(inbox_tx);

        let (broadcast_tx, broadcast_rx) = mpsc::channel(CHANNEL_CAPACITY);
        tracker.spawn(broadcast_to_consumers(broadcast_rx, consumers));
        tracker.close();

        info!("event bus started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                event = inbox_rx.recv() => {
                    let Some(event) = event else { break };
                    info!(%event, "processing");
                    if broadcast_tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
        }

        drop(broadcast_tx);
        info!("event bus draining");

        let count = drain_unprocessed(&mut inbox_rx, &tracker).await;

        info!(unprocessed = count, "event bus stopped");
        if count != 0 {
            return Err(BusError::UnprocessedEvent { count });
        }
        Ok(())
    }
}

async fn broadcast_to_consumers(
    mut broadcast: mpsc::Receiver<Event>,
    consumers: Vec<mpsc::Sender<Event>>,
) {
    while let Some(event) = broadcast.recv().await {
        for consumer in &consumers {
            if consumer.send(event.clone()).await.is_err() {
                warn!(%event, "consumer closed");
            }
        }
    }
}

/// Count events arriving while rules finish, then close the inbox for good.
async fn drain_unprocessed(inbox: &mut mpsc::Receiver<Event>, tracker: &TaskTracker) -> usize {
    let mut count = 0;

    loop {
        tokio::select! {
            event = inbox.recv() => match event {
                Some(event) => {
                    warn!(%event, "unprocessed");
                    count += 1;
                }
                None => break,
            },
            _ = tracker.wait() => break,
        }
    }

    // Publishers outside the rule set may still hold senders.
    inbox.close();
    while let Some(event) = inbox.recv().await {
        warn!(%event, "unprocessed");
        count += 1;
    }

    count
}
