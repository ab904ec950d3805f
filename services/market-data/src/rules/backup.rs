//! Backup of user-owned collections
//!
//! `raw_div` and `positions` are entered by hand and can't be downloaded
//! again, so every saved edit triggers a dump of the whole collection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use persistence::CollectionBackup;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};
use types::errors::DataError;
use types::event::Event;
use types::ids::{Group, TableId};

use super::RuleContext;
use crate::rule::{emit, Rule};

pub const NAME: &str = "BackupRule";

const USER_GROUPS: [Group; 2] = [Group::RawDiv, Group::Positions];

pub struct BackupRule {
    backup: Arc<dyn CollectionBackup>,
    timeout: Duration,
}

impl BackupRule {
    pub fn new(ctx: &RuleContext) -> Self {
        Self::with_backup(ctx.backup.clone(), ctx.backup_timeout)
    }

    pub fn with_backup(backup: Arc<dyn CollectionBackup>, timeout: Duration) -> Self {
        Self { backup, timeout }
    }

    fn collection(event: &Event) -> Option<Group> {
        match event {
            Event::UpdateCompleted { id } if USER_GROUPS.contains(&id.group()) => Some(id.group()),
            _ => None,
        }
    }
}

async fn run_backup(
    backup: Arc<dyn CollectionBackup>,
    limit: Duration,
    group: Group,
    out: mpsc::Sender<Event>,
) {
    let result = match timeout(limit, backup.backup(group.as_str())).await {
        Ok(Ok(())) => {
            info!(rule = NAME, collection = %group, "backup done");
            return;
        }
        Ok(Err(err)) => DataError::Backup(format!("{group} -> {err}")),
        Err(_) => DataError::Timeout(limit),
    };

    warn!(rule = NAME, collection = %group, error = %result, "backup failed");
    emit(NAME, &out, Event::failed(TableId::singleton(Group::Backup), result)).await;
}

#[async_trait]
impl Rule for BackupRule {
    fn name(&self) -> &str {
        NAME
    }

    async fn activate(&self, mut inbox: mpsc::Receiver<Event>, out: mpsc::Sender<Event>) {
        info!(rule = NAME, "started");

        let tracker = TaskTracker::new();
        while let Some(event) = inbox.recv().await {
            if let Some(group) = Self::collection(&event) {
                tracker.spawn(run_backup(self.backup.clone(), self.timeout, group, out.clone()));
            }
        }

        tracker.close();
        tracker.wait().await;

        info!(rule = NAME, "stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::DumpError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl CollectionBackup for Recorder {
        async fn backup(&self, collection: &str) -> Result<(), DumpError> {
            self.calls.lock().unwrap().push(collection.to_string());
            if self.fail {
                return Err(DumpError::NoDumps(collection.to_string()));
            }
            Ok(())
        }
    }

    async fn run(rule: BackupRule, events: Vec<Event>) -> Vec<Event> {
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, mut out_rx) = mpsc::channel(8);

        let handle = tokio::spawn(async move { rule.activate(in_rx, out_tx).await });
        for event in events {
            in_tx.send(event).await.unwrap();
        }
        drop(in_tx);
        handle.await.unwrap();

        let mut emitted = Vec::new();
        while let Some(event) = out_rx.recv().await {
            emitted.push(event);
        }
        emitted
    }

    #[tokio::test]
    async fn test_backs_up_user_collections_only() {
        let recorder = Arc::new(Recorder::default());
        let rule = BackupRule::with_backup(recorder.clone(), Duration::from_secs(1));

        let emitted = run(
            rule,
            vec![
                Event::completed(TableId::new(Group::RawDiv, "SBER")),
                Event::completed(TableId::singleton(Group::Usd)),
                Event::failed(TableId::singleton(Group::Positions), DataError::Gateway("x".to_string())),
                Event::completed(TableId::singleton(Group::Positions)),
            ],
        )
        .await;

        assert!(emitted.is_empty());
        let mut calls = recorder.calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, vec!["positions".to_string(), "raw_div".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_is_reported_on_backup_id() {
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let rule = BackupRule::with_backup(recorder, Duration::from_secs(1));

        let emitted = run(rule, vec![Event::completed(TableId::singleton(Group::Positions))]).await;

        assert_eq!(emitted.len(), 1);
        assert!(emitted[0].is_error());
        assert_eq!(emitted[0].id(), &TableId::singleton(Group::Backup));
    }
}
