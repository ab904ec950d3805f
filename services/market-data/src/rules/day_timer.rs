//! Day timer
//!
//! Emits `UpdateCompleted(day_ended)` once per trading day, as soon as the
//! results of a new day are published. The first tick after start always
//! fires, so a restarted service refreshes everything.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::task::TaskTracker;
use tracing::{debug, info};
use types::event::Event;
use types::ids::{Group, TableId};

use super::RuleContext;
use crate::clock::{Clock, TradingCalendar};
use crate::rule::{emit, Rule};

pub const NAME: &str = "DayTimer";

pub struct DayTimer {
    clock: Arc<dyn Clock>,
    calendar: TradingCalendar,
    tick: Duration,
}

impl DayTimer {
    pub fn new(ctx: &RuleContext) -> Self {
        Self::with_clock(ctx.clock.clone(), ctx.calendar, ctx.tick)
    }

    pub fn with_clock(clock: Arc<dyn Clock>, calendar: TradingCalendar, tick: Duration) -> Self {
        Self {
            clock,
            calendar,
            tick,
        }
    }

    /// New trading day if the published date moved past `last`.
    fn day_ended(&self, last: &mut DateTime<Utc>) -> bool {
        let cutoff = self.calendar.last_trading_date(self.clock.now());
        if cutoff > *last {
            *last = cutoff;
            return true;
        }
        false
    }
}

#[async_trait]
impl Rule for DayTimer {
    fn name(&self) -> &str {
        NAME
    }

    async fn activate(&self, mut inbox: mpsc::Receiver<Event>, out: mpsc::Sender<Event>) {
        info!(rule = NAME, "started");

        let tracker = TaskTracker::new();
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last = DateTime::UNIX_EPOCH;

        loop {
            tokio::select! {
                event = inbox.recv() => {
                    if event.is_none() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if self.day_ended(&mut last) {
                        debug!(rule = NAME, day = %last.date_naive(), "day ended");
                        let out = out.clone();
                        let event = Event::completed(TableId::singleton(Group::DayEnded));
                        tracker.spawn(async move { emit(NAME, &out, event).await });
                    }
                }
            }
        }

        tracker.close();
        tracker.wait().await;

        info!(rule = NAME, "stopped");
    }
}
