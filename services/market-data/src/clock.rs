//! Injected clock and trading calendar
//!
//! Results of a trading day are published shortly after midnight Moscow time.
//! Before the cutoff the last complete day is the day before yesterday,
//! after it the last complete day is yesterday.

use std::sync::Mutex;

use chrono::{DateTime, Days, FixedOffset, NaiveTime, Offset, TimeDelta, TimeZone, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, delta: TimeDelta) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += delta;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Moscow offset from UTC, seconds.
const MSK_OFFSET: i32 = 3 * 3600;
/// Minutes after local midnight when day results become available.
const CUTOFF_MINUTES: i64 = 45;

/// Maps wall-clock time to the last trading date with published results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingCalendar {
    zone: FixedOffset,
    cutoff: NaiveTime,
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self {
            zone: FixedOffset::east_opt(MSK_OFFSET).unwrap_or_else(|| Utc.fix()),
            cutoff: NaiveTime::MIN + TimeDelta::minutes(CUTOFF_MINUTES),
        }
    }
}

impl TradingCalendar {
    pub fn new(zone: FixedOffset, cutoff: NaiveTime) -> Self {
        Self { zone, cutoff }
    }

    /// Last date with published results, as UTC midnight.
    pub fn last_trading_date(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.zone);
        let lag = if local.time() >= self.cutoff {
            Days::new(1)
        } else {
            Days::new(2)
        };
        let date = local.date_naive() - lag;

        Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
    }
}
