//! Market Data Service
//!
//! Keeps the market data tables up to date. Rules react to events on an
//! in-process bus, download candidate rows from external feeds, validate and
//! commit them, then announce the commit so dependent rules run next.
//!
//! Features:
//! - Event bus with bounded fan-out and drain on shutdown
//! - Generic update rule: selector, gateway, validator, append or replace
//! - Feed clients: MOEX ISS, MOEX CSV, NASDAQ, registry closings, Rosstat
//! - Injected clock and trading calendar
//! - Error sink with optional Telegram notifications
//!
//! # Architecture
//!
//! ```text
//!   DayTimer ──▶ ┌──────────┐ ──▶ dates ──▶ usd ──▶ securities ──▶ quotes ...
//!   editors  ──▶ │ EventBus │ ──▶ ...
//!                └──────────┘ ──▶ ErrorSink ──▶ FatalSwitch
//! ```

pub mod bus;
pub mod clients;
pub mod clock;
pub mod fatal;
pub mod ports;
pub mod rule;
pub mod rules;
pub mod sources;
pub mod validators;

pub use bus::{BusError, EventBus, Publisher};
pub use clock::{Clock, FixedClock, SystemClock, TradingCalendar};
pub use fatal::FatalSwitch;
pub use rule::{Rule, UpdateRule, WriteMode};
pub use rules::RuleContext;
pub use sources::Sources;

pub const SERVICE_VERSION: &str = "0.1.0";
