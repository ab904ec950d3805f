//! Clients of external services
//!
//! - `http`: shared request helpers with status checks
//! - `iss`: MOEX ISS table blocks (dates, history, candles, securities)
//! - `telegram`: error notifications

pub mod http;
pub mod iss;
pub mod telegram;

pub use iss::IssClient;
pub use telegram::{Notifier, Telegram};
