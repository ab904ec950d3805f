//! Types library for the market data tables
//!
//! Shared by the persistence layer, the update rules and the HTTP frontend.
//!
//! # Modules
//! - `ids`: Table identity (`Group`, `Name`, `TableId`)
//! - `table`: Versioned table of rows
//! - `dates`, `candle`, `security`, `cpi`, `dividend`, `position`: Row variants
//! - `event`: Bus events
//! - `errors`: Error taxonomy
//! - `ext_json`: Extended-JSON timestamp codec

pub mod ids;
pub mod table;
pub mod dates;
pub mod candle;
pub mod security;
pub mod cpi;
pub mod dividend;
pub mod position;
pub mod event;
pub mod errors;
pub mod ext_json;

pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::candle::*;
    pub use crate::cpi::*;
    pub use crate::dates::*;
    pub use crate::dividend::*;
    pub use crate::errors::*;
    pub use crate::event::*;
    pub use crate::ids::*;
    pub use crate::position::*;
    pub use crate::security::*;
    pub use crate::table::*;
}
