//! Table identity
//!
//! Every table is addressed by a `(group, name)` pair. The group is the
//! collection the table lives in, the name is the document inside it.
//! Singleton tables use the group name as their own name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::DataError;

/// Top-level namespace of a table (one collection per group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    /// Synthetic event emitted when a trading day has ended
    DayEnded,
    Dates,
    Usd,
    Securities,
    Quotes,
    Indexes,
    Cpi,
    DivStatus,
    RawDiv,
    Dividends,
    NasdaqDiv,
    ReestryDiv,
    Positions,
    /// Pseudo-group for errors of the backup rule
    Backup,
}

impl Group {
    /// Every known group, in declaration order.
    pub const ALL: [Group; 14] = [
        Group::DayEnded,
        Group::Dates,
        Group::Usd,
        Group::Securities,
        Group::Quotes,
        Group::Indexes,
        Group::Cpi,
        Group::DivStatus,
        Group::RawDiv,
        Group::Dividends,
        Group::NasdaqDiv,
        Group::ReestryDiv,
        Group::Positions,
        Group::Backup,
    ];

    /// Collection name used by the document store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Group::DayEnded => "day_ended",
            Group::Dates => "dates",
            Group::Usd => "usd",
            Group::Securities => "securities",
            Group::Quotes => "quotes",
            Group::Indexes => "indexes",
            Group::Cpi => "cpi",
            Group::DivStatus => "div_status",
            Group::RawDiv => "raw_div",
            Group::Dividends => "dividends",
            Group::NasdaqDiv => "nasdaq_div",
            Group::ReestryDiv => "reestry_div",
            Group::Positions => "positions",
            Group::Backup => "backup",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Group {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Group::ALL
            .iter()
            .copied()
            .find(|group| group.as_str() == s)
            .ok_or_else(|| DataError::UnknownGroup(s.to_string()))
    }
}

/// Name of a table inside its group: a ticker, an index code or the group itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Full address of a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId {
    group: Group,
    name: Name,
}

impl TableId {
    /// Table `name` inside `group`.
    pub fn new(group: Group, name: impl Into<Name>) -> Self {
        Self {
            group,
            name: name.into(),
        }
    }

    /// Singleton table whose name equals its group.
    pub fn singleton(group: Group) -> Self {
        Self {
            group,
            name: Name::new(group.as_str()),
        }
    }

    pub fn group(&self) -> Group {
        self.group
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Whether this id addresses the singleton table of its group.
    pub fn is_singleton(&self) -> bool {
        self.name.as_str() == self.group.as_str()
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.name)
    }
}
