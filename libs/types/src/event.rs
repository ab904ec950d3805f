//! Domain events carried by the bus
//!
//! Events are a closed set: a table was updated, or updating it failed.
//! Both variants carry the id of the table they concern.

use std::fmt;
use std::sync::Arc;

use crate::errors::DataError;
use crate::ids::TableId;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A new version of the table was committed.
    UpdateCompleted { id: TableId },
    /// Updating the table failed; nothing was written.
    ErrorOccurred { id: TableId, error: Arc<DataError> },
}

impl Event {
    pub fn completed(id: TableId) -> Self {
        Event::UpdateCompleted { id }
    }

    pub fn failed(id: TableId, error: DataError) -> Self {
        Event::ErrorOccurred {
            id,
            error: Arc::new(error),
        }
    }

    /// Table the event is about.
    pub fn id(&self) -> &TableId {
        match self {
            Event::UpdateCompleted { id } | Event::ErrorOccurred { id, .. } => id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Event::ErrorOccurred { .. })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::UpdateCompleted { id } => write!(f, "UpdateCompleted({id})"),
            Event::ErrorOccurred { id, error } => write!(f, "ErrorOccurred({id}, {error})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Group;

    #[test]
    fn test_event_display() {
        let ok = Event::completed(TableId::singleton(Group::Dates));
        assert_eq!(ok.to_string(), "UpdateCompleted(dates/dates)");

        let err = Event::failed(
            TableId::new(Group::RawDiv, "SBER"),
            DataError::Validation("SBER missed dividend at 2024-05-10".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "ErrorOccurred(raw_div/SBER, validation failure: SBER missed dividend at 2024-05-10)"
        );
        assert!(err.is_error());
        assert_eq!(err.id().name().as_str(), "SBER");
    }
}
