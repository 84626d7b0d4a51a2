use thiserror::Error;

use crate::identifiers::TicketId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TicketError {
    #[error("ticket {0} is closed; no further messages can be added")]
    TicketClosed(TicketId),
    #[error("ticket {0} is already closed")]
    AlreadyClosed(TicketId),
    #[error("message body cannot be empty")]
    EmptyMessage,
}

impl TicketError {
    /// Closed-ticket conflicts are informational at the UI layer.
    pub fn is_state_conflict(&self) -> bool {
        matches!(self, Self::TicketClosed(_) | Self::AlreadyClosed(_))
    }
}
