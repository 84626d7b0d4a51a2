//! Canonical support-ticket model shared by the store client, the
//! reconciliation engine and the admin/customer front ends.

pub mod derived;
pub mod error;
pub mod identifiers;
pub mod status;
pub mod ticket;

pub use derived::{needs_reply, TicketLabel, TicketStats};
pub use error::TicketError;
pub use identifiers::TicketId;
pub use status::{Sender, TicketStatus};
pub use ticket::{Message, Ticket};
