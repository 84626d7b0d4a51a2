//! Keeps one ticket view converged with the ticket store by wholesale
//! snapshot replacement and interval polling while the ticket is open.

pub mod tracker;
pub mod view;

pub use tracker::{SyncError, TicketTracker, DEFAULT_POLL_INTERVAL};
pub use view::TicketViewSnapshot;
