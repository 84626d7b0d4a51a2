//! View-only values computed from canonical ticket fields. Nothing here is
//! stored; every caller recomputes from the current data.

use serde::Serialize;

use crate::status::{Sender, TicketStatus};
use crate::ticket::Ticket;

/// The admin has not answered the customer's latest message.
pub fn needs_reply(ticket: &Ticket) -> bool {
    ticket.status == TicketStatus::Open && ticket.last_reply_by == Sender::User
}

impl Ticket {
    pub fn needs_reply(&self) -> bool {
        needs_reply(self)
    }

    pub fn label(&self) -> TicketLabel {
        TicketLabel::for_ticket(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TicketLabel {
    AwaitingAdmin,
    AwaitingUser,
    Closed,
}

impl TicketLabel {
    pub fn for_ticket(ticket: &Ticket) -> Self {
        match (ticket.status, ticket.last_reply_by) {
            (TicketStatus::Closed, _) => Self::Closed,
            (TicketStatus::Open, Sender::User) => Self::AwaitingAdmin,
            (TicketStatus::Open, Sender::Admin) => Self::AwaitingUser,
        }
    }

    /// Short badge text. Both open variants render as `pending`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingAdmin | Self::AwaitingUser => "pending",
            Self::Closed => "closed",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::AwaitingAdmin => "waiting for a support reply",
            Self::AwaitingUser => "support has replied",
            Self::Closed => "ticket closed",
        }
    }

    pub const fn is_pending(self) -> bool {
        matches!(self, Self::AwaitingAdmin | Self::AwaitingUser)
    }

    /// Which side is expected to act next, if anyone.
    pub const fn requires_action_from(self) -> Option<Sender> {
        match self {
            Self::AwaitingAdmin => Some(Sender::Admin),
            Self::AwaitingUser | Self::Closed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TicketStats {
    pub total: usize,
    pub open: usize,
    pub pending: usize,
    pub closed: usize,
}

impl TicketStats {
    pub fn from_tickets<'a>(tickets: impl IntoIterator<Item = &'a Ticket>) -> Self {
        tickets
            .into_iter()
            .fold(Self::default(), |mut stats, ticket| {
                stats.total += 1;
                match ticket.status {
                    TicketStatus::Open => stats.open += 1,
                    TicketStatus::Closed => stats.closed += 1,
                }
                if needs_reply(ticket) {
                    stats.pending += 1;
                }
                stats
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::TicketId;
    use time::macros::datetime;

    fn ticket(id: &str) -> Ticket {
        Ticket::open(
            TicketId::new(id),
            "a@b.com",
            None,
            "help",
            datetime!(2026-03-01 10:00 UTC),
        )
        .expect("open ticket")
    }

    #[test]
    fn needs_reply_flips_after_admin_reply_and_clears_on_close() {
        let mut ticket = ticket("TKT-1");
        assert!(ticket.needs_reply());
        assert_eq!(ticket.label(), TicketLabel::AwaitingAdmin);

        ticket
            .reply(Sender::Admin, "on it", datetime!(2026-03-01 10:01 UTC))
            .expect("admin reply");
        assert!(!ticket.needs_reply());
        assert_eq!(ticket.label(), TicketLabel::AwaitingUser);
        assert_eq!(ticket.label().as_str(), "pending");

        ticket
            .reply(Sender::User, "still broken", datetime!(2026-03-01 10:02 UTC))
            .expect("user reply");
        ticket
            .close(datetime!(2026-03-01 10:03 UTC))
            .expect("close");
        assert!(!ticket.needs_reply());
        assert_eq!(ticket.label(), TicketLabel::Closed);
        assert_eq!(ticket.label().requires_action_from(), None);
    }

    #[test]
    fn stats_are_counted_from_the_collection() {
        let waiting = ticket("TKT-1");
        let mut answered = ticket("TKT-2");
        answered
            .reply(Sender::Admin, "done", datetime!(2026-03-01 10:01 UTC))
            .expect("reply");
        let mut closed = ticket("TKT-3");
        closed
            .close(datetime!(2026-03-01 10:02 UTC))
            .expect("close");

        let stats = TicketStats::from_tickets([&waiting, &answered, &closed]);
        assert_eq!(
            stats,
            TicketStats {
                total: 3,
                open: 2,
                pending: 1,
                closed: 1,
            }
        );
        assert_eq!(
            TicketStats::from_tickets(std::iter::empty::<&Ticket>()),
            TicketStats::default()
        );
    }
}
