use helpdesk_domain::{Ticket, TicketId, TicketLabel};
use time::OffsetDateTime;

/// What a subscriber renders. Always a whole server snapshot plus inert
/// sync metadata; never a partially merged ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketViewSnapshot {
    pub ticket_id: Option<TicketId>,
    pub ticket: Option<Ticket>,
    pub last_synced_at: Option<OffsetDateTime>,
    pub last_sync_error: Option<String>,
    pub polling: bool,
}

impl TicketViewSnapshot {
    pub fn is_empty(&self) -> bool {
        self.ticket_id.is_none()
    }

    pub fn is_loading(&self) -> bool {
        self.ticket_id.is_some() && self.ticket.is_none() && self.last_sync_error.is_none()
    }

    pub fn can_reply(&self) -> bool {
        self.ticket.as_ref().is_some_and(Ticket::can_reply)
    }

    pub fn is_closed(&self) -> bool {
        self.ticket
            .as_ref()
            .is_some_and(|ticket| !ticket.is_open())
    }

    pub fn needs_reply(&self) -> bool {
        self.ticket.as_ref().is_some_and(Ticket::needs_reply)
    }

    pub fn label(&self) -> Option<TicketLabel> {
        self.ticket.as_ref().map(Ticket::label)
    }

    /// Equality that ignores `last_synced_at`; a poll returning the same
    /// data is not a visible change.
    pub(crate) fn same_content(&self, other: &Self) -> bool {
        self.ticket_id == other.ticket_id
            && self.ticket == other.ticket
            && self.last_sync_error == other.last_sync_error
            && self.polling == other.polling
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_domain::Sender;
    use time::macros::datetime;

    fn open_ticket() -> Ticket {
        Ticket::open(
            TicketId::new("TKT-1"),
            "a@b.com",
            None,
            "help",
            datetime!(2026-03-01 10:00 UTC),
        )
        .expect("open ticket")
    }

    #[test]
    fn empty_view_has_no_affordances() {
        let view = TicketViewSnapshot::default();
        assert!(view.is_empty());
        assert!(!view.is_loading());
        assert!(!view.can_reply());
        assert_eq!(view.label(), None);
    }

    #[test]
    fn closed_ticket_disables_reply() {
        let mut ticket = open_ticket();
        ticket
            .reply(Sender::Admin, "fixed", datetime!(2026-03-01 10:01 UTC))
            .expect("reply");
        ticket
            .close(datetime!(2026-03-01 10:02 UTC))
            .expect("close");
        let view = TicketViewSnapshot {
            ticket_id: Some(ticket.ticket_id.clone()),
            ticket: Some(ticket),
            ..TicketViewSnapshot::default()
        };
        assert!(view.is_closed());
        assert!(!view.can_reply());
        assert!(!view.needs_reply());
        assert_eq!(view.label(), Some(TicketLabel::Closed));
    }

    #[test]
    fn sync_time_alone_is_not_a_content_change() {
        let ticket = open_ticket();
        let first = TicketViewSnapshot {
            ticket_id: Some(ticket.ticket_id.clone()),
            ticket: Some(ticket),
            last_synced_at: Some(datetime!(2026-03-01 10:00 UTC)),
            last_sync_error: None,
            polling: true,
        };
        let second = TicketViewSnapshot {
            last_synced_at: Some(datetime!(2026-03-01 10:00:15 UTC)),
            ..first.clone()
        };
        assert!(first.same_content(&second));
        assert!(!first.same_content(&TicketViewSnapshot {
            polling: false,
            ..second
        }));
    }
}
