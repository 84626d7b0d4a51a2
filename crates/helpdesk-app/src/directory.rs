use std::sync::RwLock;

use helpdesk_domain::{Ticket, TicketId, TicketStats};

/// The admin's in-memory ticket collection. Loaded once; afterwards every
/// change is an in-place replacement keyed by `ticket_id`.
#[derive(Debug, Default)]
pub struct TicketDirectory {
    tickets: RwLock<Vec<Ticket>>,
}

impl TicketDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_all(&self, tickets: Vec<Ticket>) {
        *self.tickets.write().expect("ticket directory write lock") = tickets;
    }

    /// Replaces the entry with the same id, or inserts a ticket the directory
    /// has not seen at the front. Returns `true` when an entry was replaced.
    pub fn upsert(&self, ticket: Ticket) -> bool {
        let mut tickets = self.tickets.write().expect("ticket directory write lock");
        match tickets
            .iter_mut()
            .find(|existing| existing.ticket_id == ticket.ticket_id)
        {
            Some(existing) => {
                *existing = ticket;
                true
            }
            None => {
                tickets.insert(0, ticket);
                false
            }
        }
    }

    pub fn get(&self, ticket_id: &TicketId) -> Option<Ticket> {
        self.tickets
            .read()
            .expect("ticket directory read lock")
            .iter()
            .find(|ticket| &ticket.ticket_id == ticket_id)
            .cloned()
    }

    pub fn tickets(&self) -> Vec<Ticket> {
        self.tickets
            .read()
            .expect("ticket directory read lock")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.tickets.read().expect("ticket directory read lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Case-insensitive substring match on id, subject and email. A blank
    /// query matches everything.
    pub fn search(&self, query: &str) -> Vec<Ticket> {
        let needle = query.trim().to_lowercase();
        self.tickets
            .read()
            .expect("ticket directory read lock")
            .iter()
            .filter(|ticket| matches_query(ticket, &needle))
            .cloned()
            .collect()
    }

    pub fn search_needing_reply(&self, query: &str) -> Vec<Ticket> {
        let needle = query.trim().to_lowercase();
        self.tickets
            .read()
            .expect("ticket directory read lock")
            .iter()
            .filter(|ticket| ticket.needs_reply() && matches_query(ticket, &needle))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> TicketStats {
        TicketStats::from_tickets(self.tickets.read().expect("ticket directory read lock").iter())
    }
}

fn matches_query(ticket: &Ticket, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    ticket.ticket_id.as_str().to_lowercase().contains(needle)
        || ticket.email.to_lowercase().contains(needle)
        || ticket
            .subject
            .as_deref()
            .is_some_and(|subject| subject.to_lowercase().contains(needle))
}
