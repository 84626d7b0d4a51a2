use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use helpdesk_domain::{Sender, Ticket, TicketId};
use time::OffsetDateTime;
use tracing::debug;

use crate::interface::{
    CloseTicketRequest, CreateTicketRequest, GetTicketRequest, ReplyRequest, StoreError,
    StoreProviderKind, TicketStore,
};

const TICKET_ID_PREFIX: &str = "TKT";

/// Process-local store with the same authority rules as the ticket service:
/// it issues ids, stamps messages and enforces the open/closed lifecycle.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTicketStore {
    tickets: Arc<RwLock<BTreeMap<TicketId, Ticket>>>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tickets
            .read()
            .expect("memory ticket store read lock")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn issue_ticket_id(tickets: &BTreeMap<TicketId, Ticket>) -> TicketId {
        loop {
            let raw = uuid::Uuid::new_v4().simple().to_string();
            let candidate = TicketId::new(format!(
                "{TICKET_ID_PREFIX}-{}",
                raw[..8].to_ascii_uppercase()
            ));
            if !tickets.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    fn with_ticket_mut<T>(
        &self,
        ticket_id: &TicketId,
        apply: impl FnOnce(&mut Ticket) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut tickets = self
            .tickets
            .write()
            .expect("memory ticket store write lock");
        let ticket = tickets
            .get_mut(ticket_id)
            .ok_or_else(|| StoreError::NotFound(ticket_id.clone()))?;
        apply(ticket)
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    fn kind(&self) -> StoreProviderKind {
        StoreProviderKind::Memory
    }

    async fn list_tickets(&self) -> Result<Vec<Ticket>, StoreError> {
        let tickets = self.tickets.read().expect("memory ticket store read lock");
        let mut ordered = tickets.values().cloned().collect::<Vec<_>>();
        ordered.sort_by(|left, right| {
            right
                .updated_at
                .cmp(&left.updated_at)
                .then_with(|| left.ticket_id.cmp(&right.ticket_id))
        });
        Ok(ordered)
    }

    async fn get_ticket(&self, request: GetTicketRequest) -> Result<Ticket, StoreError> {
        self.tickets
            .read()
            .expect("memory ticket store read lock")
            .get(&request.ticket_id)
            .cloned()
            .ok_or(StoreError::NotFound(request.ticket_id))
    }

    async fn create_ticket(&self, request: CreateTicketRequest) -> Result<Ticket, StoreError> {
        let email = request.email.trim();
        if email.is_empty() {
            return Err(StoreError::Validation("email is required".to_owned()));
        }

        let mut tickets = self
            .tickets
            .write()
            .expect("memory ticket store write lock");
        let ticket_id = Self::issue_ticket_id(&tickets);
        let ticket = Ticket::open(
            ticket_id.clone(),
            email,
            request.subject,
            &request.message,
            OffsetDateTime::now_utc(),
        )?;
        tickets.insert(ticket_id.clone(), ticket.clone());
        debug!(ticket_id = %ticket_id, "memory store created ticket");
        Ok(ticket)
    }

    async fn reply(&self, request: ReplyRequest) -> Result<Ticket, StoreError> {
        self.with_ticket_mut(&request.ticket_id, |ticket| {
            ticket.reply(request.sender, &request.message, OffsetDateTime::now_utc())?;
            Ok(ticket.clone())
        })
    }

    async fn close_ticket(&self, request: CloseTicketRequest) -> Result<Ticket, StoreError> {
        self.with_ticket_mut(&request.ticket_id, |ticket| {
            ticket.close(OffsetDateTime::now_utc())?;
            Ok(ticket.clone())
        })
    }
}

impl InMemoryTicketStore {
    /// Seeds a conversation for demos: one open ticket per `(email, subject, body)`.
    pub async fn seed(
        &self,
        entries: &[(&str, Option<&str>, &str)],
    ) -> Result<Vec<TicketId>, StoreError> {
        let mut created = Vec::with_capacity(entries.len());
        for (email, subject, body) in entries {
            let ticket = self
                .create_ticket(CreateTicketRequest {
                    email: (*email).to_owned(),
                    subject: subject.map(str::to_owned),
                    message: (*body).to_owned(),
                })
                .await?;
            created.push(ticket.ticket_id);
        }
        Ok(created)
    }

    pub async fn reply_as(
        &self,
        ticket_id: &TicketId,
        sender: Sender,
        message: &str,
    ) -> Result<Ticket, StoreError> {
        self.reply(ReplyRequest {
            ticket_id: ticket_id.clone(),
            sender,
            message: message.to_owned(),
        })
        .await
    }
}
