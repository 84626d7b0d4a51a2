use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::TicketError;
use crate::identifiers::TicketId;
use crate::status::{Sender, TicketStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub sender: Sender,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub ticket_id: TicketId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub status: TicketStatus,
    #[serde(default)]
    pub last_reply_by: Sender,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<OffsetDateTime>,
}

impl Ticket {
    /// Opens a ticket with the customer's first message. Server-side only:
    /// `at` must come from the authority that owns the ticket.
    pub fn open(
        ticket_id: TicketId,
        email: impl Into<String>,
        subject: Option<String>,
        body: &str,
        at: OffsetDateTime,
    ) -> Result<Self, TicketError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(TicketError::EmptyMessage);
        }

        Ok(Self {
            ticket_id,
            email: email.into(),
            subject: subject
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
            status: TicketStatus::Open,
            last_reply_by: Sender::User,
            messages: vec![Message {
                sender: Sender::User,
                message: body.to_owned(),
                created_at: at,
            }],
            created_at: Some(at),
            updated_at: Some(at),
        })
    }

    pub fn is_open(&self) -> bool {
        self.status == TicketStatus::Open
    }

    pub fn can_reply(&self) -> bool {
        self.is_open()
    }

    pub fn can_close(&self) -> bool {
        self.is_open()
    }

    /// Appends a message. The timestamp is clamped so `messages` stays
    /// non-decreasing by `created_at` even if the clock steps backwards.
    pub fn reply(
        &mut self,
        sender: Sender,
        body: &str,
        at: OffsetDateTime,
    ) -> Result<&Message, TicketError> {
        if !self.can_reply() {
            return Err(TicketError::TicketClosed(self.ticket_id.clone()));
        }
        let body = body.trim();
        if body.is_empty() {
            return Err(TicketError::EmptyMessage);
        }

        let created_at = self
            .messages
            .last()
            .map(|last| at.max(last.created_at))
            .unwrap_or(at);
        self.messages.push(Message {
            sender,
            message: body.to_owned(),
            created_at,
        });
        self.last_reply_by = sender;
        self.updated_at = Some(created_at);

        Ok(self
            .messages
            .last()
            .expect("message was appended above"))
    }

    pub fn close(&mut self, at: OffsetDateTime) -> Result<(), TicketError> {
        if !self.can_close() {
            return Err(TicketError::AlreadyClosed(self.ticket_id.clone()));
        }
        self.status = TicketStatus::Closed;
        self.updated_at = Some(at);
        Ok(())
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn is_chronological(&self) -> bool {
        self.messages
            .windows(2)
            .all(|pair| pair[0].created_at <= pair[1].created_at)
    }

    /// `false` when a snapshot carries a `lastReplyBy` that disagrees with its
    /// newest message. Summaries without messages are always consistent.
    pub fn last_reply_matches_messages(&self) -> bool {
        self.last_message()
            .map(|message| message.sender == self.last_reply_by)
            .unwrap_or(true)
    }

    pub fn subject_or_placeholder(&self) -> &str {
        self.subject
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or("(no subject)")
    }
}
