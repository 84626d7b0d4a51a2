use helpdesk_domain::{Sender, Ticket, TicketError, TicketId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("ticket {0} was not found")]
    NotFound(TicketId),
    #[error("ticket {0} is closed; replies are disabled")]
    TicketClosed(TicketId),
    #[error("ticket {0} is already closed")]
    AlreadyClosed(TicketId),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl StoreError {
    /// Transport failures and 5xx responses; the same call may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DependencyUnavailable(_))
    }

    pub fn is_state_conflict(&self) -> bool {
        matches!(self, Self::TicketClosed(_) | Self::AlreadyClosed(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<TicketError> for StoreError {
    fn from(value: TicketError) -> Self {
        match value {
            TicketError::TicketClosed(ticket_id) => Self::TicketClosed(ticket_id),
            TicketError::AlreadyClosed(ticket_id) => Self::AlreadyClosed(ticket_id),
            TicketError::EmptyMessage => Self::Validation(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTicketRequest {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTicketRequest {
    pub ticket_id: TicketId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRequest {
    pub ticket_id: TicketId,
    pub sender: Sender,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseTicketRequest {
    pub ticket_id: TicketId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreProviderKind {
    Http,
    Memory,
}

impl StoreProviderKind {
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::Http => "store.http",
            Self::Memory => "store.memory",
        }
    }

    pub fn from_key(provider_key: &str) -> Option<Self> {
        match provider_key {
            "store.http" => Some(Self::Http),
            "store.memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Request/response access to the ticket service. Every call is one round
/// trip; implementations never retry or queue on their own.
#[async_trait::async_trait]
pub trait TicketStore: Send + Sync {
    fn kind(&self) -> StoreProviderKind;
    async fn list_tickets(&self) -> Result<Vec<Ticket>, StoreError>;
    async fn get_ticket(&self, request: GetTicketRequest) -> Result<Ticket, StoreError>;
    async fn create_ticket(&self, request: CreateTicketRequest) -> Result<Ticket, StoreError>;
    async fn reply(&self, request: ReplyRequest) -> Result<Ticket, StoreError>;
    async fn close_ticket(&self, request: CloseTicketRequest) -> Result<Ticket, StoreError>;

    fn provider_key(&self) -> &'static str {
        self.kind().as_key()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreProviderError {
    #[error("unknown ticket store provider key: {0}")]
    UnknownProviderKey(String),
    #[error("failed to initialize ticket store provider: {0}")]
    ProviderInitialization(String),
}
