use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use helpdesk_domain::{Sender, Ticket, TicketId};
use helpdesk_sync::TicketTracker;
use helpdesk_ticketing::{
    CollaboratorError, DraftAssistant, DraftRequest, ReplyRequest, StoreError, TicketStore,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::directory::TicketDirectory;
use crate::draft::DraftBuffer;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComposeError {
    #[error("reply message cannot be empty")]
    EmptyMessage,
    #[error("no ticket is loaded")]
    NoTicketSelected,
    #[error("ticket {0} is closed; replies are disabled")]
    TicketClosed(TicketId),
    #[error("a reply is already being sent")]
    ReplyInFlight,
    #[error("no drafting assistant is configured")]
    AssistantUnavailable,
    #[error(transparent)]
    Store(StoreError),
    #[error("drafting assistant failed: {0}")]
    Assistant(#[from] CollaboratorError),
}

impl ComposeError {
    /// Rejections decided before any request leaves the process.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::EmptyMessage
                | Self::NoTicketSelected
                | Self::TicketClosed(_)
                | Self::ReplyInFlight
                | Self::AssistantUnavailable
        )
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(error) => error.is_retryable(),
            Self::Assistant(_) => true,
            _ => false,
        }
    }
}

impl From<StoreError> for ComposeError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::TicketClosed(ticket_id) => Self::TicketClosed(ticket_id),
            other => Self::Store(other),
        }
    }
}

struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Reply box bound to the ticket a `TicketTracker` is showing. Sends one
/// reply at a time and only adopts the ticket the store returns.
pub struct ReplyComposer {
    store: Arc<dyn TicketStore>,
    tracker: Arc<TicketTracker>,
    sender: Sender,
    directory: Option<Arc<TicketDirectory>>,
    assistant: Option<Arc<dyn DraftAssistant>>,
    draft: DraftBuffer,
    in_flight: AtomicBool,
}

impl ReplyComposer {
    pub fn new(store: Arc<dyn TicketStore>, tracker: Arc<TicketTracker>, sender: Sender) -> Self {
        Self {
            store,
            tracker,
            sender,
            directory: None,
            assistant: None,
            draft: DraftBuffer::new(),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Successful replies also replace the directory's copy of the ticket.
    pub fn with_directory(mut self, directory: Arc<TicketDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_assistant(mut self, assistant: Arc<dyn DraftAssistant>) -> Self {
        self.assistant = Some(assistant);
        self
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn draft(&self) -> &DraftBuffer {
        &self.draft
    }

    pub fn tracker(&self) -> &Arc<TicketTracker> {
        &self.tracker
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn can_submit(&self) -> bool {
        !self.is_loading() && !self.draft.is_blank() && self.tracker.snapshot().can_reply()
    }

    pub async fn submit_text(&self, text: impl Into<String>) -> Result<Ticket, ComposeError> {
        self.draft.set_text(text);
        self.submit().await
    }

    /// Sends the current draft. The draft is cleared only once the store has
    /// accepted the reply, and only if it was not edited in the meantime; on
    /// any failure it is left as typed.
    pub async fn submit(&self) -> Result<Ticket, ComposeError> {
        let text = self.draft.text();
        let message = text.trim();
        if message.is_empty() {
            return Err(ComposeError::EmptyMessage);
        }

        let ticket = self
            .tracker
            .snapshot()
            .ticket
            .ok_or(ComposeError::NoTicketSelected)?;
        if !ticket.can_reply() {
            return Err(ComposeError::TicketClosed(ticket.ticket_id));
        }

        let _guard = InFlightGuard::acquire(&self.in_flight).ok_or(ComposeError::ReplyInFlight)?;
        let ticket_id = ticket.ticket_id;
        let result = self
            .store
            .reply(ReplyRequest {
                ticket_id: ticket_id.clone(),
                sender: self.sender,
                message: message.to_owned(),
            })
            .await;

        match result {
            Ok(updated) => {
                self.draft.clear_if_unchanged(&text);
                self.tracker.apply_ticket(updated.clone());
                if let Some(directory) = &self.directory {
                    directory.upsert(updated.clone());
                }
                info!(
                    ticket_id = %ticket_id,
                    sender = self.sender.as_str(),
                    messages = updated.messages.len(),
                    "reply sent"
                );
                Ok(updated)
            }
            Err(error) => {
                warn!(ticket_id = %ticket_id, error = %error, "reply failed");
                if error.is_state_conflict() {
                    if let Err(refresh_error) = self.tracker.refresh().await {
                        debug!(
                            ticket_id = %ticket_id,
                            error = %refresh_error,
                            "refresh after reply conflict failed"
                        );
                    }
                }
                Err(error.into())
            }
        }
    }

    /// Asks the drafting assistant to reword the current draft. The result is
    /// held aside; it never replaces the draft until accepted.
    pub async fn request_suggestion(&self) -> Result<String, ComposeError> {
        let assistant = self
            .assistant
            .as_ref()
            .ok_or(ComposeError::AssistantUnavailable)?;
        let text = self.draft.text();
        if text.trim().is_empty() {
            return Err(ComposeError::EmptyMessage);
        }
        let ticket = self
            .tracker
            .snapshot()
            .ticket
            .ok_or(ComposeError::NoTicketSelected)?;

        let suggestion = assistant
            .improve_message(DraftRequest {
                email: ticket.email,
                subject: ticket.subject,
                message: text,
            })
            .await?;
        self.draft.offer_suggestion(suggestion.clone());
        Ok(suggestion)
    }

    pub fn accept_suggestion(&self) -> bool {
        self.draft.accept_suggestion()
    }

    pub fn discard_suggestion(&self) -> bool {
        self.draft.discard_suggestion()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_ticketing::{CloseTicketRequest, InMemoryTicketStore};
    use std::time::Duration;

    const SLOW_POLL: Duration = Duration::from_secs(60);

    async fn tracked(server: &InMemoryTicketStore) -> (Arc<TicketTracker>, TicketId) {
        let ticket_id = server
            .seed(&[("a@b.com", Some("Login"), "cannot sign in")])
            .await
            .expect("seed ticket")
            .remove(0);
        let tracker = Arc::new(TicketTracker::new(Arc::new(server.clone()), SLOW_POLL));
        tracker.track(ticket_id.clone()).await.expect("track ticket");
        (tracker, ticket_id)
    }

    #[tokio::test]
    async fn blank_draft_is_rejected_locally() {
        let server = InMemoryTicketStore::new();
        let (tracker, ticket_id) = tracked(&server).await;
        let composer = ReplyComposer::new(Arc::new(server.clone()), tracker, Sender::User);

        let error = composer.submit_text("   \n").await.expect_err("blank draft");
        assert_eq!(error, ComposeError::EmptyMessage);
        assert!(error.is_local());

        let ticket = server
            .get_ticket(helpdesk_ticketing::GetTicketRequest { ticket_id })
            .await
            .expect("ticket");
        assert_eq!(ticket.messages.len(), 1);
    }

    #[tokio::test]
    async fn submit_without_tracked_ticket_is_rejected() {
        let server = InMemoryTicketStore::new();
        let store: Arc<dyn TicketStore> = Arc::new(server);
        let tracker = Arc::new(TicketTracker::new(store.clone(), SLOW_POLL));
        let composer = ReplyComposer::new(store, tracker, Sender::User);

        let error = composer.submit_text("hello").await.expect_err("nothing tracked");
        assert_eq!(error, ComposeError::NoTicketSelected);
        assert_eq!(composer.draft().text(), "hello");
    }

    #[tokio::test]
    async fn accepted_reply_clears_draft_and_replaces_views() {
        let server = InMemoryTicketStore::new();
        let (tracker, ticket_id) = tracked(&server).await;
        let directory = Arc::new(TicketDirectory::new());
        directory.replace_all(server.list_tickets().await.expect("list"));
        let composer = ReplyComposer::new(Arc::new(server.clone()), tracker.clone(), Sender::Admin)
            .with_directory(directory.clone());

        let updated = composer
            .submit_text("  please reset your password  ")
            .await
            .expect("reply accepted");

        assert_eq!(updated.messages.len(), 2);
        assert_eq!(updated.messages[1].message, "please reset your password");
        assert_eq!(updated.last_reply_by, Sender::Admin);
        assert!(composer.draft().is_blank());
        assert!(!composer.is_loading());
        assert_eq!(tracker.snapshot().ticket.as_ref(), Some(&updated));
        assert_eq!(directory.get(&ticket_id), Some(updated));
        assert_eq!(directory.stats().pending, 0);
    }

    #[tokio::test]
    async fn locally_closed_ticket_never_reaches_the_store() {
        let server = InMemoryTicketStore::new();
        let (tracker, ticket_id) = tracked(&server).await;
        let closed = server
            .close_ticket(CloseTicketRequest {
                ticket_id: ticket_id.clone(),
            })
            .await
            .expect("close");
        tracker.apply_ticket(closed);
        let composer = ReplyComposer::new(Arc::new(server), tracker, Sender::User);

        let error = composer.submit_text("one more thing").await.expect_err("closed");
        assert_eq!(error, ComposeError::TicketClosed(ticket_id));
        assert_eq!(composer.draft().text(), "one more thing");
    }

    #[tokio::test]
    async fn server_side_close_keeps_draft_and_refreshes_view() {
        let server = InMemoryTicketStore::new();
        let (tracker, ticket_id) = tracked(&server).await;
        server
            .close_ticket(CloseTicketRequest {
                ticket_id: ticket_id.clone(),
            })
            .await
            .expect("close on server");
        let composer = ReplyComposer::new(Arc::new(server), tracker.clone(), Sender::User);

        let error = composer.submit_text("still broken").await.expect_err("conflict");
        assert_eq!(error, ComposeError::TicketClosed(ticket_id));
        assert!(!error.is_retryable());
        assert_eq!(composer.draft().text(), "still broken");
        assert!(tracker.snapshot().is_closed());
        assert!(!composer.can_submit());
    }

    #[tokio::test]
    async fn suggestion_requires_configured_assistant() {
        let server = InMemoryTicketStore::new();
        let (tracker, _) = tracked(&server).await;
        let composer = ReplyComposer::new(Arc::new(server), tracker, Sender::User);
        composer.draft().set_text("pls help");

        let error = composer.request_suggestion().await.expect_err("no assistant");
        assert_eq!(error, ComposeError::AssistantUnavailable);
        assert_eq!(composer.draft().suggestion(), None);
    }
}
