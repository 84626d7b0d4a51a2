use std::sync::{Arc, Mutex};
use std::time::Duration;

use helpdesk_domain::{Sender, Ticket, TicketId, TicketStats};
use helpdesk_sync::{TicketTracker, TicketViewSnapshot};
use helpdesk_ticketing::{
    CloseTicketRequest, DraftAssistant, GetTicketRequest, StoreError, TicketStore,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::composer::{ComposeError, ReplyComposer};
use crate::directory::TicketDirectory;
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed(Ticket),
    /// The ticket was closed before this request; nothing changed.
    AlreadyClosed(Ticket),
}

impl CloseOutcome {
    pub fn ticket(&self) -> &Ticket {
        match self {
            Self::Closed(ticket) | Self::AlreadyClosed(ticket) => ticket,
        }
    }

    pub fn was_already_closed(&self) -> bool {
        matches!(self, Self::AlreadyClosed(_))
    }
}

/// Copies every detail-pane snapshot into the directory until dropped.
#[derive(Debug)]
struct DirectoryForwarder(JoinHandle<()>);

impl DirectoryForwarder {
    fn spawn(tracker: &TicketTracker, directory: Arc<TicketDirectory>) -> Self {
        let mut updates = tracker.subscribe();
        Self(tokio::spawn(async move {
            loop {
                let ticket = updates.borrow_and_update().ticket.clone();
                if let Some(ticket) = ticket {
                    directory.upsert(ticket);
                }
                if updates.changed().await.is_err() {
                    break;
                }
            }
            debug!("directory forwarder stopped");
        }))
    }
}

impl Drop for DirectoryForwarder {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Admin console state: the ticket directory, the ticket currently open in
/// the detail pane, and the admin's reply box. Whatever the detail pane
/// receives (polls, refreshes, mutations) is mirrored into the directory so
/// list rows and stats follow it.
pub struct AdminDesk {
    store: Arc<dyn TicketStore>,
    directory: Arc<TicketDirectory>,
    tracker: Arc<TicketTracker>,
    composer: ReplyComposer,
    forwarder: Mutex<Option<DirectoryForwarder>>,
}

impl AdminDesk {
    pub fn new(store: Arc<dyn TicketStore>, poll_interval: Duration) -> Self {
        let directory = Arc::new(TicketDirectory::new());
        let tracker = Arc::new(TicketTracker::new(Arc::clone(&store), poll_interval));
        let composer = ReplyComposer::new(Arc::clone(&store), Arc::clone(&tracker), Sender::Admin)
            .with_directory(Arc::clone(&directory));
        Self {
            store,
            directory,
            tracker,
            composer,
            forwarder: Mutex::new(None),
        }
    }

    pub fn with_assistant(mut self, assistant: Arc<dyn DraftAssistant>) -> Self {
        self.composer = self.composer.with_assistant(assistant);
        self
    }

    pub fn directory(&self) -> &Arc<TicketDirectory> {
        &self.directory
    }

    pub fn tracker(&self) -> &Arc<TicketTracker> {
        &self.tracker
    }

    pub fn composer(&self) -> &ReplyComposer {
        &self.composer
    }

    pub async fn load(&self) -> AppResult<TicketStats> {
        let tickets = self.store.list_tickets().await?;
        info!(count = tickets.len(), "ticket directory loaded");
        self.directory.replace_all(tickets);
        Ok(self.directory.stats())
    }

    /// Reloads the whole collection, then re-fetches the ticket open in the
    /// detail pane. List rows may be summaries without messages, so the
    /// detail pane is never fed from them. A failed detail fetch is kept on
    /// the detail snapshot and does not fail the reload.
    pub async fn refresh_directory(&self) -> AppResult<TicketStats> {
        self.load().await?;
        if self.tracker.ticket_id().is_some() {
            match self.tracker.refresh().await {
                Ok(view) => {
                    if let Some(ticket) = view.ticket {
                        self.directory.upsert(ticket);
                    }
                }
                Err(error) => {
                    warn!(error = %error, "refreshing the open ticket failed");
                }
            }
        }
        Ok(self.directory.stats())
    }

    pub fn search(&self, query: &str) -> Vec<Ticket> {
        self.directory.search(query)
    }

    pub fn needs_reply_only(&self, query: &str) -> Vec<Ticket> {
        self.directory.search_needing_reply(query)
    }

    pub fn stats(&self) -> TicketStats {
        self.directory.stats()
    }

    pub fn selected(&self) -> TicketViewSnapshot {
        self.tracker.snapshot()
    }

    /// Fetches the ticket, starts tracking it and replaces the directory copy.
    /// Later polls of the ticket keep replacing it.
    pub async fn open_ticket(&self, ticket_id: TicketId) -> AppResult<TicketViewSnapshot> {
        let view = self.tracker.track(ticket_id).await?;
        if let Some(ticket) = &view.ticket {
            self.directory.upsert(ticket.clone());
        }
        self.ensure_forwarding();
        Ok(view)
    }

    pub async fn reply(&self, text: impl Into<String>) -> Result<Ticket, ComposeError> {
        self.composer.submit_text(text).await
    }

    /// Closes a ticket. Closing one that is already closed is reported as
    /// `CloseOutcome::AlreadyClosed`; a locally known closed ticket never
    /// reaches the store.
    pub async fn close_ticket(&self, ticket_id: &TicketId) -> AppResult<CloseOutcome> {
        if let Some(local) = self.known_ticket(ticket_id) {
            if !local.can_close() {
                return Ok(CloseOutcome::AlreadyClosed(local));
            }
        }

        match self
            .store
            .close_ticket(CloseTicketRequest {
                ticket_id: ticket_id.clone(),
            })
            .await
        {
            Ok(ticket) => {
                info!(ticket_id = %ticket_id, "ticket closed");
                self.adopt(ticket.clone());
                Ok(CloseOutcome::Closed(ticket))
            }
            Err(StoreError::AlreadyClosed(_)) => {
                info!(ticket_id = %ticket_id, "ticket was already closed");
                let ticket = self
                    .store
                    .get_ticket(GetTicketRequest {
                        ticket_id: ticket_id.clone(),
                    })
                    .await?;
                self.adopt(ticket.clone());
                Ok(CloseOutcome::AlreadyClosed(ticket))
            }
            Err(error) => {
                warn!(ticket_id = %ticket_id, error = %error, "closing ticket failed");
                Err(error.into())
            }
        }
    }

    pub async fn shutdown(&self) {
        self.forwarder.lock().expect("directory forwarder lock").take();
        self.tracker.stop().await;
    }

    fn ensure_forwarding(&self) {
        let mut forwarder = self.forwarder.lock().expect("directory forwarder lock");
        if forwarder.is_none() {
            *forwarder = Some(DirectoryForwarder::spawn(
                &self.tracker,
                Arc::clone(&self.directory),
            ));
        }
    }

    fn known_ticket(&self, ticket_id: &TicketId) -> Option<Ticket> {
        self.tracker
            .snapshot()
            .ticket
            .filter(|ticket| &ticket.ticket_id == ticket_id)
            .or_else(|| self.directory.get(ticket_id))
    }

    fn adopt(&self, ticket: Ticket) {
        self.tracker.apply_ticket(ticket.clone());
        self.directory.upsert(ticket);
    }
}
