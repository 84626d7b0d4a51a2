use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use helpdesk_domain::{Ticket, TicketId};
use helpdesk_ticketing::{GetTicketRequest, StoreError, TicketStore};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::view::TicketViewSnapshot;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no ticket is being tracked")]
    NoTicketSelected,
}

impl SyncError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(error) if error.is_not_found())
    }
}

#[derive(Debug)]
struct PollerState {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct TrackerState {
    ticket_id: Option<TicketId>,
    // Bumped whenever the tracked id changes; responses for an older
    // generation are dropped.
    generation: u64,
    applied_sequence: u64,
    ticket: Option<Ticket>,
    last_synced_at: Option<OffsetDateTime>,
    last_sync_error: Option<String>,
    polling: bool,
}

impl TrackerState {
    fn view(&self) -> TicketViewSnapshot {
        TicketViewSnapshot {
            ticket_id: self.ticket_id.clone(),
            ticket: self.ticket.clone(),
            last_synced_at: self.last_synced_at,
            last_sync_error: self.last_sync_error.clone(),
            polling: self.polling,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOutcome {
    Applied,
    Stale,
}

struct TrackerShared {
    state: RwLock<TrackerState>,
    view_tx: watch::Sender<TicketViewSnapshot>,
    fetch_gate: Mutex<()>,
    next_sequence: AtomicU64,
    // Outcome of the most recent fetch, written while `fetch_gate` is held.
    last_fetch: std::sync::Mutex<Option<Result<FetchOutcome, StoreError>>>,
}

impl TrackerShared {
    fn new() -> Self {
        let (view_tx, _) = watch::channel(TicketViewSnapshot::default());
        Self {
            state: RwLock::new(TrackerState::default()),
            view_tx,
            fetch_gate: Mutex::new(()),
            next_sequence: AtomicU64::new(0),
            last_fetch: std::sync::Mutex::new(None),
        }
    }

    fn next_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn publish(&self, state: &TrackerState) {
        let next = state.view();
        self.view_tx.send_if_modified(|current| {
            let changed = !current.same_content(&next);
            *current = next;
            changed
        });
    }

    fn tracked(&self) -> Option<(TicketId, u64)> {
        let state = self.state.read().expect("ticket tracker state read lock");
        state
            .ticket_id
            .clone()
            .map(|ticket_id| (ticket_id, state.generation))
    }

    fn keeps_polling(&self, generation: u64) -> bool {
        let state = self.state.read().expect("ticket tracker state read lock");
        state.generation == generation && state.ticket.as_ref().map_or(true, Ticket::is_open)
    }

    /// Fetches the tracked ticket and applies it if no newer snapshot has
    /// landed in the meantime. Callers hold `fetch_gate`.
    async fn fetch(
        &self,
        store: &dyn TicketStore,
        ticket_id: TicketId,
        generation: u64,
    ) -> Result<FetchOutcome, StoreError> {
        let outcome = self.fetch_and_apply(store, ticket_id, generation).await;
        *self.last_fetch.lock().expect("ticket tracker last fetch lock") = Some(outcome.clone());
        outcome
    }

    fn last_fetch(&self) -> Option<Result<FetchOutcome, StoreError>> {
        self.last_fetch
            .lock()
            .expect("ticket tracker last fetch lock")
            .clone()
    }

    async fn fetch_and_apply(
        &self,
        store: &dyn TicketStore,
        ticket_id: TicketId,
        generation: u64,
    ) -> Result<FetchOutcome, StoreError> {
        let sequence = self.next_sequence();
        let result = store
            .get_ticket(GetTicketRequest {
                ticket_id: ticket_id.clone(),
            })
            .await;

        let mut state = self.state.write().expect("ticket tracker state write lock");
        if state.generation != generation {
            debug!(ticket_id = %ticket_id, "dropping response for a ticket no longer tracked");
            return Ok(FetchOutcome::Stale);
        }

        match result {
            Ok(ticket) if ticket.ticket_id != ticket_id => {
                let error = StoreError::DependencyUnavailable(format!(
                    "store returned ticket {} for {ticket_id}",
                    ticket.ticket_id
                ));
                state.last_sync_error = Some(error.to_string());
                self.publish(&state);
                Err(error)
            }
            Ok(ticket) => {
                if sequence <= state.applied_sequence {
                    debug!(ticket_id = %ticket_id, sequence, "discarding stale ticket snapshot");
                    return Ok(FetchOutcome::Stale);
                }
                warn_on_inconsistent_snapshot(&ticket);
                state.applied_sequence = sequence;
                state.ticket = Some(ticket);
                state.last_synced_at = Some(OffsetDateTime::now_utc());
                state.last_sync_error = None;
                self.publish(&state);
                Ok(FetchOutcome::Applied)
            }
            Err(error) => {
                state.last_sync_error = Some(error.to_string());
                self.publish(&state);
                Err(error)
            }
        }
    }

    fn set_polling(&self, generation: u64, polling: bool) {
        let mut state = self.state.write().expect("ticket tracker state write lock");
        if state.generation == generation && state.polling != polling {
            state.polling = polling;
            self.publish(&state);
        }
    }
}

// The server owns ordering; a snapshot that breaks it is shown as received.
fn warn_on_inconsistent_snapshot(ticket: &Ticket) {
    if !ticket.is_chronological() {
        warn!(ticket_id = %ticket.ticket_id, "ticket snapshot messages are out of order");
    }
    if !ticket.last_reply_matches_messages() {
        warn!(
            ticket_id = %ticket.ticket_id,
            last_reply_by = ticket.last_reply_by.as_str(),
            "ticket snapshot lastReplyBy disagrees with its newest message"
        );
    }
}

/// Tracks a single ticket for one viewer. The poll task is owned by the
/// tracker and ends on `track` of another id, `clear`, `stop`, drop, or once
/// the ticket is observed closed.
pub struct TicketTracker {
    store: Arc<dyn TicketStore>,
    poll_interval: Duration,
    shared: Arc<TrackerShared>,
    poller: Mutex<Option<PollerState>>,
}

impl TicketTracker {
    pub fn new(store: Arc<dyn TicketStore>, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            shared: Arc::new(TrackerShared::new()),
            poller: Mutex::new(None),
        }
    }

    pub fn with_default_interval(store: Arc<dyn TicketStore>) -> Self {
        Self::new(store, DEFAULT_POLL_INTERVAL)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn subscribe(&self) -> watch::Receiver<TicketViewSnapshot> {
        self.shared.view_tx.subscribe()
    }

    pub fn snapshot(&self) -> TicketViewSnapshot {
        self.shared.view_tx.borrow().clone()
    }

    pub fn ticket_id(&self) -> Option<TicketId> {
        self.shared.tracked().map(|(ticket_id, _)| ticket_id)
    }

    pub fn is_polling(&self) -> bool {
        self.shared
            .state
            .read()
            .expect("ticket tracker state read lock")
            .polling
    }

    /// Switches the view to `ticket_id`, replacing any previous state
    /// wholesale. An unknown id returns the view to empty.
    pub async fn track(&self, ticket_id: TicketId) -> Result<TicketViewSnapshot, SyncError> {
        self.stop_poller().await;

        let generation = {
            let mut state = self.shared.state.write().expect("ticket tracker state write lock");
            let generation = state.generation + 1;
            *state = TrackerState {
                ticket_id: Some(ticket_id.clone()),
                generation,
                applied_sequence: state.applied_sequence,
                ..TrackerState::default()
            };
            self.shared.publish(&state);
            generation
        };

        let result = {
            let _gate = self.shared.fetch_gate.lock().await;
            self.shared
                .fetch(self.store.as_ref(), ticket_id.clone(), generation)
                .await
        };

        match result {
            Ok(_) => {
                if self.shared.keeps_polling(generation) {
                    self.start_poller(ticket_id, generation).await;
                }
                Ok(self.snapshot())
            }
            Err(error) if error.is_not_found() => {
                self.reset_if_current(generation);
                Err(error.into())
            }
            Err(error) => {
                if error.is_retryable() {
                    self.start_poller(ticket_id, generation).await;
                }
                Err(error.into())
            }
        }
    }

    /// User-initiated re-fetch. While another fetch is in flight this waits
    /// for it and returns its result, including its error, instead of
    /// issuing a second request.
    pub async fn refresh(&self) -> Result<TicketViewSnapshot, SyncError> {
        let (ticket_id, generation) = self.shared.tracked().ok_or(SyncError::NoTicketSelected)?;

        match self.shared.fetch_gate.try_lock() {
            Ok(_gate) => {
                self.shared
                    .fetch(self.store.as_ref(), ticket_id, generation)
                    .await?;
            }
            Err(_) => {
                debug!(ticket_id = %ticket_id, "refresh joined an in-flight fetch");
                let _gate = self.shared.fetch_gate.lock().await;
                if let Some(Err(error)) = self.shared.last_fetch() {
                    return Err(error.into());
                }
            }
        }

        Ok(self.snapshot())
    }

    /// Applies a ticket returned by a mutation (reply, close). Returns `false`
    /// when the ticket is not the one being tracked.
    pub fn apply_ticket(&self, ticket: Ticket) -> bool {
        let sequence = self.shared.next_sequence();
        let mut state = self.shared.state.write().expect("ticket tracker state write lock");
        if state.ticket_id.as_ref() != Some(&ticket.ticket_id) {
            return false;
        }
        state.applied_sequence = sequence;
        state.ticket = Some(ticket);
        state.last_synced_at = Some(OffsetDateTime::now_utc());
        state.last_sync_error = None;
        self.shared.publish(&state);
        true
    }

    /// Stops background polling but keeps the current view.
    pub async fn stop(&self) {
        self.stop_poller().await;
        if let Some((_, generation)) = self.shared.tracked() {
            self.shared.set_polling(generation, false);
        }
    }

    /// Stops polling and returns the view to empty.
    pub async fn clear(&self) {
        self.stop_poller().await;
        let mut state = self.shared.state.write().expect("ticket tracker state write lock");
        let generation = state.generation + 1;
        *state = TrackerState {
            generation,
            applied_sequence: state.applied_sequence,
            ..TrackerState::default()
        };
        self.shared.publish(&state);
    }

    fn reset_if_current(&self, generation: u64) {
        let mut state = self.shared.state.write().expect("ticket tracker state write lock");
        if state.generation != generation {
            return;
        }
        *state = TrackerState {
            generation: generation + 1,
            applied_sequence: state.applied_sequence,
            ..TrackerState::default()
        };
        self.shared.publish(&state);
    }

    async fn start_poller(&self, ticket_id: TicketId, generation: u64) {
        let mut guard = self.poller.lock().await;
        if let Some(previous) = guard.take() {
            shutdown_poller(previous).await;
        }

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let store = Arc::clone(&self.store);
        let shared = Arc::clone(&self.shared);
        let poll_interval = self.poll_interval;
        self.shared.set_polling(generation, true);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + poll_interval, poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        if !shared.keeps_polling(generation) {
                            break;
                        }
                        if let Ok(_gate) = shared.fetch_gate.try_lock() {
                            if let Err(error) = shared
                                .fetch(store.as_ref(), ticket_id.clone(), generation)
                                .await
                            {
                                warn!(ticket_id = %ticket_id, error = %error, "ticket polling sync failed");
                            }
                        } else {
                            debug!(ticket_id = %ticket_id, "skipping poll while a fetch is in flight");
                        }
                        if !shared.keeps_polling(generation) {
                            break;
                        }
                    }
                }
            }
            shared.set_polling(generation, false);
            debug!(ticket_id = %ticket_id, "ticket polling stopped");
        });

        *guard = Some(PollerState {
            stop_tx: Some(stop_tx),
            task,
        });
    }

    async fn stop_poller(&self) {
        let state = {
            let mut guard = self.poller.lock().await;
            guard.take()
        };
        if let Some(state) = state {
            shutdown_poller(state).await;
        }
    }
}

async fn shutdown_poller(mut state: PollerState) {
    if let Some(stop_tx) = state.stop_tx.take() {
        let _ = stop_tx.send(());
    }
    // A poll may be parked on a slow request; its result would be dropped anyway.
    state.task.abort();
    if let Err(error) = state.task.await {
        if !error.is_cancelled() {
            warn!(error = %error, "ticket polling task join failed");
        }
    }
}

impl Drop for TicketTracker {
    fn drop(&mut self) {
        if let Some(state) = self.poller.get_mut().take() {
            state.task.abort();
        }
    }
}
