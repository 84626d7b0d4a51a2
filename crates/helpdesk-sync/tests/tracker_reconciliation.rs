use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use helpdesk_domain::{Sender, Ticket, TicketId};
use helpdesk_sync::{SyncError, TicketTracker, TicketViewSnapshot};
use helpdesk_ticketing::{
    CloseTicketRequest, CreateTicketRequest, GetTicketRequest, InMemoryTicketStore, ReplyRequest,
    StoreError, StoreProviderKind, TicketStore,
};
use tokio::time::{sleep, timeout};

const FAST_POLL: Duration = Duration::from_millis(20);
const SLOW_POLL: Duration = Duration::from_secs(60);

/// Server-backed store that counts fetches and can inject failures or
/// latency into `get_ticket`.
#[derive(Default)]
struct ScriptedStore {
    server: InMemoryTicketStore,
    get_calls: AtomicUsize,
    queued_failures: Mutex<VecDeque<StoreError>>,
    get_delay: Mutex<Duration>,
}

impl ScriptedStore {
    fn fail_next_get(&self, error: StoreError) {
        self.queued_failures
            .lock()
            .expect("queued failures lock")
            .push_back(error);
    }

    fn set_get_delay(&self, delay: Duration) {
        *self.get_delay.lock().expect("get delay lock") = delay;
    }

    fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TicketStore for ScriptedStore {
    fn kind(&self) -> StoreProviderKind {
        StoreProviderKind::Memory
    }

    async fn list_tickets(&self) -> Result<Vec<Ticket>, StoreError> {
        self.server.list_tickets().await
    }

    async fn get_ticket(&self, request: GetTicketRequest) -> Result<Ticket, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .queued_failures
            .lock()
            .expect("queued failures lock")
            .pop_front();
        // Read first, then wait: a delayed response carries an old snapshot.
        let result = match failure {
            Some(error) => Err(error),
            None => self.server.get_ticket(request).await,
        };
        let delay = *self.get_delay.lock().expect("get delay lock");
        if !delay.is_zero() {
            sleep(delay).await;
        }
        result
    }

    async fn create_ticket(&self, request: CreateTicketRequest) -> Result<Ticket, StoreError> {
        self.server.create_ticket(request).await
    }

    async fn reply(&self, request: ReplyRequest) -> Result<Ticket, StoreError> {
        self.server.reply(request).await
    }

    async fn close_ticket(&self, request: CloseTicketRequest) -> Result<Ticket, StoreError> {
        self.server.close_ticket(request).await
    }
}

async fn seeded_store() -> (Arc<ScriptedStore>, TicketId) {
    let store = Arc::new(ScriptedStore::default());
    let ticket_id = store
        .server
        .seed(&[("a@b.com", Some("Login"), "cannot sign in")])
        .await
        .expect("seed ticket")
        .remove(0);
    (store, ticket_id)
}

async fn wait_for(tracker: &TicketTracker, predicate: impl Fn(&TicketViewSnapshot) -> bool) {
    timeout(Duration::from_secs(2), async {
        loop {
            if predicate(&tracker.snapshot()) {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("tracker view did not converge in time");
}

#[tokio::test]
async fn track_loads_snapshot_and_polls_server_changes() {
    let (store, ticket_id) = seeded_store().await;
    let tracker = TicketTracker::new(store.clone(), FAST_POLL);

    let view = tracker.track(ticket_id.clone()).await.expect("track ticket");
    assert_eq!(view.ticket.as_ref().map(|ticket| ticket.messages.len()), Some(1));
    assert!(view.polling);
    assert!(view.needs_reply());

    store
        .server
        .reply_as(&ticket_id, Sender::Admin, "try resetting your password")
        .await
        .expect("admin reply on server");

    wait_for(&tracker, |view| {
        view.ticket
            .as_ref()
            .is_some_and(|ticket| ticket.last_reply_by == Sender::Admin)
    })
    .await;
    let view = tracker.snapshot();
    assert!(!view.needs_reply());
    assert_eq!(view.ticket.expect("ticket").messages.len(), 2);
}

#[tokio::test]
async fn server_side_close_stops_polling() {
    let (store, ticket_id) = seeded_store().await;
    let tracker = TicketTracker::new(store.clone(), FAST_POLL);
    tracker.track(ticket_id.clone()).await.expect("track ticket");

    store
        .server
        .close_ticket(CloseTicketRequest {
            ticket_id: ticket_id.clone(),
        })
        .await
        .expect("close on server");

    wait_for(&tracker, |view| view.is_closed() && !view.polling).await;
    assert!(!tracker.is_polling());

    let calls = store.get_calls();
    sleep(FAST_POLL * 5).await;
    assert_eq!(store.get_calls(), calls);
    assert!(!tracker.snapshot().can_reply());
}

#[tokio::test]
async fn closed_ticket_is_not_polled_after_track() {
    let (store, ticket_id) = seeded_store().await;
    store
        .server
        .close_ticket(CloseTicketRequest {
            ticket_id: ticket_id.clone(),
        })
        .await
        .expect("close on server");

    let tracker = TicketTracker::new(store.clone(), FAST_POLL);
    let view = tracker.track(ticket_id).await.expect("track closed ticket");
    assert!(view.is_closed());
    assert!(!view.polling);

    sleep(FAST_POLL * 4).await;
    assert_eq!(store.get_calls(), 1);
}

#[tokio::test]
async fn unknown_ticket_returns_view_to_empty() {
    let (store, _) = seeded_store().await;
    let tracker = TicketTracker::new(store, FAST_POLL);

    let error = tracker
        .track(TicketId::new("TKT-NOPE"))
        .await
        .expect_err("unknown ticket");
    assert!(error.is_not_found());
    assert!(tracker.snapshot().is_empty());
    assert!(!tracker.is_polling());
}

#[tokio::test]
async fn failed_poll_keeps_previous_snapshot_until_next_success() {
    let (store, ticket_id) = seeded_store().await;
    let tracker = TicketTracker::new(store.clone(), FAST_POLL);
    let loaded = tracker.track(ticket_id.clone()).await.expect("track ticket");

    store.fail_next_get(StoreError::DependencyUnavailable("connection reset".to_owned()));
    wait_for(&tracker, |view| view.last_sync_error.is_some()).await;
    let degraded = tracker.snapshot();
    assert_eq!(degraded.ticket, loaded.ticket);
    assert!(degraded.polling);

    wait_for(&tracker, |view| view.last_sync_error.is_none()).await;
    assert_eq!(tracker.snapshot().ticket, loaded.ticket);
}

#[tokio::test]
async fn identical_polls_do_not_notify_subscribers() {
    let (store, ticket_id) = seeded_store().await;
    let tracker = TicketTracker::new(store.clone(), FAST_POLL);
    let mut receiver = tracker.subscribe();
    tracker.track(ticket_id).await.expect("track ticket");
    let _ = receiver.borrow_and_update();

    let calls = store.get_calls();
    timeout(Duration::from_secs(2), async {
        while store.get_calls() < calls + 3 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("polls should keep running");

    assert!(!receiver.has_changed().expect("tracker alive"));
}

#[tokio::test]
async fn stale_fetch_cannot_roll_back_applied_reply() {
    let (store, ticket_id) = seeded_store().await;
    let tracker = Arc::new(TicketTracker::new(store.clone(), SLOW_POLL));
    tracker.track(ticket_id.clone()).await.expect("track ticket");

    store.set_get_delay(Duration::from_millis(150));
    let refreshing = {
        let tracker = Arc::clone(&tracker);
        tokio::spawn(async move { tracker.refresh().await })
    };
    sleep(Duration::from_millis(30)).await;

    let replied = store
        .reply(ReplyRequest {
            ticket_id: ticket_id.clone(),
            sender: Sender::User,
            message: "any update?".to_owned(),
        })
        .await
        .expect("reply");
    assert!(tracker.apply_ticket(replied.clone()));

    let view = refreshing
        .await
        .expect("join refresh")
        .expect("refresh succeeds");
    assert_eq!(view.ticket.as_ref(), Some(&replied));
    assert_eq!(tracker.snapshot().ticket.expect("ticket").messages.len(), 2);
}

#[tokio::test]
async fn concurrent_refreshes_share_one_request() {
    let (store, ticket_id) = seeded_store().await;
    let tracker = Arc::new(TicketTracker::new(store.clone(), SLOW_POLL));
    tracker.track(ticket_id).await.expect("track ticket");
    assert_eq!(store.get_calls(), 1);

    store.set_get_delay(Duration::from_millis(100));
    let first = {
        let tracker = Arc::clone(&tracker);
        tokio::spawn(async move { tracker.refresh().await })
    };
    sleep(Duration::from_millis(20)).await;
    let second = tracker.refresh().await.expect("second refresh");
    let first = first.await.expect("join first").expect("first refresh");

    assert_eq!(store.get_calls(), 2);
    assert_eq!(first.ticket, second.ticket);
}

#[tokio::test]
async fn refresh_joining_a_failed_fetch_reports_the_failure() {
    let (store, ticket_id) = seeded_store().await;
    let tracker = Arc::new(TicketTracker::new(store.clone(), SLOW_POLL));
    let loaded = tracker.track(ticket_id).await.expect("track ticket");

    store.set_get_delay(Duration::from_millis(100));
    store.fail_next_get(StoreError::DependencyUnavailable("gateway timeout".to_owned()));
    let first = {
        let tracker = Arc::clone(&tracker);
        tokio::spawn(async move { tracker.refresh().await })
    };
    sleep(Duration::from_millis(20)).await;

    let joined = tracker.refresh().await.expect_err("joined refresh fails");
    let first = first
        .await
        .expect("join first")
        .expect_err("first refresh fails");

    assert_eq!(joined, first);
    assert!(matches!(&joined, SyncError::Store(error) if error.is_retryable()));
    assert_eq!(store.get_calls(), 2);
    assert_eq!(tracker.snapshot().ticket, loaded.ticket);

    store.set_get_delay(Duration::ZERO);
    let recovered = tracker.refresh().await.expect("later refresh succeeds");
    assert!(recovered.last_sync_error.is_none());
}

#[tokio::test]
async fn refresh_without_ticket_is_rejected() {
    let (store, _) = seeded_store().await;
    let tracker = TicketTracker::new(store.clone(), FAST_POLL);
    let error = tracker.refresh().await.expect_err("nothing tracked");
    assert_eq!(error, SyncError::NoTicketSelected);
    assert_eq!(store.get_calls(), 0);
}

#[tokio::test]
async fn switching_tickets_replaces_state_and_ignores_foreign_updates() {
    let (store, first_id) = seeded_store().await;
    let second_id = store
        .server
        .seed(&[("c@d.org", None, "printer on fire")])
        .await
        .expect("seed second")
        .remove(0);
    let tracker = TicketTracker::new(store.clone(), FAST_POLL);

    tracker.track(first_id.clone()).await.expect("track first");
    let view = tracker.track(second_id.clone()).await.expect("track second");
    assert_eq!(view.ticket_id.as_ref(), Some(&second_id));
    assert_eq!(
        view.ticket.as_ref().map(|ticket| ticket.email.as_str()),
        Some("c@d.org")
    );

    let foreign = store
        .server
        .reply_as(&first_id, Sender::Admin, "hello")
        .await
        .expect("reply on first");
    assert!(!tracker.apply_ticket(foreign));
    assert_eq!(tracker.ticket_id(), Some(second_id));

    tracker.clear().await;
    let cleared = tracker.snapshot();
    assert!(cleared.is_empty());
    assert!(!cleared.polling);
    assert!(cleared.ticket.is_none());
}

#[tokio::test]
async fn stop_keeps_view_and_halts_polling() {
    let (store, ticket_id) = seeded_store().await;
    let tracker = TicketTracker::new(store.clone(), FAST_POLL);
    tracker.track(ticket_id).await.expect("track ticket");

    tracker.stop().await;
    let view = tracker.snapshot();
    assert!(!view.polling);
    assert!(view.ticket.is_some());

    let calls = store.get_calls();
    sleep(FAST_POLL * 4).await;
    assert_eq!(store.get_calls(), calls);
}
