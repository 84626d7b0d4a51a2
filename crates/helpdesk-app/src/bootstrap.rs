use std::sync::Arc;
use std::time::Duration;

use helpdesk_config::HelpdeskConfig;
use helpdesk_domain::Sender;
use helpdesk_sync::TicketTracker;
use helpdesk_ticketing::{
    build_store, DisabledNotifier, DraftAssistant, HttpDraftAssistant, HttpStoreConfig,
    HttpTicketNotifier, TicketNotifier, TicketStore,
};
use tracing::info;

use crate::admin_desk::AdminDesk;
use crate::composer::ReplyComposer;
use crate::error::AppResult;
use crate::intake::TicketIntake;

/// Store and collaborators wired from configuration. Every front-end
/// component is built from here.
#[derive(Clone)]
pub struct HelpdeskRuntime {
    store: Arc<dyn TicketStore>,
    notifier: Arc<dyn TicketNotifier>,
    assistant: Option<Arc<dyn DraftAssistant>>,
    poll_interval: Duration,
}

impl HelpdeskRuntime {
    pub fn new(
        store: Arc<dyn TicketStore>,
        notifier: Arc<dyn TicketNotifier>,
        assistant: Option<Arc<dyn DraftAssistant>>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            assistant,
            poll_interval,
        }
    }

    pub fn from_config(config: &HelpdeskConfig) -> AppResult<Self> {
        let runtime = config.store_runtime();
        let store = build_store(
            runtime.provider.as_str(),
            HttpStoreConfig {
                api_url: runtime.api_url,
                api_token: runtime.api_token,
                request_timeout: runtime.request_timeout,
            },
        )?
        .into_shared();

        let notifier: Arc<dyn TicketNotifier> = match config.notifications.url.as_deref() {
            Some(url) => Arc::new(HttpTicketNotifier::new(url)?),
            None => Arc::new(DisabledNotifier),
        };
        let assistant = match config.assistant.url.as_deref() {
            Some(url) => Some(Arc::new(HttpDraftAssistant::with_timeout(
                url,
                runtime.request_timeout,
            )?) as Arc<dyn DraftAssistant>),
            None => None,
        };

        info!(
            store_provider = store.provider_key(),
            notifications = config.notifications.url.is_some(),
            assistant = assistant.is_some(),
            poll_interval_secs = config.sync.poll_interval_secs,
            "helpdesk runtime configured"
        );
        Ok(Self::new(store, notifier, assistant, config.poll_interval()))
    }

    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn has_assistant(&self) -> bool {
        self.assistant.is_some()
    }

    pub fn intake(&self) -> TicketIntake {
        let intake = TicketIntake::new(Arc::clone(&self.store), Arc::clone(&self.notifier));
        match &self.assistant {
            Some(assistant) => intake.with_assistant(Arc::clone(assistant)),
            None => intake,
        }
    }

    pub fn tracker(&self) -> Arc<TicketTracker> {
        Arc::new(TicketTracker::new(
            Arc::clone(&self.store),
            self.poll_interval,
        ))
    }

    /// Customer-side reply box over its own tracker.
    pub fn user_composer(&self) -> ReplyComposer {
        let composer = ReplyComposer::new(Arc::clone(&self.store), self.tracker(), Sender::User);
        match &self.assistant {
            Some(assistant) => composer.with_assistant(Arc::clone(assistant)),
            None => composer,
        }
    }

    pub fn admin_desk(&self) -> AdminDesk {
        let desk = AdminDesk::new(Arc::clone(&self.store), self.poll_interval);
        match &self.assistant {
            Some(assistant) => desk.with_assistant(Arc::clone(assistant)),
            None => desk,
        }
    }
}
