pub mod collaborators;
pub mod factory;
pub mod interface;
pub mod providers;

pub use collaborators::{
    CollaboratorError, DisabledNotifier, DraftAssistant, DraftRequest, HttpDraftAssistant,
    HttpTicketNotifier, TicketCreatedNotification, TicketNotifier,
};
pub use factory::{
    build_store, resolve_provider_kind, supported_provider_keys, TicketStoreFactoryOutput,
};
pub use interface::{
    CloseTicketRequest, CreateTicketRequest, GetTicketRequest, ReplyRequest, StoreError,
    StoreProviderError, StoreProviderKind, TicketStore,
};
pub use providers::http::{HttpStoreConfig, HttpTicketStore};
pub use providers::memory::InMemoryTicketStore;
