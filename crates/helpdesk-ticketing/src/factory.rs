use std::sync::Arc;

use crate::interface::{StoreProviderError, StoreProviderKind, TicketStore};
use crate::providers::http::{HttpStoreConfig, HttpTicketStore};
use crate::providers::memory::InMemoryTicketStore;

const SUPPORTED_PROVIDER_KEYS: [&str; 2] = [
    StoreProviderKind::Http.as_key(),
    StoreProviderKind::Memory.as_key(),
];

#[derive(Debug, Clone)]
pub enum TicketStoreFactoryOutput {
    Http(HttpTicketStore),
    Memory(InMemoryTicketStore),
}

impl TicketStoreFactoryOutput {
    pub fn kind(&self) -> StoreProviderKind {
        match self {
            Self::Http(_) => StoreProviderKind::Http,
            Self::Memory(_) => StoreProviderKind::Memory,
        }
    }

    pub fn into_shared(self) -> Arc<dyn TicketStore> {
        match self {
            Self::Http(store) => Arc::new(store),
            Self::Memory(store) => Arc::new(store),
        }
    }
}

pub fn supported_provider_keys() -> &'static [&'static str] {
    &SUPPORTED_PROVIDER_KEYS
}

pub fn resolve_provider_kind(provider_key: &str) -> Result<StoreProviderKind, StoreProviderError> {
    StoreProviderKind::from_key(provider_key.trim())
        .ok_or_else(|| StoreProviderError::UnknownProviderKey(provider_key.to_owned()))
}

/// `config` is only read for `store.http`.
pub fn build_store(
    provider_key: &str,
    config: HttpStoreConfig,
) -> Result<TicketStoreFactoryOutput, StoreProviderError> {
    let kind = resolve_provider_kind(provider_key)?;
    let store = match kind {
        StoreProviderKind::Http => TicketStoreFactoryOutput::Http(
            HttpTicketStore::new(config)
                .map_err(|error| StoreProviderError::ProviderInitialization(error.to_string()))?,
        ),
        StoreProviderKind::Memory => TicketStoreFactoryOutput::Memory(InMemoryTicketStore::new()),
    };
    Ok(store)
}
