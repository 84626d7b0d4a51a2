//! App-level error surface. Everything the front end reports funnels through
//! `AppError`, which keeps the store taxonomy intact.

use helpdesk_config::ConfigError;
use helpdesk_sync::SyncError;
use helpdesk_ticketing::{CollaboratorError, StoreError, StoreProviderError};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct AppError(#[from] StoreError);

impl AppError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self(StoreError::Configuration(message.into()))
    }

    pub fn dependency_unavailable(message: impl Into<String>) -> Self {
        Self(StoreError::DependencyUnavailable(message.into()))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self(StoreError::Validation(message.into()))
    }

    pub fn as_store(&self) -> &StoreError {
        &self.0
    }

    pub fn into_store(self) -> StoreError {
        self.0
    }

    pub fn is_retryable(&self) -> bool {
        self.0.is_retryable()
    }

    pub fn configuration_message(&self) -> Option<&str> {
        match self.as_store() {
            StoreError::Configuration(message) => Some(message.as_str()),
            _ => None,
        }
    }
}

impl From<AppError> for StoreError {
    fn from(value: AppError) -> Self {
        value.0
    }
}

impl From<SyncError> for AppError {
    fn from(value: SyncError) -> Self {
        match value {
            SyncError::Store(error) => Self(error),
            SyncError::NoTicketSelected => Self::validation(value.to_string()),
        }
    }
}

impl From<StoreProviderError> for AppError {
    fn from(value: StoreProviderError) -> Self {
        Self::configuration(value.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::configuration(value.to_string())
    }
}

impl From<CollaboratorError> for AppError {
    fn from(value: CollaboratorError) -> Self {
        Self::dependency_unavailable(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_domain::TicketId;

    #[test]
    fn sync_errors_keep_store_taxonomy() {
        let error = AppError::from(SyncError::Store(StoreError::NotFound(TicketId::new("TKT-1"))));
        assert_eq!(error.as_store(), &StoreError::NotFound(TicketId::new("TKT-1")));

        let missing = AppError::from(SyncError::NoTicketSelected);
        assert!(matches!(missing.as_store(), StoreError::Validation(_)));
    }

    #[test]
    fn provider_and_config_errors_become_configuration() {
        let error = AppError::from(StoreProviderError::UnknownProviderKey("nope".to_owned()));
        assert_eq!(
            error.configuration_message(),
            Some("unknown ticket store provider key: nope")
        );
        assert!(!error.is_retryable());

        let unavailable =
            AppError::from(CollaboratorError::Unavailable("connection refused".to_owned()));
        assert!(unavailable.is_retryable());
    }
}
