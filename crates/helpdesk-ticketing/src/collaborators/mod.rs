//! Boundaries to services the helpdesk calls but does not own: the message
//! drafting assistant and the confirmation-email notifier.

use std::time::Duration;

use async_trait::async_trait;
use helpdesk_domain::TicketId;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

const DEFAULT_COLLABORATOR_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("collaborator returned an invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftRequest {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

/// Suggests a reworded message. Suggestions are advisory and never sent on
/// their own.
#[async_trait]
pub trait DraftAssistant: Send + Sync {
    async fn improve_message(&self, request: DraftRequest) -> Result<String, CollaboratorError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketCreatedNotification {
    pub to: String,
    pub ticket_id: TicketId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

#[async_trait]
pub trait TicketNotifier: Send + Sync {
    async fn notify_ticket_created(
        &self,
        notification: TicketCreatedNotification,
    ) -> Result<(), CollaboratorError>;
}

fn build_json_client(timeout: Duration) -> Result<Client, CollaboratorError> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|error| {
            CollaboratorError::Unavailable(format!("failed to build HTTP client: {error}"))
        })
}

async fn post_json<B: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    body: &B,
) -> Result<String, CollaboratorError> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|error| CollaboratorError::Unavailable(format!("request failed: {error}")))?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|error| CollaboratorError::Unavailable(format!("response read failed: {error}")))?;
    if !status.is_success() {
        return Err(CollaboratorError::Unavailable(format!(
            "request failed with status {status}"
        )));
    }
    Ok(text)
}

#[derive(Debug, Clone)]
pub struct HttpDraftAssistant {
    url: String,
    client: Client,
}

impl HttpDraftAssistant {
    pub fn new(url: impl Into<String>) -> Result<Self, CollaboratorError> {
        Self::with_timeout(url, Duration::from_secs(DEFAULT_COLLABORATOR_TIMEOUT_SECS))
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self {
            url: url.into(),
            client: build_json_client(timeout)?,
        })
    }
}

#[async_trait]
impl DraftAssistant for HttpDraftAssistant {
    async fn improve_message(&self, request: DraftRequest) -> Result<String, CollaboratorError> {
        let body = post_json(&self.client, &self.url, &request).await?;
        let payload = serde_json::from_str::<Value>(&body)
            .map_err(|error| CollaboratorError::InvalidResponse(error.to_string()))?;
        ["message", "suggestion"]
            .iter()
            .find_map(|key| payload.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| {
                CollaboratorError::InvalidResponse(
                    "response has no 'message' or 'suggestion' text".to_owned(),
                )
            })
    }
}

#[derive(Debug, Clone)]
pub struct HttpTicketNotifier {
    url: String,
    client: Client,
}

impl HttpTicketNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, CollaboratorError> {
        Ok(Self {
            url: url.into(),
            client: build_json_client(Duration::from_secs(DEFAULT_COLLABORATOR_TIMEOUT_SECS))?,
        })
    }
}

#[async_trait]
impl TicketNotifier for HttpTicketNotifier {
    async fn notify_ticket_created(
        &self,
        notification: TicketCreatedNotification,
    ) -> Result<(), CollaboratorError> {
        post_json(&self.client, &self.url, &notification).await?;
        debug!(ticket_id = %notification.ticket_id, "ticket confirmation sent");
        Ok(())
    }
}

/// Used when no notification endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl TicketNotifier for DisabledNotifier {
    async fn notify_ticket_created(
        &self,
        notification: TicketCreatedNotification,
    ) -> Result<(), CollaboratorError> {
        debug!(
            ticket_id = %notification.ticket_id,
            "notifications disabled; skipping ticket confirmation"
        );
        Ok(())
    }
}
