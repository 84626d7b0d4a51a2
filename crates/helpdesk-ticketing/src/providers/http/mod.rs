use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use helpdesk_domain::{Sender, Ticket, TicketId};
use reqwest::{header, Client, Method, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::interface::{
    CloseTicketRequest, CreateTicketRequest, GetTicketRequest, ReplyRequest, StoreError,
    StoreProviderKind, TicketStore,
};

pub const DEFAULT_STORE_API_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_STORE_REQUEST_TIMEOUT_SECS: u64 = 20;
const ERROR_BODY_PREVIEW_CHARS: usize = 200;

#[derive(Clone)]
pub struct HttpStoreConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_STORE_API_URL.to_owned(),
            api_token: None,
            request_timeout: Duration::from_secs(DEFAULT_STORE_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl fmt::Debug for HttpStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStoreConfig")
            .field("api_url", &self.api_url)
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "<redacted>"),
            )
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Which call produced a response; 409 means different things per route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreOperation {
    List,
    Get,
    Create,
    Reply,
    Close,
}

impl StoreOperation {
    const fn label(self) -> &'static str {
        match self {
            Self::List => "list tickets",
            Self::Get => "get ticket",
            Self::Create => "create ticket",
            Self::Reply => "reply",
            Self::Close => "close ticket",
        }
    }
}

#[derive(Debug, Serialize)]
struct ReplyBody<'a> {
    sender: Sender,
    message: &'a str,
}

#[derive(Clone)]
pub struct HttpTicketStore {
    config: HttpStoreConfig,
    base_url: Url,
    client: Client,
}

impl fmt::Debug for HttpTicketStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTicketStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpTicketStore {
    pub fn new(config: HttpStoreConfig) -> Result<Self, StoreError> {
        let base_url = Url::parse(config.api_url.trim()).map_err(|error| {
            StoreError::Configuration(format!(
                "ticket store api_url '{}' is invalid: {error}",
                config.api_url
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Configuration(format!(
                "ticket store api_url '{}' cannot be used as a base URL",
                config.api_url
            )));
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(token) = config
            .api_token
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|error| {
                    StoreError::Configuration(format!("ticket store api_token is invalid: {error}"))
                })?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|error| {
                StoreError::Configuration(format!(
                    "failed to build ticket store HTTP client: {error}"
                ))
            })?;

        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    pub fn config(&self) -> &HttpStoreConfig {
        &self.config
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.push("tickets");
            for segment in segments {
                path.push(segment);
            }
        }
        url
    }

    fn ticket_endpoint(&self, ticket_id: &TicketId, action: Option<&str>) -> Url {
        match action {
            Some(action) => self.endpoint(&[ticket_id.as_str(), action]),
            None => self.endpoint(&[ticket_id.as_str()]),
        }
    }

    async fn request_json(
        &self,
        operation: StoreOperation,
        ticket_id: Option<&TicketId>,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, StoreError> {
        let response = request.send().await.map_err(|error| {
            StoreError::DependencyUnavailable(format!(
                "ticket store {} request failed: {error}",
                operation.label()
            ))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            StoreError::DependencyUnavailable(format!(
                "ticket store {} response read failed: {error}",
                operation.label()
            ))
        })?;

        if !status.is_success() {
            debug!(
                operation = operation.label(),
                status = %status,
                "ticket store returned an error status"
            );
            return Err(map_error_status(operation, ticket_id, status, &body));
        }

        serde_json::from_str(&body).map_err(|error| {
            StoreError::DependencyUnavailable(format!(
                "ticket store {} response was malformed JSON: {error}",
                operation.label()
            ))
        })
    }
}

#[async_trait]
impl TicketStore for HttpTicketStore {
    fn kind(&self) -> StoreProviderKind {
        StoreProviderKind::Http
    }

    async fn list_tickets(&self) -> Result<Vec<Ticket>, StoreError> {
        let request = self.client.get(self.endpoint(&[]));
        let payload = self.request_json(StoreOperation::List, None, request).await?;
        extract_ticket_list(payload)
    }

    async fn get_ticket(&self, request: GetTicketRequest) -> Result<Ticket, StoreError> {
        let http = self
            .client
            .get(self.ticket_endpoint(&request.ticket_id, None));
        let payload = self
            .request_json(StoreOperation::Get, Some(&request.ticket_id), http)
            .await?;
        extract_ticket(payload)
    }

    async fn create_ticket(&self, request: CreateTicketRequest) -> Result<Ticket, StoreError> {
        let http = self.client.post(self.endpoint(&[])).json(&request);
        let payload = self
            .request_json(StoreOperation::Create, None, http)
            .await?;
        extract_ticket(payload)
    }

    async fn reply(&self, request: ReplyRequest) -> Result<Ticket, StoreError> {
        let http = self
            .client
            .post(self.ticket_endpoint(&request.ticket_id, Some("reply")))
            .json(&ReplyBody {
                sender: request.sender,
                message: &request.message,
            });
        let payload = self
            .request_json(StoreOperation::Reply, Some(&request.ticket_id), http)
            .await?;
        extract_ticket(payload)
    }

    async fn close_ticket(&self, request: CloseTicketRequest) -> Result<Ticket, StoreError> {
        let http = self.client.request(
            Method::PATCH,
            self.ticket_endpoint(&request.ticket_id, Some("close")),
        );
        let payload = self
            .request_json(StoreOperation::Close, Some(&request.ticket_id), http)
            .await?;
        extract_ticket(payload)
    }
}

fn map_error_status(
    operation: StoreOperation,
    ticket_id: Option<&TicketId>,
    status: StatusCode,
    body: &str,
) -> StoreError {
    match (status, ticket_id) {
        (StatusCode::NOT_FOUND, Some(ticket_id)) => StoreError::NotFound(ticket_id.clone()),
        (StatusCode::CONFLICT, Some(ticket_id)) if operation == StoreOperation::Reply => {
            StoreError::TicketClosed(ticket_id.clone())
        }
        (StatusCode::CONFLICT, Some(ticket_id)) if operation == StoreOperation::Close => {
            StoreError::AlreadyClosed(ticket_id.clone())
        }
        (StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY, _) => {
            StoreError::Validation(error_message_from_body(body).unwrap_or_else(|| {
                format!("ticket store rejected {} with status {status}", operation.label())
            }))
        }
        _ => StoreError::DependencyUnavailable(format!(
            "ticket store {} failed with status {status}: {}",
            operation.label(),
            truncate_for_error(body)
        )),
    }
}

fn error_message_from_body(body: &str) -> Option<String> {
    let payload = serde_json::from_str::<Value>(body).ok()?;
    ["error", "message"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn truncate_for_error(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= ERROR_BODY_PREVIEW_CHARS {
        return trimmed.to_owned();
    }
    let mut preview = trimmed
        .chars()
        .take(ERROR_BODY_PREVIEW_CHARS)
        .collect::<String>();
    preview.push_str("...");
    preview
}

fn decode_ticket(raw: Value) -> Result<Ticket, StoreError> {
    serde_json::from_value(raw).map_err(|error| {
        StoreError::DependencyUnavailable(format!("ticket payload decode failed: {error}"))
    })
}

fn extract_ticket(payload: Value) -> Result<Ticket, StoreError> {
    for key in ["ticket", "data"] {
        if let Some(inner) = payload.get(key).filter(|value| value.is_object()) {
            return decode_ticket(inner.clone());
        }
    }
    decode_ticket(payload)
}

fn extract_ticket_list(payload: Value) -> Result<Vec<Ticket>, StoreError> {
    let values = match payload {
        Value::Array(values) => values,
        Value::Object(mut map) => ["tickets", "data", "items"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(values)) => Some(values),
                _ => None,
            })
            .ok_or_else(|| {
                StoreError::DependencyUnavailable(
                    "ticket store response does not contain a ticket list".to_owned(),
                )
            })?,
        _ => {
            return Err(StoreError::DependencyUnavailable(
                "ticket store response does not contain a ticket list".to_owned(),
            ))
        }
    };

    values.into_iter().map(decode_ticket).collect()
}
