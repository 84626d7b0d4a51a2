//! New-ticket intake: local form validation, creation, and the background
//! confirmation email.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use helpdesk_domain::{Ticket, TicketId};
use helpdesk_ticketing::{
    CollaboratorError, CreateTicketRequest, DraftAssistant, DraftRequest, StoreError,
    TicketCreatedNotification, TicketNotifier, TicketStore,
};
use regex::Regex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::AppError;

pub const TICKET_ID_NOTICE: &str =
    "Keep this ticket id. It is the only way to follow up and it cannot be recovered.";

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketForm {
    pub email: String,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntakeField {
    Email,
    Message,
}

impl IntakeField {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Message => "message",
        }
    }
}

/// Per-field validation messages, ordered by field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<IntakeField, String>);

impl FieldErrors {
    pub fn get(&self, field: IntakeField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IntakeField, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }

    fn insert(&mut self, field: IntakeField, message: &str) {
        self.0.insert(field, message.to_owned());
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                formatter.write_str("; ")?;
            }
            write!(formatter, "{}: {message}", field.as_str())?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntakeError {
    #[error("ticket form is invalid: {0}")]
    Invalid(FieldErrors),
    #[error("no drafting assistant is configured")]
    AssistantUnavailable,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("drafting assistant failed: {0}")]
    Assistant(#[from] CollaboratorError),
}

impl IntakeError {
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<IntakeError> for AppError {
    fn from(value: IntakeError) -> Self {
        match value {
            IntakeError::Store(error) => AppError::from(error),
            IntakeError::Assistant(error) => AppError::from(error),
            other => AppError::validation(other.to_string()),
        }
    }
}

pub struct IntakeValidator;

impl IntakeValidator {
    pub fn is_valid_email(email: &str) -> bool {
        email_regex().is_match(email.trim())
    }

    /// Checks the form without touching the network and returns the request
    /// that would be sent, with values trimmed and a blank subject dropped.
    pub fn validate(form: &TicketForm) -> Result<CreateTicketRequest, FieldErrors> {
        let email = form.email.trim();
        let message = form.message.trim();
        let mut errors = FieldErrors::default();

        if email.is_empty() {
            errors.insert(IntakeField::Email, "email is required");
        } else if !Self::is_valid_email(email) {
            errors.insert(IntakeField::Email, "enter a valid email address");
        }
        if message.is_empty() {
            errors.insert(IntakeField::Message, "message is required");
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let subject = form.subject.trim();
        Ok(CreateTicketRequest {
            email: email.to_owned(),
            subject: (!subject.is_empty()).then(|| subject.to_owned()),
            message: message.to_owned(),
        })
    }
}

/// Proof of creation handed to the customer exactly once.
#[derive(Debug)]
pub struct TicketReceipt {
    ticket: Ticket,
    confirmation: Option<JoinHandle<()>>,
}

impl TicketReceipt {
    pub fn ticket_id(&self) -> &TicketId {
        &self.ticket.ticket_id
    }

    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    pub fn into_ticket(self) -> Ticket {
        self.ticket
    }

    pub fn notice(&self) -> &'static str {
        TICKET_ID_NOTICE
    }

    /// Waits up to `limit` for the confirmation email task. Long-lived
    /// callers can drop the receipt instead; a process about to exit has to
    /// wait or the send is lost with the runtime. Returns `false` when the
    /// task did not finish in time (it can be waited on again) or panicked.
    /// Delivery failures are logged by the task itself and count as finished.
    pub async fn wait_for_confirmation(&mut self, limit: Duration) -> bool {
        let Some(task) = self.confirmation.as_mut() else {
            return true;
        };
        let ticket_id = &self.ticket.ticket_id;
        match tokio::time::timeout(limit, task).await {
            Ok(Ok(())) => {
                self.confirmation = None;
                true
            }
            Ok(Err(error)) => {
                self.confirmation = None;
                warn!(ticket_id = %ticket_id, error = %error, "ticket confirmation task aborted");
                false
            }
            Err(_) => {
                warn!(
                    ticket_id = %ticket_id,
                    limit_ms = limit.as_millis() as u64,
                    "ticket confirmation email still pending"
                );
                false
            }
        }
    }
}

pub struct TicketIntake {
    store: Arc<dyn TicketStore>,
    notifier: Arc<dyn TicketNotifier>,
    assistant: Option<Arc<dyn DraftAssistant>>,
}

impl TicketIntake {
    pub fn new(store: Arc<dyn TicketStore>, notifier: Arc<dyn TicketNotifier>) -> Self {
        Self {
            store,
            notifier,
            assistant: None,
        }
    }

    pub fn with_assistant(mut self, assistant: Arc<dyn DraftAssistant>) -> Self {
        self.assistant = Some(assistant);
        self
    }

    /// Validates locally, creates the ticket, then sends the confirmation
    /// email in the background. A notifier failure never undoes creation.
    /// The send is tracked by the returned receipt; see
    /// [`TicketReceipt::wait_for_confirmation`].
    pub async fn submit(&self, form: &TicketForm) -> Result<TicketReceipt, IntakeError> {
        let request = IntakeValidator::validate(form).map_err(IntakeError::Invalid)?;
        let ticket = self.store.create_ticket(request).await?;
        info!(ticket_id = %ticket.ticket_id, "ticket created");

        let notification = TicketCreatedNotification {
            to: ticket.email.clone(),
            ticket_id: ticket.ticket_id.clone(),
            subject: ticket.subject.clone(),
            message: ticket
                .messages
                .first()
                .map(|message| message.message.clone())
                .unwrap_or_default(),
        };
        let notifier = Arc::clone(&self.notifier);
        let confirmation = tokio::spawn(async move {
            let ticket_id = notification.ticket_id.clone();
            if let Err(error) = notifier.notify_ticket_created(notification).await {
                warn!(ticket_id = %ticket_id, error = %error, "ticket confirmation email failed");
            }
        });

        Ok(TicketReceipt {
            ticket,
            confirmation: Some(confirmation),
        })
    }

    /// Suggests a reworded first message for the form. The form itself is
    /// left untouched; only the message has to be filled in.
    pub async fn suggest_message(&self, form: &TicketForm) -> Result<String, IntakeError> {
        let assistant = self
            .assistant
            .as_ref()
            .ok_or(IntakeError::AssistantUnavailable)?;
        let message = form.message.trim();
        if message.is_empty() {
            let mut errors = FieldErrors::default();
            errors.insert(IntakeField::Message, "message is required");
            return Err(IntakeError::Invalid(errors));
        }
        let subject = form.subject.trim();
        let suggestion = assistant
            .improve_message(DraftRequest {
                email: form.email.trim().to_owned(),
                subject: (!subject.is_empty()).then(|| subject.to_owned()),
                message: message.to_owned(),
            })
            .await?;
        Ok(suggestion)
    }
}
