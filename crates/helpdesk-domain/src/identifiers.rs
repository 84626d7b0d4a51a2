use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-issued ticket key. The only value a customer has to keep.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Normalizes an id typed or pasted by a person. Returns `None` for blank input.
    pub fn from_user_input(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<String> for TicketId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TicketId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::TicketId;

    #[test]
    fn from_user_input_trims_and_rejects_blank_values() {
        assert_eq!(
            TicketId::from_user_input("  TKT-1A2B3C4D \n"),
            Some(TicketId::new("TKT-1A2B3C4D"))
        );
        assert_eq!(TicketId::from_user_input("   "), None);
    }

    #[test]
    fn ticket_id_serializes_as_plain_string() {
        let encoded = serde_json::to_string(&TicketId::new("TKT-42")).expect("encode id");
        assert_eq!(encoded, "\"TKT-42\"");
    }
}
