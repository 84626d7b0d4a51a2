use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Closed,
}

impl TicketStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    #[default]
    User,
    Admin,
}

impl Sender {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    pub fn from_key(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Sender, TicketStatus};

    #[test]
    fn status_and_sender_use_lowercase_wire_names() {
        assert_eq!(
            serde_json::to_string(&TicketStatus::Closed).expect("encode status"),
            "\"closed\""
        );
        assert_eq!(
            serde_json::from_str::<Sender>("\"admin\"").expect("decode sender"),
            Sender::Admin
        );
    }

    #[test]
    fn sender_from_key_is_case_insensitive() {
        assert_eq!(Sender::from_key(" Admin "), Some(Sender::Admin));
        assert_eq!(Sender::from_key("USER"), Some(Sender::User));
        assert_eq!(Sender::from_key("operator"), None);
    }

    #[test]
    fn only_closed_is_terminal() {
        assert!(TicketStatus::Closed.is_terminal());
        assert!(!TicketStatus::Open.is_terminal());
    }
}
