use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Role supplied by the identity collaborator for the authenticated caller.
///
/// `System` is reserved for trusted internal callers (payment confirmation,
/// order conversion); it is never accepted from an end-user session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Customer,
    Tailor,
    Admin,
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Tailor => "tailor",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }
}

impl std::str::FromStr for ActorRole {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "tailor" => Ok(Self::Tailor),
            "admin" => Ok(Self::Admin),
            "system" => Ok(Self::System),
            other => Err(DomainError::Validation(format!(
                "unknown actor role `{other}` (expected customer|tailor|admin|system)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn customer(id: impl Into<String>) -> Self {
        Self { id: id.into(), role: ActorRole::Customer }
    }

    pub fn tailor(id: impl Into<String>) -> Self {
        Self { id: id.into(), role: ActorRole::Tailor }
    }

    pub fn system() -> Self {
        Self { id: "system".to_string(), role: ActorRole::System }
    }
}
