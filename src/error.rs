use thiserror::Error;

use crate::models::BookingStatus;
use crate::workflow::Actor;

/// Failure fallback shown to users when the smart-match classifier misbehaves.
pub const SMART_MATCH_FALLBACK: &str =
    "Sorry, I had trouble understanding that. Could you try rephrasing your request or searching manually?";

#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Validation(String),

    #[error("{actor} cannot move booking '{booking_id}' from {from} to {to}")]
    InvalidTransition {
        booking_id: String,
        actor: Actor,
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("booking '{0}' was modified concurrently, reload and retry")]
    Conflict(String),

    #[error("smart match failed: {0}")]
    Collaborator(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl MarketplaceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Text safe to show to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Collaborator(_) => SMART_MATCH_FALLBACK.to_string(),
            Self::Storage(_) | Self::Config(_) => {
                "Something went wrong on our side, please try again later.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for MarketplaceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("document encoding failed: {err}"))
    }
}

pub type Result<T, E = MarketplaceError> = std::result::Result<T, E>;
