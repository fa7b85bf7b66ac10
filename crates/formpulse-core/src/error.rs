use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormpulseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid form identifier: {raw:?}")]
    InvalidIdentifier { raw: String },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Event queue saturated, update for form {form_id} dropped")]
    EventQueueSaturated { form_id: String },

    #[error("Hub has stopped")]
    HubStopped,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FormpulseError {
    /// Short error code string sent to HTTP callers in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            FormpulseError::Config(_) => "CONFIG_ERROR",
            FormpulseError::InvalidIdentifier { .. } => "INVALID_IDENTIFIER",
            FormpulseError::Transport(_) => "TRANSPORT_FAILURE",
            FormpulseError::EventQueueSaturated { .. } => "EVENT_QUEUE_SATURATED",
            FormpulseError::HubStopped => "HUB_STOPPED",
            FormpulseError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    pub fn invalid_identifier(raw: impl Into<String>) -> Self {
        FormpulseError::InvalidIdentifier { raw: raw.into() }
    }
}

pub type Result<T> = std::result::Result<T, FormpulseError>;
