use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the channel client and its collaborators.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("unsupported event type: {0}")]
    UnsupportedMessageKind(String),
    #[error("invalid {kind} payload")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("teams channel for bot '{0}' is not initialized")]
    NotInitialized(String),
    #[error("delivery failed")]
    Delivery(#[from] AdapterError),
    #[error("conversation store failure")]
    Store(#[from] StoreError),
    #[error("event bus failure")]
    Bus(#[source] anyhow::Error),
}

/// Errors raised by the platform adapter while delivering an activity.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("connector request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connector transport error: {0}")]
    Transport(String),
    #[error("connector rejected activity: status={status} body={body}")]
    Rejected { status: u16, body: String },
    #[error("invalid conversation reference: {0}")]
    InvalidReference(String),
}

impl AdapterError {
    /// Whether a later attempt might succeed. The bridge itself never retries.
    pub fn is_transient(&self) -> bool {
        match self {
            AdapterError::Timeout(_) | AdapterError::Transport(_) => true,
            AdapterError::Rejected { status, .. } => *status == 429 || *status >= 500,
            AdapterError::InvalidReference(_) => false,
        }
    }
}

/// Durable key-value store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error")]
    Backend(#[source] anyhow::Error),
    #[error("failed to decode stored value for key '{key}'")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
