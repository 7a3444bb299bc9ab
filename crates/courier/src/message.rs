//! Courier message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery state of a queued message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Queued,
    Sent,
    Failed,
}

/// A mail queue entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message in `queued` state.
    pub fn queued(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
            status: MessageStatus::Queued,
            created_at: Utc::now(),
        }
    }
}

/// The mail sent when a verifiable address must be proven.
pub fn verification_message(address: &str) -> Message {
    Message::queued(
        address,
        "Please verify your email address",
        format!(
            "Hi,\n\nplease verify your email address {address} by clicking the \
             verification link we sent you.\n\nIf you did not request this, you \
             can safely ignore this message.\n"
        ),
    )
}
