//! Session record and message types.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// History is bounded to the most recent 20 entries (10 exchanges).
pub const MAX_HISTORY: usize = 20;

/// Role in a follow-up conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message in a session's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Conversational state carried between diagnosis requests.
///
/// Owned exclusively by the store; callers receive clones and mutate only
/// through the store's operations.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Opaque store-generated identifier.
    pub id: String,

    /// Message history, oldest first, at most [`MAX_HISTORY`] entries.
    pub history: Vec<ChatMessage>,

    /// Last known clinical form, opaque to the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinical_context: Option<Value>,

    /// Last worker result, opaque to the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_result: Option<Value>,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Last access, used for TTL expiry. Not serialized.
    #[serde(skip)]
    pub(crate) last_activity: Instant,
}

impl Session {
    /// Create a fresh session with a newly generated id.
    pub(crate) fn new() -> Self {
        Self {
            id: generate_id(),
            history: Vec::new(),
            clinical_context: None,
            last_result: None,
            created_at: Utc::now(),
            last_activity: Instant::now(),
        }
    }

    /// Append a message, keeping only the most recent [`MAX_HISTORY`].
    pub(crate) fn push_message(&mut self, message: ChatMessage) {
        self.history.push(message);
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub(crate) fn is_expired(&self, ttl: Duration) -> bool {
        self.last_activity.elapsed() > ttl
    }
}

/// Generate a session id: time component plus a random component, unique
/// within a process run with overwhelming probability.
fn generate_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let random = Uuid::new_v4().simple().to_string();
    format!("sess_{}_{}", millis, &random[..9])
}
