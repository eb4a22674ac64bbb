use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;

/// Read-only view of a Talk bot webhook payload.
///
/// All accessors are projections over the parsed envelope; nothing is mutated
/// or retained beyond the request that carried it.
#[derive(Debug, Clone, Deserialize)]
pub struct TalkEvent {
    actor: Actor,
    object: Object,
    target: Target,
}

#[derive(Debug, Clone, Deserialize)]
struct Actor {
    id: String,
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Object {
    id: i64,
    name: String,
    /// Nested JSON document; the chat text lives in its `message` field.
    content: String,
    #[serde(rename = "mediaType", default)]
    media_type: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Target {
    id: String,
    name: String,
}

impl TalkEvent {
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).context("invalid Talk event payload")
    }

    pub fn actor_id(&self) -> &str {
        &self.actor.id
    }

    pub fn actor_display_name(&self) -> &str {
        &self.actor.name
    }

    /// Message id, used as the reply target.
    pub fn object_id(&self) -> i64 {
        self.object.id
    }

    /// Event kind; only `"message"` events carry chat text.
    pub fn object_name(&self) -> &str {
        &self.object.name
    }

    pub fn object_media_type(&self) -> &str {
        &self.object.media_type
    }

    /// Opaque conversation identifier the event belongs to.
    pub fn conversation_token(&self) -> &str {
        &self.target.id
    }

    pub fn conversation_name(&self) -> &str {
        &self.target.name
    }

    /// Parse the nested `content` document.
    pub fn object_content(&self) -> Result<Value> {
        serde_json::from_str(&self.object.content).context("invalid event object content")
    }

    /// The chat message text carried in the event content.
    pub fn message_text(&self) -> Result<String> {
        self.object_content()?
            .get("message")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| anyhow!("event content has no message field"))
    }
}
