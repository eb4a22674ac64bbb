/// Bridges chat mentions to the task queue and task completions back to chat.
///
/// Correlation is carried entirely in the completion webhook URL; the relay
/// itself keeps no per-task state.
use std::sync::Arc;

use anyhow::{Result, bail};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::platform::PlatformClient;
use crate::talk::TalkClient;
use crate::talk::event::TalkEvent;

/// Mention token that addresses the assistant in a chat message.
pub const MENTION_TOKEN: &str = "@assistant";

const SCHEDULE_ERROR_PREFIX: &str = "ERROR: Unable to process request";
const GENERATION_FAILED_NOTICE: &str = "ERROR: Failed to generate message, please try again later";

/// Extract the prompt from a chat message: everything after the first
/// case-insensitive `@assistant` that is immediately followed by whitespace,
/// to the end of the text (newlines included), trimmed.
///
/// `None` means the message does not address the assistant and is discarded
/// without a reply: noise filtering, not an error.
pub fn extract_prompt(text: &str) -> Option<String> {
    let token_len = MENTION_TOKEN.len();
    let mut start = 0;
    while start + token_len <= text.len() {
        let idx = start + find_ascii_case_insensitive(&text[start..], MENTION_TOKEN)?;
        let rest = &text[idx + token_len..];
        let mut chars = rest.chars();
        match chars.next() {
            Some(c) if c.is_whitespace() => return Some(chars.as_str().trim().to_string()),
            // Token embedded in a longer word ("@assistants"): keep scanning
            _ => start = idx + token_len,
        }
    }
    None
}

/// Byte-wise case-insensitive substring search; the needle must be ASCII, so
/// a match can never start or end inside a multi-byte character.
fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len()).find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}

/// Final state of a scheduled generation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Successful,
    Failed,
    Cancelled,
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskOutput {
    pub output: String,
}

/// Completion notice delivered by the platform's task webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskCompletion {
    pub status: String,
    #[serde(default)]
    pub output: Option<TaskOutput>,
}

impl TaskCompletion {
    pub fn status(&self) -> TaskStatus {
        match self.status.as_str() {
            "STATUS_SUCCESSFUL" => TaskStatus::Successful,
            "STATUS_FAILED" => TaskStatus::Failed,
            "STATUS_CANCELLED" => TaskStatus::Cancelled,
            _ => TaskStatus::Other,
        }
    }
}

/// Wire envelope of the completion webhook body.
#[derive(Debug, Deserialize)]
pub struct CompletionEnvelope {
    pub task: TaskCompletion,
}

pub struct Relay {
    platform: Arc<PlatformClient>,
    talk: Arc<TalkClient>,
    bot_route: String,
}

impl Relay {
    pub fn new(platform: Arc<PlatformClient>, talk: Arc<TalkClient>, bot_route: String) -> Self {
        Self {
            platform,
            talk,
            bot_route,
        }
    }

    /// Handle a verified chat message: extract the prompt and schedule a
    /// generation task whose completion webhook encodes the reply target.
    ///
    /// A platform-side scheduling error is relayed into the conversation as a
    /// short notice; a message without a mention is dropped silently.
    pub async fn process_message(&self, event: &TalkEvent) -> Result<()> {
        let text = event.message_text()?;
        let Some(prompt) = extract_prompt(&text) else {
            debug!("message {} has no mention, ignoring", event.object_id());
            return Ok(());
        };

        let webhook_uri = format!(
            "/message?reply_to={}&token={}",
            event.object_id(),
            urlencoding::encode(event.conversation_token())
        );
        let webhook_method = format!("AppAPI:{}:POST", self.bot_route);
        info!(
            "scheduling generation task for message {} in {}",
            event.object_id(),
            event.conversation_token()
        );

        let data = self
            .platform
            .schedule_text_task(&prompt, &self.bot_route, &webhook_uri, &webhook_method)
            .await?;

        if let Some(message) = data.get("message").and_then(Value::as_str) {
            warn!("platform rejected task: {}", message);
            self.talk
                .send_message(
                    &format!("{} ({})", SCHEDULE_ERROR_PREFIX, message),
                    event.object_id(),
                    event.conversation_token(),
                    false,
                )
                .await?;
        }
        Ok(())
    }

    /// Dispatch `process_message` as a background unit of work so the webhook
    /// response never waits on the platform. Failures here are only
    /// observable as an absent reply; they are logged, not propagated.
    pub fn spawn_process(self: Arc<Self>, event: TalkEvent) {
        tokio::spawn(async move {
            if let Err(e) = self.process_message(&event).await {
                error!("failed to process message {}: {}", event.object_id(), e);
            }
        });
    }

    /// Drive the reply for a completed task, correlated purely through the
    /// `reply_to`/`token` pair baked into the webhook URL.
    pub async fn handle_completion(
        &self,
        reply_to: i64,
        token: &str,
        completion: &TaskCompletion,
    ) -> Result<()> {
        match completion.status() {
            TaskStatus::Successful => {
                let Some(output) = completion.output.as_ref() else {
                    bail!("successful task completion carries no output");
                };
                self.talk
                    .send_message(&output.output, reply_to, token, false)
                    .await?;
            }
            TaskStatus::Failed => {
                self.talk
                    .send_message(GENERATION_FAILED_NOTICE, reply_to, token, false)
                    .await?;
            }
            TaskStatus::Cancelled | TaskStatus::Other => {
                debug!(
                    "task for reply_to={} ended as {}, no reply",
                    reply_to, completion.status
                );
            }
        }
        Ok(())
    }
}
