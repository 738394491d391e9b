use serde::{Deserialize, Serialize};

use crate::message::{ChatMessage, ChatRole};

/// Role vocabulary of the generation endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamRole {
    User,
    Model,
}

impl From<ChatRole> for UpstreamRole {
    fn from(role: ChatRole) -> Self {
        match role {
            ChatRole::User => UpstreamRole::User,
            ChatRole::Assistant => UpstreamRole::Model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// One entry of the outgoing `messages` array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamMessage {
    pub role: UpstreamRole,
    pub parts: Vec<Part>,
}

impl UpstreamMessage {
    pub fn text(&self) -> &str {
        self.parts.first().map(|p| p.text.as_str()).unwrap_or_default()
    }
}

impl From<&ChatMessage> for UpstreamMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.into(),
            parts: vec![Part {
                text: msg.content.clone(),
            }],
        }
    }
}

/// Map roles, wrap bodies and collapse same-role runs to their last entry
pub fn normalize(messages: &[ChatMessage]) -> Vec<UpstreamMessage> {
    collapse_runs(messages.iter().map(UpstreamMessage::from).collect())
}

/// Keep only the last entry of every run of consecutive same-role messages
pub fn collapse_runs(messages: Vec<UpstreamMessage>) -> Vec<UpstreamMessage> {
    let mut out: Vec<UpstreamMessage> = Vec::with_capacity(messages.len());
    for msg in messages {
        match out.last_mut() {
            Some(prev) if prev.role == msg.role => *prev = msg,
            _ => out.push(msg),
        }
    }
    out
}

/// History as it is sent upstream.
///
/// Roles are mapped first, then only the last `max_history` entries are kept
/// (`0` keeps everything), then same-role runs are collapsed. The returned
/// text is the body of the latest message before collapsing, which is what the
/// request signature covers.
pub fn outgoing_history(messages: &[ChatMessage], max_history: usize) -> (Vec<UpstreamMessage>, String) {
    let start = if max_history == 0 {
        0
    } else {
        messages.len().saturating_sub(max_history)
    };

    let window: Vec<UpstreamMessage> = messages[start..].iter().map(UpstreamMessage::from).collect();
    let latest = window.last().map(|m| m.text().to_string()).unwrap_or_default();

    (collapse_runs(window), latest)
}
