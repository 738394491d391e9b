//! UI-agnostic chat types
//!
//! These are shared by the interactive client and the headless subcommands, and
//! are the exact shapes written to the `messageList` storage key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Structured error returned by the generation endpoint inside `{ "error": ... }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code.is_empty(), self.message.is_empty()) {
            (true, true) => write!(f, "unknown error"),
            (true, false) => write!(f, "{}", self.message),
            (false, true) => write!(f, "{}", self.code),
            (false, false) => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);

        let msg: ChatMessage = serde_json::from_str(r#"{"role":"user","content":"yo"}"#).unwrap();
        assert_eq!(msg, ChatMessage::user("yo"));
    }

    #[test]
    fn test_error_message_fields_default() {
        let err: ErrorMessage = serde_json::from_str(r#"{"message":"quota"}"#).unwrap();
        assert_eq!(err.code, "");
        assert_eq!(err.to_string(), "quota");

        let err = ErrorMessage {
            code: "401".to_string(),
            message: "bad pass".to_string(),
        };
        assert_eq!(err.to_string(), "401: bad pass");
    }
}
