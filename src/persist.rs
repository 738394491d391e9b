//! Mirrors chat history and the stick-to-bottom flag into [`LocalStorage`].

use crate::message::ChatMessage;
use crate::storage::LocalStorage;

pub const MESSAGE_LIST_KEY: &str = "messageList";
pub const STICK_KEY: &str = "stickToBottom";
pub const STICK_VALUE: &str = "stick";
pub const PASS_KEY: &str = "pass";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Restored {
    pub messages: Vec<ChatMessage>,
    pub stick: bool,
}

/// Best-effort read at startup. Never fails: bad data is logged and skipped.
pub fn restore(storage: &LocalStorage) -> Restored {
    let messages = match storage.get_item(MESSAGE_LIST_KEY) {
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable messageList");
            Vec::new()
        }),
        None => Vec::new(),
    };

    Restored {
        messages,
        stick: storage.get_item(STICK_KEY) == Some(STICK_VALUE),
    }
}

/// Write the current state back; the stick key is removed when unset
pub fn snapshot(storage: &mut LocalStorage, messages: &[ChatMessage], stick: bool) -> anyhow::Result<()> {
    storage.set_item(MESSAGE_LIST_KEY, serde_json::to_string(messages)?);
    if stick {
        storage.set_item(STICK_KEY, STICK_VALUE);
    } else {
        storage.remove_item(STICK_KEY);
    }
    storage.save()
}

pub fn passphrase(storage: &LocalStorage) -> Option<String> {
    storage.get_item(PASS_KEY).map(str::to_string)
}
