use reqwest::StatusCode;
use thiserror::Error;

use crate::message::ErrorMessage;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("message is empty")]
    EmptyInput,

    #[error("a reply is still streaming")]
    Busy,

    /// Structured error from the endpoint; this is the only kind shown in the chat pane
    #[error("{0}")]
    Upstream(ErrorMessage),

    #[error("request failed with status {0}")]
    UnexpectedStatus(StatusCode),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl ChatError {
    /// The payload to put in the error slot, if this failure has one
    pub fn upstream(&self) -> Option<&ErrorMessage> {
        match self {
            ChatError::Upstream(err) => Some(err),
            _ => None,
        }
    }
}
