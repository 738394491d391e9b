//! Terminal chat client for a Gemini generation endpoint.
//!
//! The conversation core ([`session`], [`normalize`], [`decode`]) is free of
//! terminal code; [`app`], [`handler`] and [`ui`] wire it into a ratatui front end.

pub mod app;
pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod handler;
pub mod message;
pub mod normalize;
pub mod persist;
pub mod predict;
pub mod scroll;
pub mod session;
pub mod signature;
pub mod storage;
pub mod tui;
pub mod ui;

pub use client::{GenerateClient, GenerateRequest};
pub use config::{Config, ConfigArgs, Settings};
pub use error::ChatError;
pub use message::{ChatMessage, ChatRole, ErrorMessage};
pub use session::{ChatSession, StreamEvent, TurnId, TurnUpdate};
pub use signature::{Sha256Signer, Signer};
pub use storage::LocalStorage;
