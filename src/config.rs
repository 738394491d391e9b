use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use anyhow::{Result, anyhow};

use crate::session::DEFAULT_MAX_HISTORY;
use crate::storage::LocalStorage;

pub const DEFAULT_BASE_URL: &str = "http://localhost:4321";

/// Settings stored in `<config_dir>/gemini-chat/config.json`
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub base_url: Option<String>,
    pub max_history_messages: Option<usize>,
    pub secret_key: Option<String>,
    pub predict_url: Option<String>,
    pub storage_path: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        Ok(())
    }

    /// Overwrite stored values with whatever was given on the command line
    pub fn merge(&mut self, args: ConfigArgs) {
        if args.base_url.is_some() {
            self.base_url = args.base_url;
        }
        if args.max_history.is_some() {
            self.max_history_messages = args.max_history;
        }
        if args.secret_key.is_some() {
            self.secret_key = args.secret_key;
        }
        if args.predict_url.is_some() {
            self.predict_url = args.predict_url;
        }
        if args.storage.is_some() {
            self.storage_path = args.storage;
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("gemini-chat").join("config.json"))
    }
}

/// Command-line and environment overrides; these win over the config file
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Base URL of the site serving /api/generate
    #[arg(long, env = "GEMINI_CHAT_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// How many of the most recent messages are sent with each request (0 = all)
    #[arg(long, env = "PUBLIC_MAX_HISTORY_MESSAGES", global = true)]
    pub max_history: Option<usize>,

    /// Key mixed into request signatures
    #[arg(long, env = "PUBLIC_SECRET_KEY", hide_env_values = true, global = true)]
    pub secret_key: Option<String>,

    /// Endpoint that returns input suggestions; prediction is off when unset
    #[arg(long, env = "GEMINI_CHAT_PREDICT_URL", global = true)]
    pub predict_url: Option<String>,

    /// Where chat history is kept
    #[arg(long, env = "GEMINI_CHAT_STORAGE", global = true)]
    pub storage: Option<PathBuf>,
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub max_history: usize,
    pub secret_key: Option<String>,
    pub predict_url: Option<String>,
    pub storage_path: PathBuf,
}

impl Settings {
    pub fn resolve(config: Config, args: ConfigArgs) -> Result<Self> {
        let storage_path = match args.storage.or(config.storage_path) {
            Some(path) => path,
            None => LocalStorage::default_path()?,
        };

        Ok(Self {
            base_url: args
                .base_url
                .or(config.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            max_history: args
                .max_history
                .or(config.max_history_messages)
                .unwrap_or(DEFAULT_MAX_HISTORY),
            secret_key: args.secret_key.or(config.secret_key),
            predict_url: args.predict_url.or(config.predict_url),
            storage_path,
        })
    }
}
