//! Input-prediction hook.
//!
//! Every edit of the input field may start a prediction request. Requests are
//! numbered and only the result of the most recently issued one is kept, so a
//! slow answer for an older keystroke can't replace a newer suggestion.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, text: &str) -> Result<String>;
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    text: &'a str,
}

/// Asks an HTTP endpoint for a completion; the response body is the suggestion
#[derive(Clone, Debug)]
pub struct HttpPredictor {
    client: Client,
    url: String,
}

impl HttpPredictor {
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn predict(&self, text: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .json(&PredictRequest { text })
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?.trim().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionSeq(u64);

#[derive(Debug, Default)]
pub struct PredictionHook {
    suggestion: String,
    issued: u64,
}

impl PredictionHook {
    pub fn suggestion(&self) -> Option<&str> {
        (!self.suggestion.is_empty()).then_some(self.suggestion.as_str())
    }

    /// React to an input edit. Returns a sequence token when a prediction
    /// should be requested for `input`.
    pub fn on_input(&mut self, input: &str) -> Option<PredictionSeq> {
        self.issued += 1;
        if input.is_empty() {
            self.suggestion.clear();
            return None;
        }
        Some(PredictionSeq(self.issued))
    }

    /// Store a finished prediction. Stale results are dropped.
    pub fn resolve(&mut self, seq: PredictionSeq, result: Result<String>) -> bool {
        if seq.0 != self.issued {
            return false;
        }
        match result {
            Ok(suggestion) => {
                self.suggestion = suggestion;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "input prediction failed");
                false
            }
        }
    }

    /// The suggestion to write into the input field
    pub fn accept(&self) -> Option<String> {
        self.suggestion().map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_prediction_wins() {
        let mut hook = PredictionHook::default();
        let first = hook.on_input("hel").unwrap();
        let second = hook.on_input("hell").unwrap();

        assert!(hook.resolve(second, Ok("hello".to_string())));
        // Slower answer for the older keystroke arrives afterwards
        assert!(!hook.resolve(first, Ok("help".to_string())));
        assert_eq!(hook.suggestion(), Some("hello"));
    }

    #[test]
    fn test_empty_input_clears_suggestion() {
        let mut hook = PredictionHook::default();
        let seq = hook.on_input("h").unwrap();
        hook.resolve(seq, Ok("hi".to_string()));

        assert!(hook.on_input("").is_none());
        assert_eq!(hook.suggestion(), None);
        assert!(!hook.resolve(seq, Ok("hi".to_string())));
    }

    #[test]
    fn test_accept_returns_suggestion() {
        let mut hook = PredictionHook::default();
        assert_eq!(hook.accept(), None);
        let seq = hook.on_input("wha").unwrap();
        hook.resolve(seq, Ok("what time is it".to_string()));
        assert_eq!(hook.accept().as_deref(), Some("what time is it"));
    }

    #[test]
    fn test_failed_prediction_keeps_previous_suggestion() {
        let mut hook = PredictionHook::default();
        let seq = hook.on_input("a").unwrap();
        hook.resolve(seq, Ok("abc".to_string()));
        let seq = hook.on_input("ab").unwrap();
        assert!(!hook.resolve(seq, Err(anyhow::anyhow!("timeout"))));
        assert_eq!(hook.suggestion(), Some("abc"));
    }

    struct Echo;

    #[async_trait]
    impl Predictor for Echo {
        async fn predict(&self, text: &str) -> Result<String> {
            Ok(format!("{text}!"))
        }
    }

    #[tokio::test]
    async fn test_predictor_trait_object() {
        let predictor: std::sync::Arc<dyn Predictor> = std::sync::Arc::new(Echo);
        let mut hook = PredictionHook::default();
        let seq = hook.on_input("hey").unwrap();
        let result = predictor.predict("hey").await;
        assert!(hook.resolve(seq, result));
        assert_eq!(hook.suggestion(), Some("hey!"));
    }
}
