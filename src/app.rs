use std::sync::Arc;
use std::time::Instant;

use ratatui::layout::Rect;
use tokio::sync::mpsc;

use crate::client::{GenerateClient, GenerateRequest};
use crate::config::Settings;
use crate::error::ChatError;
use crate::persist;
use crate::predict::{HttpPredictor, PredictionHook, PredictionSeq, Predictor};
use crate::scroll::ScrollState;
use crate::session::{ChatSession, StreamEvent, TurnId, TurnRequest, TurnUpdate};
use crate::signature::{Sha256Signer, Signer};
use crate::storage::LocalStorage;
use crate::tui::AppEvent;

pub struct App {
    pub should_quit: bool,

    // Chat state
    pub session: ChatSession,
    pub scroll: ScrollState,
    pub prediction: PredictionHook,

    // Input field
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Chat pane area for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,

    storage: LocalStorage,
    client: GenerateClient,
    signer: Arc<dyn Signer>,
    predictor: Option<Arc<dyn Predictor>>,
    events: mpsc::UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(settings: &Settings, events: mpsc::UnboundedSender<AppEvent>) -> Self {
        let storage = LocalStorage::open(&settings.storage_path);
        let restored = persist::restore(&storage);
        tracing::info!(
            messages = restored.messages.len(),
            stick = restored.stick,
            path = %storage.path().display(),
            "restored chat history"
        );

        let mut session = ChatSession::new(settings.max_history);
        session.restore(restored.messages);

        let predictor = settings
            .predict_url
            .as_deref()
            .map(|url| Arc::new(HttpPredictor::new(url)) as Arc<dyn Predictor>);

        let mut scroll = ScrollState::new(restored.stick);
        if restored.stick {
            scroll.instant_to_bottom();
        }

        Self {
            should_quit: false,
            session,
            scroll,
            prediction: PredictionHook::default(),
            input: String::new(),
            input_cursor: 0,
            animation_frame: 0,
            chat_area: None,
            storage,
            client: GenerateClient::new(&settings.base_url),
            signer: Arc::new(Sha256Signer::new(settings.secret_key.as_deref())),
            predictor,
            events,
        }
    }

    /// Send the input field as a new user message
    pub fn submit(&mut self) {
        match self.session.send(&self.input) {
            Ok(turn) => {
                self.input.clear();
                self.input_cursor = 0;
                self.prediction.on_input("");
                self.dispatch(turn);
                self.scroll.follow();
            }
            Err(ChatError::EmptyInput) => {}
            Err(e) => tracing::debug!(error = %e, "send ignored"),
        }
    }

    pub fn retry(&mut self) {
        match self.session.retry() {
            Ok(Some(turn)) => self.dispatch(turn),
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "retry ignored"),
        }
    }

    pub fn stop(&mut self) {
        if self.session.stop() {
            self.scroll.follow();
        }
    }

    pub fn clear(&mut self) {
        self.session.clear();
        self.input.clear();
        self.input_cursor = 0;
        self.prediction.on_input("");
    }

    pub fn toggle_stick(&mut self) {
        self.scroll.toggle_stick(Instant::now());
    }

    fn dispatch(&mut self, turn: TurnRequest) {
        let id = turn.id;
        let request = GenerateRequest::new(
            turn,
            chrono::Utc::now().timestamp_millis(),
            persist::passphrase(&self.storage),
            self.signer.as_ref(),
        );

        let client = self.client.clone();
        let tx = self.events.clone();
        let task = tokio::spawn(async move {
            client
                .stream_turn(request, |event| {
                    let _ = tx.send(AppEvent::Turn(id, event));
                })
                .await;
        });
        self.session.attach(id, task.abort_handle());
    }

    pub fn on_turn_event(&mut self, id: TurnId, event: StreamEvent) {
        match self.session.apply(id, event) {
            TurnUpdate::Ignored => {}
            TurnUpdate::Appended(_) | TurnUpdate::Skipped | TurnUpdate::Finished { .. } => {
                self.scroll.follow();
            }
        }
    }

    /// Called after every edit of the input field
    pub fn on_input_changed(&mut self) {
        let Some(seq) = self.prediction.on_input(&self.input) else {
            return;
        };
        let Some(predictor) = self.predictor.clone() else {
            return;
        };

        let text = self.input.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = predictor.predict(&text).await;
            let _ = tx.send(AppEvent::Prediction(seq, result));
        });
    }

    pub fn on_prediction(&mut self, seq: PredictionSeq, result: anyhow::Result<String>) {
        self.prediction.resolve(seq, result);
    }

    /// Overwrite the input field with the current suggestion
    pub fn accept_suggestion(&mut self) {
        if let Some(suggestion) = self.prediction.accept() {
            self.input_cursor = suggestion.chars().count();
            self.input = suggestion;
        }
    }

    /// Tick animation frame and smooth scrolling (called by Tick event)
    pub fn tick(&mut self) {
        if self.session.is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.scroll.tick();
    }

    /// Write history and the stick flag back to storage (on exit)
    pub fn persist(&mut self) -> anyhow::Result<()> {
        persist::snapshot(&mut self.storage, self.session.messages(), self.scroll.is_stick())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handle_event;
    use crate::message::ChatMessage;
    use bytes::Bytes;
    use std::path::PathBuf;

    fn settings(storage_path: PathBuf) -> Settings {
        Settings {
            // Nothing listens here; requests fail fast
            base_url: "http://127.0.0.1:9".to_string(),
            max_history: 99,
            secret_key: None,
            predict_url: None,
            storage_path,
        }
    }

    #[tokio::test]
    async fn test_history_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let (tx, _rx) = mpsc::unbounded_channel();

        let mut app = App::new(&settings(path.clone()), tx.clone());
        app.session.restore(vec![ChatMessage::user("q"), ChatMessage::assistant("a")]);
        app.toggle_stick();
        app.persist().unwrap();

        let app = App::new(&settings(path), tx);
        assert_eq!(app.session.messages().len(), 2);
        assert!(app.scroll.is_stick());
    }

    #[tokio::test]
    async fn test_submit_clears_input_and_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut app = App::new(&settings(dir.path().join("s.json")), tx);

        app.input = "hello".to_string();
        app.input_cursor = 5;
        app.submit();
        assert!(app.input.is_empty());
        assert!(app.session.is_loading());

        // Second submit while loading is refused
        app.input = "again".to_string();
        app.submit();
        assert_eq!(app.input, "again");

        loop {
            match rx.recv().await.unwrap() {
                AppEvent::Turn(id, event) => {
                    let done = matches!(event, StreamEvent::Failed(_) | StreamEvent::End);
                    app.on_turn_event(id, event);
                    if done {
                        break;
                    }
                }
                _ => {}
            }
        }
        assert!(!app.session.is_loading());
        assert_eq!(app.session.messages(), &[ChatMessage::user("hello")]);
    }

    /// Start a turn and lay out 100 lines of content in a 20 line viewport
    fn streaming_app(dir: &tempfile::TempDir, stick: bool) -> (App, TurnId) {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(&settings(dir.path().join("s.json")), tx);
        app.scroll = ScrollState::new(stick);

        app.input = "hello".to_string();
        app.submit();
        app.scroll.layout(100, 20);
        let id = app.session.active_turn().unwrap();
        (app, id)
    }

    #[tokio::test]
    async fn test_stream_events_repin_when_stuck() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, id) = streaming_app(&dir, true);
        assert_eq!(app.scroll.offset(), 80);

        handle_event(&mut app, AppEvent::Turn(id, StreamEvent::Chunk(Bytes::from_static(b"Hi"))));
        app.scroll.layout(120, 20);
        assert_eq!(app.scroll.offset(), 100);

        handle_event(&mut app, AppEvent::Turn(id, StreamEvent::End));
        app.scroll.layout(130, 20);
        assert_eq!(app.scroll.offset(), 110);
        assert_eq!(app.session.messages().last(), Some(&ChatMessage::assistant("Hi")));
    }

    #[tokio::test]
    async fn test_stream_events_leave_unstuck_view_alone() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, id) = streaming_app(&dir, false);
        assert_eq!(app.scroll.offset(), 0);

        handle_event(&mut app, AppEvent::Turn(id, StreamEvent::Chunk(Bytes::from_static(b"Hi"))));
        app.scroll.layout(120, 20);
        assert_eq!(app.scroll.offset(), 0);

        handle_event(&mut app, AppEvent::Turn(id, StreamEvent::End));
        app.scroll.layout(130, 20);
        assert_eq!(app.scroll.offset(), 0);
    }

    #[tokio::test]
    async fn test_accept_suggestion_moves_cursor_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(&settings(dir.path().join("s.json")), tx);

        app.input = "wh".to_string();
        let seq = app.prediction.on_input(&app.input).unwrap();
        app.on_prediction(seq, Ok("what is rust".to_string()));
        app.accept_suggestion();

        assert_eq!(app.input, "what is rust");
        assert_eq!(app.input_cursor, 12);
    }
}
