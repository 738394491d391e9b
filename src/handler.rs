use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use crate::app::App;
use crate::tui::AppEvent;

/// Lines moved per mouse wheel notch
const WHEEL_LINES: u16 = 3;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Apply one event to the app; failures inside are logged where they happen
pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
        AppEvent::Turn(id, event) => app.on_turn_event(id, event),
        AppEvent::Prediction(seq, result) => app.on_prediction(seq, result),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    if ctrl {
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => app.should_quit = true,
            KeyCode::Char('r') => app.retry(),
            KeyCode::Char('l') => app.clear(),
            KeyCode::Char('b') => app.toggle_stick(),
            KeyCode::Char('d') => {
                app.scroll.smooth_to_bottom(std::time::Instant::now());
            }
            KeyCode::Char('a') => app.input_cursor = 0,
            KeyCode::Char('e') => app.input_cursor = app.input.chars().count(),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Enter => {
            // Sending is disabled while a reply is streaming
            if !app.session.is_loading() {
                app.submit();
            }
        }
        KeyCode::Esc => app.stop(),
        KeyCode::Tab => app.accept_suggestion(),

        // Chat scrolling
        KeyCode::Up => app.scroll.scroll_up(1),
        KeyCode::Down => app.scroll.scroll_down(1),
        KeyCode::PageUp => app.scroll.scroll_up(page(app)),
        KeyCode::PageDown => app.scroll.scroll_down(page(app)),

        // Input editing
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
                app.on_input_changed();
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.input_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
                app.on_input_changed();
            }
        }
        KeyCode::Left => {
            app.input_cursor = app.input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.input_cursor = (app.input_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.input_cursor = 0;
        }
        KeyCode::End => {
            app.input_cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(byte_pos, c);
            app.input_cursor += 1;
            app.on_input_changed();
        }
        _ => {}
    }
}

/// Half the visible chat height
fn page(app: &App) -> u16 {
    app.chat_area
        .map(|area| area.height.saturating_sub(2) / 2)
        .unwrap_or(10)
        .max(1)
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .is_some_and(|area| point_in_rect(mouse.column, mouse.row, area));
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollUp => app.scroll.scroll_up(WHEEL_LINES),
        MouseEventKind::ScrollDown => app.scroll.scroll_down(WHEEL_LINES),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use tokio::sync::mpsc;

    fn test_app(dir: &tempfile::TempDir) -> App {
        let settings = Settings {
            base_url: "http://127.0.0.1:9".to_string(),
            max_history: 99,
            secret_key: None,
            predict_url: None,
            storage_path: dir.path().join("storage.json"),
        };
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(&settings, tx)
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn test_ctrl_c_quits() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        handle_event(&mut app, key(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);
    }

    #[test]
    fn test_typing_edits_at_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        for c in "héo".chars() {
            handle_event(&mut app, key(KeyCode::Char(c), KeyModifiers::NONE));
        }
        handle_event(&mut app, key(KeyCode::Left, KeyModifiers::NONE));
        handle_event(&mut app, key(KeyCode::Char('l'), KeyModifiers::NONE));
        handle_event(&mut app, key(KeyCode::Backspace, KeyModifiers::NONE));
        handle_event(&mut app, key(KeyCode::Char('y'), KeyModifiers::NONE));
        assert_eq!(app.input, "héyo");
        assert_eq!(app.input_cursor, 3);
    }

    #[test]
    fn test_up_arrow_releases_stick() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.toggle_stick();
        assert!(app.scroll.is_stick());
        handle_event(&mut app, key(KeyCode::Up, KeyModifiers::NONE));
        assert!(!app.scroll.is_stick());
    }

    #[test]
    fn test_char_to_byte_index_multibyte() {
        let s = "aé日b";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 2), 3);
        assert_eq!(char_to_byte_index(s, 3), 6);
        assert_eq!(char_to_byte_index(s, 10), s.len());
    }

    #[test]
    fn test_point_in_rect() {
        let rect = Rect::new(2, 2, 4, 3);
        assert!(point_in_rect(2, 2, rect));
        assert!(point_in_rect(5, 4, rect));
        assert!(!point_in_rect(6, 4, rect));
        assert!(!point_in_rect(1, 3, rect));
    }
}
