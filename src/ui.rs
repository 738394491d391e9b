use ratatui::{
    Frame,
    layout::{Constraint, Layout, Margin, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
};
use crate::app::App;
use crate::message::ChatRole;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(bold_text, Style::default().add_modifier(Modifier::BOLD)));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Rows the chat text occupies once wrapped to `width` columns, using the same
/// word wrapping the chat paragraph renders with
fn wrapped_height(text: &Text, width: u16) -> u16 {
    if text.lines.is_empty() {
        return 0;
    }
    let rows = Paragraph::new(text.clone())
        .wrap(Wrap { trim: false })
        .line_count(width.max(1));
    rows.min(u16::MAX as usize) as u16
}

fn role_line(role: ChatRole) -> Line<'static> {
    match role {
        ChatRole::User => Line::from(Span::styled(
            "You:",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        ChatRole::Assistant => Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
    }
}

fn push_body(lines: &mut Vec<Line<'static>>, role: ChatRole, content: &str) {
    for line in content.lines() {
        match role {
            ChatRole::User => lines.push(Line::from(line.to_string())),
            ChatRole::Assistant => lines.push(parse_markdown_line(line)),
        }
    }
}

fn chat_lines(app: &App) -> Vec<Line<'static>> {
    let session = &app.session;
    let hint_style = Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC);
    let mut lines: Vec<Line<'static>> = Vec::new();

    let messages = session.messages();
    for (i, msg) in messages.iter().enumerate() {
        lines.push(role_line(msg.role));
        push_body(&mut lines, msg.role, &msg.content);

        let is_last = i + 1 == messages.len();
        if is_last && msg.role == ChatRole::Assistant && !session.is_loading() {
            lines.push(Line::from(Span::styled("↻ Ctrl+R to regenerate", hint_style)));
        }
        lines.push(Line::default());
    }

    if !session.draft().is_empty() {
        lines.push(role_line(ChatRole::Assistant));
        push_body(&mut lines, ChatRole::Assistant, session.draft());
        lines.push(Line::default());
    } else if session.is_loading() {
        lines.push(role_line(ChatRole::Assistant));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(format!("Thinking{}", dots), hint_style)));
        lines.push(Line::default());
    }

    if let Some(error) = session.error() {
        lines.push(Line::from(Span::styled(
            "Error:",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(error.to_string(), Style::default().fg(Color::Red))));
        lines.push(Line::from(Span::styled("↻ Ctrl+R to retry", hint_style)));
    }

    lines
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let suggestion_height = if app.prediction.suggestion().is_some() { 1 } else { 0 };

    let [header_area, chat_area, suggestion_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(suggestion_height),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    if suggestion_height > 0 {
        render_suggestion(app, frame, suggestion_area);
    }
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let stick = if app.scroll.is_stick() { " [follow]" } else { "" };

    let title = Line::from(vec![
        Span::styled(" Gemini Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(stick, Style::default().fg(Color::Green)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store area for mouse hit-testing
    app.chat_area = Some(area);

    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" {} messages ", app.session.messages().len()));

    let lines = chat_lines(app);
    // Layout runs even when empty so a cleared chat drops its old offset
    let text = if lines.is_empty() {
        app.scroll.layout(0, inner_height);
        Text::from(Span::styled(
            "Enter something...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let text = Text::from(lines);
        app.scroll.layout(wrapped_height(&text, inner_width), inner_height);
        text
    };

    let chat = Paragraph::new(text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll.offset(), 0));
    frame.render_widget(chat, area);

    let max_offset = app.scroll.max_offset();
    if max_offset > 0 {
        let mut scrollbar_state = ScrollbarState::new(max_offset as usize)
            .position(app.scroll.offset() as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area.inner(Margin { vertical: 1, horizontal: 0 }),
            &mut scrollbar_state,
        );
    }
}

fn render_suggestion(app: &App, frame: &mut Frame, area: Rect) {
    let suggestion = app.prediction.suggestion().unwrap_or_default();
    let line = Line::from(vec![
        Span::styled(" Suggested: ", Style::default().fg(Color::DarkGray)),
        Span::styled(suggestion.to_string(), Style::default().fg(Color::Magenta)),
        Span::styled("  (Tab to use)", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let loading = app.session.is_loading();
    let (title, border_color) = if loading {
        (" AI is thinking... (Esc to stop) ", Color::DarkGray)
    } else {
        (" Send (Enter) ", Color::Yellow)
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    if !loading {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = if app.session.is_loading() {
        vec![
            Span::styled(" Esc ", key_style),
            Span::styled(" stop ", label_style),
        ]
    } else {
        vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" ^R ", key_style),
            Span::styled(" retry ", label_style),
            Span::styled(" ^L ", key_style),
            Span::styled(" clear ", label_style),
        ]
    };

    if app.prediction.suggestion().is_some() {
        hints.extend(vec![
            Span::styled(" Tab ", key_style),
            Span::styled(" suggestion ", label_style),
        ]);
    }

    hints.extend(vec![
        Span::styled(" ↑/↓ ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" ^B ", key_style),
        Span::styled(if app.scroll.is_stick() { " unfollow " } else { " follow " }, label_style),
        Span::styled(" ^C ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    let footer = Paragraph::new(Line::from(hints)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}
