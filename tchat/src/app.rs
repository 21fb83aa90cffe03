//! Application state and event handling.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tchat_proto::message::SYSTEM_SERVICE_ID;

use crate::chat::DisplaySink;
use crate::chat::format::render;

/// One delivered line: author plus an already-wrapped body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    /// Service id the line is attributed to.
    pub author: String,
    /// Wrapped body; may contain `"\n "` breaks.
    pub body: String,
}

impl ChatLine {
    /// Whether this line is an infrastructure notice.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.author == SYSTEM_SERVICE_ID
    }
}

/// The chat view's display state: the cumulative rendered text plus the
/// structured lines it was built from.
#[derive(Debug, Default)]
pub struct ChatLog {
    buffer: String,
    lines: Vec<ChatLine>,
}

impl ChatLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything rendered so far, one `"<id>> <body>\n"` record per line.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Delivered lines in arrival order.
    #[must_use]
    pub fn lines(&self) -> &[ChatLine] {
        &self.lines
    }

    /// Number of terminal rows the log occupies.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.lines.iter().map(|l| l.body.split('\n').count()).sum()
    }
}

impl DisplaySink for ChatLog {
    fn push_line(&mut self, author: &str, body: &str) {
        self.buffer.push_str(&render(author, body));
        self.lines.push(ChatLine {
            author: author.to_string(),
            body: body.to_string(),
        });
    }
}

/// Main application state.
pub struct App {
    /// Current text input.
    pub input: String,
    /// Cursor position in input (character index).
    pub cursor_position: usize,
    /// Received and echoed messages.
    pub log: ChatLog,
    /// Rows scrolled back from the bottom of the log.
    pub scroll_back: usize,
    /// Peer id messages are addressed to.
    pub destination: String,
    /// This client's own service id.
    pub service_id: String,
    /// A send is in flight.
    pub sending: bool,
    /// Whether the app should quit.
    pub should_quit: bool,
}

impl App {
    /// Create the application for a conversation with `destination`.
    #[must_use]
    pub fn new(service_id: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            input: String::new(),
            cursor_position: 0,
            log: ChatLog::new(),
            scroll_back: 0,
            destination: destination.into(),
            service_id: service_id.into(),
            sending: false,
            should_quit: false,
        }
    }

    /// Handle a key event.
    ///
    /// Returns the text to send when Enter is pressed on non-blank input.
    /// The input is left in place until [`finish_send`](Self::finish_send).
    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<String> {
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) | (KeyCode::Esc, _) => {
                self.should_quit = true;
                None
            }
            (KeyCode::Enter, _) => self.submit(),
            (KeyCode::Char(c), _) => {
                self.enter_char(c);
                None
            }
            (KeyCode::Backspace, _) => {
                self.delete_char();
                None
            }
            (KeyCode::Delete, _) => {
                self.delete_char_forward();
                None
            }
            (KeyCode::Left, _) => {
                self.cursor_position = self.cursor_position.saturating_sub(1);
                None
            }
            (KeyCode::Right, _) => {
                self.cursor_position = (self.cursor_position + 1).min(self.input_len());
                None
            }
            (KeyCode::Home, _) => {
                self.cursor_position = 0;
                None
            }
            (KeyCode::End, _) => {
                self.cursor_position = self.input_len();
                None
            }
            (KeyCode::PageUp, _) => {
                self.scroll_back = (self.scroll_back + 5).min(self.log.row_count());
                None
            }
            (KeyCode::PageDown, _) => {
                self.scroll_back = self.scroll_back.saturating_sub(5);
                None
            }
            _ => None,
        }
    }

    /// Mark the in-flight send as done and clear the input.
    ///
    /// Called after the send completes, whatever the outcome.
    pub fn finish_send(&mut self) {
        self.sending = false;
        self.input.clear();
        self.cursor_position = 0;
        self.scroll_back = 0;
    }

    fn submit(&mut self) -> Option<String> {
        if self.sending || self.input.trim().is_empty() {
            return None;
        }
        self.sending = true;
        Some(self.input.clone())
    }

    fn input_len(&self) -> usize {
        self.input.chars().count()
    }

    /// Byte offset of the character at `char_idx`.
    fn byte_index(&self, char_idx: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_idx)
            .map_or(self.input.len(), |(i, _)| i)
    }

    fn enter_char(&mut self, c: char) {
        let idx = self.byte_index(self.cursor_position);
        self.input.insert(idx, c);
        self.cursor_position += 1;
    }

    fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let idx = self.byte_index(self.cursor_position);
            self.input.remove(idx);
        }
    }

    fn delete_char_forward(&mut self) {
        if self.cursor_position < self.input_len() {
            let idx = self.byte_index(self.cursor_position);
            self.input.remove(idx);
        }
    }
}
