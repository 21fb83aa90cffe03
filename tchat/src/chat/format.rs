//! Message body normalization for fixed-width display.
//!
//! [`wrap`] is not idempotent: already-wrapped text keeps its indentation
//! characters after the newline pass, so a second wrap shifts every break.
//! Always wrap the original message content, never displayed text.

/// Column width at which bodies are re-wrapped.
pub const WRAP_WIDTH: usize = 80;

/// Character inserted after every wrap break.
pub const WRAP_INDENT: char = ' ';

/// Strip all line breaks, then break before every [`WRAP_WIDTH`]th character.
///
/// Counts characters, not bytes, so multi-byte text is never split inside
/// a code point.
#[must_use]
pub fn wrap(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2 * (text.len() / WRAP_WIDTH));
    let chars = text.chars().filter(|c| !matches!(c, '\n' | '\r'));
    for (i, c) in chars.enumerate() {
        if i > 0 && i % WRAP_WIDTH == 0 {
            out.push('\n');
            out.push(WRAP_INDENT);
        }
        out.push(c);
    }
    out
}

/// Attribute a wrapped body to its author: `"<service_id>> <wrapped>\n"`.
#[must_use]
pub fn render(service_id: &str, wrapped: &str) -> String {
    format!("{service_id}> {wrapped}\n")
}
