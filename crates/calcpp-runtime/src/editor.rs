#![forbid(unsafe_code)]

//! Expression buffer with a character cursor.
//!
//! Cursor positions count `char`s, not bytes, so symbols such as `π`, `√`
//! and `∫` move the cursor by one.

use calcpp_core::CursorMove;

/// Editable expression text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpressionBuffer {
    text: String,
    cursor: usize,
}

impl ExpressionBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Value access ---

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Cursor position in characters.
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Length in characters.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Replace the text and place the cursor, clamped to the new length.
    pub fn set(&mut self, text: impl Into<String>, cursor: usize) {
        self.text = text.into();
        self.cursor = cursor.min(self.char_len());
    }

    /// Replace the text and put the cursor at the end.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.char_len();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    // --- Editing ---

    /// Insert `text` at the cursor, then move the cursor past it and by
    /// `offset` more (negative moves back into the inserted text).
    ///
    /// Returns `false` when nothing changed.
    pub fn insert(&mut self, text: &str, offset: isize) -> bool {
        if text.is_empty() {
            return false;
        }
        let at = self.byte_offset(self.cursor);
        self.text.insert_str(at, text);
        let moved = self.cursor + text.chars().count();
        self.cursor = moved.saturating_add_signed(offset).min(self.char_len());
        true
    }

    /// Delete the character before the cursor.
    ///
    /// Returns `false` at the start of the buffer.
    pub fn erase(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let start = self.byte_offset(self.cursor - 1);
        let end = self.byte_offset(self.cursor);
        self.text.drain(start..end);
        self.cursor -= 1;
        true
    }

    pub fn move_cursor(&mut self, mv: CursorMove) {
        self.cursor = match mv {
            CursorMove::Left => self.cursor.saturating_sub(1),
            CursorMove::Right => (self.cursor + 1).min(self.char_len()),
            CursorMove::Start => 0,
            CursorMove::End => self.char_len(),
        };
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_index)
            .map_or(self.text.len(), |(i, _)| i)
    }
}

/// Text and cursor offset inserted for a function picked by name.
///
/// Postfix entries (`x!`, `x%`, `x°`, `x!!`) insert only their suffix.
/// Integrals, derivatives, sums and products come with argument slots and
/// leave the cursor in the first one.
#[must_use]
pub fn function_template(name: &str) -> (String, isize) {
    match name {
        "∫" | "∂" => (format!("{name}(,x)"), -3),
        "Σ" | "∏" => (format!("{name}(,i,a,b)"), -7),
        "∫ab" => ("∫ab(,x,a,b)".to_string(), -7),
        "mod" | "log" => (format!("{name}(,)"), -2),
        "x!" | "x%" | "x°" | "x!!" => (name[1..].to_string(), 0),
        _ => (format!("{name}()"), -1),
    }
}
