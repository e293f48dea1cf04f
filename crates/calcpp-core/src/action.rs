#![forbid(unsafe_code)]

//! Calculator actions produced by keypad gestures.
//!
//! [`CalcAction`] is the closed set of operations the presentation layer can
//! request from the calculation orchestrator. Text payloads are static: every
//! keypad binding inserts a fixed literal.

/// Cursor movement target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorMove {
    Left,
    Right,
    Start,
    End,
}

/// An operation requested by the keypad or a picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalcAction {
    /// Insert literal text at the cursor.
    InsertText(&'static str),
    /// Insert a function call template at the cursor.
    InsertFunction(&'static str),
    /// Insert `()` and place the cursor between the brackets.
    InsertBracketPair,
    MoveCursor(CursorMove),
    Erase,
    Clear,
    Evaluate,
    Simplify,
    CopyResult,
    OpenHistory,
    OpenVariablePicker,
    OpenFunctionPicker,
    Undo,
    Redo,
}

impl CalcAction {
    /// Whether the action edits the expression text.
    #[must_use]
    pub const fn is_edit(self) -> bool {
        matches!(
            self,
            Self::InsertText(_)
                | Self::InsertFunction(_)
                | Self::InsertBracketPair
                | Self::Erase
                | Self::Clear
        )
    }
}
