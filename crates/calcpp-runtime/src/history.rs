#![forbid(unsafe_code)]

//! Calculation history with an undo/redo pointer.
//!
//! Every applied engine response becomes a [`HistoryItem`]. The stack keeps
//! them oldest-first and tracks a pointer used by undo and redo to walk
//! back and forth without creating new entries.
//!
//! # Invariants
//!
//! 1. After [`record`](HistoryStack::record) or
//!    [`jump_to`](HistoryStack::jump_to) the pointer is the last index.
//! 2. `items.len() <= config.max_entries`; the oldest items are evicted
//!    first.
//! 3. `undo` with the pointer at 0 and `redo` with the pointer at the last
//!    index are no-ops.
//! 4. `Replace` on an empty stack appends.
//!
//! ```text
//! record(a) record(b) record(c)   [a, b, c]  ptr=2
//! undo()                          [a, b, c]  ptr=1  -> b
//! record(d, Replace)              [a, b, d]  ptr=2
//! ```

use std::collections::VecDeque;
use std::fmt;

use calcpp_engine::RequestKind;

/// Relation between an expression and its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Relation {
    /// Evaluated value.
    #[default]
    Equals,
    /// Simplified form.
    Equivalent,
}

impl Relation {
    /// Relation for a response of `kind` (after combined-kind resolution).
    #[must_use]
    pub const fn for_response(success: bool, kind: RequestKind) -> Self {
        if success && matches!(kind, RequestKind::Simplify) {
            Self::Equivalent
        } else {
            Self::Equals
        }
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::Equivalent => "≡",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One stored calculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    /// Uid of the request that produced this item.
    pub uid: u32,
    pub expr: String,
    pub relation: Relation,
    /// Result text, or the formatted error.
    pub result: String,
    /// Cursor anchor in characters; restored cursor sits one past it.
    pub anchor: usize,
    pub result_pending: bool,
}

/// How a new item enters the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryPolicy {
    #[default]
    Append,
    /// Overwrite the newest item.
    Replace,
}

/// Limits for the history stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum number of items kept. Zero is treated as one.
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_entries: 1000 }
    }
}

impl HistoryConfig {
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self { max_entries }
    }

    /// No eviction (for testing).
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_entries: usize::MAX,
        }
    }
}

/// Oldest-first history with an undo/redo pointer.
#[derive(Clone, Default)]
pub struct HistoryStack {
    items: VecDeque<HistoryItem>,
    pointer: usize,
    config: HistoryConfig,
}

impl fmt::Debug for HistoryStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryStack")
            .field("len", &self.items.len())
            .field("pointer", &self.pointer())
            .field("config", &self.config)
            .finish()
    }
}

impl HistoryStack {
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            items: VecDeque::new(),
            pointer: 0,
            config,
        }
    }

    // ========================================================================
    // Core Operations
    // ========================================================================

    /// Store `item` according to `policy` and move the pointer to it.
    ///
    /// Returns the policy actually applied.
    pub fn record(&mut self, item: HistoryItem, policy: HistoryPolicy) -> HistoryPolicy {
        let applied = if self.items.is_empty() {
            HistoryPolicy::Append
        } else {
            policy
        };
        match applied {
            HistoryPolicy::Append => self.items.push_back(item),
            HistoryPolicy::Replace => {
                if let Some(last) = self.items.back_mut() {
                    *last = item;
                }
            }
        }
        self.enforce_limit();
        self.pointer = self.items.len().saturating_sub(1);
        tracing::debug!(
            target: "calcpp.history",
            policy = ?applied,
            len = self.items.len(),
            "history item recorded"
        );
        applied
    }

    /// Step the pointer back and return the item it lands on.
    pub fn undo(&mut self) -> Option<&HistoryItem> {
        if self.pointer == 0 || self.items.is_empty() {
            return None;
        }
        self.pointer -= 1;
        self.items.get(self.pointer)
    }

    /// Step the pointer forward and return the item it lands on.
    pub fn redo(&mut self) -> Option<&HistoryItem> {
        if !self.can_redo() {
            return None;
        }
        self.pointer += 1;
        self.items.get(self.pointer)
    }

    /// Select the item at `index` directly, as from the history view.
    ///
    /// The pointer is parked on the newest item afterwards.
    pub fn jump_to(&mut self, index: usize) -> Option<&HistoryItem> {
        if index >= self.items.len() {
            return None;
        }
        self.pointer = self.items.len() - 1;
        self.items.get(index)
    }

    /// Remove every item and reset the pointer.
    pub fn clear(&mut self) {
        self.items.clear();
        self.pointer = 0;
        tracing::debug!(target: "calcpp.history", "history cleared");
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[must_use]
    pub fn items(&self) -> &VecDeque<HistoryItem> {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&HistoryItem> {
        self.items.get(index)
    }

    /// Pointer position; `None` while empty.
    #[must_use]
    pub fn pointer(&self) -> Option<usize> {
        (!self.items.is_empty()).then_some(self.pointer)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.items.is_empty() && self.pointer > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.pointer + 1 < self.items.len()
    }

    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    fn enforce_limit(&mut self) {
        let max = self.config.max_entries.max(1);
        let mut evicted = 0_usize;
        while self.items.len() > max {
            self.items.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!(target: "calcpp.history", evicted, "evicted oldest history items");
        }
    }
}
