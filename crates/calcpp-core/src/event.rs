#![forbid(unsafe_code)]

//! Canonical pointer event types.
//!
//! Hosts translate their platform pointer callbacks (DOM pointer events,
//! touch APIs, test scripts) into [`PointerEvent`] values and forward them to
//! the recognizer that owns the pressed element.
//!
//! # Design Notes
//!
//! - Coordinates are page coordinates in CSS pixels and may be fractional.
//! - Timestamps come from the event source, not from a clock read at
//!   dispatch time, so classification is reproducible from a recorded trace.
//! - Moves are not modelled: classification only needs the press and release
//!   positions.

use web_time::Instant;

/// Identifier assigned by the platform to one pointer for the lifetime of
/// its contact.
pub type PointerId = u32;

/// A position in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

impl PointerPosition {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Offset from `origin` to `self` as `(dx, dy)`.
    #[must_use]
    pub fn delta_from(self, origin: Self) -> (f64, f64) {
        (self.x - origin.x, self.y - origin.y)
    }
}

impl From<(f64, f64)> for PointerPosition {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Device class that produced a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointerKind {
    #[default]
    Touch,
    Mouse,
    Pen,
}

/// Lifecycle phase of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerPhase {
    Down,
    Up,
    Cancel,
    Enter,
    Leave,
}

/// One pointer lifecycle signal for a single interactive element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub pointer_id: PointerId,
    pub kind: PointerKind,
    pub position: PointerPosition,
    pub timestamp: Instant,
}

impl PointerEvent {
    /// Create a touch event with the given phase.
    #[must_use]
    pub fn new(
        phase: PointerPhase,
        pointer_id: PointerId,
        position: impl Into<PointerPosition>,
        timestamp: Instant,
    ) -> Self {
        Self {
            phase,
            pointer_id,
            kind: PointerKind::Touch,
            position: position.into(),
            timestamp,
        }
    }

    #[must_use]
    pub fn down(pointer_id: PointerId, x: f64, y: f64, timestamp: Instant) -> Self {
        Self::new(PointerPhase::Down, pointer_id, (x, y), timestamp)
    }

    #[must_use]
    pub fn up(pointer_id: PointerId, x: f64, y: f64, timestamp: Instant) -> Self {
        Self::new(PointerPhase::Up, pointer_id, (x, y), timestamp)
    }

    #[must_use]
    pub fn cancel(pointer_id: PointerId, timestamp: Instant) -> Self {
        Self::new(PointerPhase::Cancel, pointer_id, (0.0, 0.0), timestamp)
    }

    #[must_use]
    pub fn enter(pointer_id: PointerId, timestamp: Instant) -> Self {
        Self::new(PointerPhase::Enter, pointer_id, (0.0, 0.0), timestamp)
    }

    #[must_use]
    pub fn leave(pointer_id: PointerId, timestamp: Instant) -> Self {
        Self::new(PointerPhase::Leave, pointer_id, (0.0, 0.0), timestamp)
    }

    /// Replace the device kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: PointerKind) -> Self {
        self.kind = kind;
        self
    }
}
