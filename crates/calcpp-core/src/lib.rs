#![forbid(unsafe_code)]

//! Core: pointer events, drag-gesture recognition, and keypad roles.
//!
//! # Role in calcpp
//! `calcpp-core` is the input layer. It turns the raw pointer stream that a
//! host forwards for each keypad button into one of a small set of gestures
//! (tap, swipe up/down/left, repeating long-press tick) and maps those
//! gestures onto calculator actions.
//!
//! # Primary responsibilities
//! - **PointerEvent**: normalized pointer lifecycle signals with event-source
//!   timestamps.
//! - **GestureRecognizer**: per-button press-session state machine.
//! - **ButtonRole / DragActions**: the closed set of keypad buttons and the
//!   action each gesture triggers on them.
//! - **Keypad**: one recognizer per button, routed by role.
//!
//! # How it fits in the system
//! `calcpp-runtime` consumes the [`action::CalcAction`] values produced here
//! and drives the calculation orchestrator. Nothing in this crate performs
//! I/O or spawns threads; timers are deadlines the host polls.

pub mod action;
pub mod button;
pub mod event;
pub mod gesture;

pub use action::{CalcAction, CursorMove};
pub use button::{ButtonDispatch, ButtonRole, DragActions, DragButton, Keypad};
pub use event::{PointerEvent, PointerId, PointerKind, PointerPhase, PointerPosition};
pub use gesture::{
    CaptureCommand, Gesture, GestureConfig, GestureDispatch, GestureIgnoredReason,
    GestureOutcome, GestureRecognizer, RepeatDelays, classify_release,
};
