#![forbid(unsafe_code)]

//! Keypad buttons: roles, gesture bindings, and routing.
//!
//! Each keypad button has a [`ButtonRole`]. The [`DragActions`] capability
//! trait maps the gestures recognized on a button to the [`CalcAction`] it
//! triggers; a gesture with no binding is silently dropped.
//!
//! [`DragButton`] pairs one set of bindings with one [`GestureRecognizer`],
//! and [`Keypad`] owns one button per role.

use web_time::Instant;

use crate::action::{CalcAction, CursorMove};
use crate::event::PointerEvent;
use crate::gesture::{Gesture, GestureConfig, GestureDispatch, GestureRecognizer};

// ---------------------------------------------------------------------------
// Capability trait
// ---------------------------------------------------------------------------

/// Gesture bindings for one button.
///
/// Only [`tap`](DragActions::tap) is required. A button is repeat-capable
/// exactly when [`repeat`](DragActions::repeat) returns an action.
pub trait DragActions {
    fn tap(&self) -> Option<CalcAction>;

    fn swipe_up(&self) -> Option<CalcAction> {
        None
    }

    fn swipe_down(&self) -> Option<CalcAction> {
        None
    }

    fn swipe_left(&self) -> Option<CalcAction> {
        None
    }

    fn repeat(&self) -> Option<CalcAction> {
        None
    }

    fn supports_repeat(&self) -> bool {
        self.repeat().is_some()
    }

    /// Action bound to `gesture`, if any.
    fn action_for(&self, gesture: Gesture) -> Option<CalcAction> {
        match gesture {
            Gesture::Tap => self.tap(),
            Gesture::SwipeUp => self.swipe_up(),
            Gesture::SwipeDown => self.swipe_down(),
            Gesture::SwipeLeft => self.swipe_left(),
            Gesture::RepeatTick => self.repeat(),
        }
    }
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// The keypad buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ButtonRole {
    Digit0,
    Digit1,
    Digit2,
    Digit3,
    Digit4,
    Digit5,
    Digit6,
    Digit7,
    Digit8,
    Digit9,
    Add,
    Sub,
    Mul,
    Div,
    Equals,
    Erase,
    Clear,
    Left,
    Right,
    History,
    Variables,
    Functions,
    Point,
    Brackets,
    Percent,
}

impl ButtonRole {
    /// Every role, in keypad order.
    pub const ALL: [Self; 25] = [
        Self::Digit0,
        Self::Digit1,
        Self::Digit2,
        Self::Digit3,
        Self::Digit4,
        Self::Digit5,
        Self::Digit6,
        Self::Digit7,
        Self::Digit8,
        Self::Digit9,
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Equals,
        Self::Erase,
        Self::Clear,
        Self::Left,
        Self::Right,
        Self::History,
        Self::Variables,
        Self::Functions,
        Self::Point,
        Self::Brackets,
        Self::Percent,
    ];

    /// Role for the decimal digit `n`.
    #[must_use]
    pub const fn digit(n: u8) -> Option<Self> {
        match n {
            0 => Some(Self::Digit0),
            1 => Some(Self::Digit1),
            2 => Some(Self::Digit2),
            3 => Some(Self::Digit3),
            4 => Some(Self::Digit4),
            5 => Some(Self::Digit5),
            6 => Some(Self::Digit6),
            7 => Some(Self::Digit7),
            8 => Some(Self::Digit8),
            9 => Some(Self::Digit9),
            _ => None,
        }
    }

    /// Position in [`ButtonRole::ALL`].
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Primary label shown on the button face.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Digit0 => "0",
            Self::Digit1 => "1",
            Self::Digit2 => "2",
            Self::Digit3 => "3",
            Self::Digit4 => "4",
            Self::Digit5 => "5",
            Self::Digit6 => "6",
            Self::Digit7 => "7",
            Self::Digit8 => "8",
            Self::Digit9 => "9",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "×",
            Self::Div => "/",
            Self::Equals => "=",
            Self::Erase => "⌫",
            Self::Clear => "C",
            Self::Left => "‹",
            Self::Right => "›",
            Self::History => "⟲",
            Self::Variables => "π",
            Self::Functions => "ƒ",
            Self::Point => ".",
            Self::Brackets => "( )",
            Self::Percent => "%",
        }
    }
}

impl DragActions for ButtonRole {
    fn tap(&self) -> Option<CalcAction> {
        use CalcAction::{InsertText, MoveCursor};
        Some(match self {
            Self::Digit0 => InsertText("0"),
            Self::Digit1 => InsertText("1"),
            Self::Digit2 => InsertText("2"),
            Self::Digit3 => InsertText("3"),
            Self::Digit4 => InsertText("4"),
            Self::Digit5 => InsertText("5"),
            Self::Digit6 => InsertText("6"),
            Self::Digit7 => InsertText("7"),
            Self::Digit8 => InsertText("8"),
            Self::Digit9 => InsertText("9"),
            Self::Add => InsertText("+"),
            Self::Sub => InsertText("-"),
            Self::Mul => InsertText("*"),
            Self::Div => InsertText("/"),
            Self::Equals => CalcAction::Evaluate,
            Self::Erase => CalcAction::Erase,
            Self::Clear => CalcAction::Clear,
            Self::Left => MoveCursor(CursorMove::Left),
            Self::Right => MoveCursor(CursorMove::Right),
            Self::History => CalcAction::OpenHistory,
            Self::Variables => CalcAction::OpenVariablePicker,
            Self::Functions => CalcAction::OpenFunctionPicker,
            Self::Point => InsertText("."),
            Self::Brackets => CalcAction::InsertBracketPair,
            Self::Percent => InsertText("%"),
        })
    }

    fn swipe_up(&self) -> Option<CalcAction> {
        use CalcAction::{InsertFunction, InsertText};
        match self {
            Self::Digit0 => Some(InsertText("000")),
            Self::Digit1 => Some(InsertFunction("sin")),
            Self::Digit2 => Some(InsertFunction("cos")),
            Self::Digit3 => Some(InsertFunction("tan")),
            Self::Digit4 => Some(InsertText("x")),
            Self::Digit5 => Some(InsertText("t")),
            Self::Digit6 => Some(InsertText("a")),
            Self::Digit7 => Some(InsertText("i")),
            Self::Digit8 => Some(InsertFunction("ln")),
            Self::Digit9 => Some(InsertFunction("log")),
            Self::Add => Some(InsertText("°")),
            Self::Sub => Some(InsertFunction("∂")),
            Self::Mul => Some(InsertText("^")),
            Self::Div => Some(InsertFunction("√")),
            Self::Equals => Some(CalcAction::Simplify),
            Self::Left => Some(CalcAction::MoveCursor(CursorMove::Start)),
            Self::Right => Some(CalcAction::MoveCursor(CursorMove::End)),
            Self::History => Some(CalcAction::Undo),
            Self::Variables => Some(InsertText("π")),
            Self::Point => Some(InsertText(",")),
            Self::Brackets => Some(InsertText("(")),
            Self::Erase | Self::Clear | Self::Functions | Self::Percent => None,
        }
    }

    fn swipe_down(&self) -> Option<CalcAction> {
        use CalcAction::{InsertFunction, InsertText};
        match self {
            Self::Digit0 => Some(InsertText("00")),
            Self::Digit1 => Some(InsertFunction("asin")),
            Self::Digit2 => Some(InsertFunction("acos")),
            Self::Digit3 => Some(InsertFunction("atan")),
            Self::Digit4 => Some(InsertText("y")),
            Self::Digit5 => Some(InsertText("j")),
            Self::Digit6 => Some(InsertText("b")),
            Self::Digit7 => Some(InsertText("!")),
            Self::Digit8 => Some(InsertFunction("lg")),
            Self::Digit9 => Some(InsertFunction("∫ab")),
            Self::Add => Some(InsertFunction("Σ")),
            Self::Sub => Some(InsertFunction("∫")),
            Self::Mul => Some(InsertText("^2")),
            Self::Div => Some(InsertFunction("√3")),
            Self::Left => Some(CalcAction::CopyResult),
            Self::History => Some(CalcAction::Redo),
            Self::Variables => Some(InsertText("e")),
            Self::Brackets => Some(InsertText(")")),
            Self::Equals
            | Self::Erase
            | Self::Clear
            | Self::Right
            | Self::Functions
            | Self::Point
            | Self::Percent => None,
        }
    }

    fn swipe_left(&self) -> Option<CalcAction> {
        use CalcAction::InsertText;
        match self {
            Self::Digit1 => Some(InsertText("A")),
            Self::Digit2 => Some(InsertText("B")),
            Self::Digit3 => Some(InsertText("C")),
            Self::Digit4 => Some(InsertText("D")),
            Self::Digit5 => Some(InsertText("E")),
            Self::Digit6 => Some(InsertText("F")),
            Self::Digit7 => Some(InsertText("0b:")),
            Self::Digit8 => Some(InsertText("0d:")),
            Self::Digit9 => Some(InsertText("0x:")),
            Self::Brackets => Some(CalcAction::InsertBracketPair),
            _ => None,
        }
    }

    fn repeat(&self) -> Option<CalcAction> {
        match self {
            Self::Erase => Some(CalcAction::Erase),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// DragButton
// ---------------------------------------------------------------------------

/// Result of routing one pointer event through a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonDispatch {
    pub dispatch: GestureDispatch,
    /// Action bound to the recognized gesture, if any.
    pub action: Option<CalcAction>,
}

/// One keypad button: a recognizer plus its gesture bindings.
#[derive(Debug, Clone)]
pub struct DragButton<A = ButtonRole> {
    actions: A,
    recognizer: GestureRecognizer,
}

impl<A: DragActions> DragButton<A> {
    /// Create a button. Repeat is enabled when `actions` supports it.
    #[must_use]
    pub fn new(actions: A, config: GestureConfig) -> Self {
        let recognizer = if actions.supports_repeat() {
            GestureRecognizer::with_repeat(config)
        } else {
            GestureRecognizer::new(config)
        };
        Self { actions, recognizer }
    }

    /// Feed one pointer event and resolve the bound action.
    pub fn process(&mut self, event: &PointerEvent) -> ButtonDispatch {
        let dispatch = self.recognizer.process(event);
        let action = dispatch.gesture.and_then(|g| self.actions.action_for(g));
        ButtonDispatch { dispatch, action }
    }

    /// Collect a due repeat tick as an action.
    pub fn poll(&mut self, now: Instant) -> Option<CalcAction> {
        self.recognizer
            .poll(now)
            .and_then(|g| self.actions.action_for(g))
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.recognizer.next_deadline()
    }

    #[must_use]
    pub fn is_pressed(&self) -> bool {
        self.recognizer.is_pressed()
    }

    #[must_use]
    pub fn is_hovering(&self) -> bool {
        self.recognizer.is_hovering()
    }

    #[must_use]
    pub fn actions(&self) -> &A {
        &self.actions
    }

    #[must_use]
    pub fn recognizer(&self) -> &GestureRecognizer {
        &self.recognizer
    }

    pub fn reset(&mut self) {
        self.recognizer.reset();
    }
}

// ---------------------------------------------------------------------------
// Keypad
// ---------------------------------------------------------------------------

/// One [`DragButton`] per [`ButtonRole`].
#[derive(Debug, Clone)]
pub struct Keypad {
    buttons: Vec<DragButton<ButtonRole>>,
}

impl Keypad {
    #[must_use]
    pub fn new(config: &GestureConfig) -> Self {
        let buttons = ButtonRole::ALL
            .iter()
            .map(|&role| DragButton::new(role, config.clone()))
            .collect();
        Self { buttons }
    }

    /// Route a pointer event to the button for `role`.
    pub fn process(&mut self, role: ButtonRole, event: &PointerEvent) -> ButtonDispatch {
        self.buttons[role.index()].process(event)
    }

    /// Collect every due repeat action across all buttons.
    pub fn poll(&mut self, now: Instant) -> Vec<CalcAction> {
        self.buttons
            .iter_mut()
            .filter_map(|button| button.poll(now))
            .collect()
    }

    /// Earliest pending repeat deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.buttons
            .iter()
            .filter_map(DragButton::next_deadline)
            .min()
    }

    #[must_use]
    pub fn button(&self, role: ButtonRole) -> &DragButton<ButtonRole> {
        &self.buttons[role.index()]
    }

    /// Drop every active press, e.g. when the keypad is hidden.
    pub fn reset(&mut self) {
        for button in &mut self.buttons {
            button.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MS_100: Duration = Duration::from_millis(100);

    fn swipe(keypad: &mut Keypad, role: ButtonRole, dx: f64, dy: f64) -> Option<CalcAction> {
        let t = Instant::now();
        keypad.process(role, &PointerEvent::down(1, 50.0, 50.0, t));
        keypad
            .process(role, &PointerEvent::up(1, 50.0 + dx, 50.0 + dy, t + MS_100))
            .action
    }

    #[test]
    fn all_roles_indexed_in_order() {
        for (i, role) in ButtonRole::ALL.iter().enumerate() {
            assert_eq!(role.index(), i);
        }
    }

    #[test]
    fn every_role_has_a_tap() {
        for role in ButtonRole::ALL {
            assert!(role.tap().is_some(), "{role:?}");
        }
    }

    #[test]
    fn only_erase_repeats() {
        let repeating: Vec<ButtonRole> = ButtonRole::ALL
            .into_iter()
            .filter(DragActions::supports_repeat)
            .collect();
        assert_eq!(repeating, vec![ButtonRole::Erase]);
    }

    #[test]
    fn digit_lookup() {
        assert_eq!(ButtonRole::digit(7), Some(ButtonRole::Digit7));
        assert_eq!(ButtonRole::digit(10), None);
    }

    #[test]
    fn digit_bindings() {
        let mut keypad = Keypad::new(&GestureConfig::default());
        assert_eq!(
            swipe(&mut keypad, ButtonRole::Digit1, 0.0, 0.0),
            Some(CalcAction::InsertText("1"))
        );
        assert_eq!(
            swipe(&mut keypad, ButtonRole::Digit1, 0.0, -40.0),
            Some(CalcAction::InsertFunction("sin"))
        );
        assert_eq!(
            swipe(&mut keypad, ButtonRole::Digit1, -40.0, 0.0),
            Some(CalcAction::InsertText("A"))
        );
        assert_eq!(
            swipe(&mut keypad, ButtonRole::Digit9, 0.0, 40.0),
            Some(CalcAction::InsertFunction("∫ab"))
        );
        assert_eq!(
            swipe(&mut keypad, ButtonRole::Digit0, 0.0, -40.0),
            Some(CalcAction::InsertText("000"))
        );
    }

    #[test]
    fn right_swipe_yields_no_action() {
        let mut keypad = Keypad::new(&GestureConfig::default());
        assert_eq!(swipe(&mut keypad, ButtonRole::Digit5, 40.0, 0.0), None);
    }

    #[test]
    fn unbound_gesture_is_dropped() {
        let mut keypad = Keypad::new(&GestureConfig::default());
        assert_eq!(swipe(&mut keypad, ButtonRole::Percent, 0.0, -40.0), None);
        assert_eq!(swipe(&mut keypad, ButtonRole::Clear, -40.0, 0.0), None);
    }

    #[test]
    fn history_and_equals_bindings() {
        let mut keypad = Keypad::new(&GestureConfig::default());
        assert_eq!(
            swipe(&mut keypad, ButtonRole::History, 0.0, -40.0),
            Some(CalcAction::Undo)
        );
        assert_eq!(
            swipe(&mut keypad, ButtonRole::History, 0.0, 40.0),
            Some(CalcAction::Redo)
        );
        assert_eq!(
            swipe(&mut keypad, ButtonRole::Equals, 0.0, -40.0),
            Some(CalcAction::Simplify)
        );
        assert_eq!(
            swipe(&mut keypad, ButtonRole::Left, 0.0, 40.0),
            Some(CalcAction::CopyResult)
        );
    }

    #[test]
    fn holding_erase_repeats_erase() {
        let mut keypad = Keypad::new(&GestureConfig::default());
        let t = Instant::now();
        keypad.process(ButtonRole::Erase, &PointerEvent::down(1, 0.0, 0.0, t));
        assert_eq!(keypad.next_deadline(), Some(t + Duration::from_millis(400)));
        assert!(keypad.poll(t + MS_100).is_empty());
        assert_eq!(
            keypad.poll(t + Duration::from_millis(400)),
            vec![CalcAction::Erase]
        );
        assert!(keypad.button(ButtonRole::Erase).is_pressed());
    }

    #[test]
    fn holding_a_digit_does_not_repeat() {
        let mut keypad = Keypad::new(&GestureConfig::default());
        let t = Instant::now();
        keypad.process(ButtonRole::Digit3, &PointerEvent::down(1, 0.0, 0.0, t));
        assert_eq!(keypad.next_deadline(), None);
        assert!(keypad.poll(t + Duration::from_secs(3)).is_empty());
    }

    #[test]
    fn buttons_are_independent() {
        let mut keypad = Keypad::new(&GestureConfig::default());
        let t = Instant::now();
        keypad.process(ButtonRole::Digit1, &PointerEvent::down(1, 0.0, 0.0, t));
        let out = keypad.process(ButtonRole::Digit2, &PointerEvent::down(2, 0.0, 0.0, t));
        assert!(out.dispatch.capture.is_some());
        keypad.reset();
        assert!(!keypad.button(ButtonRole::Digit1).is_pressed());
    }
}
