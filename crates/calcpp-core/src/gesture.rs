#![forbid(unsafe_code)]

//! Drag-gesture recognition for keypad buttons.
//!
//! [`GestureRecognizer`] is a per-button state machine that converts the
//! [`PointerEvent`] stream of one interactive element into at most one
//! [`Gesture`] per press, plus a stream of [`Gesture::RepeatTick`]s while a
//! repeat-capable button is held.
//!
//! # State Machine
//!
//! ```text
//!            down (no session)                 up (same pointer)
//!   Idle ───────────────────────► Pressed ─────────────────────► Idle + classify
//!    ▲                             │  │
//!    │        cancel (same ptr)    │  │ leave (same ptr): pointer marked out,
//!    └─────────────────────────────┘  │ repeat timer disarmed, session kept
//!                                     ▼
//!                          repeat timer (repeat-capable buttons only):
//!                          Armed(400ms) ──poll──► Repeating(delay shrinks ×2/3, floor 50ms)
//! ```
//!
//! # Invariants
//!
//! 1. At most one press session is active; a second pointer-down while one is
//!    active is ignored until release.
//! 2. A release emits exactly one of tap / swipe up / swipe down / swipe left,
//!    or nothing for a rightward swipe.
//! 3. Repeat ticks are only produced while the session is active and the
//!    pointer has not left the element.
//! 4. Repeat delays are non-increasing and never drop below the floor.
//!
//! # Failure Modes
//!
//! - Out-of-order signals (up without down, cancel for an unknown pointer)
//!   are ignored and reported through [`GestureOutcome::Ignored`]; they never
//!   panic.
//! - A leave is not a release: hosts that capture the pointer keep receiving
//!   its up event, so the session survives the leave.

use std::time::Duration;

use web_time::Instant;

use crate::event::{PointerEvent, PointerId, PointerKind, PointerPhase, PointerPosition};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Thresholds and timeouts for drag-gesture recognition.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureConfig {
    /// Minimum release distance (pixels) for a swipe (default: 15).
    pub touch_slop: f64,
    /// Presses shorter than this are taps (default: 40ms).
    pub min_swipe_time: Duration,
    /// Presses longer than this are taps (default: 2500ms).
    pub max_swipe_time: Duration,
    /// Hold time before the first repeat tick (default: 400ms).
    pub long_press_timeout: Duration,
    /// Baseline repeat delay, shrunk before each reschedule (default: 300ms).
    pub repeat_initial_delay: Duration,
    /// Floor for the repeat delay (default: 50ms).
    pub repeat_min_delay: Duration,
    /// Factor applied to the repeat delay on every tick (default: 2/3).
    /// Values outside `(0, 1]` are treated as the default.
    pub repeat_delay_factor: f64,
}

const DEFAULT_REPEAT_DELAY_FACTOR: f64 = 2.0 / 3.0;

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            touch_slop: 15.0,
            min_swipe_time: Duration::from_millis(40),
            max_swipe_time: Duration::from_millis(2500),
            long_press_timeout: Duration::from_millis(400),
            repeat_initial_delay: Duration::from_millis(300),
            repeat_min_delay: Duration::from_millis(50),
            repeat_delay_factor: DEFAULT_REPEAT_DELAY_FACTOR,
        }
    }
}

impl GestureConfig {
    /// Squared touch slop, compared against squared release distance.
    #[inline]
    #[must_use]
    pub fn touch_slop_squared(&self) -> f64 {
        self.touch_slop * self.touch_slop
    }

    /// Repeat factor in `(0, 1]`; NaN or out-of-range values fall back to
    /// the default.
    #[must_use]
    pub fn effective_repeat_factor(&self) -> f64 {
        let factor = self.repeat_delay_factor;
        if factor > 0.0 && factor <= 1.0 {
            factor
        } else {
            DEFAULT_REPEAT_DELAY_FACTOR
        }
    }

    /// Next repeat delay after `current`.
    #[must_use]
    pub fn shrink_repeat_delay(&self, current: Duration) -> Duration {
        current
            .mul_f64(self.effective_repeat_factor())
            .max(self.repeat_min_delay)
    }
}

// ---------------------------------------------------------------------------
// Gestures
// ---------------------------------------------------------------------------

/// A recognized gesture.
///
/// Swipe-right is reserved: it is recognized internally but never emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    Tap,
    SwipeUp,
    SwipeDown,
    SwipeLeft,
    /// Emitted repeatedly while a repeat-capable button is held.
    RepeatTick,
}

/// Classify a completed press.
///
/// `elapsed` is release time minus press time; `(dx, dy)` is the release
/// position minus the press position in page coordinates (y grows
/// downwards). Returns `None` for a rightward swipe.
#[must_use]
pub fn classify_release(config: &GestureConfig, elapsed: Duration, dx: f64, dy: f64) -> Option<Gesture> {
    let distance_squared = dx * dx + dy * dy;
    if elapsed < config.min_swipe_time
        || elapsed > config.max_swipe_time
        || distance_squared < config.touch_slop_squared()
    {
        return Some(Gesture::Tap);
    }

    let angle = (-dy).atan2(dx).to_degrees();
    if (45.0..135.0).contains(&angle) {
        Some(Gesture::SwipeUp)
    } else if (-135.0..-45.0).contains(&angle) {
        Some(Gesture::SwipeDown)
    } else if (-45.0..45.0).contains(&angle) {
        None
    } else {
        Some(Gesture::SwipeLeft)
    }
}

/// Iterator over the repeat delay sequence: the baseline delay first, then
/// each successive shrunk delay.
///
/// ```
/// use std::time::Duration;
/// use calcpp_core::{GestureConfig, RepeatDelays};
///
/// let delays: Vec<Duration> = RepeatDelays::new(&GestureConfig::default()).take(3).collect();
/// assert_eq!(delays[0], Duration::from_millis(300));
/// assert!(delays[1] < delays[0] && delays[2] < delays[1]);
/// ```
#[derive(Debug, Clone)]
pub struct RepeatDelays {
    config: GestureConfig,
    current: Duration,
}

impl RepeatDelays {
    #[must_use]
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            config: config.clone(),
            current: config.repeat_initial_delay,
        }
    }
}

impl Iterator for RepeatDelays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let out = self.current;
        self.current = self.config.shrink_repeat_delay(self.current);
        Some(out)
    }
}

// ---------------------------------------------------------------------------
// Dispatch records
// ---------------------------------------------------------------------------

/// Pointer-capture command for the host, wired to
/// `setPointerCapture()` / `releasePointerCapture()` on web hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    Acquire { pointer_id: PointerId },
    Release { pointer_id: PointerId },
}

/// Reason an incoming pointer signal was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureIgnoredReason {
    ActivePointerAlreadyInProgress,
    NoActivePointer,
    PointerMismatch,
}

/// Outcome category for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    SessionStarted,
    /// The session closed and produced a gesture.
    Classified,
    /// The session closed as a rightward swipe; nothing is emitted.
    Discarded,
    Cancelled,
    /// The active pointer left the element; the session continues.
    PointerOut,
    HoverChanged,
    Unchanged,
    Ignored(GestureIgnoredReason),
}

/// Result of feeding one pointer event to a recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureDispatch {
    pub phase: PointerPhase,
    pub pointer_id: PointerId,
    pub gesture: Option<Gesture>,
    pub capture: Option<CaptureCommand>,
    pub outcome: GestureOutcome,
}

impl GestureDispatch {
    fn new(event: &PointerEvent, outcome: GestureOutcome) -> Self {
        Self {
            phase: event.phase,
            pointer_id: event.pointer_id,
            gesture: None,
            capture: None,
            outcome,
        }
    }

    fn ignored(event: &PointerEvent, reason: GestureIgnoredReason) -> Self {
        Self::new(event, GestureOutcome::Ignored(reason))
    }

    fn with_capture(mut self, capture: CaptureCommand) -> Self {
        self.capture = Some(capture);
        self
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

/// The pointer currently pressing the element.
#[derive(Debug, Clone, Copy)]
struct PressSession {
    pointer_id: PointerId,
    start: PointerPosition,
    start_time: Instant,
    pointer_out: bool,
}

#[derive(Debug, Clone, Copy)]
enum RepeatTimer {
    /// Waiting for the long-press timeout.
    Armed { due: Instant },
    /// Ticking; `current_delay` is the delay that produced `due`.
    Repeating { due: Instant, current_delay: Duration },
}

impl RepeatTimer {
    const fn due(self) -> Instant {
        match self {
            Self::Armed { due } | Self::Repeating { due, .. } => due,
        }
    }
}

// ---------------------------------------------------------------------------
// GestureRecognizer
// ---------------------------------------------------------------------------

/// Stateful drag-gesture recognizer for one interactive element.
///
/// Feed every pointer event for the element to
/// [`process`](GestureRecognizer::process). For repeat-capable elements,
/// call [`poll`](GestureRecognizer::poll) on each host tick (or at
/// [`next_deadline`](GestureRecognizer::next_deadline)) to collect repeat
/// ticks.
///
/// Gestures are returned, never invoked: the caller dispatches them once the
/// recognizer call has returned, so handlers cannot re-enter the recognizer.
#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    config: GestureConfig,
    repeat_enabled: bool,
    session: Option<PressSession>,
    timer: Option<RepeatTimer>,
    hovering: bool,
}

impl GestureRecognizer {
    /// Create a recognizer without long-press repeat.
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            repeat_enabled: false,
            session: None,
            timer: None,
            hovering: false,
        }
    }

    /// Create a recognizer that emits repeat ticks while held.
    #[must_use]
    pub fn with_repeat(config: GestureConfig) -> Self {
        Self {
            repeat_enabled: true,
            ..Self::new(config)
        }
    }

    /// Feed one pointer event.
    pub fn process(&mut self, event: &PointerEvent) -> GestureDispatch {
        let dispatch = match event.phase {
            PointerPhase::Down => self.on_down(event),
            PointerPhase::Up => self.on_up(event),
            PointerPhase::Cancel => self.on_cancel(event),
            PointerPhase::Enter => self.on_enter(event),
            PointerPhase::Leave => self.on_leave(event),
        };
        log_dispatch(&dispatch);
        dispatch
    }

    /// Fire the repeat timer if it is due.
    ///
    /// Emits at most one tick per call; the following tick is scheduled
    /// relative to `now`.
    pub fn poll(&mut self, now: Instant) -> Option<Gesture> {
        let timer = self.timer?;
        if now < timer.due() {
            return None;
        }
        let current_delay = match timer {
            RepeatTimer::Armed { .. } => self.config.repeat_initial_delay,
            RepeatTimer::Repeating { current_delay, .. } => current_delay,
        };
        let next_delay = self.config.shrink_repeat_delay(current_delay);
        self.timer = Some(RepeatTimer::Repeating {
            due: now + next_delay,
            current_delay: next_delay,
        });

        #[cfg(feature = "tracing")]
        tracing::trace!(
            target: "calcpp.gesture",
            next_delay_ms = next_delay.as_secs_f64() * 1000.0,
            "repeat tick"
        );

        Some(Gesture::RepeatTick)
    }

    /// When the next repeat tick is due, if a timer is armed.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.map(RepeatTimer::due)
    }

    /// Whether a press session is active.
    #[inline]
    #[must_use]
    pub fn is_pressed(&self) -> bool {
        self.session.is_some()
    }

    /// Whether the active pointer has left the element.
    #[must_use]
    pub fn is_pointer_out(&self) -> bool {
        self.session.is_some_and(|s| s.pointer_out)
    }

    /// Whether a mouse pointer is hovering the element.
    #[inline]
    #[must_use]
    pub fn is_hovering(&self) -> bool {
        self.hovering
    }

    /// Pointer id of the active session, if any.
    #[must_use]
    pub fn active_pointer_id(&self) -> Option<PointerId> {
        self.session.map(|s| s.pointer_id)
    }

    /// Whether this recognizer emits repeat ticks.
    #[inline]
    #[must_use]
    pub const fn repeat_enabled(&self) -> bool {
        self.repeat_enabled
    }

    /// Drop the active session and any repeat timer without emitting.
    pub fn reset(&mut self) {
        self.session = None;
        self.timer = None;
        self.hovering = false;
    }

    /// Get a reference to the current configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Update the configuration. Applies from the next press.
    pub fn set_config(&mut self, config: GestureConfig) {
        self.config = config;
    }
}

// ---------------------------------------------------------------------------
// Internal event handlers
// ---------------------------------------------------------------------------

impl GestureRecognizer {
    fn on_down(&mut self, event: &PointerEvent) -> GestureDispatch {
        if self.session.is_some() {
            return GestureDispatch::ignored(event, GestureIgnoredReason::ActivePointerAlreadyInProgress);
        }
        self.session = Some(PressSession {
            pointer_id: event.pointer_id,
            start: event.position,
            start_time: event.timestamp,
            pointer_out: false,
        });
        if self.repeat_enabled {
            self.timer = Some(RepeatTimer::Armed {
                due: event.timestamp + self.config.long_press_timeout,
            });
        }
        GestureDispatch::new(event, GestureOutcome::SessionStarted).with_capture(CaptureCommand::Acquire {
            pointer_id: event.pointer_id,
        })
    }

    fn on_up(&mut self, event: &PointerEvent) -> GestureDispatch {
        let session = match self.active_session(event) {
            Ok(session) => session,
            Err(reason) => return GestureDispatch::ignored(event, reason),
        };
        self.session = None;
        self.timer = None;

        let elapsed = event.timestamp.saturating_duration_since(session.start_time);
        let (dx, dy) = event.position.delta_from(session.start);
        let gesture = classify_release(&self.config, elapsed, dx, dy);

        let outcome = if gesture.is_some() {
            GestureOutcome::Classified
        } else {
            GestureOutcome::Discarded
        };
        let mut dispatch = GestureDispatch::new(event, outcome).with_capture(CaptureCommand::Release {
            pointer_id: session.pointer_id,
        });
        dispatch.gesture = gesture;
        dispatch
    }

    fn on_cancel(&mut self, event: &PointerEvent) -> GestureDispatch {
        let session = match self.active_session(event) {
            Ok(session) => session,
            Err(reason) => return GestureDispatch::ignored(event, reason),
        };
        self.session = None;
        self.timer = None;
        GestureDispatch::new(event, GestureOutcome::Cancelled).with_capture(CaptureCommand::Release {
            pointer_id: session.pointer_id,
        })
    }

    fn on_enter(&mut self, event: &PointerEvent) -> GestureDispatch {
        if event.kind == PointerKind::Mouse && !self.hovering {
            self.hovering = true;
            return GestureDispatch::new(event, GestureOutcome::HoverChanged);
        }
        GestureDispatch::new(event, GestureOutcome::Unchanged)
    }

    fn on_leave(&mut self, event: &PointerEvent) -> GestureDispatch {
        let hover_changed = event.kind == PointerKind::Mouse && self.hovering;
        if hover_changed {
            self.hovering = false;
        }

        if let Some(session) = self.session.as_mut()
            && session.pointer_id == event.pointer_id
        {
            session.pointer_out = true;
            self.timer = None;
            return GestureDispatch::new(event, GestureOutcome::PointerOut);
        }

        let outcome = if hover_changed {
            GestureOutcome::HoverChanged
        } else {
            GestureOutcome::Unchanged
        };
        GestureDispatch::new(event, outcome)
    }

    fn active_session(&self, event: &PointerEvent) -> Result<PressSession, GestureIgnoredReason> {
        match self.session {
            None => Err(GestureIgnoredReason::NoActivePointer),
            Some(session) if session.pointer_id != event.pointer_id => {
                Err(GestureIgnoredReason::PointerMismatch)
            }
            Some(session) => Ok(session),
        }
    }
}

#[cfg(feature = "tracing")]
fn log_dispatch(dispatch: &GestureDispatch) {
    tracing::trace!(
        target: "calcpp.gesture",
        phase = ?dispatch.phase,
        pointer_id = dispatch.pointer_id,
        gesture = ?dispatch.gesture,
        outcome = ?dispatch.outcome,
        "pointer dispatch"
    );
}

#[cfg(not(feature = "tracing"))]
fn log_dispatch(_dispatch: &GestureDispatch) {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
