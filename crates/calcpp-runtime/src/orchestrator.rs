#![forbid(unsafe_code)]

//! Calculation orchestrator.
//!
//! [`Calculator`] owns the expression buffer, the result slot, the history
//! stack and the compute channel. Keypad and picker actions edit the buffer
//! and dispatch requests; channel events pumped on the control thread fill
//! in results and history.
//!
//! # Result slot
//!
//! ```text
//!   empty buffer ──────────────────────────────► idle    (result "", not pending)
//!   dispatch ──► pending ── success ──► ready     (result, not pending)
//!                        └─ failure ──► error     (formatted error, pending)
//! ```
//!
//! # Invariants
//!
//! 1. At most one request is outstanding. Dispatching while `busy`
//!    reinitializes the channel first, so only the newest request can
//!    produce a response.
//! 2. An empty buffer never dispatches and never creates history.
//! 3. Equals after a settled result substitutes the result into the buffer
//!    without dispatching.
//! 4. Every applied response, success or failure, is recorded in history.
//!
//! # Failure Modes
//!
//! - Engine still loading or unavailable: edits are ignored and the view
//!   shows the loading text or the load error. [`Calculator::retry_load`]
//!   starts a fresh load after a failure.
//! - Worker died mid-request: `busy` stays set, and the next dispatch
//!   reinitializes, which spawns a fresh worker.

use std::time::Duration;

use calcpp_core::{CalcAction, CursorMove};
use calcpp_engine::{AngleUnit, CalcRequest, CalcResponse, NumeralBase, RequestKind};
use web_time::Instant;

use crate::channel::{ChannelEvent, ChannelStatus, ComputeChannel};
use crate::editor::{ExpressionBuffer, function_template};
use crate::format::MessageCatalog;
use crate::history::{HistoryConfig, HistoryItem, HistoryPolicy, HistoryStack, Relation};
use crate::picker::PickerSession;

/// Result text shown while the engine loads.
pub const LOADING_TEXT: &str = "Loading...";

/// Screen the presentation layer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Main,
    History,
    SelectVariable,
    SelectFunction,
}

/// Side effect the host must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEffect {
    /// Put this text on the clipboard.
    CopyToClipboard(String),
}

/// Render snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalcView {
    /// Editor text; the load error replaces it when the engine failed.
    pub expression: String,
    pub cursor: usize,
    pub result: String,
    /// Draw the result dimmed.
    pub result_pending: bool,
    pub busy: bool,
    pub status: ChannelStatus,
    /// Whether the editor accepts input.
    pub input_enabled: bool,
    pub page: Page,
    pub can_undo: bool,
    pub can_redo: bool,
}

/// The calculator session.
#[derive(Debug)]
pub struct Calculator {
    channel: ComputeChannel,
    buffer: ExpressionBuffer,
    result: String,
    result_pending: bool,
    needs_replace: bool,
    last_kind: Option<RequestKind>,
    busy: bool,
    uid: u32,
    angle_unit: AngleUnit,
    numeral_base: NumeralBase,
    policy: HistoryPolicy,
    history: HistoryStack,
    catalog: MessageCatalog,
    page: Page,
    picker: PickerSession,
}

impl Calculator {
    /// Start a session over `channel` with default units and history limits.
    #[must_use]
    pub fn new(channel: ComputeChannel) -> Self {
        Self {
            channel,
            buffer: ExpressionBuffer::new(),
            result: String::new(),
            result_pending: false,
            needs_replace: false,
            last_kind: None,
            busy: false,
            uid: 0,
            angle_unit: AngleUnit::default(),
            numeral_base: NumeralBase::default(),
            policy: HistoryPolicy::Append,
            history: HistoryStack::default(),
            catalog: MessageCatalog::english(),
            page: Page::Main,
            picker: PickerSession::new(),
        }
    }

    #[must_use]
    pub fn with_history(mut self, config: HistoryConfig) -> Self {
        self.history = HistoryStack::new(config);
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: MessageCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Initial units; does not dispatch.
    #[must_use]
    pub fn with_units(mut self, angle_unit: AngleUnit, numeral_base: NumeralBase) -> Self {
        self.angle_unit = angle_unit;
        self.numeral_base = numeral_base;
        self
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Apply a keypad or picker action.
    pub fn apply(&mut self, action: CalcAction) -> Option<HostEffect> {
        match action {
            CalcAction::InsertText(text) => self.insert(text, 0),
            CalcAction::InsertFunction(name) => self.insert_function(name),
            CalcAction::InsertBracketPair => self.insert("()", -1),
            CalcAction::MoveCursor(mv) => self.move_cursor(mv),
            CalcAction::Erase => self.erase(),
            CalcAction::Clear => self.clear(),
            CalcAction::Evaluate => self.evaluate(),
            CalcAction::Simplify => self.simplify(),
            CalcAction::CopyResult => {
                return Some(HostEffect::CopyToClipboard(self.result.clone()));
            }
            CalcAction::OpenHistory => self.open_history(),
            CalcAction::OpenVariablePicker => self.page = Page::SelectVariable,
            CalcAction::OpenFunctionPicker => self.page = Page::SelectFunction,
            CalcAction::Undo => self.undo(),
            CalcAction::Redo => self.redo(),
        }
        None
    }

    /// Insert `text` at the cursor and recompute.
    pub fn insert(&mut self, text: &str, offset: isize) {
        if !self.edit_allowed() {
            return;
        }
        self.buffer.insert(text, offset);
        self.recompute_after_edit();
    }

    /// Insert the call template for `name`.
    pub fn insert_function(&mut self, name: &str) {
        let (text, offset) = function_template(name);
        self.insert(&text, offset);
    }

    pub fn erase(&mut self) {
        if !self.edit_allowed() {
            return;
        }
        self.buffer.erase();
        self.recompute_after_edit();
    }

    pub fn clear(&mut self) {
        if !self.edit_allowed() {
            return;
        }
        self.buffer.clear();
        self.recompute_after_edit();
    }

    /// Replace the whole expression, as typed into a host text field.
    pub fn set_expression(&mut self, text: impl Into<String>) {
        if !self.edit_allowed() {
            return;
        }
        self.buffer.set_text(text);
        self.recompute_after_edit();
    }

    pub fn move_cursor(&mut self, mv: CursorMove) {
        self.buffer.move_cursor(mv);
    }

    /// Equals: substitute a settled result, or evaluate.
    pub fn evaluate(&mut self) {
        if self.last_kind.is_some() && !self.result_pending {
            let result = self.result.clone();
            self.buffer.set_text(result);
            tracing::debug!(target: "calcpp.calc", "result substituted into expression");
            return;
        }
        if self.dispatch_allowed() {
            self.start_calculation(RequestKind::Evaluate, HistoryPolicy::Replace);
        }
    }

    pub fn simplify(&mut self) {
        if self.dispatch_allowed() {
            self.start_calculation(RequestKind::Simplify, HistoryPolicy::Replace);
        }
    }

    pub fn set_angle_unit(&mut self, unit: AngleUnit) {
        if self.angle_unit != unit {
            self.angle_unit = unit;
            self.recompute_after_unit_change();
        }
    }

    pub fn set_numeral_base(&mut self, base: NumeralBase) {
        if self.numeral_base != base {
            self.numeral_base = base;
            self.recompute_after_unit_change();
        }
    }

    // --- history ---

    pub fn undo(&mut self) {
        if let Some(item) = self.history.undo().cloned() {
            self.enter_history_item(item);
        }
    }

    pub fn redo(&mut self) {
        if let Some(item) = self.history.redo().cloned() {
            self.enter_history_item(item);
        }
    }

    /// Restore the history item at `index`, as picked in the history view.
    pub fn jump_to(&mut self, index: usize) {
        if let Some(item) = self.history.jump_to(index).cloned() {
            self.enter_history_item(item);
        }
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.page = Page::Main;
    }

    pub fn open_history(&mut self) {
        self.needs_replace = false;
        self.page = Page::History;
    }

    // --- pages and pickers ---

    /// Leave a secondary page.
    pub fn back(&mut self) {
        self.page = Page::Main;
    }

    pub fn select_variable(&mut self, name: &str) {
        self.page = Page::Main;
        self.insert(name, 0);
    }

    pub fn select_function(&mut self, name: &str) {
        self.page = Page::Main;
        self.insert_function(name);
    }

    // ========================================================================
    // Channel events
    // ========================================================================

    /// Apply every queued channel event. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.channel.poll() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Block up to `timeout` for one event, then apply it and anything else
    /// queued. Returns `false` on timeout.
    pub fn wait_and_pump(&mut self, timeout: Duration) -> bool {
        let Some(event) = self.channel.wait(timeout) else {
            return false;
        };
        self.handle_event(event);
        self.pump();
        true
    }

    /// Pump until the outstanding request is answered. Returns `false` if
    /// still busy after `timeout`.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.pump();
        while self.busy {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !self.wait_and_pump(remaining) {
                return !self.busy;
            }
        }
        true
    }

    /// Retry a failed engine load or worker spawn. Returns `false` when the
    /// channel is not in a load-error state.
    ///
    /// The channel goes back to loading; input is enabled again once the
    /// new worker starts, which the host observes through [`Self::pump`].
    pub fn retry_load(&mut self) -> bool {
        if self.channel.status().load_error().is_none() {
            return false;
        }
        self.busy = false;
        match self.channel.reinitialize() {
            Ok(()) => {
                tracing::debug!(target: "calcpp.calc", "engine load retried");
                true
            }
            Err(err) => {
                tracing::warn!(target: "calcpp.calc", error = %err, "engine load retry failed");
                false
            }
        }
    }

    /// Terminate the worker. The session stays readable but cannot compute.
    pub fn dispose(&mut self) {
        self.channel.dispose();
        self.busy = false;
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[must_use]
    pub fn expression(&self) -> &str {
        self.buffer.text()
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.buffer.cursor()
    }

    #[must_use]
    pub fn result(&self) -> &str {
        &self.result
    }

    #[must_use]
    pub fn is_result_pending(&self) -> bool {
        self.result_pending
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Whether the next edit replaces the newest history item.
    #[must_use]
    pub fn needs_replace(&self) -> bool {
        self.needs_replace
    }

    #[must_use]
    pub fn last_kind(&self) -> Option<RequestKind> {
        self.last_kind
    }

    /// Uid of the most recent request.
    #[must_use]
    pub fn uid(&self) -> u32 {
        self.uid
    }

    #[must_use]
    pub fn angle_unit(&self) -> AngleUnit {
        self.angle_unit
    }

    #[must_use]
    pub fn numeral_base(&self) -> NumeralBase {
        self.numeral_base
    }

    #[must_use]
    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    #[must_use]
    pub fn page(&self) -> Page {
        self.page
    }

    #[must_use]
    pub fn picker(&self) -> &PickerSession {
        &self.picker
    }

    pub fn picker_mut(&mut self) -> &mut PickerSession {
        &mut self.picker
    }

    #[must_use]
    pub fn channel(&self) -> &ComputeChannel {
        &self.channel
    }

    #[must_use]
    pub fn view(&self) -> CalcView {
        let status = self.channel.status().clone();
        let expression = match status.load_error() {
            Some(error) => format!("Error: {error}"),
            None => self.buffer.text().to_string(),
        };
        let result = if status == ChannelStatus::Loading {
            LOADING_TEXT.to_string()
        } else {
            self.result.clone()
        };
        CalcView {
            expression,
            cursor: self.buffer.cursor(),
            result,
            result_pending: self.result_pending,
            busy: self.busy,
            input_enabled: status.can_send(),
            status,
            page: self.page,
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn edit_allowed(&self) -> bool {
        let allowed = self.channel.status().can_send();
        if !allowed {
            tracing::debug!(target: "calcpp.calc", status = ?self.channel.status(), "edit ignored; engine not available");
        }
        allowed
    }

    fn dispatch_allowed(&self) -> bool {
        let allowed = self.channel.status().can_send();
        if !allowed {
            tracing::debug!(target: "calcpp.calc", status = ?self.channel.status(), "calculation skipped; engine not available");
        }
        allowed
    }

    fn recompute_after_edit(&mut self) {
        let policy = if self.needs_replace {
            HistoryPolicy::Replace
        } else {
            HistoryPolicy::Append
        };
        self.start_calculation(RequestKind::EvaluateOrSimplify, policy);
    }

    fn recompute_after_unit_change(&mut self) {
        if self.buffer.is_empty() || !self.dispatch_allowed() {
            return;
        }
        if let Some(kind) = self.last_kind {
            self.start_calculation(kind, HistoryPolicy::Replace);
        }
    }

    fn start_calculation(&mut self, kind: RequestKind, policy: HistoryPolicy) {
        if self.busy {
            if let Err(err) = self.channel.reinitialize() {
                tracing::warn!(target: "calcpp.calc", error = %err, "reinitialize failed");
            }
            self.busy = false;
        }
        self.policy = policy;

        if self.buffer.is_empty() {
            self.result_pending = false;
            self.needs_replace = false;
            self.result.clear();
            return;
        }

        self.result_pending = true;
        self.needs_replace = false;
        self.last_kind = None;
        self.uid = self.uid.wrapping_add(1);
        let request = CalcRequest {
            kind,
            uid: self.uid,
            expr: self.buffer.text().to_string(),
            angle_unit: self.angle_unit,
            numeral_base: self.numeral_base,
        };
        // Set before sending: a failed send still counts as outstanding, so
        // the next dispatch replaces the worker.
        self.busy = true;
        match self.channel.send(&request) {
            Ok(()) => tracing::debug!(
                target: "calcpp.calc",
                kind = %kind,
                uid = self.uid,
                policy = ?policy,
                "calculation dispatched"
            ),
            Err(err) => tracing::warn!(
                target: "calcpp.calc",
                kind = %kind,
                uid = self.uid,
                error = %err,
                "calculation could not be sent"
            ),
        }
    }

    fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Ready { generation } => {
                tracing::debug!(target: "calcpp.calc", generation, "engine ready");
            }
            ChannelEvent::LoadFailed(error) => {
                tracing::warn!(target: "calcpp.calc", error = %error, "engine unavailable");
            }
            ChannelEvent::Response(response) => self.apply_response(response),
            ChannelEvent::WorkerExited { generation, reason } => {
                tracing::warn!(
                    target: "calcpp.calc",
                    generation,
                    reason = %reason,
                    busy = self.busy,
                    "worker exited"
                );
            }
        }
    }

    fn apply_response(&mut self, response: CalcResponse) {
        if let Err(err) = response.validate() {
            tracing::warn!(target: "calcpp.calc", error = %err, "inconsistent response");
        }
        self.busy = false;
        self.last_kind = Some(response.kind);
        let relation = Relation::for_response(response.success, response.relation_kind());
        let expr_len = response.expr.chars().count();

        let (result, anchor) = if response.success {
            self.result_pending = false;
            self.needs_replace = false;
            (response.result.clone().unwrap_or_default(), expr_len)
        } else {
            self.result_pending = true;
            self.needs_replace = true;
            match response.error() {
                Some(error) => (
                    self.catalog.render(error),
                    error.position().unwrap_or(expr_len),
                ),
                None => (String::new(), expr_len),
            }
        };

        tracing::debug!(
            target: "calcpp.calc",
            uid = response.uid,
            success = response.success,
            relation = %relation,
            "response applied"
        );

        self.result.clone_from(&result);
        let item = HistoryItem {
            uid: response.uid,
            expr: response.expr,
            relation,
            result,
            anchor,
            result_pending: self.result_pending,
        };
        self.history.record(item, self.policy);
    }

    fn enter_history_item(&mut self, item: HistoryItem) {
        self.buffer.set(item.expr, item.anchor + 1);
        self.result = item.result;
        self.result_pending = item.result_pending;
        self.needs_replace = false;
        self.page = Page::Main;
        tracing::debug!(target: "calcpp.history", uid = item.uid, "history item restored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker_thread::InProcessLoader;
    use calcpp_engine::{EngineError, MathEngine, ParseException};

    const WAIT: Duration = Duration::from_secs(5);

    /// Adds two integers; simplifies anything with `x`.
    struct AddEngine;

    impl MathEngine for AddEngine {
        fn set_angle_units(&mut self, _unit: AngleUnit) {}

        fn set_numeral_base(&mut self, _base: NumeralBase) {}

        fn process_expr(&mut self, expr: &str) -> Result<String, EngineError> {
            Ok(expr.to_string())
        }

        fn evaluate(&mut self, expr: &str) -> Result<String, EngineError> {
            let parse = |s: &str| s.trim().parse::<i64>().ok();
            match expr.split_once('+') {
                Some((a, b)) => match (parse(a), parse(b)) {
                    (Some(a), Some(b)) => Ok((a + b).to_string()),
                    _ => Err(EngineError::Parse(ParseException::new(0, expr, "syntax_error").with_params(["0"]))),
                },
                None => parse(expr)
                    .map(|v| v.to_string())
                    .ok_or_else(|| EngineError::message("not a number")),
            }
        }

        fn simplify(&mut self, expr: &str) -> Result<String, EngineError> {
            if expr.contains('x') {
                Ok(expr.replace(' ', ""))
            } else {
                Err(EngineError::message("cannot simplify"))
            }
        }
    }

    fn ready_calculator() -> Calculator {
        let mut channel = ComputeChannel::start(InProcessLoader::new(|| AddEngine));
        assert!(matches!(channel.wait(WAIT), Some(ChannelEvent::Ready { .. })));
        Calculator::new(channel)
    }

    #[test]
    fn typing_recomputes_each_edit() {
        let mut calc = ready_calculator();
        calc.apply(CalcAction::InsertText("1"));
        assert!(calc.settle(WAIT));
        calc.apply(CalcAction::InsertText("+"));
        assert!(calc.settle(WAIT));
        calc.apply(CalcAction::InsertText("2"));
        assert!(calc.settle(WAIT));
        assert_eq!(calc.result(), "3");
        assert!(!calc.is_result_pending());
        // "1" appended, "1+" failed, "1+2" replaced the failure.
        let exprs: Vec<&str> = calc.history().items().iter().map(|i| i.expr.as_str()).collect();
        assert_eq!(exprs, vec!["1", "1+2"]);
    }

    #[test]
    fn failure_marks_replace_and_pending() {
        let mut calc = ready_calculator();
        calc.set_expression("1+y");
        assert!(calc.settle(WAIT));
        assert!(calc.is_result_pending());
        assert!(calc.needs_replace());
        assert_eq!(calc.result(), "cannot simplify");
        let item = calc.history().get(0).unwrap();
        assert_eq!(item.relation, Relation::Equals);
        assert!(item.result_pending);
    }

    #[test]
    fn simplified_result_uses_equivalence() {
        let mut calc = ready_calculator();
        calc.set_expression("x + x");
        assert!(calc.settle(WAIT));
        assert_eq!(calc.result(), "x+x");
        assert_eq!(calc.history().get(0).unwrap().relation, Relation::Equivalent);
    }

    #[test]
    fn copy_result_returns_effect() {
        let mut calc = ready_calculator();
        calc.set_expression("2+2");
        assert!(calc.settle(WAIT));
        assert_eq!(
            calc.apply(CalcAction::CopyResult),
            Some(HostEffect::CopyToClipboard("4".into()))
        );
    }

    #[test]
    fn function_insert_places_cursor() {
        let mut calc = ready_calculator();
        calc.apply(CalcAction::InsertFunction("sin"));
        assert_eq!(calc.expression(), "sin()");
        assert_eq!(calc.cursor(), 4);
        calc.apply(CalcAction::InsertBracketPair);
        assert_eq!(calc.expression(), "sin(())");
        assert_eq!(calc.cursor(), 5);
    }

    #[test]
    fn pages_follow_actions() {
        let mut calc = ready_calculator();
        calc.apply(CalcAction::OpenFunctionPicker);
        assert_eq!(calc.page(), Page::SelectFunction);
        calc.picker_mut().set_function_page(1);
        calc.select_function("cos");
        assert_eq!(calc.page(), Page::Main);
        assert_eq!(calc.expression(), "cos()");
        assert_eq!(calc.picker().function_page(), 1);

        calc.apply(CalcAction::OpenVariablePicker);
        assert_eq!(calc.page(), Page::SelectVariable);
        calc.select_variable("π");
        assert_eq!(calc.expression(), "cos(π)");

        calc.apply(CalcAction::OpenHistory);
        assert_eq!(calc.page(), Page::History);
        assert!(!calc.needs_replace());
        calc.clear_history();
        assert_eq!(calc.page(), Page::Main);
    }

    #[test]
    fn unit_change_recomputes_with_last_kind() {
        let mut calc = ready_calculator();
        calc.set_expression("5");
        assert!(calc.settle(WAIT));
        let before = calc.uid();
        calc.set_numeral_base(NumeralBase::Hex);
        assert_eq!(calc.uid(), before + 1);
        assert!(calc.settle(WAIT));
        assert_eq!(calc.history().len(), 1);

        // Same unit again: nothing to do.
        calc.set_numeral_base(NumeralBase::Hex);
        assert_eq!(calc.uid(), before + 1);
    }

    #[test]
    fn view_reflects_state() {
        let mut calc = ready_calculator();
        calc.set_expression("1+1");
        assert!(calc.settle(WAIT));
        let view = calc.view();
        assert_eq!(view.expression, "1+1");
        assert_eq!(view.result, "2");
        assert!(view.input_enabled);
        assert!(!view.busy);
        assert!(!view.can_undo);
    }
}
