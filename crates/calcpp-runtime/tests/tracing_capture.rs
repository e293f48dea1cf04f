#![forbid(unsafe_code)]

//! Log points emitted by the channel and the orchestrator.
//!
//! Run:
//!   cargo test -p calcpp-runtime --test tracing_capture

mod support;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use calcpp_core::CalcAction;
use calcpp_engine::CalcResponse;
use calcpp_runtime::Calculator;
use tracing_subscriber::layer::SubscriberExt;

use support::{ManualLoader, ready_channel};

// ============================================================================
// Tracing Capture Infrastructure
// ============================================================================

#[derive(Debug, Clone)]
struct CapturedEvent {
    target: String,
    level: tracing::Level,
    message: Option<String>,
    fields: HashMap<String, String>,
}

struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let fields: HashMap<String, String> = visitor.0.into_iter().collect();
        self.events.lock().unwrap().push(CapturedEvent {
            target: event.metadata().target().to_string(),
            level: *event.metadata().level(),
            message: fields.get("message").cloned(),
            fields,
        });
    }
}

fn with_capture<F: FnOnce()>(f: F) -> Vec<CapturedEvent> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::TRACE)
        .with(EventCapture {
            events: Arc::clone(&events),
        });
    tracing::subscriber::with_default(subscriber, f);
    let captured = events.lock().unwrap().clone();
    captured
}

fn find<'a>(events: &'a [CapturedEvent], target: &str, message: &str) -> Vec<&'a CapturedEvent> {
    events
        .iter()
        .filter(|e| e.target == target && e.message.as_deref() == Some(message))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn dispatch_reinit_and_stale_drop_are_logged() {
    let events = with_capture(|| {
        let (loader, workers) = ManualLoader::new();
        let mut calc = Calculator::new(ready_channel(loader));
        calc.apply(CalcAction::InsertText("4"));
        let (stale_generation, stale) = workers.last_request();
        calc.apply(CalcAction::InsertText("2"));
        workers.respond_as(stale_generation, CalcResponse::succeeded(&stale, "4"));
        workers.succeed_last("42");
        calc.pump();
    });

    let dispatched = find(&events, "calcpp.calc", "calculation dispatched");
    assert_eq!(dispatched.len(), 2);
    assert_eq!(dispatched[0].fields.get("kind").map(String::as_str), Some("evaluate/simplify"));
    assert_eq!(dispatched[1].fields.get("uid").map(String::as_str), Some("2"));
    assert_eq!(dispatched[0].level, tracing::Level::DEBUG);

    assert_eq!(find(&events, "calcpp.channel", "reinitializing worker").len(), 1);
    let dropped = find(&events, "calcpp.channel", "dropping superseded worker message");
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].fields.get("generation").map(String::as_str), Some("1"));

    let applied = find(&events, "calcpp.calc", "response applied");
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].fields.get("success").map(String::as_str), Some("true"));
    assert_eq!(find(&events, "calcpp.history", "history item recorded").len(), 1);
}

#[test]
fn load_failure_is_logged_as_error() {
    let events = with_capture(|| {
        let mut channel =
            calcpp_runtime::ComputeChannel::start(support::FailingLoader("no engine"));
        assert!(channel.wait(support::WAIT).is_some());
    });
    let failed = find(&events, "calcpp.channel", "engine load failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].level, tracing::Level::ERROR);
    assert_eq!(failed[0].fields.get("error").map(String::as_str), Some("no engine"));
}
