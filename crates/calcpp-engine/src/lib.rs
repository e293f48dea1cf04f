#![forbid(unsafe_code)]

//! Engine: the math engine capability and the worker wire protocol.
//!
//! # Role in calcpp
//! The symbolic/numeric math itself is an opaque external engine. This crate
//! defines the seam to it ([`MathEngine`]), the request/response values that
//! cross the compute channel, and the worker-side request handling shared
//! by every worker kind.
//!
//! # Primary responsibilities
//! - **protocol**: [`CalcRequest`], [`CalcResponse`], [`WorkerMessage`] and
//!   their JSON encoding (one object per line on process transports).
//! - **engine**: the [`MathEngine`] trait and [`handle_request`], which
//!   resolves the combined evaluate-or-simplify kind.
//! - **host**: [`serve_lines`], the loop an engine executable runs to serve
//!   requests over stdin/stdout.

pub mod engine;
pub mod host;
pub mod protocol;

pub use engine::{MathEngine, handle_request};
pub use host::{ServeStats, serve_lines};
pub use protocol::{
    AngleUnit, CalcRequest, CalcResponse, EngineError, NumeralBase, ParseException,
    ProtocolError, RequestKind, WorkerMessage,
};
