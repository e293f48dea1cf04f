#![forbid(unsafe_code)]

//! calcpp Runtime
//!
//! The control-thread side of the calculator: the compute channel to the
//! isolated engine worker, the history stack, and the orchestrator that
//! turns keypad actions into engine requests and responses into results.
//!
//! # Key Components
//!
//! - [`ComputeChannel`] - single-slot channel to a generation-tagged worker
//! - [`InProcessLoader`] / [`ProcessLoader`] - thread and child-process workers
//! - [`Calculator`] - expression buffer, result slot, dispatch and history
//! - [`HistoryStack`] - calculation history with an undo/redo pointer
//! - [`MessageCatalog`] - rendering of structured engine errors
//! - [`CalcConfig`] - TOML/JSON configuration
//!
//! # How it fits in the system
//! `calcpp-core` produces [`calcpp_core::CalcAction`]s from keypad gestures;
//! the host feeds them to [`Calculator::apply`], pumps channel events on its
//! tick, and renders [`Calculator::view`]. The math itself runs behind the
//! [`calcpp_engine::MathEngine`] seam on a worker.

pub mod cancellation;
pub mod channel;
pub mod config;
pub mod editor;
pub mod format;
pub mod history;
pub mod orchestrator;
pub mod picker;
pub mod worker_process;
pub mod worker_thread;

pub use cancellation::{CancellationSource, CancellationToken};
pub use channel::{
    ChannelError, ChannelEvent, ChannelStatus, ComputeChannel, EngineLoader, LoadError,
    WorkerFactory, WorkerOutbox, WorkerTransport,
};
pub use config::{CalcConfig, ConfigError};
pub use editor::{ExpressionBuffer, function_template};
pub use format::MessageCatalog;
pub use history::{HistoryConfig, HistoryItem, HistoryPolicy, HistoryStack, Relation};
pub use orchestrator::{CalcView, Calculator, HostEffect, LOADING_TEXT, Page};
pub use picker::{FUNCTION_CATEGORIES, FunctionCategory, PickerSession, VARIABLES, Variable};
pub use worker_process::ProcessLoader;
pub use worker_thread::InProcessLoader;
