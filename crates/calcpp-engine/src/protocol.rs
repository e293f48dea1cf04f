#![forbid(unsafe_code)]

//! Worker wire protocol.
//!
//! Requests and responses are plain JSON objects keyed by `type`:
//!
//! ```text
//! worker → host   {"type":"init"}
//! host → worker   {"type":"evaluate","uid":7,"expr":"1+2","angleUnit":"rad","numeralBase":"dec"}
//! worker → host   {"type":"evaluate","uid":7,"success":true,"expr":"1+2","result":"3"}
//! ```
//!
//! Combined `evaluate/simplify` responses additionally carry `resultType`
//! (the attempt that produced the shown value) and, when evaluation failed,
//! `evaluateError`. Engine errors are either a bare string or a structured
//! [`ParseException`].
//!
//! Process transports frame one object per line; in-process transports pass
//! the values directly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Angle unit applied to trigonometric functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    Deg,
    #[default]
    Rad,
    Grad,
    Turns,
}

impl AngleUnit {
    pub const ALL: [Self; 4] = [Self::Deg, Self::Rad, Self::Grad, Self::Turns];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deg => "deg",
            Self::Rad => "rad",
            Self::Grad => "grad",
            Self::Turns => "turns",
        }
    }
}

/// Numeral base used to parse and print numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumeralBase {
    #[default]
    Dec,
    Hex,
    Oct,
    Bin,
}

impl NumeralBase {
    pub const ALL: [Self; 4] = [Self::Dec, Self::Hex, Self::Oct, Self::Bin];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dec => "dec",
            Self::Hex => "hex",
            Self::Oct => "oct",
            Self::Bin => "bin",
        }
    }
}

/// Calculation request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    #[serde(rename = "evaluate")]
    Evaluate,
    #[serde(rename = "simplify")]
    Simplify,
    /// Evaluate, falling back to simplification on failure.
    #[serde(rename = "evaluate/simplify")]
    EvaluateOrSimplify,
}

impl RequestKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Evaluate => "evaluate",
            Self::Simplify => "simplify",
            Self::EvaluateOrSimplify => "evaluate/simplify",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

/// Structured parse/evaluation failure reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseException {
    /// Character offset of the failure in the processed expression.
    pub position: usize,
    pub expression: String,
    /// Key into the message catalog.
    pub message_code: String,
    #[serde(default)]
    pub params: Vec<String>,
}

impl ParseException {
    #[must_use]
    pub fn new(position: usize, expression: impl Into<String>, message_code: impl Into<String>) -> Self {
        Self {
            position,
            expression: expression.into(),
            message_code: message_code.into(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }
}

/// An engine failure: a structured parse exception or an opaque message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EngineError {
    Parse(ParseException),
    Message(String),
}

impl EngineError {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Error position, if the engine reported one.
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Parse(pe) => Some(pe.position),
            Self::Message(_) => None,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(pe) => write!(f, "{} at position {}", pe.message_code, pe.position),
            Self::Message(message) => f.write_str(message),
        }
    }
}

impl From<ParseException> for EngineError {
    fn from(value: ParseException) -> Self {
        Self::Parse(value)
    }
}

// ---------------------------------------------------------------------------
// Requests and responses
// ---------------------------------------------------------------------------

/// One calculation request. Immutable once sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalcRequest {
    #[serde(rename = "type")]
    pub kind: RequestKind,
    /// Correlation counter, wrapping at 2^32.
    pub uid: u32,
    pub expr: String,
    pub angle_unit: AngleUnit,
    pub numeral_base: NumeralBase,
}

impl CalcRequest {
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Result of one calculation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalcResponse {
    /// Echo of the request kind.
    #[serde(rename = "type")]
    pub kind: RequestKind,
    /// Echo of the request uid.
    pub uid: u32,
    pub success: bool,
    /// Echo of the request expression.
    pub expr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Attempt that produced the outcome. Set on combined requests only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_type: Option<RequestKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluate_error: Option<EngineError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simplify_error: Option<EngineError>,
}

impl CalcResponse {
    /// Successful response to `request`.
    #[must_use]
    pub fn succeeded(request: &CalcRequest, result: impl Into<String>) -> Self {
        Self {
            kind: request.kind,
            uid: request.uid,
            success: true,
            expr: request.expr.clone(),
            result: Some(result.into()),
            result_type: None,
            evaluate_error: None,
            simplify_error: None,
        }
    }

    /// Failed response to `request`.
    #[must_use]
    pub fn failed(
        request: &CalcRequest,
        evaluate_error: Option<EngineError>,
        simplify_error: Option<EngineError>,
    ) -> Self {
        Self {
            kind: request.kind,
            uid: request.uid,
            success: false,
            expr: request.expr.clone(),
            result: None,
            result_type: None,
            evaluate_error,
            simplify_error,
        }
    }

    #[must_use]
    pub fn with_result_type(mut self, kind: RequestKind) -> Self {
        self.result_type = Some(kind);
        self
    }

    #[must_use]
    pub fn with_evaluate_error(mut self, error: EngineError) -> Self {
        self.evaluate_error = Some(error);
        self
    }

    /// Kind deciding the relation symbol: the producing attempt when known,
    /// otherwise the request kind.
    #[must_use]
    pub fn relation_kind(&self) -> RequestKind {
        self.result_type.unwrap_or(self.kind)
    }

    /// The error to show for a failed response, preferring the
    /// simplification error.
    #[must_use]
    pub fn error(&self) -> Option<&EngineError> {
        self.simplify_error.as_ref().or(self.evaluate_error.as_ref())
    }

    /// Check the success flag against the payload.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.success && self.result.is_none() {
            return Err(ProtocolError::MissingResult { uid: self.uid });
        }
        if !self.success && self.error().is_none() {
            return Err(ProtocolError::MissingError { uid: self.uid });
        }
        Ok(())
    }
}

/// Message from a worker to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    /// The engine finished loading and accepts requests.
    Init,
    Response(CalcResponse),
}

impl WorkerMessage {
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Init => serde_json::to_string(&serde_json::json!({ "type": "init" })),
            Self::Response(response) => serde_json::to_string(response),
        }
    }

    /// Decode and validate one wire object.
    pub fn from_json_str(s: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(s)?;
        match value.get("type").and_then(serde_json::Value::as_str) {
            Some("init") => Ok(Self::Init),
            Some(_) => {
                let response: CalcResponse = serde_json::from_value(value)?;
                response.validate()?;
                Ok(Self::Response(response))
            }
            None => Err(ProtocolError::MissingType),
        }
    }
}

/// A wire message that could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message has no `type` field")]
    MissingType,

    #[error("successful response {uid} carries no result")]
    MissingResult { uid: u32 },

    #[error("failed response {uid} carries no error")]
    MissingError { uid: u32 },
}
