//! Directive handler trait and output types.

use serde_json::Value;

use crate::context::HandlerContext;
use crate::error::BoxError;

/// Result returned by a [`Handler`].
pub type HandlerResult = Result<HandlerOutput, BoxError>;

/// Output from a directive handler.
///
/// - [`Text`](Self::Text): substituted for the directive span
/// - [`Null`](Self::Null): substituted as an empty string, recorded as `null`
/// - [`Halt`](Self::Halt): stops the whole run and becomes its result
#[derive(Clone, Debug, PartialEq)]
pub enum HandlerOutput {
    /// Replacement text.
    Text(String),
    /// No output.
    Null,
    /// Early termination value.
    Halt(Value),
}

impl HandlerOutput {
    /// Create a text output.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Create a halt output.
    #[must_use]
    pub fn halt(value: impl Into<Value>) -> Self {
        Self::Halt(value.into())
    }

    /// Type discriminator recorded in the execution ledger.
    #[must_use]
    pub fn return_type(&self) -> ReturnType {
        match self {
            Self::Text(_) => ReturnType::String,
            Self::Null => ReturnType::Null,
            Self::Halt(value) => ReturnType::of(value),
        }
    }
}

impl From<String> for HandlerOutput {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for HandlerOutput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<Option<String>> for HandlerOutput {
    fn from(s: Option<String>) -> Self {
        s.map_or(Self::Null, Self::Text)
    }
}

/// Lower-cased type of a handler's raw return value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ReturnType {
    /// Replacement text, or a JSON string halt value.
    String,
    /// No output, or a JSON `null` halt value.
    Null,
    /// JSON boolean halt value.
    Boolean,
    /// JSON integer halt value.
    Integer,
    /// JSON floating point halt value.
    Double,
    /// JSON array halt value.
    Array,
    /// JSON object halt value.
    Object,
}

impl ReturnType {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if n.is_f64() => Self::Double,
            Value::Number(_) => Self::Integer,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    /// Tag as a lowercase string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// Trait for directive handlers.
///
/// A handler receives the directive value, the whole text being processed
/// (it may edit it in place) and a [`HandlerContext`] through which it can
/// schedule more work or register requests while it is the active handler.
///
/// # Example
///
/// ```
/// use sc_engine::{Handler, HandlerContext, HandlerOutput, HandlerResult};
///
/// struct Upper;
///
/// impl Handler for Upper {
///     fn call(&self, value: &str, _text: &mut String, _ctx: &mut HandlerContext<'_>) -> HandlerResult {
///         Ok(HandlerOutput::text(value.to_uppercase()))
///     }
/// }
/// ```
pub trait Handler {
    /// Handle one directive occurrence.
    fn call(&self, value: &str, text: &mut String, ctx: &mut HandlerContext<'_>) -> HandlerResult;
}

/// [`Handler`] backed by a closure.
pub(crate) struct FnHandler<F>(pub(crate) F);

impl<F> Handler for FnHandler<F>
where
    F: Fn(&str, &mut String, &mut HandlerContext<'_>) -> HandlerResult,
{
    fn call(&self, value: &str, text: &mut String, ctx: &mut HandlerContext<'_>) -> HandlerResult {
        (self.0)(value, text, ctx)
    }
}
