//! Engine error types.
//!
//! Only fatal conditions are errors. Unresolved handlers and malformed
//! directive values are recorded on the engine and inspected after the run.

/// Boxed error raised by a handler.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Fatal error that aborts [`Engine::run`](crate::Engine::run).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The active handler tried to enqueue its own name.
    #[error("handler `{handler}` cannot queue itself")]
    SelfQueue {
        /// Short name of the offending handler.
        handler: String,
    },
    /// A handler-only operation was invoked outside the handler that owns it.
    #[error("`{operation}` can only be called from the active handler")]
    InvalidCallContext {
        /// Operation name (e.g., "`enqueue_at_end`").
        operation: &'static str,
    },
    /// The text kept producing directives past the configured level limit.
    #[error("maximum nesting level ({limit}) exceeded")]
    LevelLimit {
        /// Configured limit.
        limit: u32,
    },
    /// A handler returned an error of its own.
    #[error("handler `{name}` failed: {source}")]
    Handler {
        /// Prefixed name of the failing handler.
        name: String,
        /// Error returned by the handler.
        #[source]
        source: BoxError,
    },
}

impl EngineError {
    /// Wrap an error returned by a handler.
    ///
    /// Engine errors that travelled through the handler (for example a
    /// rejected self-queue propagated with `?`) are unwrapped instead of
    /// being nested.
    pub(crate) fn from_handler(name: &str, source: BoxError) -> Self {
        match source.downcast::<Self>() {
            Ok(engine) => *engine,
            Err(source) => Self::Handler {
                name: name.to_owned(),
                source,
            },
        }
    }
}
