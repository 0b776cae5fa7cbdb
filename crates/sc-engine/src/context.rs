//! Handler execution context.
//!
//! A [`HandlerContext`] is created by the engine for each handler invocation
//! and is the only way to reach the handler-facing engine API. It carries a
//! token that is checked against the active handler on every call, so a
//! context can never act on behalf of another invocation.

use crate::error::EngineError;
use crate::queue::Placement;
use crate::request::LAST_WORK;
use crate::state::EngineState;

/// Identifies one handler invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ExecutionToken(pub(crate) u64);

/// Engine access granted to the active handler.
///
/// # Example
///
/// ```
/// use sc_engine::{Engine, EngineConfig, HandlerOutput, Outcome, StaticRegistry};
///
/// let registry = StaticRegistry::new()
///     .with_fn("page", |_value, _text, ctx| {
///         // Emit the footer side effect after this directive
///         ctx.enqueue_after_current("footer", "")?;
///         Ok(HandlerOutput::text("body"))
///     })
///     .with_fn("footer", |_value, _text, _ctx| Ok(HandlerOutput::Null));
///
/// let mut engine = Engine::new(registry, EngineConfig::default());
/// let outcome = engine.run("[[page#]]").unwrap();
/// assert_eq!(
///     outcome,
///     Outcome::Text("<!--start page 1 lvl-->body<!--end page 1 lvl-->".to_owned())
/// );
/// assert_eq!(engine.worked_names(false), vec!["page", "footer"]);
/// ```
pub struct HandlerContext<'a> {
    state: &'a mut EngineState,
    token: ExecutionToken,
}

impl<'a> HandlerContext<'a> {
    pub(crate) fn new(state: &'a mut EngineState, token: ExecutionToken) -> Self {
        Self { state, token }
    }

    /// Prefixed name of the active handler.
    pub fn handler_name(&self) -> Result<&str, EngineError> {
        self.state
            .active_for(self.token, "handler_name")
            .map(|active| active.prefixed.as_str())
    }

    /// Current level (1-based).
    #[must_use]
    pub fn level(&self) -> u32 {
        self.state.current_level()
    }

    /// Queue `name` immediately after the current directive.
    ///
    /// Returns `false` if the name was already queued at this level or has a
    /// pending request.
    ///
    /// # Errors
    ///
    /// [`EngineError::SelfQueue`] if `name` is the active handler itself.
    pub fn enqueue_after_current(&mut self, name: &str, value: &str) -> Result<bool, EngineError> {
        self.enqueue_one("enqueue_after_current", name, value, Placement::AfterCurrent)
    }

    /// Queue `name` at the end of the current level.
    ///
    /// Same rules as [`enqueue_after_current`](Self::enqueue_after_current).
    pub fn enqueue_at_end(&mut self, name: &str, value: &str) -> Result<bool, EngineError> {
        self.enqueue_one("enqueue_at_end", name, value, Placement::AtEnd)
    }

    /// Queue several names as one batch sharing `value` and `placement`.
    ///
    /// The batch keeps its order. Returns, per name, whether it was accepted.
    /// If any name is the active handler the whole batch is rejected.
    pub fn enqueue_batch(
        &mut self,
        names: &[&str],
        value: &str,
        placement: Placement,
    ) -> Result<Vec<bool>, EngineError> {
        self.state
            .enqueue(self.token, "enqueue_batch", names, value, placement)
    }

    fn enqueue_one(
        &mut self,
        operation: &'static str,
        name: &str,
        value: &str,
        placement: Placement,
    ) -> Result<bool, EngineError> {
        let accepted = self
            .state
            .enqueue(self.token, operation, &[name], value, placement)?;
        Ok(accepted.first().copied().unwrap_or(false))
    }

    /// Register a request for the active handler.
    ///
    /// Returns `false` if the identical request is already pending.
    pub fn add_request(&mut self, request: &str) -> Result<bool, EngineError> {
        let name = self
            .state
            .active_for(self.token, "add_request")?
            .prefixed
            .clone();
        let added = self.state.requests.add(&name, request);
        if added {
            tracing::debug!(handler = %name, request, "Request registered");
        }
        Ok(added)
    }

    /// Ask to run again after every other directive of this level.
    ///
    /// Shorthand for `add_request("lastWork")`.
    pub fn run_last(&mut self) -> Result<bool, EngineError> {
        self.add_request(LAST_WORK)
    }

    /// Names whose latest invocation completed, across all levels.
    ///
    /// With `short_only`, names are returned without the prefix.
    pub fn worked_names(&self, short_only: bool) -> Result<Vec<String>, EngineError> {
        self.state.active_for(self.token, "worked_names")?;
        Ok(self.state.worked_names(short_only))
    }
}
