//! Recursive directive expansion engine.
//!
//! Text may contain directives of the form `[[name#value]]`. The [`Engine`]
//! finds them, resolves each name to a [`Handler`] through a
//! [`HandlerRegistry`], and replaces the directive with the handler's
//! output. Output may contain further directives, which are expanded on the
//! next level until none are left.
//!
//! # Architecture
//!
//! - [`matcher`]: cheap pre-check and full scan of the text
//! - [`Engine`]: level loop, substitution and deferred work
//! - [`HandlerContext`]: the API a running handler uses to queue more work,
//!   register requests and query completed handlers
//! - [`ExecutionLedger`]: per-level record of every handler attempt
//!
//! Handlers can ask to run after every other directive of their level with
//! [`HandlerContext::run_last`], inject work with
//! [`HandlerContext::enqueue_after_current`] and
//! [`HandlerContext::enqueue_at_end`], or stop the whole run by returning
//! [`HandlerOutput::Halt`].
//!
//! # Example
//!
//! ```
//! use sc_engine::{Engine, EngineConfig, HandlerOutput, StaticRegistry};
//!
//! let registry = StaticRegistry::new()
//!     .with_fn("OFI_user", |value, _text, _ctx| Ok(HandlerOutput::text(value.to_uppercase())));
//!
//! let config = EngineConfig::new().with_prefix("OFI_").with_wrap_output(false);
//! let mut engine = Engine::new(registry, config);
//!
//! let text = engine.run("Hi [[user#ann]]!").unwrap().into_text();
//! assert_eq!(text.as_deref(), Some("Hi ANN!"));
//! assert_eq!(engine.worked_names(true), vec!["user"]);
//! ```

mod config;
mod context;
mod deferred;
mod engine;
mod error;
mod handler;
mod ledger;
pub mod matcher;
mod queue;
mod registry;
mod request;
mod snapshot;
mod state;
mod substitute;

pub use config::{DEFAULT_MAX_LEVELS, DEFAULT_VALUE_PREVIEW_CHARS, EngineConfig};
pub use context::HandlerContext;
pub use deferred::DeferredEntry;
pub use engine::{Engine, Outcome};
pub use error::{BoxError, EngineError};
pub use handler::{Handler, HandlerOutput, HandlerResult, ReturnType};
pub use ledger::{Attempt, ExecutionLedger, NameAttempts};
pub use matcher::{BracketWarning, DirectiveMatch};
pub use queue::{Placement, QueueEntry, QueueHistory};
pub use registry::{HandlerRegistry, StaticRegistry};
pub use request::{LAST_WORK, PendingRequest, Requests, request_hash};
pub use snapshot::Snapshot;
pub use substitute::{substitute_once, wrap_output};
