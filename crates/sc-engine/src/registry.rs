//! Handler lookup.

use std::collections::HashMap;

use crate::context::HandlerContext;
use crate::handler::{FnHandler, Handler, HandlerResult};

/// Resolves prefixed directive names to handlers.
pub trait HandlerRegistry {
    /// Look up the handler for `name`, or `None` if it is not registered.
    fn resolve(&self, name: &str) -> Option<&dyn Handler>;
}

impl<T: HandlerRegistry + ?Sized> HandlerRegistry for &T {
    fn resolve(&self, name: &str) -> Option<&dyn Handler> {
        (**self).resolve(name)
    }
}

impl<T: HandlerRegistry + ?Sized> HandlerRegistry for Box<T> {
    fn resolve(&self, name: &str) -> Option<&dyn Handler> {
        (**self).resolve(name)
    }
}

/// In-memory registry populated by the host.
///
/// # Example
///
/// ```
/// use sc_engine::{HandlerOutput, StaticRegistry};
///
/// let registry = StaticRegistry::new()
///     .with_fn("year", |_value, _text, _ctx| Ok(HandlerOutput::text("2024")));
///
/// assert!(registry.contains("year"));
/// ```
#[derive(Default)]
pub struct StaticRegistry {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl StaticRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `name`.
    #[must_use]
    pub fn with_handler<H: Handler + 'static>(mut self, name: impl Into<String>, handler: H) -> Self {
        self.insert(name, handler);
        self
    }

    /// Register a closure under `name`.
    #[must_use]
    pub fn with_fn<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str, &mut String, &mut HandlerContext<'_>) -> HandlerResult + 'static,
    {
        self.insert(name, FnHandler(f));
        self
    }

    /// Register a handler, replacing any previous one with the same name.
    pub fn insert<H: Handler + 'static>(&mut self, name: impl Into<String>, handler: H) {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    /// Whether a handler is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl HandlerRegistry for StaticRegistry {
    fn resolve(&self, name: &str) -> Option<&dyn Handler> {
        self.handlers.get(name).map(AsRef::as_ref)
    }
}
