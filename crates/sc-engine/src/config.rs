//! Engine configuration.

/// Default number of characters kept in [`Attempt::value_prefix`](crate::Attempt::value_prefix).
pub const DEFAULT_VALUE_PREVIEW_CHARS: usize = 50;

/// Default bound on recursive passes.
pub const DEFAULT_MAX_LEVELS: u32 = 100;

/// Configuration for the [`Engine`](crate::Engine).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Prefix prepended to directive names for registry lookup and bookkeeping.
    ///
    /// Default: empty
    pub prefix: String,
    /// Maximum number of levels before the run aborts. `None` disables the bound.
    ///
    /// Default: 100
    pub max_levels: Option<u32>,
    /// Number of characters of each value kept in the execution ledger.
    ///
    /// Default: 50
    pub value_preview_chars: usize,
    /// Wrap non-empty substitutions in `<!--start …-->`/`<!--end …-->` markers.
    ///
    /// Default: true
    pub wrap_output: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            prefix: String::new(),
            max_levels: Some(DEFAULT_MAX_LEVELS),
            value_preview_chars: DEFAULT_VALUE_PREVIEW_CHARS,
            wrap_output: true,
        }
    }

    /// Set the handler name prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the maximum number of levels.
    #[must_use]
    pub fn with_max_levels(mut self, max_levels: Option<u32>) -> Self {
        self.max_levels = max_levels;
        self
    }

    /// Set the ledger value preview length.
    #[must_use]
    pub fn with_value_preview_chars(mut self, chars: usize) -> Self {
        self.value_preview_chars = chars;
        self
    }

    /// Enable or disable output wrapping.
    #[must_use]
    pub fn with_wrap_output(mut self, wrap: bool) -> Self {
        self.wrap_output = wrap;
        self
    }

    /// Return `name` with the prefix applied.
    ///
    /// Names that already carry the prefix are returned unchanged.
    #[must_use]
    pub fn prefixed(&self, name: &str) -> String {
        if name.starts_with(&self.prefix) {
            name.to_owned()
        } else {
            format!("{}{name}", self.prefix)
        }
    }

    /// Return `name` without the prefix.
    #[must_use]
    pub fn short<'a>(&self, name: &'a str) -> &'a str {
        name.strip_prefix(self.prefix.as_str()).unwrap_or(name)
    }
}
