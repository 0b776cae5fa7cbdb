//! File-per-name handler registry.
//!
//! Every file `<dir>/<name>.<ext>` becomes the handler for the prefixed
//! directive name `<name>`. A template may start with header lines that
//! drive the engine before its body is rendered:
//!
//! ```text
//! @last
//! @after footer
//! @end analytics
//! <nav>{{worked}}</nav>
//! ```
//!
//! - `@last`: run again after every other directive of the level
//! - `@after NAME`: queue `NAME` right after this directive
//! - `@end NAME`: queue `NAME` at the end of the level
//!
//! Queued directives receive this directive's value. The body supports the
//! placeholders `{{value}}`, `{{level}}` and `{{worked}}` (comma-separated
//! short names of the handlers that completed so far).

use std::collections::HashMap;

use sc_config::HandlersConfig;
use sc_engine::{Handler, HandlerContext, HandlerOutput, HandlerRegistry, HandlerResult};

use crate::error::CliError;

/// Handler rendering one template file.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct TemplateHandler {
    run_last: bool,
    after: Vec<String>,
    at_end: Vec<String>,
    body: String,
}

impl TemplateHandler {
    pub(crate) fn parse(source: &str) -> Self {
        let mut handler = Self::default();
        let mut rest = source;

        while let Some(line) = rest.lines().next() {
            let header = line.trim_end();
            if header == "@last" {
                handler.run_last = true;
            } else if let Some(name) = header.strip_prefix("@after ") {
                handler.after.push(name.trim().to_owned());
            } else if let Some(name) = header.strip_prefix("@end ") {
                handler.at_end.push(name.trim().to_owned());
            } else {
                break;
            }
            rest = rest.get(line.len()..).unwrap_or_default();
            rest = rest
                .strip_prefix("\r\n")
                .or_else(|| rest.strip_prefix('\n'))
                .unwrap_or(rest);
        }

        handler.body = rest.to_owned();
        handler
    }
}

impl Handler for TemplateHandler {
    fn call(&self, value: &str, _text: &mut String, ctx: &mut HandlerContext<'_>) -> HandlerResult {
        if self.run_last {
            ctx.run_last()?;
        }
        for name in &self.after {
            ctx.enqueue_after_current(name, value)?;
        }
        for name in &self.at_end {
            ctx.enqueue_at_end(name, value)?;
        }

        let mut rendered = self.body.replace("{{value}}", value);
        if rendered.contains("{{level}}") {
            rendered = rendered.replace("{{level}}", &ctx.level().to_string());
        }
        if rendered.contains("{{worked}}") {
            rendered = rendered.replace("{{worked}}", &ctx.worked_names(true)?.join(", "));
        }
        Ok(HandlerOutput::Text(rendered))
    }
}

/// Registry of templates loaded from a directory.
#[derive(Debug, Default)]
pub(crate) struct TemplateRegistry {
    handlers: HashMap<String, TemplateHandler>,
}

impl TemplateRegistry {
    /// Load every template with the configured extension.
    ///
    /// A missing directory yields an empty registry.
    pub(crate) fn load(config: &HandlersConfig) -> Result<Self, CliError> {
        let mut registry = Self::default();
        if !config.dir.is_dir() {
            tracing::warn!(dir = %config.dir.display(), "Handler directory not found");
            return Ok(registry);
        }

        for entry in std::fs::read_dir(&config.dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != config.extension.as_str())
            {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let source = std::fs::read_to_string(&path).map_err(|source| CliError::Template {
                path: path.clone(),
                source,
            })?;
            tracing::debug!(handler = name, path = %path.display(), "Loaded handler template");
            registry
                .handlers
                .insert(name.to_owned(), TemplateHandler::parse(&source));
        }

        tracing::info!(
            dir = %config.dir.display(),
            count = registry.len(),
            "Loaded handler templates"
        );
        Ok(registry)
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    #[cfg(test)]
    fn from_dir(dir: &std::path::Path) -> Self {
        Self::load(&HandlersConfig {
            dir: dir.to_path_buf(),
            extension: "txt".to_owned(),
        })
        .unwrap()
    }
}

impl HandlerRegistry for TemplateRegistry {
    fn resolve(&self, name: &str) -> Option<&dyn Handler> {
        self.handlers.get(name).map(|h| h as &dyn Handler)
    }
}
