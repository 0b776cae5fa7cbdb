//! Level processor.
//!
//! Drives the expansion: scan the text, build the level queue, run every
//! entry (handlers may grow the queue while it is iterated), substitute
//! results, drain deferred entries, and start the next level from the
//! resulting text until no directive is left.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::EngineConfig;
use crate::deferred::output_text;
use crate::error::EngineError;
use crate::ledger::ExecutionLedger;
use crate::matcher::{self, BracketWarning};
use crate::queue::{LevelQueue, QueueEntry, QueueHistory};
use crate::registry::HandlerRegistry;
use crate::request::Requests;
use crate::snapshot::Snapshot;
use crate::state::EngineState;
use crate::substitute::{substitute_once, wrap_output};

/// Result of a run.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// Text with every directive expanded.
    Text(String),
    /// A handler stopped the run with this value.
    Halted(Value),
}

impl Outcome {
    /// Expanded text, or `None` if the run was halted.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Halted(_) => None,
        }
    }

    /// Whether a handler halted the run.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted(_))
    }
}

/// What happened to one queue entry.
#[derive(Debug)]
pub(crate) enum Step {
    Continue,
    Deferred,
    Halted(Value),
}

/// Recursive directive expansion engine.
///
/// # Example
///
/// ```
/// use sc_engine::{Engine, EngineConfig, HandlerOutput, Outcome, StaticRegistry};
///
/// let registry = StaticRegistry::new()
///     .with_fn("greet", |value, _text, _ctx| Ok(HandlerOutput::text(format!("Hello, {value}"))));
///
/// let mut engine = Engine::new(registry, EngineConfig::default());
/// let outcome = engine.run("[[greet#world]]").unwrap();
///
/// assert_eq!(
///     outcome,
///     Outcome::Text("<!--start greet 1 lvl-->Hello, world<!--end greet 1 lvl-->".to_owned())
/// );
/// ```
pub struct Engine<R> {
    registry: R,
    pub(crate) state: EngineState,
}

impl<R: HandlerRegistry> Engine<R> {
    /// Create an engine resolving handlers through `registry`.
    #[must_use]
    pub fn new(registry: R, config: EngineConfig) -> Self {
        Self {
            registry,
            state: EngineState::new(config),
        }
    }

    /// Expand every directive in `text`.
    ///
    /// Bookkeeping accumulates across calls; use [`reset`](Self::reset) to
    /// start from a clean state.
    ///
    /// # Errors
    ///
    /// Fatal handler misuse, handler failures and exceeding the level limit
    /// abort the run. Nothing of the partially expanded text is returned.
    pub fn run(&mut self, text: impl Into<String>) -> Result<Outcome, EngineError> {
        let text = text.into();
        tracing::debug!(length = text.len(), "Starting directive expansion");
        self.state.last_level = false;

        let result = self.work(text);
        self.state.active = None;
        self.state.fatal = None;

        match &result {
            Ok(Outcome::Text(_)) => tracing::info!(
                levels = self.state.current_level(),
                undefined = self.state.undefined.len(),
                "Directive expansion finished"
            ),
            Ok(Outcome::Halted(value)) => tracing::info!(
                level = self.state.current_level(),
                %value,
                "Directive expansion halted by handler"
            ),
            Err(e) => tracing::warn!(error = %e, "Directive expansion failed"),
        }
        result
    }

    fn work(&mut self, mut text: String) -> Result<Outcome, EngineError> {
        loop {
            let matches = if matcher::signs_directive(&text) {
                matcher::scan(&text)
            } else {
                Vec::new()
            };

            if matches.is_empty() {
                self.state.last_level = true;
                tracing::debug!(level = self.state.current_level(), "No directives left");
                if let Step::Halted(value) = self.drain_deferred(&mut text)? {
                    return Ok(Outcome::Halted(value));
                }
                if let Step::Halted(value) = self.drain_carried(&mut text)? {
                    return Ok(Outcome::Halted(value));
                }
                return Ok(Outcome::Text(text));
            }

            let level = self.state.level.map_or(1, |level| level + 1);
            if let Some(limit) = self.state.config.max_levels
                && level > limit
            {
                return Err(EngineError::LevelLimit { limit });
            }
            self.state.level = Some(level);
            tracing::debug!(level, directives = matches.len(), "Processing level");

            self.record_matches(level, &matches);

            let carried = std::mem::take(&mut self.state.carried);
            // Carried entries run at this level
            for entry in &carried {
                self.state.history.record(level, &entry.name);
            }
            self.state.queue = LevelQueue::from_entries(
                carried
                    .into_iter()
                    .chain(matches.into_iter().map(QueueEntry::from)),
            );

            // The queue may grow while it is iterated
            let mut index = 0;
            while index < self.state.queue.len() {
                if let Some(entry) = self.state.queue.pending(index).cloned() {
                    match self.execute(&entry, Some(index), &mut text)? {
                        Step::Continue => self.state.queue.consume(index),
                        Step::Deferred => self.state.queue.defer(index),
                        Step::Halted(value) => {
                            self.state.queue.consume(index);
                            return Ok(Outcome::Halted(value));
                        }
                    }
                }
                index += 1;
            }

            if let Step::Halted(value) = self.drain_deferred(&mut text)? {
                return Ok(Outcome::Halted(value));
            }
        }
    }

    fn record_matches(&mut self, level: u32, matches: &[matcher::DirectiveMatch]) {
        for m in matches {
            if let Some(warning) = m.bracket_warning() {
                let name = self.state.config.prefixed(&m.name);
                tracing::warn!(
                    directive = %name,
                    open = warning.open,
                    close = warning.close,
                    "Directive value contains brackets"
                );
                self.state.warnings.insert(name, warning);
            }
        }
        self.state
            .found
            .insert(level, matches.iter().map(|m| m.name.clone()).collect());
    }

    /// Run one entry as the active handler.
    ///
    /// `index` is the entry's position in the level queue, or `None` for
    /// deferred and carried entries, which cannot be deferred again.
    pub(crate) fn execute(
        &mut self,
        entry: &QueueEntry,
        index: Option<usize>,
        text: &mut String,
    ) -> Result<Step, EngineError> {
        let prefixed = self.state.config.prefixed(&entry.name);
        self.state.activate(&entry.name, index);

        let Some(handler) = self.registry.resolve(&prefixed) else {
            tracing::warn!(
                handler = %prefixed,
                level = self.state.current_level(),
                "No handler registered for directive"
            );
            if let Some(span) = &entry.span {
                substitute_once(text, span, "");
            }
            self.state.undefined.push(prefixed);
            return Ok(Step::Continue);
        };

        let output = self.state.invoke(handler, &entry.value, text)?;

        if index.is_some()
            && self
                .state
                .requests
                .get(&prefixed)
                .is_some_and(|p| p.is_last_work())
        {
            tracing::debug!(handler = %prefixed, "Deferring directive to end of level");
            self.state.deferred.push(prefixed, entry.clone());
            return Ok(Step::Deferred);
        }

        let replacement = match output_text(output) {
            Ok(replacement) => replacement,
            Err(value) => return Ok(Step::Halted(value)),
        };

        if let Some(span) = &entry.span {
            let replacement = if replacement.is_empty() || !self.state.config.wrap_output {
                replacement
            } else {
                wrap_output(
                    self.state.config.short(&entry.name),
                    self.state.current_level(),
                    &replacement,
                )
            };
            if !substitute_once(text, span, &replacement) {
                tracing::debug!(handler = %prefixed, "Directive span no longer in text");
            }
        }

        Ok(Step::Continue)
    }

    /// Clear all bookkeeping, keeping registry and configuration.
    pub fn reset(&mut self) {
        let config = self.state.config.clone();
        self.state = EngineState::new(config);
    }

    /// Handler registry.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.state.config
    }

    /// Last level processed, `None` if no directive was ever found.
    pub fn level(&self) -> Option<u32> {
        self.state.level
    }

    /// Whether the terminal pass was reached.
    pub fn is_last_level(&self) -> bool {
        self.state.last_level
    }

    /// Execution ledger.
    pub fn ledger(&self) -> &ExecutionLedger {
        &self.state.ledger
    }

    /// Pending handler requests.
    pub fn requests(&self) -> &Requests {
        &self.state.requests
    }

    /// Prefixed names without a registered handler, in encounter order.
    pub fn undefined(&self) -> &[String] {
        &self.state.undefined
    }

    /// Bracket warnings keyed by prefixed name.
    pub fn warnings(&self) -> &BTreeMap<String, BracketWarning> {
        &self.state.warnings
    }

    /// Names queued by handlers, per level.
    pub fn history(&self) -> &QueueHistory {
        &self.state.history
    }

    /// Directive names found by the matcher, per level.
    pub fn found_names(&self) -> &BTreeMap<u32, Vec<String>> {
        &self.state.found
    }

    /// Names whose latest invocation completed, across all levels.
    pub fn worked_names(&self, short_only: bool) -> Vec<String> {
        self.state.worked_names(short_only)
    }

    /// Owned copy of the engine state for debugging.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::handler::{HandlerOutput, ReturnType};
    use crate::registry::StaticRegistry;

    fn engine(registry: StaticRegistry) -> Engine<StaticRegistry> {
        Engine::new(registry, EngineConfig::default())
    }

    fn wrapped(name: &str, level: u32, output: &str) -> String {
        wrap_output(name, level, output)
    }

    fn text(outcome: Outcome) -> String {
        outcome.into_text().expect("run was halted")
    }

    type Log = Rc<RefCell<Vec<String>>>;

    fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn test_text_without_directives_is_unchanged() {
        let mut engine = engine(StaticRegistry::new());
        let input = "plain [text] with # and ]] but no directive";

        let output = text(engine.run(input).unwrap());

        assert_eq!(output, input);
        assert_eq!(engine.level(), None);
        assert!(engine.is_last_level());
        assert!(engine.ledger().is_empty());
    }

    #[test]
    fn test_single_substitution() {
        let registry = StaticRegistry::new().with_fn("abc", |_, _, _| Ok(HandlerOutput::text("R")));
        let mut engine = engine(registry);

        let output = text(engine.run("a [[abc#v]] b").unwrap());

        assert_eq!(output, "a <!--start abc 1 lvl-->R<!--end abc 1 lvl--> b");
        assert_eq!(engine.level(), Some(1));
        let attempts = engine.ledger().attempts(1, "abc");
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].completed);
        assert_eq!(attempts[0].return_type, Some(ReturnType::String));
    }

    #[test]
    fn test_unresolved_directive_is_removed() {
        let config = EngineConfig::new().with_prefix("OFI_");
        let mut engine = Engine::new(StaticRegistry::new(), config);

        let output = text(engine.run("[[nope#v]]").unwrap());

        assert_eq!(output, "");
        assert_eq!(engine.undefined(), ["OFI_nope".to_owned()]);
        assert!(engine.ledger().is_empty());
    }

    #[test]
    fn test_prefixed_lookup() {
        let registry =
            StaticRegistry::new().with_fn("OFI_menu", |_, _, _| Ok(HandlerOutput::text("M")));
        let mut engine = Engine::new(registry, EngineConfig::new().with_prefix("OFI_"));

        let output = text(engine.run("[[menu#]]").unwrap());

        assert_eq!(output, wrapped("menu", 1, "M"));
        assert_eq!(engine.worked_names(false), vec!["OFI_menu"]);
        assert_eq!(engine.worked_names(true), vec!["menu"]);
    }

    #[test]
    fn test_self_queue_aborts_run() {
        let registry = StaticRegistry::new().with_fn("abc", |_, _, ctx| {
            ctx.enqueue_after_current("abc", "again")?;
            Ok(HandlerOutput::text("R"))
        });
        let mut engine = engine(registry);

        let err = engine.run("[[abc#v]]").unwrap_err();

        assert!(matches!(err, EngineError::SelfQueue { handler } if handler == "abc"));
    }

    #[test]
    fn test_swallowed_self_queue_still_aborts_run() {
        let registry = StaticRegistry::new().with_fn("abc", |_, _, ctx| {
            let _ = ctx.enqueue_at_end("abc", "again");
            Ok(HandlerOutput::text("R"))
        });
        let mut engine = engine(registry);

        let err = engine.run("[[abc#v]]").unwrap_err();

        assert!(matches!(err, EngineError::SelfQueue { .. }));
        // The attempt never completed
        assert!(!engine.ledger().attempts(1, "abc")[0].completed);
    }

    #[test]
    fn test_last_work_runs_after_level() {
        let calls = log();
        let seen_by_bbb = Rc::new(RefCell::new(String::new()));

        let registry = StaticRegistry::new()
            .with_fn("aaa", {
                let calls = Rc::clone(&calls);
                move |_, _, ctx| {
                    calls.borrow_mut().push("aaa".to_owned());
                    ctx.run_last()?;
                    Ok(HandlerOutput::text("A"))
                }
            })
            .with_fn("bbb", {
                let calls = Rc::clone(&calls);
                let seen = Rc::clone(&seen_by_bbb);
                move |_, text, _| {
                    calls.borrow_mut().push("bbb".to_owned());
                    seen.borrow_mut().clone_from(text);
                    Ok(HandlerOutput::text("B"))
                }
            });
        let mut engine = engine(registry);

        let output = text(engine.run("[[aaa#1]][[bbb#2]]").unwrap());

        assert_eq!(*calls.borrow(), vec!["aaa", "bbb", "aaa"]);
        // bbb ran while aaa was still unexpanded
        assert_eq!(*seen_by_bbb.borrow(), "[[aaa#1]][[bbb#2]]");
        assert_eq!(
            output,
            format!("{}{}", wrapped("aaa", 1, "A"), wrapped("bbb", 1, "B"))
        );
        let attempts = engine.ledger().attempts(1, "aaa");
        assert_eq!(attempts.len(), 2);
        assert!(attempts.iter().all(|a| a.had_request));
        // Consumed request is cleared
        assert!(engine.requests().is_empty());
    }

    #[test]
    fn test_repeated_request_is_noop() {
        let results = Rc::new(RefCell::new(Vec::new()));

        let registry = StaticRegistry::new()
            .with_fn("aaa", {
                let results = Rc::clone(&results);
                move |_, _, ctx| {
                    results.borrow_mut().push(ctx.run_last()?);
                    results.borrow_mut().push(ctx.run_last()?);
                    Ok(HandlerOutput::text("A"))
                }
            })
            .with_fn("bbb", |_, _, _| Ok(HandlerOutput::text("B")));
        let mut engine = engine(registry);

        let output = text(engine.run("[[aaa#]] [[bbb#]]").unwrap());

        assert_eq!(results.borrow()[..2].to_vec(), vec![true, false]);
        assert_eq!(output.matches("<!--start aaa").count(), 1);
        assert_eq!(engine.ledger().attempts(1, "aaa").len(), 2);
    }

    #[test]
    fn test_nested_output_is_next_level() {
        let registry = StaticRegistry::new()
            .with_fn("outer", |_, _, _| Ok(HandlerOutput::text("<[[inner#y]]>")))
            .with_fn("inner", |_, _, ctx| {
                Ok(HandlerOutput::text(format!("I{}", ctx.level())))
            });
        let mut engine = engine(registry);

        let output = text(engine.run("[[outer#x]]").unwrap());

        assert_eq!(
            output,
            wrapped("outer", 1, &format!("<{}>", wrapped("inner", 2, "I2")))
        );
        assert_eq!(engine.level(), Some(2));
        assert_eq!(engine.found_names()[&1], vec!["outer"]);
        assert_eq!(engine.found_names()[&2], vec!["inner"]);
    }

    #[test]
    fn test_bracket_warning_recorded() {
        let mut engine = engine(StaticRegistry::new());

        let output = text(engine.run("[[abc#a[b]c]]").unwrap());

        assert_eq!(output, "");
        assert_eq!(
            engine.warnings().get("abc"),
            Some(&BracketWarning { open: 1, close: 1 })
        );
    }

    #[test]
    fn test_halt_stops_run() {
        let bbb_called = Rc::new(Cell::new(false));
        let registry = StaticRegistry::new()
            .with_fn("aaa", |_, _, _| Ok(HandlerOutput::halt(json!({ "stop": true }))))
            .with_fn("bbb", {
                let called = Rc::clone(&bbb_called);
                move |_, _, _| {
                    called.set(true);
                    Ok(HandlerOutput::text("B"))
                }
            });
        let mut engine = engine(registry);

        let outcome = engine.run("[[aaa#]] [[bbb#]]").unwrap();

        assert_eq!(outcome, Outcome::Halted(json!({ "stop": true })));
        assert!(!bbb_called.get());
        assert_eq!(
            engine.ledger().attempts(1, "aaa")[0].return_type,
            Some(ReturnType::Object)
        );
    }

    #[test]
    fn test_halted_run_is_not_last_level() {
        let registry =
            StaticRegistry::new().with_fn("stop", |_, _, _| Ok(HandlerOutput::halt(json!(1))));
        let mut engine = engine(registry);

        engine.run("plain").unwrap();
        assert!(engine.is_last_level());
        let outcome = engine.run("[[stop#]]").unwrap();

        assert!(outcome.is_halted());
        assert!(!engine.is_last_level());
    }

    #[test]
    fn test_null_output_is_bare_empty() {
        let registry = StaticRegistry::new().with_fn("abc", |_, _, _| Ok(HandlerOutput::Null));
        let mut engine = engine(registry);

        let output = text(engine.run("x[[abc#]]y").unwrap());

        assert_eq!(output, "xy");
        assert_eq!(
            engine.ledger().attempts(1, "abc")[0].return_type,
            Some(ReturnType::Null)
        );
    }

    #[test]
    fn test_enqueue_after_current_runs_next() {
        let calls = log();
        let registry = StaticRegistry::new()
            .with_fn("aaa", {
                let calls = Rc::clone(&calls);
                move |_, _, ctx| {
                    calls.borrow_mut().push("aaa".to_owned());
                    ctx.enqueue_after_current("ccc", "injected")?;
                    Ok(HandlerOutput::text("A"))
                }
            })
            .with_fn("bbb", {
                let calls = Rc::clone(&calls);
                move |_, _, _| {
                    calls.borrow_mut().push("bbb".to_owned());
                    Ok(HandlerOutput::text("B"))
                }
            })
            .with_fn("ccc", {
                let calls = Rc::clone(&calls);
                move |value, _, _| {
                    calls.borrow_mut().push(format!("ccc:{value}"));
                    Ok(HandlerOutput::text("C"))
                }
            });
        let mut engine = engine(registry);

        let output = text(engine.run("[[aaa#]][[bbb#]]").unwrap());

        assert_eq!(*calls.borrow(), vec!["aaa", "ccc:injected", "bbb"]);
        // Injected entries leave no textual footprint
        assert_eq!(
            output,
            format!("{}{}", wrapped("aaa", 1, "A"), wrapped("bbb", 1, "B"))
        );
        assert_eq!(engine.history().names(1), ["ccc".to_owned()]);
    }

    #[test]
    fn test_enqueue_at_end_runs_in_same_level() {
        let calls = log();
        let registry = StaticRegistry::new()
            .with_fn("aaa", |_, _, ctx| {
                ctx.enqueue_at_end("ccc", "")?;
                Ok(HandlerOutput::text("A"))
            })
            .with_fn("bbb", {
                let calls = Rc::clone(&calls);
                move |_, _, ctx| {
                    calls.borrow_mut().push(format!("bbb@{}", ctx.level()));
                    Ok(HandlerOutput::text("B"))
                }
            })
            .with_fn("ccc", {
                let calls = Rc::clone(&calls);
                move |_, _, ctx| {
                    calls.borrow_mut().push(format!("ccc@{}", ctx.level()));
                    Ok(HandlerOutput::Null)
                }
            });
        let mut engine = engine(registry);

        engine.run("[[aaa#]][[bbb#]]").unwrap();

        assert_eq!(*calls.borrow(), vec!["bbb@1", "ccc@1"]);
        assert_eq!(engine.level(), Some(1));
    }

    #[test]
    fn test_enqueue_from_deferred_runs_on_terminal_pass() {
        let calls = log();
        let registry = StaticRegistry::new()
            .with_fn("aaa", |_, _, ctx| {
                if ctx.run_last()? {
                    return Ok(HandlerOutput::Null);
                }
                ctx.enqueue_at_end("ccc", "late")?;
                Ok(HandlerOutput::text("A"))
            })
            .with_fn("ccc", {
                let calls = Rc::clone(&calls);
                move |value, _, _| {
                    calls.borrow_mut().push(value.to_owned());
                    Ok(HandlerOutput::text("ignored"))
                }
            });
        let mut engine = engine(registry);

        let output = text(engine.run("[[aaa#]]").unwrap());

        assert_eq!(output, wrapped("aaa", 1, "A"));
        assert_eq!(*calls.borrow(), vec!["late"]);
        assert_eq!(engine.worked_names(true), vec!["aaa", "ccc"]);
    }

    #[test]
    fn test_carried_entry_on_terminal_pass_is_not_deferred() {
        let calls = log();
        let registry = StaticRegistry::new()
            .with_fn("aaa", |_, _, ctx| {
                if ctx.run_last()? {
                    return Ok(HandlerOutput::Null);
                }
                ctx.enqueue_at_end("ccc", "late")?;
                Ok(HandlerOutput::text("A"))
            })
            .with_fn("ccc", {
                let calls = Rc::clone(&calls);
                move |value, _, ctx| {
                    calls.borrow_mut().push(value.to_owned());
                    ctx.run_last()?;
                    Ok(HandlerOutput::Null)
                }
            });
        let mut engine = engine(registry);

        text(engine.run("[[aaa#]]").unwrap());

        assert_eq!(*calls.borrow(), vec!["late"]);
        let snapshot = engine.snapshot();
        assert!(snapshot.deferred.is_empty());
        assert!(snapshot.pending.is_empty());
        assert_eq!(engine.ledger().attempts(1, "ccc").len(), 1);
    }

    #[test]
    fn test_carried_entry_counts_for_next_level_history() {
        let calls = log();
        let accepted = Rc::new(RefCell::new(Vec::new()));
        let registry = StaticRegistry::new()
            .with_fn("aaa", |_, _, ctx| {
                if ctx.run_last()? {
                    return Ok(HandlerOutput::Null);
                }
                ctx.enqueue_at_end("ccc", "from-aaa")?;
                Ok(HandlerOutput::text("[[bbb#]]"))
            })
            .with_fn("bbb", {
                let accepted = Rc::clone(&accepted);
                move |_, _, ctx| {
                    accepted
                        .borrow_mut()
                        .push(ctx.enqueue_at_end("ccc", "from-bbb")?);
                    Ok(HandlerOutput::text("B"))
                }
            })
            .with_fn("ccc", {
                let calls = Rc::clone(&calls);
                move |value, _, ctx| {
                    calls.borrow_mut().push(format!("{value}@{}", ctx.level()));
                    Ok(HandlerOutput::Null)
                }
            });
        let mut engine = engine(registry);

        let output = text(engine.run("[[aaa#]]").unwrap());

        assert_eq!(*calls.borrow(), vec!["from-aaa@2"]);
        assert_eq!(*accepted.borrow(), vec![false]);
        assert_eq!(engine.history().names(2), ["ccc".to_owned()]);
        assert_eq!(output, wrapped("aaa", 1, &wrapped("bbb", 2, "B")));
    }

    #[test]
    fn test_handler_error_propagates() {
        let registry = StaticRegistry::new().with_fn("abc", |_, _, _| Err("boom".into()));
        let mut engine = engine(registry);

        let err = engine.run("[[abc#]]").unwrap_err();

        assert_eq!(err.to_string(), "handler `abc` failed: boom");
        assert!(!engine.ledger().attempts(1, "abc")[0].completed);
        assert!(engine.worked_names(false).is_empty());
    }

    #[test]
    fn test_level_limit() {
        let registry =
            StaticRegistry::new().with_fn("rec", |_, _, _| Ok(HandlerOutput::text("[[rec#]]")));
        let mut engine = Engine::new(registry, EngineConfig::new().with_max_levels(Some(3)));

        let err = engine.run("[[rec#]]").unwrap_err();

        assert!(matches!(err, EngineError::LevelLimit { limit: 3 }));
        assert_eq!(engine.level(), Some(3));
    }

    #[test]
    fn test_handler_can_edit_whole_text() {
        let registry = StaticRegistry::new().with_fn("abc", |_, text, _| {
            text.push('!');
            Ok(HandlerOutput::text("R"))
        });
        let mut engine = engine(registry);

        let output = text(engine.run("[[abc#]]").unwrap());

        assert_eq!(output, format!("{}!", wrapped("abc", 1, "R")));
    }

    #[test]
    fn test_missing_span_is_silent() {
        let bbb_called = Rc::new(Cell::new(false));
        let registry = StaticRegistry::new()
            .with_fn("aaa", |_, text, _| {
                text.clear();
                Ok(HandlerOutput::text("A"))
            })
            .with_fn("bbb", {
                let called = Rc::clone(&bbb_called);
                move |_, _, _| {
                    called.set(true);
                    Ok(HandlerOutput::text("B"))
                }
            });
        let mut engine = engine(registry);

        let output = text(engine.run("[[aaa#]][[bbb#]]").unwrap());

        assert_eq!(output, "");
        assert!(bbb_called.get());
    }

    #[test]
    fn test_identical_directives_replace_in_order() {
        let counter = Rc::new(Cell::new(0));
        let registry = StaticRegistry::new().with_fn("cnt", {
            let counter = Rc::clone(&counter);
            move |_, _, _| {
                counter.set(counter.get() + 1);
                Ok(HandlerOutput::text(counter.get().to_string()))
            }
        });
        let mut engine = engine(registry);

        let output = text(engine.run("[[cnt#]] [[cnt#]]").unwrap());

        assert_eq!(
            output,
            format!("{} {}", wrapped("cnt", 1, "1"), wrapped("cnt", 1, "2"))
        );
        assert_eq!(engine.ledger().attempts(1, "cnt").len(), 2);
    }

    #[test]
    fn test_wrapping_disabled() {
        let registry = StaticRegistry::new().with_fn("abc", |_, _, _| Ok(HandlerOutput::text("R")));
        let mut engine = Engine::new(registry, EngineConfig::new().with_wrap_output(false));

        let output = text(engine.run("a [[abc#v]] b").unwrap());

        assert_eq!(output, "a R b");
    }

    #[test]
    fn test_worked_names_from_handler() {
        let seen = log();
        let registry = StaticRegistry::new()
            .with_fn("aaa", |_, _, _| Ok(HandlerOutput::text("A")))
            .with_fn("bbb", {
                let seen = Rc::clone(&seen);
                move |_, _, ctx| {
                    seen.borrow_mut().extend(ctx.worked_names(true)?);
                    Ok(HandlerOutput::text("B"))
                }
            });
        let mut engine = Engine::new(registry, EngineConfig::new());

        engine.run("[[aaa#]][[bbb#]]").unwrap();

        // bbb's own attempt is still open while it runs
        assert_eq!(*seen.borrow(), vec!["aaa"]);
    }

    #[test]
    fn test_reset() {
        let registry = StaticRegistry::new().with_fn("abc", |_, _, _| Ok(HandlerOutput::text("R")));
        let mut engine = engine(registry);
        engine.run("[[abc#]]").unwrap();

        engine.reset();

        assert_eq!(engine.level(), None);
        assert!(engine.ledger().is_empty());
        assert!(!engine.is_last_level());
    }

    #[test]
    fn test_levels_continue_across_runs() {
        let registry = StaticRegistry::new().with_fn("abc", |_, _, _| Ok(HandlerOutput::text("R")));
        let mut engine = engine(registry);

        engine.run("[[abc#]]").unwrap();
        let output = text(engine.run("[[abc#]]").unwrap());

        assert_eq!(output, wrapped("abc", 2, "R"));
    }
}
