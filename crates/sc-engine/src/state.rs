//! Mutable engine state shared by the level processor and handler contexts.

use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::context::{ExecutionToken, HandlerContext};
use crate::deferred::DeferredQueue;
use crate::error::EngineError;
use crate::handler::{Handler, HandlerOutput};
use crate::ledger::ExecutionLedger;
use crate::matcher::BracketWarning;
use crate::queue::{LevelQueue, Placement, QueueEntry, QueueHistory};
use crate::request::Requests;

/// The handler currently running.
#[derive(Debug)]
pub(crate) struct Active {
    pub(crate) token: ExecutionToken,
    pub(crate) prefixed: String,
    pub(crate) short: String,
    /// Queue index of the running entry. `None` while draining deferred work.
    pub(crate) index: Option<usize>,
}

#[derive(Debug, Default)]
pub(crate) struct EngineState {
    pub(crate) config: EngineConfig,
    pub(crate) level: Option<u32>,
    pub(crate) last_level: bool,
    pub(crate) queue: LevelQueue,
    /// Entries queued while no level queue was being iterated.
    pub(crate) carried: Vec<QueueEntry>,
    pub(crate) deferred: DeferredQueue,
    pub(crate) history: QueueHistory,
    pub(crate) ledger: ExecutionLedger,
    pub(crate) requests: Requests,
    pub(crate) found: BTreeMap<u32, Vec<String>>,
    pub(crate) warnings: BTreeMap<String, BracketWarning>,
    pub(crate) undefined: Vec<String>,
    pub(crate) active: Option<Active>,
    /// Fatal error raised through a context, reported even if the handler swallowed it.
    pub(crate) fatal: Option<EngineError>,
    next_token: u64,
}

impl EngineState {
    pub(crate) fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub(crate) fn current_level(&self) -> u32 {
        self.level.unwrap_or(0)
    }

    /// Make `name` the active handler and issue its token.
    pub(crate) fn activate(&mut self, name: &str, index: Option<usize>) -> ExecutionToken {
        self.next_token += 1;
        let token = ExecutionToken(self.next_token);
        self.active = Some(Active {
            token,
            prefixed: self.config.prefixed(name),
            short: self.config.short(name).to_owned(),
            index,
        });
        token
    }

    /// Active handler owning `token`.
    pub(crate) fn active_for(
        &self,
        token: ExecutionToken,
        operation: &'static str,
    ) -> Result<&Active, EngineError> {
        self.active
            .as_ref()
            .filter(|active| active.token == token)
            .ok_or(EngineError::InvalidCallContext { operation })
    }

    /// Run `handler` as the active handler, recording the attempt in the ledger.
    pub(crate) fn invoke(
        &mut self,
        handler: &dyn Handler,
        value: &str,
        text: &mut String,
    ) -> Result<HandlerOutput, EngineError> {
        let Some(active) = self.active.as_ref() else {
            return Err(EngineError::InvalidCallContext { operation: "invoke" });
        };
        let token = active.token;
        let name = active.prefixed.clone();
        let level = self.current_level();

        self.ledger
            .begin_attempt(level, &name, value, self.config.value_preview_chars);
        tracing::debug!(handler = %name, level, "Invoking handler");

        let result = {
            let mut ctx = HandlerContext::new(self, token);
            handler.call(value, text, &mut ctx)
        };

        if let Some(fatal) = self.fatal.take() {
            return Err(fatal);
        }
        let output = result.map_err(|source| EngineError::from_handler(&name, source))?;

        let had_request = self.requests.contains(&name);
        self.ledger
            .end_attempt(level, &name, output.return_type(), had_request);
        Ok(output)
    }

    pub(crate) fn worked_names(&self, short_only: bool) -> Vec<String> {
        self.ledger
            .worked_names()
            .into_iter()
            .map(|name| {
                if short_only {
                    self.config.short(name).to_owned()
                } else {
                    name.to_owned()
                }
            })
            .collect()
    }

    /// Queue `names` on behalf of the active handler.
    ///
    /// Each name is accepted at most once per level. Names with a pending
    /// request are suppressed. Queuing the active handler itself is fatal.
    pub(crate) fn enqueue(
        &mut self,
        token: ExecutionToken,
        operation: &'static str,
        names: &[&str],
        value: &str,
        placement: Placement,
    ) -> Result<Vec<bool>, EngineError> {
        let active = self.active_for(token, operation)?;
        let current_short = active.short.clone();
        let index = active.index;
        let level = self.current_level();

        if let Some(own) = names.iter().find(|n| self.config.short(n) == current_short) {
            tracing::debug!(handler = %own, "Handler tried to queue itself");
            self.fatal = Some(EngineError::SelfQueue {
                handler: current_short.clone(),
            });
            return Err(EngineError::SelfQueue {
                handler: current_short,
            });
        }

        let mut accepted = Vec::with_capacity(names.len());
        let mut batch: Vec<QueueEntry> = Vec::new();
        for name in names {
            let short = self.config.short(name);
            let ok = !self.history.contains(level, short)
                && !self.requests.contains(&self.config.prefixed(short));
            if ok {
                self.history.record(level, short);
                batch.push(QueueEntry::injected(short, value));
            }
            accepted.push(ok);
        }

        if !batch.is_empty() {
            tracing::debug!(
                handler = %current_short,
                count = batch.len(),
                ?placement,
                "Queued directives"
            );
            match index {
                Some(index) => self.queue.insert(index, batch, placement),
                None => self.carried.extend(batch),
            }
        }

        Ok(accepted)
    }
}
