//! Deferred ("lastWork") entries and their runner.
//!
//! Entries whose handler asked to run last are pulled out of the level queue
//! and executed after the main pass, in the order they were deferred.

use std::collections::VecDeque;

use crate::engine::{Engine, Step};
use crate::error::EngineError;
use crate::handler::HandlerOutput;
use crate::queue::QueueEntry;
use crate::registry::HandlerRegistry;

/// An entry waiting for the end of its level.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DeferredEntry {
    /// Prefixed handler name.
    pub handler: String,
    /// Entry pulled from the level queue.
    pub entry: QueueEntry,
}

#[derive(Debug, Default)]
pub(crate) struct DeferredQueue {
    entries: VecDeque<DeferredEntry>,
}

impl DeferredQueue {
    pub(crate) fn push(&mut self, handler: String, entry: QueueEntry) {
        self.entries.push_back(DeferredEntry { handler, entry });
    }

    pub(crate) fn pop(&mut self) -> Option<DeferredEntry> {
        self.entries.pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn to_vec(&self) -> Vec<DeferredEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl<R: HandlerRegistry> Engine<R> {
    /// Run every deferred entry of the current level.
    ///
    /// A consumed `lastWork` request is cleared so the handler can be
    /// scheduled normally at later levels.
    pub(crate) fn drain_deferred(&mut self, text: &mut String) -> Result<Step, EngineError> {
        while let Some(DeferredEntry { handler, entry }) = self.state.deferred.pop() {
            tracing::debug!(handler = %handler, level = self.state.current_level(), "Running deferred directive");
            let step = self.execute(&entry, None, text);
            if self
                .state
                .requests
                .get(&handler)
                .is_some_and(|p| p.is_last_work())
            {
                self.state.requests.remove(&handler);
            }
            if let Step::Halted(value) = step? {
                return Ok(Step::Halted(value));
            }
        }
        Ok(Step::Continue)
    }

    /// Run entries queued while no level queue was open.
    ///
    /// Only reached on the terminal pass, where no further level will pick
    /// them up.
    pub(crate) fn drain_carried(&mut self, text: &mut String) -> Result<Step, EngineError> {
        while !self.state.carried.is_empty() {
            let entry = self.state.carried.remove(0);
            if let Step::Halted(value) = self.execute(&entry, None, text)? {
                return Ok(Step::Halted(value));
            }
        }
        Ok(Step::Continue)
    }
}

/// Replacement text for a non-halting output.
pub(crate) fn output_text(output: HandlerOutput) -> Result<String, serde_json::Value> {
    match output {
        HandlerOutput::Text(text) => Ok(text),
        HandlerOutput::Null => Ok(String::new()),
        HandlerOutput::Halt(value) => Err(value),
    }
}
