//! Point-in-time copy of the engine state.
//!
//! A [`Snapshot`] owns its data, so it outlives the engine and can be
//! inspected after a run that failed or was halted.

use std::collections::BTreeMap;

use crate::deferred::DeferredEntry;
use crate::ledger::ExecutionLedger;
use crate::matcher::BracketWarning;
use crate::queue::{QueueEntry, QueueHistory};
use crate::request::Requests;
use crate::state::EngineState;

/// Owned copy of the engine bookkeeping.
///
/// With the `serde` feature enabled this serializes to JSON, which is what
/// the CLI writes for `--dump`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Snapshot {
    /// Last level processed, `None` if no directive was found.
    pub level: Option<u32>,
    /// Whether the terminal pass was reached.
    pub last_level: bool,
    /// Directive names found by the matcher, per level.
    pub found: BTreeMap<u32, Vec<String>>,
    /// Names queued by handlers, per level.
    pub history: QueueHistory,
    /// Every handler attempt, per level.
    pub ledger: ExecutionLedger,
    /// Requests registered by handlers and not yet consumed.
    pub requests: Requests,
    /// Prefixed names without a handler.
    pub undefined: Vec<String>,
    /// Bracket counts for directive values containing `[` or `]`, by
    /// prefixed name.
    pub warnings: BTreeMap<String, BracketWarning>,
    /// Entries still waiting for the end of their level.
    pub deferred: Vec<DeferredEntry>,
    /// Entries left in the level queue, followed by entries carried to the
    /// next level.
    pub pending: Vec<QueueEntry>,
}

impl Snapshot {
    pub(crate) fn capture(state: &EngineState) -> Self {
        let mut pending = state.queue.remaining();
        pending.extend(state.carried.iter().cloned());

        Self {
            level: state.level,
            last_level: state.last_level,
            found: state.found.clone(),
            history: state.history.clone(),
            ledger: state.ledger.clone(),
            requests: state.requests.clone(),
            undefined: state.undefined.clone(),
            warnings: state.warnings.clone(),
            deferred: state.deferred.to_vec(),
            pending,
        }
    }
}
