//! Level queue and enqueue history.
//!
//! The queue is an index-addressable arena. Entries are never removed while
//! a level is being iterated: consumed and deferred entries are tombstoned
//! in place so indices stay stable while handlers insert new work.

use std::collections::BTreeMap;

use crate::matcher::DirectiveMatch;

/// A unit of work in a level queue.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct QueueEntry {
    /// Span to replace in the text. `None` for entries injected by handlers.
    pub span: Option<String>,
    /// Directive name (unprefixed).
    pub name: String,
    /// Directive value passed to the handler.
    pub value: String,
}

impl QueueEntry {
    /// Create an injected entry with no textual footprint.
    #[must_use]
    pub fn injected(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            span: None,
            name: name.into(),
            value: value.into(),
        }
    }
}

impl From<DirectiveMatch> for QueueEntry {
    fn from(m: DirectiveMatch) -> Self {
        Self {
            span: Some(m.full_text),
            name: m.name,
            value: m.value,
        }
    }
}

/// Where an enqueued entry is placed in the current level queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Immediately after the entry being processed.
    AfterCurrent,
    /// At the tail of the queue.
    AtEnd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    Pending,
    Consumed,
    Deferred,
}

#[derive(Debug)]
struct Slot {
    entry: QueueEntry,
    state: SlotState,
}

/// Ordered work list for the active level.
#[derive(Debug, Default)]
pub(crate) struct LevelQueue {
    slots: Vec<Slot>,
}

impl LevelQueue {
    /// Build a fresh queue from the entries of a pass.
    pub(crate) fn from_entries(entries: impl IntoIterator<Item = QueueEntry>) -> Self {
        Self {
            slots: entries
                .into_iter()
                .map(|entry| Slot {
                    entry,
                    state: SlotState::Pending,
                })
                .collect(),
        }
    }

    /// Number of slots, tombstones included.
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Entry at `index` if it has not been consumed or deferred yet.
    pub(crate) fn pending(&self, index: usize) -> Option<&QueueEntry> {
        self.slots
            .get(index)
            .filter(|slot| slot.state == SlotState::Pending)
            .map(|slot| &slot.entry)
    }

    /// Insert a batch relative to the entry at `current`.
    ///
    /// The batch keeps its own order in both placements.
    pub(crate) fn insert(&mut self, current: usize, batch: Vec<QueueEntry>, placement: Placement) {
        let slots = batch.into_iter().map(|entry| Slot {
            entry,
            state: SlotState::Pending,
        });
        match placement {
            Placement::AfterCurrent => {
                let at = (current + 1).min(self.slots.len());
                self.slots.splice(at..at, slots);
            }
            Placement::AtEnd => self.slots.extend(slots),
        }
    }

    /// Mark the entry at `index` as consumed.
    pub(crate) fn consume(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.state = SlotState::Consumed;
        }
    }

    /// Mark the entry at `index` as moved to the deferred queue.
    pub(crate) fn defer(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.state = SlotState::Deferred;
        }
    }

    /// Entries still waiting to be processed.
    pub(crate) fn remaining(&self) -> Vec<QueueEntry> {
        self.slots
            .iter()
            .filter(|slot| slot.state == SlotState::Pending)
            .map(|slot| slot.entry.clone())
            .collect()
    }
}

/// Every short name queued by a handler, per level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct QueueHistory {
    levels: BTreeMap<u32, Vec<String>>,
}

impl QueueHistory {
    /// Whether `name` was already queued at `level`.
    #[must_use]
    pub fn contains(&self, level: u32, name: &str) -> bool {
        self.levels
            .get(&level)
            .is_some_and(|names| names.iter().any(|n| n == name))
    }

    /// Names queued at `level`, in order.
    #[must_use]
    pub fn names(&self, level: u32) -> &[String] {
        self.levels.get(&level).map(Vec::as_slice).unwrap_or_default()
    }

    pub(crate) fn record(&mut self, level: u32, name: &str) {
        let names = self.levels.entry(level).or_default();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_owned());
        }
    }

    /// Whether nothing was ever queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
