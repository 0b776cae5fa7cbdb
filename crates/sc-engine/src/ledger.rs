//! Execution ledger.
//!
//! Records every handler invocation attempt per level and per prefixed name.
//! An attempt is opened before the handler runs and completed after it
//! returns, so a handler that failed leaves an incomplete attempt behind.

use std::collections::BTreeMap;

use crate::handler::ReturnType;

/// One handler invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Attempt {
    /// First characters of the value.
    pub value_prefix: String,
    /// Value length in characters.
    pub value_length: usize,
    /// Whether the handler returned.
    pub completed: bool,
    /// Whether the handler had a pending request when it returned.
    pub had_request: bool,
    /// Type of the handler's return value, set on completion.
    pub return_type: Option<ReturnType>,
}

/// Attempts for one prefixed name at one level.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NameAttempts {
    /// Prefixed handler name.
    pub name: String,
    /// Attempts in invocation order.
    pub attempts: Vec<Attempt>,
}

/// Append-only record of handler invocations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ExecutionLedger {
    levels: BTreeMap<u32, Vec<NameAttempts>>,
}

impl ExecutionLedger {
    /// Open a new attempt for `name` at `level`.
    pub(crate) fn begin_attempt(&mut self, level: u32, name: &str, value: &str, preview_chars: usize) {
        let attempt = Attempt {
            value_prefix: value.chars().take(preview_chars).collect(),
            value_length: value.chars().count(),
            completed: false,
            had_request: false,
            return_type: None,
        };

        let names = self.levels.entry(level).or_default();
        match names.iter_mut().find(|n| n.name == name) {
            Some(existing) => existing.attempts.push(attempt),
            None => names.push(NameAttempts {
                name: name.to_owned(),
                attempts: vec![attempt],
            }),
        }
    }

    /// Complete the latest attempt for `name` at `level`.
    pub(crate) fn end_attempt(
        &mut self,
        level: u32,
        name: &str,
        return_type: ReturnType,
        had_request: bool,
    ) {
        let latest = self
            .levels
            .get_mut(&level)
            .and_then(|names| names.iter_mut().find(|n| n.name == name))
            .and_then(|n| n.attempts.last_mut());

        if let Some(attempt) = latest {
            attempt.completed = true;
            attempt.had_request = had_request;
            attempt.return_type = Some(return_type);
        }
    }

    /// Attempts recorded for `name` at `level`.
    #[must_use]
    pub fn attempts(&self, level: u32, name: &str) -> &[Attempt] {
        self.levels
            .get(&level)
            .and_then(|names| names.iter().find(|n| n.name == name))
            .map(|n| n.attempts.as_slice())
            .unwrap_or_default()
    }

    /// Names with attempts at `level`, in first-invocation order.
    #[must_use]
    pub fn level(&self, level: u32) -> &[NameAttempts] {
        self.levels.get(&level).map(Vec::as_slice).unwrap_or_default()
    }

    /// Prefixed names whose latest attempt across all levels completed.
    ///
    /// Names are listed once, in order of first invocation.
    #[must_use]
    pub fn worked_names(&self) -> Vec<&str> {
        let mut order: Vec<&str> = Vec::new();
        let mut latest: BTreeMap<&str, bool> = BTreeMap::new();

        for names in self.levels.values() {
            for entry in names {
                if !latest.contains_key(entry.name.as_str()) {
                    order.push(&entry.name);
                }
                if let Some(attempt) = entry.attempts.last() {
                    latest.insert(&entry.name, attempt.completed);
                }
            }
        }

        order
            .into_iter()
            .filter(|name| latest.get(name).copied().unwrap_or(false))
            .collect()
    }

    /// Whether no attempt was ever recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
