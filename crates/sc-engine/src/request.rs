//! Handler requests.
//!
//! A handler may register one request while it is active. Only
//! [`LAST_WORK`] has an effect: the directive is moved to the end of its
//! level. Other requests are stored but inert.

use std::collections::BTreeMap;

use sha1::{Digest, Sha1};

/// Request to run after every other directive of the same level.
pub const LAST_WORK: &str = "lastWork";

/// A request registered by a handler.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PendingRequest {
    /// Raw request string.
    pub request: String,
    /// SHA-1 of the handler name and request.
    pub hash: String,
}

impl PendingRequest {
    /// Whether this is a [`LAST_WORK`] request.
    #[must_use]
    pub fn is_last_work(&self) -> bool {
        self.request == LAST_WORK
    }
}

/// Pending requests keyed by prefixed handler name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Requests {
    pending: BTreeMap<String, PendingRequest>,
}

impl Requests {
    /// Register `request` for `handler`.
    ///
    /// Returns `false` without changes when the identical request is already
    /// pending. A different request replaces the pending one.
    pub(crate) fn add(&mut self, handler: &str, request: &str) -> bool {
        let hash = request_hash(handler, request);
        if self.pending.get(handler).is_some_and(|p| p.hash == hash) {
            return false;
        }
        self.pending.insert(
            handler.to_owned(),
            PendingRequest {
                request: request.to_owned(),
                hash,
            },
        );
        true
    }

    /// Pending request for `handler`.
    #[must_use]
    pub fn get(&self, handler: &str) -> Option<&PendingRequest> {
        self.pending.get(handler)
    }

    /// Whether `handler` has a pending request.
    #[must_use]
    pub fn contains(&self, handler: &str) -> bool {
        self.pending.contains_key(handler)
    }

    pub(crate) fn remove(&mut self, handler: &str) -> Option<PendingRequest> {
        self.pending.remove(handler)
    }

    /// Whether no request is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// SHA-1 hex digest of the JSON array `[handler, request]`.
#[must_use]
pub fn request_hash(handler: &str, request: &str) -> String {
    let payload = serde_json::json!([handler, request]).to_string();
    let mut hasher = Sha1::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}
