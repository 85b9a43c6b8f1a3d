//! Token store: the single mutable state of a simulation session.
//! Distribution, firing history and the append-only log live and reset
//! together; all mutation funnels through the step execution in
//! [`crate::sim::engine`].
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::net::core::FiringHistory;
use crate::net::ids::{PlaceId, PlaceRef, Subplace, TransitionId};
use crate::net::structure::{Distribution, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    TokenInject,
    TransitionFire,
    ActionStart,
    ActionComplete,
    TokenMove,
}

impl LogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LogKind::TokenInject => "token_inject",
            LogKind::TransitionFire => "transition_fire",
            LogKind::ActionStart => "action_start",
            LogKind::ActionComplete => "action_complete",
            LogKind::TokenMove => "token_move",
        }
    }
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp_ms: u64,
    pub kind: LogKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            timestamp_ms: now_millis(),
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        kind: LogKind,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            timestamp_ms: now_millis(),
            kind,
            message: message.into(),
            details: Some(details),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Holds the token distribution, per-transition firing history and the
/// simulation log. No operation here can observe a half-applied firing:
/// the engine computes a complete new distribution before committing it
/// through [`TokenStore::replace_distribution`].
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    distribution: Distribution,
    last_fired: FiringHistory,
    fire_seq: u64,
    log: Vec<LogEntry>,
    /// When set, the log behaves as a ring buffer of this many entries.
    log_capacity: Option<usize>,
    token_counter: u64,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            log_capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn set_log_capacity(&mut self, capacity: Option<usize>) {
        self.log_capacity = capacity;
        if let Some(cap) = capacity
            && self.log.len() > cap
        {
            self.log.drain(..self.log.len() - cap);
        }
    }

    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }

    pub fn last_fired(&self) -> &FiringHistory {
        &self.last_fired
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Engine-generated token ids: `token_1`, `token_2`, ...
    pub fn next_token_id(&mut self) -> String {
        self.token_counter += 1;
        format!("token_{}", self.token_counter)
    }

    /// Append `token` to the tail of `place`. Always succeeds; capacity
    /// is advisory and checked by the caller.
    pub fn inject(&mut self, place: PlaceRef, token: Token) {
        let entry = LogEntry::with_details(
            LogKind::TokenInject,
            format!("Token {} injected into {place}", token.id),
            json!({ "placeId": place.to_string(), "token": token }),
        );
        self.distribution.push_back(place, token);
        self.append_log(entry);
    }

    /// Remove the most recently added token of `place`; no-op when the
    /// place is empty.
    pub fn remove_newest(&mut self, place: &PlaceRef) -> Option<Token> {
        let token = self.distribution.pop_back(place)?;
        self.append_log(LogEntry::with_details(
            LogKind::TokenInject,
            format!("Token {} removed from {place}", token.id),
            json!({ "placeId": place.to_string(), "tokenId": token.id }),
        ));
        Some(token)
    }

    /// Commit a step's result as one atomic unit.
    pub fn replace_distribution(&mut self, distribution: Distribution) {
        self.distribution = distribution;
    }

    /// Record a firing and return its sequence number. The sequence is a
    /// logical clock: it only orders firings for least-recently-fired
    /// tie-breaking and carries no wall-time meaning.
    pub fn record_fired(&mut self, transition: &TransitionId) -> u64 {
        self.fire_seq += 1;
        self.last_fired.insert(transition.clone(), self.fire_seq);
        self.fire_seq
    }

    pub fn append_log(&mut self, entry: LogEntry) {
        if let Some(capacity) = self.log_capacity {
            while self.log.len() >= capacity.max(1) {
                self.log.remove(0);
            }
        }
        self.log.push(entry);
    }

    /// Clear distribution, history, log and the token counter together.
    /// Stopping a running auto-step loop is the caller's job.
    pub fn reset(&mut self) {
        self.distribution.clear();
        self.last_fired.clear();
        self.fire_seq = 0;
        self.log.clear();
        self.token_counter = 0;
    }

    pub fn token_count(&self, place: &PlaceId, include_subplaces: bool) -> usize {
        self.distribution.count_at_base(place, include_subplaces)
    }

    pub fn place_tokens(&self, place: &PlaceId, subplace: Option<Subplace>) -> &[Token] {
        let place_ref = match subplace {
            Some(subplace) => PlaceRef::Sub(place.clone(), subplace),
            None => PlaceRef::Plain(place.clone()),
        };
        self.distribution.tokens(&place_ref)
    }
}
