//! Debounced remote validation tracking.
//!
//! The engine never talks to the network itself. An edit that needs a
//! remote check schedules a keyed request here; the embedding loop
//! polls `due(now)` to collect requests whose debounce window has
//! elapsed, dispatches them, and feeds verdicts back through the
//! editor. Every (row, field) key carries a generation counter — a
//! newer edit supersedes an older in-flight validation, and stale
//! responses are discarded, not applied.
//!
//! Time is injected (`Instant` arguments) so the debounce behavior is
//! deterministic under test.

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use glotgrid_protocol::ValidationRequest;

use crate::row::RowId;

/// Default debounce window for remote field validation.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Remote validations are keyed per (row, field).
pub type ValidationKey = (RowId, String);

/// A request whose debounce window has elapsed, ready to dispatch.
#[derive(Debug, Clone)]
pub struct ScheduledValidation {
    pub row: RowId,
    pub field: String,
    /// Generation at schedule time. Pass it back with the verdict;
    /// the editor drops the result if the key has moved on.
    pub generation: u64,
    pub request: ValidationRequest,
}

#[derive(Debug)]
struct WaitingEntry {
    generation: u64,
    due_at: Instant,
    request: ValidationRequest,
}

/// Tracks debounce windows and staleness generations for in-flight
/// remote validations.
#[derive(Debug)]
pub struct PendingValidations {
    debounce: Duration,
    generations: FxHashMap<ValidationKey, u64>,
    waiting: FxHashMap<ValidationKey, WaitingEntry>,
}

impl PendingValidations {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            generations: FxHashMap::default(),
            waiting: FxHashMap::default(),
        }
    }

    /// Schedule (or reschedule) a remote validation for a key,
    /// superseding any waiting or in-flight one. Returns the new
    /// generation.
    pub fn schedule(&mut self, key: ValidationKey, request: ValidationRequest, now: Instant) -> u64 {
        let generation = self.bump(&key);
        self.waiting.insert(
            key,
            WaitingEntry {
                generation,
                due_at: now + self.debounce,
                request,
            },
        );
        generation
    }

    /// Invalidate any waiting or in-flight validation for a key
    /// (edit resolved locally, cell restored by undo, row replaced).
    pub fn cancel(&mut self, key: &ValidationKey) {
        self.bump(key);
        self.waiting.remove(key);
    }

    /// Drain every request whose debounce window has elapsed.
    pub fn due(&mut self, now: Instant) -> Vec<ScheduledValidation> {
        let keys: Vec<ValidationKey> = self
            .waiting
            .iter()
            .filter(|(_, e)| e.due_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.waiting.remove(&key) {
                out.push(ScheduledValidation {
                    row: key.0,
                    field: key.1,
                    generation: entry.generation,
                    request: entry.request,
                });
            }
        }
        out
    }

    /// True iff `generation` is still the latest for the key — i.e. a
    /// verdict carrying it may be applied.
    pub fn is_current(&self, key: &ValidationKey, generation: u64) -> bool {
        self.generations.get(key).copied() == Some(generation)
    }

    /// Remap waiting/in-flight keys from a promoted draft's old id to
    /// its persisted id.
    pub fn remap_row(&mut self, old: RowId, new: RowId) {
        let moved: Vec<ValidationKey> = self
            .generations
            .keys()
            .filter(|(row, _)| *row == old)
            .cloned()
            .collect();
        for (_, field) in moved {
            let old_key = (old, field.clone());
            let new_key = (new, field);
            if let Some(g) = self.generations.remove(&old_key) {
                self.generations.insert(new_key.clone(), g);
            }
            if let Some(e) = self.waiting.remove(&old_key) {
                self.waiting.insert(new_key, e);
            }
        }
    }

    pub fn clear(&mut self) {
        self.generations.clear();
        self.waiting.clear();
    }

    fn bump(&mut self, key: &ValidationKey) -> u64 {
        let counter = self.generations.entry(key.clone()).or_insert(0);
        *counter += 1;
        *counter
    }
}

impl Default for PendingValidations {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(field: &str, value: i64) -> ValidationRequest {
        ValidationRequest {
            field: field.into(),
            value: serde_json::json!(value),
            original: serde_json::Value::Null,
        }
    }

    fn key(field: &str) -> ValidationKey {
        (RowId::Persisted(1), field.into())
    }

    #[test]
    fn nothing_due_inside_debounce_window() {
        let mut pending = PendingValidations::new(Duration::from_millis(500));
        let t0 = Instant::now();
        pending.schedule(key("name"), req("name", 1), t0);
        assert!(pending.due(t0 + Duration::from_millis(499)).is_empty());
        let due = pending.due(t0 + Duration::from_millis(500));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].field, "name");
    }

    #[test]
    fn reschedule_supersedes_and_restarts_window() {
        let mut pending = PendingValidations::new(Duration::from_millis(500));
        let t0 = Instant::now();
        let g1 = pending.schedule(key("name"), req("name", 1), t0);
        let g2 = pending.schedule(key("name"), req("name", 2), t0 + Duration::from_millis(400));
        assert!(g2 > g1);
        // First window elapsed, but the entry was replaced
        assert!(pending.due(t0 + Duration::from_millis(600)).is_empty());
        let due = pending.due(t0 + Duration::from_millis(900));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].generation, g2);
        // A verdict from the superseded call must be discarded
        assert!(!pending.is_current(&key("name"), g1));
        assert!(pending.is_current(&key("name"), g2));
    }

    #[test]
    fn dispatched_generation_stays_current_until_superseded() {
        let mut pending = PendingValidations::default();
        let t0 = Instant::now();
        let g = pending.schedule(key("iso_code"), req("iso_code", 1), t0);
        let due = pending.due(t0 + DEFAULT_DEBOUNCE);
        assert_eq!(due.len(), 1);
        assert!(pending.is_current(&key("iso_code"), g));
        pending.cancel(&key("iso_code"));
        assert!(!pending.is_current(&key("iso_code"), g));
    }

    #[test]
    fn remap_row_carries_waiting_entries() {
        let mut pending = PendingValidations::default();
        let t0 = Instant::now();
        let old = (RowId::Draft(1), "name".to_string());
        let g = pending.schedule(old.clone(), req("name", 1), t0);
        pending.remap_row(RowId::Draft(1), RowId::Persisted(40));
        assert!(!pending.is_current(&old, g));
        assert!(pending.is_current(&(RowId::Persisted(40), "name".into()), g));
        let due = pending.due(t0 + DEFAULT_DEBOUNCE);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].row, RowId::Persisted(40));
    }
}
