//! One editable field of one row.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Validation status of a cell. `Pending` while a remote check is in
/// flight; a pending cell is never eligible for a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    #[default]
    Valid,
    Invalid,
    Pending,
}

/// A grid cell: the value being edited, its authoritative baseline,
/// and its validation/conflict bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// The typed domain value — this is what gets persisted.
    pub value: Value,
    /// Human-readable rendering of `value`.
    pub text: String,
    /// The last known authoritative value. Never mutated by
    /// in-progress edits; overwritten only by load or confirmed save.
    pub original: Value,
    pub validation: ValidationState,
    pub validation_error: Option<String>,
    /// Set by the save protocol when this field collided with a
    /// concurrent edit; cleared by the save protocol or by the user
    /// re-touching the cell.
    pub has_conflict: bool,
    /// True while `value` diverges from `original`. Reset on save
    /// success.
    pub edited: bool,
}

impl Cell {
    /// A cell seeded from the authoritative source: baseline equals
    /// value.
    pub fn loaded(value: Value, text: String) -> Self {
        Self {
            original: value.clone(),
            value,
            text,
            validation: ValidationState::Valid,
            validation_error: None,
            has_conflict: false,
            edited: false,
        }
    }

    /// A blank draft cell: no baseline yet.
    pub fn blank() -> Self {
        Self::loaded(Value::Null, String::new())
    }

    pub fn is_invalid(&self) -> bool {
        self.validation == ValidationState::Invalid
    }

    pub fn is_pending(&self) -> bool {
        self.validation == ValidationState::Pending
    }

    pub fn mark_valid(&mut self) {
        self.validation = ValidationState::Valid;
        self.validation_error = None;
    }

    pub fn mark_invalid(&mut self, message: impl Into<String>) {
        self.validation = ValidationState::Invalid;
        self.validation_error = Some(message.into());
    }

    pub fn mark_pending(&mut self) {
        self.validation = ValidationState::Pending;
        self.validation_error = None;
    }

    /// Apply an edit: set value/text, recompute the divergence flag,
    /// clear any conflict highlight (re-touching resolves it).
    pub fn apply_edit(&mut self, value: Value, text: Option<String>) {
        self.text = text.unwrap_or_else(|| value.render());
        self.edited = !value.eq_loose(&self.original);
        self.value = value;
        self.has_conflict = false;
    }

    /// Accept an authoritative value as both value and baseline
    /// (confirmed save or fresh load of this field).
    pub fn accept(&mut self, value: Value, text: String) {
        self.original = value.clone();
        self.value = value;
        self.text = text;
        self.edited = false;
        self.has_conflict = false;
        self.mark_valid();
    }
}
