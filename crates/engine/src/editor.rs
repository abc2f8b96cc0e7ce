//! The batch editor facade.
//!
//! One owned `BatchEditor` holds the grid, the undo/redo history, the
//! pending remote validations, and the save state. Every mutation
//! goes through `&mut self`, so two edits can never interleave — the
//! serialized update queue of the surrounding application is this
//! method surface. Typed events accumulate per operation and are
//! drained by the embedding UI.

use std::time::{Duration, Instant};

use glotgrid_protocol::{BatchSaveRequest, BatchSaveResponse, RecordData, ValidationRequest, ValidationVerdict};

use crate::cell::ValidationState;
use crate::column::GridSchema;
use crate::events::GridEvent;
use crate::grid::{Grid, GridError};
use crate::history::{EditGroup, History, DEFAULT_CAPACITY};
use crate::pending::{PendingValidations, ScheduledValidation, ValidationKey, DEFAULT_DEBOUNCE};
use crate::row::RowId;
use crate::save::{self, ReadyPlan, SaveBlocked, SavePlan, SaveSummary, SaveTarget};
use crate::validate::{structural_check, MSG_REQUIRED};
use crate::value::Value;

/// A single cell edit, as delivered by the UI: the resolved typed
/// value plus the raw display text (free text that failed to resolve
/// to a reference arrives as `Null` value with non-empty text).
#[derive(Debug, Clone)]
pub struct CellEdit {
    pub row: RowId,
    pub field: String,
    pub value: Value,
    pub text: Option<String>,
}

/// The conflict-aware batch mutation engine over one working set.
#[derive(Debug)]
pub struct BatchEditor {
    grid: Grid,
    history: History,
    pending: PendingValidations,
    saving: bool,
    events: Vec<GridEvent>,
}

impl BatchEditor {
    pub fn new(schema: GridSchema) -> Self {
        Self::with_tuning(schema, DEFAULT_DEBOUNCE, DEFAULT_CAPACITY)
    }

    /// Construct with explicit debounce window and history depth
    /// (from settings).
    pub fn with_tuning(schema: GridSchema, debounce: Duration, history_capacity: usize) -> Self {
        Self {
            grid: Grid::new(schema),
            history: History::new(history_capacity),
            pending: PendingValidations::new(debounce),
            saving: false,
            events: Vec::new(),
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// True when navigating away should pass through a confirmation
    /// gate.
    pub fn has_unsaved_changes(&self) -> bool {
        self.grid.has_unsaved_changes()
    }

    /// Drain events accumulated since the last call.
    pub fn take_events(&mut self) -> Vec<GridEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // Loading and lifecycle
    // ------------------------------------------------------------------

    /// Seed the grid from the authoritative source. Used for the
    /// initial load; state from any previous working set is dropped.
    pub fn load(&mut self, records: &[RecordData]) {
        self.grid.load(records);
        self.history.clear();
        self.pending.clear();
        self.saving = false;
        self.events.push(GridEvent::GridReset);
    }

    /// Confirmed refresh: discard history, selection, and in-progress
    /// edits; reload from the authoritative source. The confirmation
    /// gate itself lives in the UI, keyed on `has_unsaved_changes`.
    pub fn reset(&mut self, records: &[RecordData]) {
        self.load(records);
    }

    pub fn add_draft(&mut self) -> RowId {
        let id = self.grid.add_draft();
        self.events.push(GridEvent::CellsChanged { rows: vec![id] });
        id
    }

    pub fn remove_row(&mut self, id: RowId) -> bool {
        let removed = self.grid.remove(id);
        if removed {
            for col in self.grid.schema().columns().to_vec() {
                self.pending.cancel(&(id, col.field));
            }
            self.events.push(GridEvent::CellsChanged { rows: vec![id] });
        }
        removed
    }

    // ------------------------------------------------------------------
    // Editing and validation
    // ------------------------------------------------------------------

    /// Apply a single cell edit through the validation pipeline.
    pub fn edit_cell(
        &mut self,
        row: RowId,
        field: impl Into<String>,
        value: Value,
        text: Option<String>,
        now: Instant,
    ) -> Result<(), GridError> {
        let field = field.into();
        let edit = CellEdit {
            row,
            field: field.clone(),
            value,
            text,
        };
        self.apply_group("Edit cell", vec![edit], now)
    }

    /// Apply many cell edits as one atomic group (paste/fill). A
    /// single undo reverses the whole group.
    pub fn apply_group(
        &mut self,
        description: &str,
        edits: Vec<CellEdit>,
        now: Instant,
    ) -> Result<(), GridError> {
        // Validate addressing up front so a paste is all-or-nothing.
        for edit in &edits {
            if self.grid.row(edit.row).is_none() {
                return Err(GridError::UnknownRow(edit.row));
            }
            if self.grid.schema().column(&edit.field).is_none() {
                return Err(GridError::UnknownColumn(edit.field.clone()));
            }
        }

        let mut group = EditGroup::new(description);
        let mut touched_rows = Vec::new();
        for edit in edits {
            self.apply_one(edit, now, &mut group);
        }
        for change in &group.changes {
            if !touched_rows.contains(&change.row) {
                touched_rows.push(change.row);
            }
        }
        if !group.is_empty() {
            self.history.record(group);
            self.events.push(GridEvent::CellsChanged { rows: touched_rows });
        }
        Ok(())
    }

    fn apply_one(&mut self, edit: CellEdit, now: Instant, group: &mut EditGroup) {
        let CellEdit {
            row: row_id,
            field,
            value,
            text,
        } = edit;

        let Some(spec) = self.grid.schema().column(&field).cloned() else {
            return;
        };

        let first_touch;
        let before;
        let text_now;
        let original;
        let untouched_draft;
        {
            let Some(row) = self.grid.row_mut(row_id) else {
                return;
            };
            let Some(cell) = row.cell_mut(&field) else {
                return;
            };
            before = cell.clone();
            cell.apply_edit(value.clone(), text);
            let changed = *cell != before;
            text_now = cell.text.clone();
            original = cell.original.clone();
            // Only an edit that actually changed the cell counts as
            // touching the row; a no-op never arms the cascade.
            first_touch = changed && !row.touched;
            if first_touch {
                row.touched = true;
            }
            untouched_draft = row.is_draft && !row.touched;
        }

        let key: ValidationKey = (row_id, field.clone());

        // Validation pipeline, short-circuiting at the first hit. An
        // untouched draft's required cells stay quiet until someone
        // actually changes the row.
        let verdict = if spec.required && value.is_empty() && !untouched_draft {
            CellVerdict::Invalid(MSG_REQUIRED.to_string())
        } else if let Some(msg) = structural_check(&spec, row_id, &value, &text_now) {
            CellVerdict::Invalid(msg.to_string())
        } else if value.eq_loose(&original) {
            // A value identical to the authoritative baseline cannot
            // be wrong; no remote call.
            CellVerdict::Valid
        } else {
            CellVerdict::Remote
        };

        match verdict {
            CellVerdict::Valid => {
                self.pending.cancel(&key);
                if let Some(cell) = self.cell_mut(row_id, &field) {
                    cell.mark_valid();
                }
            }
            CellVerdict::Invalid(msg) => {
                self.pending.cancel(&key);
                if let Some(cell) = self.cell_mut(row_id, &field) {
                    cell.mark_invalid(msg);
                }
            }
            CellVerdict::Remote => {
                let request = ValidationRequest {
                    field: field.clone(),
                    value: value.to_json(),
                    original: original.to_json(),
                };
                self.pending.schedule(key, request, now);
                if let Some(cell) = self.cell_mut(row_id, &field) {
                    cell.mark_pending();
                }
            }
        }

        // The first real edit on a draft row retroactively flags
        // every other empty required cell.
        if first_touch {
            self.flag_required(row_id, &field);
        }

        if let Some(after) = self.grid.row(row_id).and_then(|r| r.cell(&field)).cloned() {
            if before != after {
                group.push(row_id, field, before, after);
            }
        }
    }

    fn cell_mut(&mut self, row: RowId, field: &str) -> Option<&mut crate::cell::Cell> {
        self.grid.row_mut(row).and_then(|r| r.cell_mut(field))
    }

    fn flag_required(&mut self, row_id: RowId, except_field: &str) {
        let required: Vec<String> = self
            .grid
            .schema()
            .required_columns()
            .map(|c| c.field.clone())
            .filter(|f| f != except_field)
            .collect();
        if let Some(row) = self.grid.row_mut(row_id) {
            for field in required {
                if let Some(cell) = row.cell_mut(&field) {
                    if cell.value.is_empty() && cell.validation == ValidationState::Valid {
                        cell.mark_invalid(MSG_REQUIRED);
                    }
                }
            }
        }
    }

    /// Remote validations whose debounce window has elapsed. The
    /// caller dispatches them and feeds verdicts back through
    /// `apply_validation`.
    pub fn due_validations(&mut self, now: Instant) -> Vec<ScheduledValidation> {
        self.pending.due(now)
    }

    /// Apply a remote verdict. Returns false when the result was
    /// stale (the cell has been edited again since) and was
    /// discarded.
    pub fn apply_validation(
        &mut self,
        row: RowId,
        field: &str,
        generation: u64,
        verdict: &ValidationVerdict,
    ) -> bool {
        let key: ValidationKey = (row, field.to_string());
        if !self.pending.is_current(&key, generation) {
            return false;
        }
        self.pending.cancel(&key);
        let Some(cell) = self.cell_mut(row, field) else {
            return false;
        };
        if verdict.valid {
            cell.mark_valid();
        } else {
            let msg = verdict.error.clone().unwrap_or_else(|| "Invalid value".into());
            cell.mark_invalid(msg);
        }
        self.events.push(GridEvent::CellsChanged { rows: vec![row] });
        true
    }

    // ------------------------------------------------------------------
    // Undo / redo
    // ------------------------------------------------------------------

    /// Revert the most recent edit group. Returns its description, or
    /// `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<String> {
        let group = self.history.pop_undo()?;
        let mut rows = Vec::new();
        for change in &group.changes {
            if let Some(cell) = self.cell_mut(change.row, &change.field) {
                *cell = change.before.clone();
            }
            // Any in-flight validation for the restored cell is stale.
            self.pending.cancel(&(change.row, change.field.clone()));
            if !rows.contains(&change.row) {
                rows.push(change.row);
            }
        }
        let description = group.description.clone();
        self.history.undone(group);
        self.events.push(GridEvent::CellsChanged { rows });
        Some(description)
    }

    /// Reapply the most recently undone group.
    pub fn redo(&mut self) -> Option<String> {
        let group = self.history.pop_redo()?;
        let mut rows = Vec::new();
        for change in &group.changes {
            if let Some(cell) = self.cell_mut(change.row, &change.field) {
                *cell = change.after.clone();
            }
            self.pending.cancel(&(change.row, change.field.clone()));
            if !rows.contains(&change.row) {
                rows.push(change.row);
            }
        }
        let description = group.description.clone();
        self.history.redone(group);
        self.events.push(GridEvent::CellsChanged { rows });
        Some(description)
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Toggle a row together with its hierarchical descendants.
    pub fn toggle_select(&mut self, id: RowId) -> Result<(), GridError> {
        self.grid.toggle_cascade(id)?;
        let selected = self.grid.selected_ids().len();
        self.events.push(GridEvent::SelectionChanged { selected });
        Ok(())
    }

    /// Select-all over the currently visible subset.
    pub fn toggle_select_visible(&mut self, visible: &[RowId]) {
        self.grid.toggle_select_visible(visible);
        let selected = self.grid.selected_ids().len();
        self.events.push(GridEvent::SelectionChanged { selected });
    }

    // ------------------------------------------------------------------
    // Save protocol
    // ------------------------------------------------------------------

    /// Plan a save. See `save::plan` for the gating rules; on top of
    /// them, a save already in flight blocks a second one.
    pub fn plan_save(&self, target: &SaveTarget) -> Result<SavePlan, SaveBlocked> {
        if self.saving {
            return Err(SaveBlocked::SaveInFlight);
        }
        save::plan(&self.grid, target)
    }

    /// Start the planned save: flips into `saving` and yields the
    /// wire request. Cell edits are not blocked while it is in
    /// flight; they accumulate for a subsequent save.
    pub fn begin_save(&mut self, plan: ReadyPlan) -> BatchSaveRequest {
        self.saving = true;
        plan.request
    }

    /// Reconcile the server response. History and selection are
    /// cleared only when every row saved cleanly; a rejected row
    /// keeps its edits undoable and stays selected for the user's
    /// immediate follow-up. Rows the response refreshed (saved or
    /// conflict-rebuilt) lose their history entries: those snapshots
    /// predate the new baseline, and restoring one would overwrite
    /// the authoritative `original` values with stale data.
    pub fn complete_save(&mut self, response: &BatchSaveResponse) -> SaveSummary {
        self.saving = false;
        let outcome = save::apply_response(&mut self.grid, response);

        for (old, new) in &outcome.remapped {
            self.history.remap_row(*old, *new);
            self.pending.remap_row(*old, *new);
            self.events.push(GridEvent::RowReplaced { old: *old, new: *new });
        }
        self.history.prune_rows(&outcome.refreshed_rows);
        if !outcome.touched_rows.is_empty() {
            self.events.push(GridEvent::CellsChanged {
                rows: outcome.touched_rows.clone(),
            });
        }

        if outcome.summary.conflicts == 0 && outcome.summary.validation_failures == 0 {
            self.history.clear();
            self.grid.clear_selection();
            self.events.push(GridEvent::SelectionChanged { selected: 0 });
        }

        self.events.push(GridEvent::SaveCompleted {
            saved: outcome.summary.saved,
            conflicts: outcome.summary.conflicts,
        });
        outcome.summary
    }

    /// Transport-level failure: nothing is assumed saved; the user
    /// may retry.
    pub fn fail_save(&mut self) {
        self.saving = false;
    }
}

enum CellVerdict {
    Valid,
    Invalid(String),
    Remote,
}
