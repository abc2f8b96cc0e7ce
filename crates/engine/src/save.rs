//! Batch save planning and conflict reconciliation.
//!
//! The save path is split in three so the embedding UI owns the
//! transport: `plan` builds the wire request (or asks for
//! confirmation, or refuses with a structured issue list),
//! the editor flips into `saving` and hands the request out, and
//! `apply_response` reconciles the server's saved/conflict split back
//! into the grid.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashSet;

use glotgrid_protocol::{BatchSaveRequest, BatchSaveResponse, RecordData, RowPayload, SaveError};

use crate::grid::Grid;
use crate::row::{Row, RowId};
use crate::value::Value;

/// Which rows a save targets.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveTarget {
    /// Every row with changes.
    AllChanged,
    /// The current selection (its changed rows).
    Selected,
    /// An explicit row subset (its changed rows).
    Rows(Vec<RowId>),
}

/// One locatable problem blocking a save.
#[derive(Debug, Clone, PartialEq)]
pub struct CellIssue {
    pub row: RowId,
    pub field: String,
    pub message: String,
}

impl fmt::Display for CellIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}, field '{}': {}", self.row, self.field, self.message)
    }
}

/// Why a save could not be planned or started.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveBlocked {
    /// No targeted row has changes and nothing else is changed.
    NothingToSave,
    /// A save is already in flight; edits accumulate for the next one.
    SaveInFlight,
    /// Targeted rows carry invalid cells. Every problem is listed so
    /// the user can locate them without scanning the grid.
    ValidationErrors(Vec<CellIssue>),
    /// Targeted cells still await remote validation; a pending cell
    /// is never eligible for a save.
    PendingValidation(Vec<CellIssue>),
}

impl fmt::Display for SaveBlocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveBlocked::NothingToSave => write!(f, "no changes to save"),
            SaveBlocked::SaveInFlight => write!(f, "a save is already in progress"),
            SaveBlocked::ValidationErrors(issues) => {
                write!(f, "{} validation problem(s) block this save", issues.len())
            }
            SaveBlocked::PendingValidation(issues) => {
                write!(f, "{} cell(s) still being validated", issues.len())
            }
        }
    }
}

impl std::error::Error for SaveBlocked {}

/// Outcome of planning a save.
#[derive(Debug, Clone)]
pub enum SavePlan {
    Ready(ReadyPlan),
    /// The targeted subset has no changes, but changed rows exist
    /// elsewhere. Ask the user before widening to "all changed".
    ConfirmWiden { changed_rows: usize },
}

/// A planned save: the targeted rows and the wire request.
#[derive(Debug, Clone)]
pub struct ReadyPlan {
    pub rows: Vec<RowId>,
    pub request: BatchSaveRequest,
}

/// Counts surfaced as the one-line human summary after a save. The
/// per-cell conflict state carries the detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveSummary {
    pub saved: usize,
    pub conflicts: usize,
    pub validation_failures: usize,
}

impl fmt::Display for SaveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} row(s) saved, {} conflict(s)", self.saved, self.conflicts)?;
        if self.validation_failures > 0 {
            write!(f, ", {} validation failure(s)", self.validation_failures)?;
        }
        Ok(())
    }
}

/// Build a save plan against the current grid state.
pub fn plan(grid: &Grid, target: &SaveTarget) -> Result<SavePlan, SaveBlocked> {
    let changed: Vec<RowId> = grid.changed_ids();
    let candidates: Vec<RowId> = match target {
        SaveTarget::AllChanged => changed.clone(),
        SaveTarget::Selected => {
            let selected: FxHashSet<RowId> = grid.selected_ids().into_iter().collect();
            changed.iter().copied().filter(|id| selected.contains(id)).collect()
        }
        SaveTarget::Rows(rows) => {
            let wanted: FxHashSet<RowId> = rows.iter().copied().collect();
            changed.iter().copied().filter(|id| wanted.contains(id)).collect()
        }
    };

    if candidates.is_empty() {
        if !changed.is_empty() && !matches!(target, SaveTarget::AllChanged) {
            return Ok(SavePlan::ConfirmWiden {
                changed_rows: changed.len(),
            });
        }
        return Err(SaveBlocked::NothingToSave);
    }

    let mut invalid = Vec::new();
    let mut pending = Vec::new();
    for &id in &candidates {
        let row = grid.row(id).expect("candidate rows come from the grid");
        for col in grid.schema().columns() {
            let cell = match row.cell(&col.field) {
                Some(c) => c,
                None => continue,
            };
            if cell.is_invalid() {
                invalid.push(CellIssue {
                    row: id,
                    field: col.field.clone(),
                    message: cell
                        .validation_error
                        .clone()
                        .unwrap_or_else(|| "invalid value".into()),
                });
            } else if cell.is_pending() {
                pending.push(CellIssue {
                    row: id,
                    field: col.field.clone(),
                    message: "validation in progress".into(),
                });
            }
        }
    }
    if !invalid.is_empty() {
        return Err(SaveBlocked::ValidationErrors(invalid));
    }
    if !pending.is_empty() {
        return Err(SaveBlocked::PendingValidation(pending));
    }

    let candidate_set: FxHashSet<RowId> = candidates.iter().copied().collect();
    let mut rows = Vec::new();
    let mut payloads = Vec::new();
    for row in grid.rows() {
        if !candidate_set.contains(&row.id) {
            continue;
        }
        rows.push(row.id);
        payloads.push(if row.is_draft {
            build_create(grid, row)
        } else {
            build_update(grid, row)
        });
    }

    Ok(SavePlan::Ready(ReadyPlan {
        rows,
        request: BatchSaveRequest { rows: payloads },
    }))
}

/// Update payload: only diverged cells, plus the freshness token and
/// the per-field baseline map for server-side conflict comparison.
fn build_update(grid: &Grid, row: &Row) -> RowPayload {
    let mut values = BTreeMap::new();
    let mut base = BTreeMap::new();
    for col in grid.schema().columns() {
        if let Some(cell) = row.cell(&col.field) {
            if cell.edited {
                values.insert(col.field.clone(), cell.value.to_json());
                base.insert(col.field.clone(), cell.original.to_json());
            }
        }
    }
    RowPayload::Update {
        id: row.id.record_id().expect("update rows are persisted"),
        version: row.version.clone().unwrap_or_default(),
        values,
        base,
    }
}

/// Create payload: every required column unconditionally, plus any
/// non-empty optional column. Empty optionals are omitted so the
/// server applies its own defaults.
fn build_create(grid: &Grid, row: &Row) -> RowPayload {
    let mut values = BTreeMap::new();
    for col in grid.schema().columns() {
        if let Some(cell) = row.cell(&col.field) {
            if col.required || !cell.value.is_empty() {
                values.insert(col.field.clone(), cell.value.to_json());
            }
        }
    }
    let draft = match row.id {
        RowId::Draft(n) => n,
        RowId::Persisted(id) => unreachable!("create payload for persisted row {id}"),
    };
    RowPayload::Create { draft, values }
}

/// What `apply_response` changed, for the editor's bookkeeping.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub summary: SaveSummary,
    /// (old, new) pairs for promoted drafts.
    pub remapped: Vec<(RowId, RowId)>,
    /// Every row replaced or touched, in processing order.
    pub touched_rows: Vec<RowId>,
    /// Rows whose baseline the response replaced (saved or
    /// conflict-rebuilt), under their current ids. Undo snapshots
    /// recorded against the old baseline are void for these rows.
    pub refreshed_rows: Vec<RowId>,
}

/// Reconcile a batch save response into the grid.
///
/// Saved rows are replaced in place by the authoritative record.
/// Conflict rows are rebuilt on the fresh baseline with the user's
/// edits restored on exactly the colliding fields. Server validation
/// failures mark the named cell invalid.
pub fn apply_response(grid: &mut Grid, response: &BatchSaveResponse) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    for saved in &response.saved {
        let old = match saved.draft {
            Some(n) => RowId::Draft(n),
            None => RowId::Persisted(saved.record.id),
        };
        let Some(previous) = grid.row(old) else {
            continue;
        };
        let mut fresh = Row::from_record(grid.schema(), &saved.record);
        fresh.selected = previous.selected;
        let new = match grid.replace(old, fresh) {
            Ok(id) => id,
            Err(_) => continue,
        };
        if new != old {
            outcome.remapped.push((old, new));
        }
        outcome.touched_rows.push(new);
        outcome.refreshed_rows.push(new);
        outcome.summary.saved += 1;
    }

    for error in &response.errors {
        match error {
            SaveError::Conflict { id, record, fields } => {
                let row_id = RowId::Persisted(*id);
                if reconcile_conflict(grid, row_id, record, fields) {
                    outcome.touched_rows.push(row_id);
                    outcome.refreshed_rows.push(row_id);
                    outcome.summary.conflicts += 1;
                }
            }
            SaveError::Validation {
                id,
                draft,
                field,
                message,
            } => {
                let row_id = match (id, draft) {
                    (Some(id), _) => RowId::Persisted(*id),
                    (None, Some(n)) => RowId::Draft(*n),
                    (None, None) => continue,
                };
                if let Some(row) = grid.row_mut(row_id) {
                    if let Some(cell) = row.cell_mut(field) {
                        cell.mark_invalid(message.clone());
                    }
                    outcome.touched_rows.push(row_id);
                    outcome.summary.validation_failures += 1;
                }
            }
        }
    }

    outcome
}

/// Rebuild a conflicted row from the fresh authoritative record, then
/// partition the user's edits: colliding fields keep the user's value
/// over the fresh baseline (`has_conflict`, still edited); surviving
/// fields count as applied and take the fresh value as both value and
/// baseline. Untouched cells simply refresh.
fn reconcile_conflict(
    grid: &mut Grid,
    row_id: RowId,
    record: &RecordData,
    conflict_fields: &[String],
) -> bool {
    let Some(previous) = grid.row(row_id) else {
        return false;
    };
    let mut fresh = Row::from_record(grid.schema(), record);
    fresh.selected = previous.selected;
    fresh.touched = previous.touched;

    for col in grid.schema().columns() {
        let Some(old_cell) = previous.cell(&col.field) else {
            continue;
        };
        if !old_cell.edited {
            continue;
        }
        if conflict_fields.iter().any(|f| f == &col.field) {
            let old_value = old_cell.value.clone();
            let old_text = old_cell.text.clone();
            if let Some(cell) = fresh.cell_mut(&col.field) {
                let server_text = cell.text.clone();
                cell.value = old_value;
                cell.text = old_text;
                cell.edited = true;
                cell.has_conflict = true;
                cell.validation_error = if server_text.is_empty() {
                    Some("Changed by another user; the field was cleared".to_string())
                } else {
                    Some(format!("Changed by another user to \"{server_text}\""))
                };
            }
        }
        // Not in the conflicting list: the edit was applied — the
        // fresh record already carries it as value and baseline.
    }

    grid.replace(row_id, fresh).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{ColumnKind, ColumnSpec, GridSchema};
    use crate::value::Value;
    use glotgrid_protocol::{FieldData, SavedRow};
    use std::collections::BTreeMap;

    fn schema() -> GridSchema {
        GridSchema::new(vec![
            ColumnSpec::new("name", "Name", ColumnKind::Text).required(),
            ColumnSpec::new("iso_code", "ISO code", ColumnKind::Text),
            ColumnSpec::new("parent", "Parent", ColumnKind::Reference).hierarchy_parent(),
        ])
    }

    fn record(id: i64, version: &str, name: &str, iso: Option<&str>) -> RecordData {
        let mut fields = BTreeMap::new();
        fields.insert("name".into(), FieldData::new(serde_json::json!(name)));
        fields.insert(
            "iso_code".into(),
            FieldData::new(iso.map(|s| serde_json::json!(s)).unwrap_or(serde_json::Value::Null)),
        );
        fields.insert("parent".into(), FieldData::new(serde_json::Value::Null));
        RecordData {
            id,
            version: version.into(),
            fields,
        }
    }

    fn grid_with_one_edit() -> Grid {
        let mut grid = Grid::new(schema());
        grid.load(&[record(1, "v1", "Mosetén", Some("cas")), record(2, "v1", "Chimané", None)]);
        grid.row_mut(RowId::Persisted(1))
            .unwrap()
            .cell_mut("name")
            .unwrap()
            .apply_edit(Value::Text("Mosetén-Chimané".into()), None);
        grid
    }

    #[test]
    fn update_payload_carries_only_diverged_fields() {
        let grid = grid_with_one_edit();
        let plan = match plan(&grid, &SaveTarget::AllChanged).unwrap() {
            SavePlan::Ready(p) => p,
            other => panic!("expected ready plan, got {other:?}"),
        };
        assert_eq!(plan.rows, vec![RowId::Persisted(1)]);
        assert_eq!(plan.request.rows.len(), 1);
        match &plan.request.rows[0] {
            RowPayload::Update { id, version, values, base } => {
                assert_eq!(*id, 1);
                assert_eq!(version, "v1");
                assert_eq!(values.len(), 1);
                assert_eq!(values["name"], serde_json::json!("Mosetén-Chimané"));
                assert_eq!(base["name"], serde_json::json!("Mosetén"));
            }
            other => panic!("expected update payload, got {other:?}"),
        }
    }

    #[test]
    fn create_payload_includes_required_and_nonempty_only() {
        let mut grid = Grid::new(schema());
        let draft = grid.add_draft();
        {
            let row = grid.row_mut(draft).unwrap();
            row.touched = true;
            row.cell_mut("iso_code").unwrap().apply_edit(Value::Text("xyz".into()), None);
        }
        let plan = match plan(&grid, &SaveTarget::AllChanged).unwrap() {
            SavePlan::Ready(p) => p,
            other => panic!("expected ready plan, got {other:?}"),
        };
        match &plan.request.rows[0] {
            RowPayload::Create { draft: n, values } => {
                assert_eq!(*n, 1);
                // required "name" present even though empty; empty optional "parent" omitted
                assert!(values.contains_key("name"));
                assert_eq!(values["iso_code"], serde_json::json!("xyz"));
                assert!(!values.contains_key("parent"));
            }
            other => panic!("expected create payload, got {other:?}"),
        }
    }

    #[test]
    fn empty_subset_with_changes_elsewhere_asks_to_widen() {
        let grid = grid_with_one_edit();
        match plan(&grid, &SaveTarget::Rows(vec![RowId::Persisted(2)])).unwrap() {
            SavePlan::ConfirmWiden { changed_rows } => assert_eq!(changed_rows, 1),
            other => panic!("expected widen prompt, got {other:?}"),
        }
    }

    #[test]
    fn no_changes_anywhere_is_nothing_to_save() {
        let mut grid = Grid::new(schema());
        grid.load(&[record(1, "v1", "Mosetén", None)]);
        assert_eq!(plan(&grid, &SaveTarget::AllChanged).unwrap_err(), SaveBlocked::NothingToSave);
        assert_eq!(plan(&grid, &SaveTarget::Selected).unwrap_err(), SaveBlocked::NothingToSave);
    }

    #[test]
    fn invalid_cells_block_with_locatable_issues() {
        let mut grid = grid_with_one_edit();
        grid.row_mut(RowId::Persisted(1))
            .unwrap()
            .cell_mut("iso_code")
            .unwrap()
            .mark_invalid("bad code");
        match plan(&grid, &SaveTarget::AllChanged).unwrap_err() {
            SaveBlocked::ValidationErrors(issues) => {
                assert_eq!(issues.len(), 1);
                assert_eq!(issues[0].row, RowId::Persisted(1));
                assert_eq!(issues[0].field, "iso_code");
                assert_eq!(issues[0].message, "bad code");
            }
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn pending_cells_block_the_save() {
        let mut grid = grid_with_one_edit();
        grid.row_mut(RowId::Persisted(1))
            .unwrap()
            .cell_mut("name")
            .unwrap()
            .mark_pending();
        assert!(matches!(
            plan(&grid, &SaveTarget::AllChanged).unwrap_err(),
            SaveBlocked::PendingValidation(_)
        ));
    }

    #[test]
    fn saved_row_refreshes_baseline_in_place() {
        let mut grid = grid_with_one_edit();
        let response = BatchSaveResponse {
            success: true,
            saved: vec![SavedRow {
                record: record(1, "v2", "Mosetén-Chimané", Some("cas")),
                draft: None,
            }],
            errors: vec![],
        };
        let outcome = apply_response(&mut grid, &response);
        assert_eq!(outcome.summary.saved, 1);
        assert_eq!(outcome.summary.conflicts, 0);
        let row = grid.row(RowId::Persisted(1)).unwrap();
        assert!(!row.has_changes());
        assert_eq!(row.version.as_deref(), Some("v2"));
        assert_eq!(
            row.cell("name").unwrap().original,
            Value::Text("Mosetén-Chimané".into())
        );
        // Position preserved
        assert_eq!(grid.rows()[0].id, RowId::Persisted(1));
    }

    #[test]
    fn conflict_partition_preserves_user_value_on_colliding_field() {
        let mut grid = Grid::new(schema());
        grid.load(&[record(1, "v1", "Mosetén", Some("cas"))]);
        {
            let row = grid.row_mut(RowId::Persisted(1)).unwrap();
            row.cell_mut("name").unwrap().apply_edit(Value::Text("Mine".into()), None);
            row.cell_mut("iso_code").unwrap().apply_edit(Value::Text("mnt".into()), None);
        }
        // Server: name collided (now "Theirs"), iso_code edit applied.
        let response = BatchSaveResponse {
            success: false,
            saved: vec![],
            errors: vec![SaveError::Conflict {
                id: 1,
                record: record(1, "v3", "Theirs", Some("mnt")),
                fields: vec!["name".into()],
            }],
        };
        let outcome = apply_response(&mut grid, &response);
        assert_eq!(outcome.summary.conflicts, 1);

        let row = grid.row(RowId::Persisted(1)).unwrap();
        let name = row.cell("name").unwrap();
        assert!(name.has_conflict);
        assert!(name.edited);
        assert_eq!(name.value, Value::Text("Mine".into()));
        assert_eq!(name.original, Value::Text("Theirs".into()));

        let iso = row.cell("iso_code").unwrap();
        assert!(!iso.has_conflict);
        assert!(!iso.edited);
        assert_eq!(iso.value, Value::Text("mnt".into()));
        assert_eq!(iso.original, Value::Text("mnt".into()));

        assert!(row.has_changes());
        assert_eq!(row.version.as_deref(), Some("v3"));
    }

    #[test]
    fn server_validation_failure_marks_cell_invalid() {
        let mut grid = grid_with_one_edit();
        let response = BatchSaveResponse {
            success: false,
            saved: vec![],
            errors: vec![SaveError::Validation {
                id: Some(1),
                draft: None,
                field: "name".into(),
                message: "duplicate name".into(),
            }],
        };
        let outcome = apply_response(&mut grid, &response);
        assert_eq!(outcome.summary.validation_failures, 1);
        let cell = grid.row(RowId::Persisted(1)).unwrap().cell("name").unwrap();
        assert!(cell.is_invalid());
        assert_eq!(cell.validation_error.as_deref(), Some("duplicate name"));
    }

    #[test]
    fn summary_display() {
        let s = SaveSummary { saved: 2, conflicts: 1, validation_failures: 0 };
        assert_eq!(s.to_string(), "2 row(s) saved, 1 conflict(s)");
        let s = SaveSummary { saved: 0, conflicts: 0, validation_failures: 2 };
        assert_eq!(s.to_string(), "0 row(s) saved, 0 conflict(s), 2 validation failure(s)");
    }
}
