//! Test harness for editor operations with a scripted validator.
//!
//! This module provides `EditorHarness`, a wrapper around `BatchEditor`
//! that:
//! - Drives time through a manual clock (no real sleeping)
//! - Answers remote validations from a scripted verdict table
//! - Records every dispatched validation request
//! - Collects emitted events
//!
//! Use this harness to test debounce/staleness invariants without any
//! transport.

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use glotgrid_protocol::{BatchSaveResponse, ValidationRequest, ValidationVerdict};

use crate::column::GridSchema;
use crate::editor::BatchEditor;
use crate::events::EventCollector;
use crate::grid::GridError;
use crate::pending::DEFAULT_DEBOUNCE;
use crate::row::RowId;
use crate::value::Value;

/// Test harness wrapping BatchEditor with a manual clock and a
/// scripted remote validator.
pub struct EditorHarness {
    editor: BatchEditor,
    now: Instant,
    /// field name -> verdict the fake server returns. Fields without
    /// an entry validate clean.
    verdicts: FxHashMap<String, ValidationVerdict>,
    /// Every request dispatched through `run_validations`.
    dispatched: Vec<ValidationRequest>,
    events: EventCollector,
}

impl EditorHarness {
    pub fn new(schema: GridSchema) -> Self {
        Self {
            editor: BatchEditor::new(schema),
            now: Instant::now(),
            verdicts: FxHashMap::default(),
            dispatched: Vec::new(),
            events: EventCollector::new(),
        }
    }

    pub fn editor(&self) -> &BatchEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut BatchEditor {
        &mut self.editor
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    /// Script the verdict the fake server returns for a field.
    pub fn script_verdict(&mut self, field: &str, verdict: ValidationVerdict) {
        self.verdicts.insert(field.to_string(), verdict);
    }

    /// Requests dispatched so far, oldest first.
    pub fn dispatched(&self) -> &[ValidationRequest] {
        &self.dispatched
    }

    pub fn events(&self) -> &EventCollector {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Advance the clock without running validations.
    pub fn tick(&mut self, by: Duration) {
        self.now += by;
    }

    /// Edit a cell at the current clock reading.
    pub fn edit(&mut self, row: RowId, field: &str, value: Value) -> Result<(), GridError> {
        let result = self.editor.edit_cell(row, field, value, None, self.now);
        self.drain_events();
        result
    }

    /// Advance past the debounce window, dispatch everything due, and
    /// apply the scripted verdicts. Returns how many verdicts landed
    /// (stale ones are dropped by the editor and not counted).
    pub fn run_validations(&mut self) -> usize {
        self.tick(DEFAULT_DEBOUNCE);
        let due = self.editor.due_validations(self.now);
        let mut applied = 0;
        for scheduled in due {
            let verdict = self
                .verdicts
                .get(&scheduled.field)
                .cloned()
                .unwrap_or_else(ValidationVerdict::ok);
            self.dispatched.push(scheduled.request.clone());
            if self
                .editor
                .apply_validation(scheduled.row, &scheduled.field, scheduled.generation, &verdict)
            {
                applied += 1;
            }
        }
        self.drain_events();
        applied
    }

    /// Plan, begin, and complete a save against a canned response.
    /// Panics if planning does not yield a ready plan.
    pub fn save_with_response(
        &mut self,
        target: &crate::save::SaveTarget,
        response: &BatchSaveResponse,
    ) -> crate::save::SaveSummary {
        let plan = match self.editor.plan_save(target) {
            Ok(crate::save::SavePlan::Ready(p)) => p,
            other => panic!("expected ready plan, got {other:?}"),
        };
        self.editor.begin_save(plan);
        let summary = self.editor.complete_save(response);
        self.drain_events();
        summary
    }

    fn drain_events(&mut self) {
        self.events.extend(self.editor.take_events());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{ColumnKind, ColumnSpec};
    use glotgrid_protocol::{FieldData, RecordData, SavedRow};
    use std::collections::BTreeMap;

    fn schema() -> GridSchema {
        GridSchema::new(vec![
            ColumnSpec::new("name", "Name", ColumnKind::Text).required(),
            ColumnSpec::new("iso_code", "ISO code", ColumnKind::Text),
        ])
    }

    fn record(id: i64, name: &str) -> RecordData {
        let mut fields = BTreeMap::new();
        fields.insert("name".into(), FieldData::new(serde_json::json!(name)));
        fields.insert("iso_code".into(), FieldData::new(serde_json::Value::Null));
        RecordData {
            id,
            version: "v1".into(),
            fields,
        }
    }

    #[test]
    fn scripted_verdicts_land_on_cells() {
        let mut h = EditorHarness::new(schema());
        h.editor_mut().load(&[record(1, "Mosetén")]);
        h.clear_events();
        h.script_verdict("iso_code", ValidationVerdict::invalid("unknown code"));

        h.edit(RowId::Persisted(1), "iso_code", Value::Text("zzz".into())).unwrap();
        assert_eq!(h.run_validations(), 1);
        assert_eq!(h.dispatched().len(), 1);

        let cell = h.editor().grid().row(RowId::Persisted(1)).unwrap().cell("iso_code").unwrap();
        assert!(cell.is_invalid());
        assert_eq!(cell.validation_error.as_deref(), Some("unknown code"));
    }

    #[test]
    fn harness_save_promotes_and_collects_events() {
        let mut h = EditorHarness::new(schema());
        h.editor_mut().load(&[record(1, "Mosetén")]);
        h.clear_events();

        h.edit(RowId::Persisted(1), "name", Value::Text("Renamed".into())).unwrap();
        h.run_validations();

        let response = BatchSaveResponse {
            success: true,
            saved: vec![SavedRow {
                record: record(1, "Renamed"),
                draft: None,
            }],
            errors: vec![],
        };
        let summary = h.save_with_response(&crate::save::SaveTarget::AllChanged, &response);
        assert_eq!(summary.saved, 1);
        assert_eq!(summary.conflicts, 0);
        assert_eq!(h.events().save_completed(), vec![(1, 0)]);
        assert!(!h.editor().has_unsaved_changes());
    }
}
