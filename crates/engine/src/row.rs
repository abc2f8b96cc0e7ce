//! Rows: id, per-field cells, derived state.

use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use glotgrid_protocol::RecordData;

use crate::cell::Cell;
use crate::column::GridSchema;
use crate::value::Value;

/// Row identity. Draft ids come from a counter the grid owns, so the
/// two namespaces can never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RowId {
    Persisted(i64),
    Draft(u64),
}

impl RowId {
    pub fn is_draft(&self) -> bool {
        matches!(self, RowId::Draft(_))
    }

    /// The persisted record id, if this row has one.
    pub fn record_id(&self) -> Option<i64> {
        match self {
            RowId::Persisted(id) => Some(*id),
            RowId::Draft(_) => None,
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Persisted(id) => write!(f, "{id}"),
            RowId::Draft(n) => write!(f, "draft:{n}"),
        }
    }
}

/// One grid row: a field → cell mapping (display order comes from
/// the schema) plus row-level bookkeeping.
#[derive(Debug, Clone)]
pub struct Row {
    pub id: RowId,
    cells: FxHashMap<String, Cell>,
    /// True until the row has been successfully persisted once.
    pub is_draft: bool,
    /// Has the row ever received a real edit. Drives the
    /// required-field cascade on drafts; a single explicit
    /// transition, never re-derived from cell state.
    pub touched: bool,
    pub selected: bool,
    /// Opaque freshness token from the last authoritative read.
    /// `None` exactly for drafts.
    pub version: Option<String>,
}

impl Row {
    /// Materialize a row from an authoritative record. Every cell's
    /// baseline equals its value.
    pub fn from_record(schema: &GridSchema, record: &RecordData) -> Self {
        let mut cells = FxHashMap::default();
        for col in schema.columns() {
            let cell = match record.fields.get(&col.field) {
                Some(field) => {
                    let value = Value::from_json(col.kind, &field.value);
                    let text = field.text.clone().unwrap_or_else(|| value.render());
                    Cell::loaded(value, text)
                }
                None => Cell::blank(),
            };
            cells.insert(col.field.clone(), cell);
        }
        Self {
            id: RowId::Persisted(record.id),
            cells,
            is_draft: false,
            touched: true,
            selected: false,
            version: Some(record.version.clone()),
        }
    }

    /// A fresh draft row: all baselines `Null`, no version token.
    pub fn draft(schema: &GridSchema, id: u64) -> Self {
        let mut cells = FxHashMap::default();
        for col in schema.columns() {
            cells.insert(col.field.clone(), Cell::blank());
        }
        Self {
            id: RowId::Draft(id),
            cells,
            is_draft: true,
            touched: false,
            selected: false,
            version: None,
        }
    }

    pub fn cell(&self, field: &str) -> Option<&Cell> {
        self.cells.get(field)
    }

    pub fn cell_mut(&mut self, field: &str) -> Option<&mut Cell> {
        self.cells.get_mut(field)
    }

    /// True iff any cell diverges from its baseline. The same fact as
    /// per-cell `edited`, viewed at row granularity.
    pub fn has_changes(&self) -> bool {
        self.cells.values().any(|c| c.edited)
    }

    pub fn has_errors(&self) -> bool {
        self.cells.values().any(|c| c.is_invalid())
    }

    pub fn has_pending(&self) -> bool {
        self.cells.values().any(|c| c.is_pending())
    }

    pub fn has_conflicts(&self) -> bool {
        self.cells.values().any(|c| c.has_conflict)
    }

    /// The record id this row points at through the hierarchy parent
    /// column, if the schema has one and the cell holds a reference.
    pub fn parent_record(&self, schema: &GridSchema) -> Option<i64> {
        let field = schema.hierarchy_parent_field()?;
        match self.cell(field)?.value {
            Value::Ref(id) => Some(id),
            _ => None,
        }
    }
}
