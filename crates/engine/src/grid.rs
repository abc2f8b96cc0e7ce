//! The grid: ordered rows, id index, hierarchical selection.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

use glotgrid_protocol::RecordData;

use crate::column::GridSchema;
use crate::row::{Row, RowId};

/// Errors for grid lookups. Validation failures are cell state, not
/// errors; these cover only structural misuse (unknown row/column).
#[derive(Debug, Clone, PartialEq)]
pub enum GridError {
    UnknownRow(RowId),
    UnknownColumn(String),
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::UnknownRow(id) => write!(f, "unknown row: {id}"),
            GridError::UnknownColumn(field) => write!(f, "unknown column: {field}"),
        }
    }
}

impl std::error::Error for GridError {}

/// The editable working set. Rows keep their load order; lookup is
/// through the id index. Draft ids are allocated from a counter that
/// never resets within a session, so a removed draft's id is not
/// reused.
#[derive(Debug)]
pub struct Grid {
    schema: GridSchema,
    rows: Vec<Row>,
    index: FxHashMap<RowId, usize>,
    next_draft: u64,
}

impl Grid {
    pub fn new(schema: GridSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            index: FxHashMap::default(),
            next_draft: 1,
        }
    }

    pub fn schema(&self) -> &GridSchema {
        &self.schema
    }

    /// Seed the grid from the authoritative source, replacing any
    /// existing rows.
    pub fn load(&mut self, records: &[RecordData]) {
        self.rows = records
            .iter()
            .map(|r| Row::from_record(&self.schema, r))
            .collect();
        self.rebuild_index();
    }

    /// Append a fresh draft row; returns its id.
    pub fn add_draft(&mut self) -> RowId {
        let id = self.next_draft;
        self.next_draft += 1;
        let row = Row::draft(&self.schema, id);
        let row_id = row.id;
        self.index.insert(row_id, self.rows.len());
        self.rows.push(row);
        row_id
    }

    /// Remove a row outright. Returns false if the id is unknown.
    pub fn remove(&mut self, id: RowId) -> bool {
        match self.index.remove(&id) {
            Some(pos) => {
                self.rows.remove(pos);
                self.rebuild_index();
                true
            }
            None => false,
        }
    }

    /// Replace a row in place, keeping its grid position. Used by the
    /// save protocol; for draft promotion the id changes and the
    /// index is remapped.
    pub fn replace(&mut self, old: RowId, row: Row) -> Result<RowId, GridError> {
        let pos = *self.index.get(&old).ok_or(GridError::UnknownRow(old))?;
        let new = row.id;
        self.rows[pos] = row;
        if new != old {
            self.index.remove(&old);
            self.index.insert(new, pos);
        }
        Ok(new)
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.index.get(&id).map(|&i| &self.rows[i])
    }

    pub fn row_mut(&mut self, id: RowId) -> Option<&mut Row> {
        match self.index.get(&id) {
            Some(&i) => Some(&mut self.rows[i]),
            None => None,
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_ids(&self) -> Vec<RowId> {
        self.rows.iter().map(|r| r.id).collect()
    }

    // ------------------------------------------------------------------
    // Hierarchical selection
    // ------------------------------------------------------------------

    /// Transitive closure of rows whose hierarchy-parent chain leads
    /// to `id`. Empty when the schema has no hierarchy column or the
    /// row is a draft (drafts have no persisted id to point at).
    pub fn descendants(&self, id: RowId) -> Vec<RowId> {
        let Some(root) = id.record_id() else {
            return Vec::new();
        };
        if self.schema.hierarchy_parent_field().is_none() {
            return Vec::new();
        }

        // parent record id -> child rows
        let mut children: FxHashMap<i64, Vec<RowId>> = FxHashMap::default();
        for row in &self.rows {
            if let Some(parent) = row.parent_record(&self.schema) {
                children.entry(parent).or_default().push(row.id);
            }
        }

        let mut out = Vec::new();
        let mut seen: FxHashSet<RowId> = FxHashSet::default();
        let mut frontier = vec![root];
        while let Some(parent) = frontier.pop() {
            for &child in children.get(&parent).into_iter().flatten() {
                if seen.insert(child) {
                    out.push(child);
                    if let Some(child_record) = child.record_id() {
                        frontier.push(child_record);
                    }
                }
            }
        }
        out
    }

    /// Set selection on a row and all of its descendants as one
    /// atomic operation. Returns the ids whose state changed.
    pub fn select_cascade(&mut self, id: RowId, selected: bool) -> Result<Vec<RowId>, GridError> {
        if !self.index.contains_key(&id) {
            return Err(GridError::UnknownRow(id));
        }
        let mut targets = vec![id];
        targets.extend(self.descendants(id));
        let mut changed = Vec::new();
        for target in targets {
            if let Some(row) = self.row_mut(target) {
                if row.selected != selected {
                    row.selected = selected;
                    changed.push(target);
                }
            }
        }
        Ok(changed)
    }

    /// Toggle a row (and its subtree) based on the row's current
    /// state.
    pub fn toggle_cascade(&mut self, id: RowId) -> Result<Vec<RowId>, GridError> {
        let current = self.row(id).ok_or(GridError::UnknownRow(id))?.selected;
        self.select_cascade(id, !current)
    }

    /// Select-all over the caller's visible subset: if every visible
    /// row is already selected, deselect them all; otherwise select
    /// them all. The unfiltered remainder is untouched.
    pub fn toggle_select_visible(&mut self, visible: &[RowId]) -> usize {
        let all_selected = visible
            .iter()
            .filter_map(|id| self.row(*id))
            .all(|r| r.selected);
        let target = !(all_selected && !visible.is_empty());
        let mut changed = 0;
        for id in visible {
            if let Some(row) = self.row_mut(*id) {
                if row.selected != target {
                    row.selected = target;
                    changed += 1;
                }
            }
        }
        changed
    }

    pub fn selected_ids(&self) -> Vec<RowId> {
        self.rows.iter().filter(|r| r.selected).map(|r| r.id).collect()
    }

    pub fn clear_selection(&mut self) {
        for row in &mut self.rows {
            row.selected = false;
        }
    }

    // ------------------------------------------------------------------
    // Derived row sets
    // ------------------------------------------------------------------

    /// Rows with at least one edited cell, in grid order.
    pub fn changed_ids(&self) -> Vec<RowId> {
        self.rows
            .iter()
            .filter(|r| r.has_changes())
            .map(|r| r.id)
            .collect()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.rows.iter().any(|r| r.has_changes())
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id, i))
            .collect();
    }
}
