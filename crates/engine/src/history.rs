//! Undo/redo command log.
//!
//! Each entry captures full before/after cell snapshots, so applying
//! either side is a plain restore — no re-derivation. Paste/fill
//! operations push one group covering every touched cell; a single
//! undo reverses the whole paste.

use crate::cell::Cell;
use crate::row::RowId;

/// Default bound on history depth. Oldest groups drop first.
pub const DEFAULT_CAPACITY: usize = 100;

/// One cell's transition within an edit group.
#[derive(Debug, Clone)]
pub struct CellChange {
    pub row: RowId,
    pub field: String,
    pub before: Cell,
    pub after: Cell,
}

/// A logical edit: one cell for a keyboard edit, many for paste/fill.
#[derive(Debug, Clone)]
pub struct EditGroup {
    pub description: String,
    pub changes: Vec<CellChange>,
}

impl EditGroup {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            changes: Vec::new(),
        }
    }

    pub fn push(&mut self, row: RowId, field: impl Into<String>, before: Cell, after: Cell) {
        self.changes.push(CellChange {
            row,
            field: field.into(),
            before,
            after,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Bounded undo/redo stacks of edit groups.
#[derive(Debug)]
pub struct History {
    undo: Vec<EditGroup>,
    redo: Vec<EditGroup>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            capacity,
        }
    }

    /// Record a new edit group. Discards the redo branch.
    pub fn record(&mut self, group: EditGroup) {
        if group.is_empty() {
            return;
        }
        self.undo.push(group);
        self.redo.clear();
        if self.undo.len() > self.capacity {
            self.undo.remove(0);
        }
    }

    /// Pop the most recent group for undoing. The caller restores the
    /// before-snapshots, then hands the group back via `undone`.
    pub fn pop_undo(&mut self) -> Option<EditGroup> {
        self.undo.pop()
    }

    pub fn undone(&mut self, group: EditGroup) {
        self.redo.push(group);
    }

    pub fn pop_redo(&mut self) -> Option<EditGroup> {
        self.redo.pop()
    }

    pub fn redone(&mut self, group: EditGroup) {
        // Does not clear redo: this is a replay, not a new edit.
        self.undo.push(group);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    /// Wholesale clear: conflict-free save success or grid reset.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Drop every group touching any of the given rows, from both
    /// stacks. Runs after a save refreshes those rows' baselines:
    /// snapshots taken against the old baseline would, if restored,
    /// overwrite the fresh `original` values with stale data.
    pub fn prune_rows(&mut self, rows: &[RowId]) {
        self.undo
            .retain(|g| !g.changes.iter().any(|c| rows.contains(&c.row)));
        self.redo
            .retain(|g| !g.changes.iter().any(|c| rows.contains(&c.row)));
    }

    /// Repoint a promoted draft's entries at its persisted id so undo
    /// keeps working across the save.
    pub fn remap_row(&mut self, old: RowId, new: RowId) {
        for group in self.undo.iter_mut().chain(self.redo.iter_mut()) {
            for change in &mut group.changes {
                if change.row == old {
                    change.row = new;
                }
            }
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
