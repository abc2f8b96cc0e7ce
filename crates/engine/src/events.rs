//! Event types for grid change notifications.
//!
//! The embedding UI drains these after each engine operation to know
//! what to repaint, without diffing the whole grid. They're also used
//! by the test harness to verify operation boundaries.

use crate::row::RowId;

/// Events emitted by the editor during operations.
#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    /// Cell state changed on these rows (edits, validation verdicts,
    /// undo/redo restores).
    CellsChanged { rows: Vec<RowId> },

    /// A row was replaced in place by a save (draft promotion or
    /// baseline refresh). Position and unrelated bookkeeping survive.
    RowReplaced { old: RowId, new: RowId },

    /// The selection set changed. Carries the new selected count.
    SelectionChanged { selected: usize },

    /// A batch save completed (fully or partially).
    SaveCompleted { saved: usize, conflicts: usize },

    /// The grid was reseeded from the authoritative source.
    GridReset,
}

/// Simple event collector for testing.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<GridEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = GridEvent>) {
        self.events.extend(events);
    }

    pub fn events(&self) -> &[GridEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Filter to only RowReplaced events.
    pub fn row_replaced(&self) -> Vec<(&RowId, &RowId)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GridEvent::RowReplaced { old, new } => Some((old, new)),
                _ => None,
            })
            .collect()
    }

    /// Filter to only SaveCompleted events.
    pub fn save_completed(&self) -> Vec<(usize, usize)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GridEvent::SaveCompleted { saved, conflicts } => Some((*saved, *conflicts)),
                _ => None,
            })
            .collect()
    }

    /// Rows named by any CellsChanged event, in emission order.
    pub fn changed_rows(&self) -> Vec<RowId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                GridEvent::CellsChanged { rows } => Some(rows.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}
