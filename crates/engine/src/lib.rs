//! `glotgrid-engine` — Conflict-aware batch editing engine for
//! tabular record grids.
//!
//! Pure engine crate: holds the working set, validation state, undo
//! history, and the save protocol. No transport or IO dependencies;
//! time is injected and remote calls are delegated to the embedding
//! loop.

pub mod cell;
pub mod column;
pub mod editor;
pub mod events;
pub mod grid;
pub mod history;
pub mod pending;
pub mod row;
pub mod save;
pub mod validate;
pub mod value;

#[cfg(test)]
pub mod harness;

pub use cell::{Cell, ValidationState};
pub use column::{ColumnKind, ColumnSpec, GridSchema};
pub use editor::{BatchEditor, CellEdit};
pub use events::GridEvent;
pub use grid::{Grid, GridError};
pub use pending::{ScheduledValidation, DEFAULT_DEBOUNCE};
pub use row::{Row, RowId};
pub use save::{SaveBlocked, SavePlan, SaveSummary, SaveTarget};
pub use value::Value;
