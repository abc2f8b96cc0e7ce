//! Column configuration.
//!
//! The engine is schema-agnostic: everything it knows about the
//! records it edits comes from a `GridSchema` — an ordered list of
//! column specs. Cell typing and structural validation dispatch off
//! the closed `ColumnKind` enum, never off dynamic introspection.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// The closed set of cell kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Free text.
    Text,
    /// Text constrained to a fixed option list (enforced server-side).
    Select,
    /// Numeric literal: optional sign, digits, optional fraction.
    Decimal,
    /// Single foreign reference.
    Reference,
    /// Many foreign references.
    MultiReference,
    /// Array of plain strings.
    StringList,
    Boolean,
}

/// Configuration for one editable column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Field name, as it appears on the wire.
    pub field: String,
    /// Display label.
    pub label: String,
    pub kind: ColumnKind,
    /// Required columns flag empty values as invalid (with the draft
    /// deferral described in the validation pipeline).
    #[serde(default)]
    pub required: bool,
    /// Marks the self-referential parent link of the record
    /// hierarchy. At most one column per schema.
    #[serde(default)]
    pub hierarchy_parent: bool,
}

impl ColumnSpec {
    pub fn new(field: impl Into<String>, label: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            field: field.into(),
            label: label.into(),
            kind,
            required: false,
            hierarchy_parent: false,
        }
    }

    /// Mark this column required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark this column as the hierarchy parent link.
    /// Only meaningful for `Reference` columns.
    pub fn hierarchy_parent(mut self) -> Self {
        self.hierarchy_parent = true;
        self
    }
}

/// Ordered column set plus lookup by field name.
#[derive(Debug, Clone)]
pub struct GridSchema {
    columns: Vec<ColumnSpec>,
    by_field: FxHashMap<String, usize>,
}

impl GridSchema {
    /// Build a schema. Later duplicates of a field name are ignored.
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        let mut by_field = FxHashMap::default();
        for (i, col) in columns.iter().enumerate() {
            by_field.entry(col.field.clone()).or_insert(i);
        }
        Self { columns, by_field }
    }

    /// Columns in display order.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column(&self, field: &str) -> Option<&ColumnSpec> {
        self.by_field.get(field).map(|&i| &self.columns[i])
    }

    /// The field name of the hierarchy parent column, if any.
    pub fn hierarchy_parent_field(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.hierarchy_parent)
            .map(|c| c.field.as_str())
    }

    /// Required columns in display order.
    pub fn required_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| c.required)
    }
}
