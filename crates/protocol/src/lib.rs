//! GlotGrid Archive Protocol — v1 Frozen Wire Format
//!
//! This crate defines the canonical types exchanged between the batch
//! editor and the archive server: the record read path, per-field
//! remote validation, and the batch save request/response with its
//! saved/conflict split. The wire format is JSON.
//!
//! # Protocol Version
//!
//! This is **protocol v1** — the wire format is frozen. Changes require:
//! 1. Version bump in PROTOCOL_VERSION
//! 2. New golden shapes in `tests/json_contract.rs`
//! 3. Backward compatibility handling
//!
//! # Usage
//!
//! ```ignore
//! use glotgrid_protocol::{BatchSaveRequest, BatchSaveResponse, RowPayload};
//!
//! let req = BatchSaveRequest { rows: vec![] };
//! let json = serde_json::to_string(&req)?;
//! let resp: BatchSaveResponse = serde_json::from_str(&line)?;
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Current protocol version. Increment for breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

// =============================================================================
// Records (read path)
// =============================================================================

/// One field of an authoritative record: the typed value plus an
/// optional human-readable rendering (e.g. a reference id displayed
/// as "Name (code)").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldData {
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl FieldData {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value, text: None }
    }

    pub fn with_text(value: serde_json::Value, text: impl Into<String>) -> Self {
        Self {
            value,
            text: Some(text.into()),
        }
    }
}

/// An authoritative record as served by the archive.
///
/// `version` is the opaque freshness token for optimistic conflict
/// detection; it changes on every server-side write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordData {
    pub id: i64,
    pub version: String,
    /// Field name → value. BTreeMap for stable serialization order.
    pub fields: BTreeMap<String, FieldData>,
}

/// Read-path query. `ids = None` means the full working set — the
/// editor expects all rows up front and does not paginate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<i64>>,
}

// =============================================================================
// Field validation
// =============================================================================

/// Remote validation of a single field edit. The original value is
/// passed for context so the server can validate the transition, not
/// just the end state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub field: String,
    pub value: serde_json::Value,
    pub original: serde_json::Value,
}

/// Server verdict on a field edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationVerdict {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(message.into()),
        }
    }
}

// =============================================================================
// Batch save
// =============================================================================

/// One row of a batch save.
///
/// Updates carry only the changed fields, the freshness token, and a
/// `base` map of "field → the original value this edit was based on"
/// for server-side conflict comparison. Creates carry required fields
/// plus any non-empty optional field; omitted fields get server
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RowPayload {
    Update {
        id: i64,
        version: String,
        values: BTreeMap<String, serde_json::Value>,
        base: BTreeMap<String, serde_json::Value>,
    },
    Create {
        /// Client-side draft id, echoed back in the response so the
        /// editor can map a saved record to the draft it replaces.
        draft: u64,
        values: BTreeMap<String, serde_json::Value>,
    },
}

/// Batch save request. Applied per row: the server reports each row
/// as saved or failed independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSaveRequest {
    pub rows: Vec<RowPayload>,
}

/// Per-row failure in a batch save response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SaveError {
    /// One or more fields collided with a concurrent edit. Carries
    /// the fresh authoritative record and the names of the fields
    /// that specifically conflicted (not necessarily all edited
    /// fields).
    Conflict {
        id: i64,
        record: RecordData,
        fields: Vec<String>,
    },
    /// Server-side validation rejected a field.
    Validation {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        draft: Option<u64>,
        field: String,
        message: String,
    },
}

/// Batch save response: the saved/failed split.
///
/// `success` is true iff `errors` is empty. A transport-level failure
/// produces no response at all — the client must not assume partial
/// application in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSaveResponse {
    pub success: bool,
    pub saved: Vec<SavedRow>,
    #[serde(default)]
    pub errors: Vec<SaveError>,
}

/// A successfully saved row: the fresh record, plus the draft id it
/// satisfies when the row was a create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRow {
    pub record: RecordData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<u64>,
}
