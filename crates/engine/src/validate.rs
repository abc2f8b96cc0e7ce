//! Local structural validation.
//!
//! These checks are cheap, synchronous, and never wait on the
//! network. They run before the baseline short-circuit and before any
//! remote validation is scheduled. Anything that passes here and
//! differs from the baseline goes to the remote validator.

use crate::column::{ColumnKind, ColumnSpec};
use crate::row::RowId;
use crate::value::Value;

pub const MSG_REQUIRED: &str = "This field is required";
pub const MSG_UNRESOLVED_REF: &str = "Select a value from the list";
pub const MSG_SELF_REF: &str = "A record cannot reference itself";
pub const MSG_NOT_A_NUMBER: &str = "Must be a number";
pub const MSG_NOT_A_LIST: &str = "Must be a list of values";
pub const MSG_EMPTY_LIST_ENTRY: &str = "List entries cannot be empty";

/// Check a value against the numeric-literal grammar:
/// optional sign, digits, optional fractional part.
///
/// ```
/// use glotgrid_engine::validate::is_decimal_literal;
///
/// assert!(is_decimal_literal("-16.75"));
/// assert!(is_decimal_literal("+3"));
/// assert!(is_decimal_literal("0.5"));
/// assert!(!is_decimal_literal("3."));
/// assert!(!is_decimal_literal(".5"));
/// assert!(!is_decimal_literal("1,5"));
/// assert!(!is_decimal_literal("e10"));
/// ```
pub fn is_decimal_literal(s: &str) -> bool {
    let s = s.trim();
    let rest = s.strip_prefix(['+', '-']).unwrap_or(s);
    if rest.is_empty() {
        return false;
    }
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match frac_part {
        Some(f) => !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()),
        None => true,
    }
}

/// Type-specific structural check for an edited cell.
///
/// Returns the failure message, or `None` when the value is
/// structurally sound for the column kind. Emptiness is not checked
/// here — required-field handling runs before this.
pub fn structural_check(
    spec: &ColumnSpec,
    row_id: RowId,
    value: &Value,
    text: &str,
) -> Option<&'static str> {
    match spec.kind {
        ColumnKind::Reference => {
            // Free text that didn't resolve to a reference.
            if value.is_empty() && !text.trim().is_empty() {
                return Some(MSG_UNRESOLVED_REF);
            }
            if spec.hierarchy_parent {
                if let (Value::Ref(target), Some(own)) = (value, row_id.record_id()) {
                    if *target == own {
                        return Some(MSG_SELF_REF);
                    }
                }
            }
            None
        }
        ColumnKind::MultiReference => {
            if value.is_empty() && !text.trim().is_empty() {
                return Some(MSG_UNRESOLVED_REF);
            }
            match value {
                Value::Null | Value::Refs(_) => None,
                _ => Some(MSG_NOT_A_LIST),
            }
        }
        ColumnKind::StringList => match value {
            Value::Null => None,
            // An explicitly empty list is valid for optional fields.
            Value::List(items) => {
                if items.iter().any(|s| s.trim().is_empty()) {
                    Some(MSG_EMPTY_LIST_ENTRY)
                } else {
                    None
                }
            }
            _ => Some(MSG_NOT_A_LIST),
        },
        ColumnKind::Decimal => match value {
            Value::Null | Value::Number(_) => None,
            Value::Text(s) => {
                if s.trim().is_empty() || is_decimal_literal(s) {
                    None
                } else {
                    Some(MSG_NOT_A_NUMBER)
                }
            }
            _ => Some(MSG_NOT_A_NUMBER),
        },
        ColumnKind::Text | ColumnKind::Select | ColumnKind::Boolean => None,
    }
}
