//! Validated access requests against a spreadsheet range.
//!
//! Request bodies arrive as loosely typed JSON from browser forms, so the
//! parsers here work on [`serde_json::Value`] and report which field was
//! missing or malformed instead of surfacing a serde error.

use std::fmt;

use serde_json::{Map, Value};
use sheets_proxy_types::Rows;

use super::error::DomainError;

const SPREADSHEET_ID_FIELD: &str = "spreadsheetId";
const RANGE_FIELD: &str = "range";
const VALUES_FIELD: &str = "values";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Append,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Append => "append",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A spreadsheet id plus an A1-notation range, both non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SheetTarget {
    spreadsheet_id: String,
    range: String,
}

impl SheetTarget {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        range: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let spreadsheet_id = spreadsheet_id.into();
        let range = range.into();
        if spreadsheet_id.is_empty() {
            return Err(invalid_field(SPREADSHEET_ID_FIELD));
        }
        if range.is_empty() {
            return Err(invalid_field(RANGE_FIELD));
        }
        Ok(Self {
            spreadsheet_id,
            range,
        })
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    pub fn range(&self) -> &str {
        &self.range
    }

    /// Parse `{ spreadsheetId, range }` out of a JSON body.
    pub fn from_body(body: &Value) -> Result<Self, DomainError> {
        let object = body_object(body)?;
        let spreadsheet_id = required_string(object, SPREADSHEET_ID_FIELD)?;
        let range = required_string(object, RANGE_FIELD)?;
        Self::new(spreadsheet_id, range)
    }
}

/// A validated append: target plus the rows to write.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendCommand {
    pub target: SheetTarget,
    pub rows: Rows,
}

impl AppendCommand {
    /// Parse `{ spreadsheetId, range, values }` out of a JSON body.
    pub fn from_body(body: &Value) -> Result<Self, DomainError> {
        let target = SheetTarget::from_body(body)?;
        let values = match body_object(body)?.get(VALUES_FIELD) {
            Some(Value::Array(values)) => values,
            _ => {
                return Err(DomainError::validation(
                    "Missing or invalid \"values\" (must be array)",
                ));
            }
        };
        let rows = normalize_rows(values)?;
        Ok(Self { target, rows })
    }
}

/// Check that `values` is a list of rows where each row is either an array of
/// scalar cells or a single scalar cell. Scalar rows become one-cell rows.
pub fn normalize_rows(values: &[Value]) -> Result<Rows, DomainError> {
    values
        .iter()
        .enumerate()
        .map(|(index, row)| match row {
            Value::Array(cells) => {
                if let Some(position) = cells.iter().position(|cell| !is_scalar(cell)) {
                    return Err(DomainError::validation(format!(
                        "Invalid \"values\": row {index} cell {position} must be a scalar"
                    )));
                }
                Ok(cells.clone())
            }
            Value::Object(_) => Err(DomainError::validation(format!(
                "Invalid \"values\": row {index} must be an array or a scalar"
            ))),
            scalar => Ok(vec![scalar.clone()]),
        })
        .collect()
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn body_object(body: &Value) -> Result<&Map<String, Value>, DomainError> {
    body.as_object()
        .ok_or_else(|| DomainError::validation("Request body must be a JSON object"))
}

fn required_string<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, DomainError> {
    match object.get(field) {
        Some(Value::String(value)) if !value.is_empty() => Ok(value.as_str()),
        _ => Err(invalid_field(field)),
    }
}

fn invalid_field(field: &str) -> DomainError {
    DomainError::validation(format!("Missing or invalid \"{field}\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn target_requires_non_empty_strings() {
        let err = SheetTarget::from_body(&json!({ "range": "A1" })).unwrap_err();
        assert_eq!(err.to_string(), "Missing or invalid \"spreadsheetId\"");

        let err = SheetTarget::from_body(&json!({ "spreadsheetId": "S1", "range": "" }))
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing or invalid \"range\"");

        let err = SheetTarget::from_body(&json!({ "spreadsheetId": 7, "range": "A1" }))
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing or invalid \"spreadsheetId\"");
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(SheetTarget::from_body(&json!(["S1", "A1"])).is_err());
    }

    #[test]
    fn append_requires_values_array() {
        let err = AppendCommand::from_body(&json!({
            "spreadsheetId": "S1",
            "range": "Sheet1!A:Z",
            "values": "not-an-array"
        }))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing or invalid \"values\" (must be array)"
        );
    }

    #[test]
    fn scalar_rows_become_single_cells() {
        let command = AppendCommand::from_body(&json!({
            "spreadsheetId": "S1",
            "range": "Sheet1!A:Z",
            "values": [["2025-01-01", "A", 120], "note", null]
        }))
        .expect("valid append");

        assert_eq!(command.target.spreadsheet_id(), "S1");
        assert_eq!(
            command.rows,
            vec![
                vec![json!("2025-01-01"), json!("A"), json!(120)],
                vec![json!("note")],
                vec![Value::Null],
            ]
        );
    }

    #[test]
    fn objects_and_nested_arrays_are_rejected() {
        assert!(normalize_rows(&[json!({ "a": 1 })]).is_err());
        assert!(normalize_rows(&[json!([1, [2, 3]])]).is_err());
        assert!(normalize_rows(&[json!([1, { "b": 2 }])]).is_err());
    }

    #[test]
    fn empty_values_are_allowed() {
        assert_eq!(normalize_rows(&[]).expect("valid"), Rows::new());
    }
}
