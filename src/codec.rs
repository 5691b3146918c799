//! Typed value wire codec
//!
//! Columns only hold strings, so every non-string attribute is written with a
//! two-character type tag:
//!
//! | value     | column                  |
//! |-----------|-------------------------|
//! | Bool      | `$bTrue` / `$bFalse`    |
//! | Int       | `$i<decimal>`           |
//! | Long      | `$l<decimal>`           |
//! | Float     | `$f<repr>`              |
//! | Timestamp | `$tYYYY-MM-DDTHH:MM:SS` |
//! | String    | unchanged               |
//!
//! Older writers appended `L` to longs (`$l123L`); the suffix is accepted on
//! read and never written.
//!
//! A `Map` of scalars becomes a nested column group. The format is shared
//! with data already on disk, so it must not change.
//!
//! A plain string that itself starts with `$` is stored verbatim and will not
//! read back as a string; callers storing such strings must escape them.

use crate::backend::{Cell, Row};
use crate::graph::{AttributeMap, Value};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use thiserror::Error;

const TIMESTAMP_WRITE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const TIMESTAMP_READ_FORMAT: &str = "%Y%m%dT%H:%M:%S";

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Value has no column representation
    #[error("Cannot encode value of type {0}")]
    UnsupportedValueType(&'static str),

    /// Column does not hold a well-formed tagged value
    #[error("Cannot decode {value:?}: {reason}")]
    DecodeError { value: String, reason: String },
}

pub type CodecResult<T> = Result<T, CodecError>;

fn decode_error(value: &str, reason: impl Into<String>) -> CodecError {
    CodecError::DecodeError {
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Encode a scalar into its column string.
pub fn encode_value(value: &Value) -> CodecResult<String> {
    match value {
        Value::Bool(true) => Ok("$bTrue".to_string()),
        Value::Bool(false) => Ok("$bFalse".to_string()),
        Value::Int(i) => Ok(format!("$i{}", i)),
        Value::Long(l) => Ok(format!("$l{}", l)),
        Value::Float(f) => Ok(format!("$f{:?}", f)),
        Value::String(s) => Ok(s.clone()),
        Value::Timestamp(ts) => Ok(format!("$t{}", ts.format(TIMESTAMP_WRITE_FORMAT))),
        other => Err(CodecError::UnsupportedValueType(other.type_name())),
    }
}

/// Encode a value into a cell; a map of scalars becomes a nested group.
pub fn encode(value: &Value) -> CodecResult<Cell> {
    match value {
        Value::Map(map) => {
            let mut group = BTreeMap::new();
            for (key, inner) in map {
                if inner.is_null() {
                    continue;
                }
                group.insert(key.clone(), encode_value(inner)?);
            }
            Ok(Cell::Group(group))
        }
        other => encode_value(other).map(Cell::Value),
    }
}

/// Decode a column string. Untagged strings come back as `Value::String`.
pub fn decode(raw: &str) -> CodecResult<Value> {
    if !raw.starts_with('$') {
        return Ok(Value::String(raw.to_string()));
    }
    let (tag, content) = match (raw.get(..2), raw.get(2..)) {
        (Some(tag), Some(content)) if tag.len() == 2 => (tag, content),
        _ => return Err(decode_error(raw, "missing type tag")),
    };
    match tag {
        "$b" => match content {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            _ => Err(decode_error(raw, "boolean must be True or False")),
        },
        "$i" => content
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| decode_error(raw, e.to_string())),
        "$l" => content
            .strip_suffix('L')
            .unwrap_or(content)
            .parse::<i128>()
            .map(Value::Long)
            .map_err(|e| decode_error(raw, e.to_string())),
        "$f" => content
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| decode_error(raw, e.to_string())),
        "$t" => {
            let compact = content.replace('-', "");
            NaiveDateTime::parse_from_str(&compact, TIMESTAMP_READ_FORMAT)
                .map(Value::Timestamp)
                .map_err(|e| decode_error(raw, e.to_string()))
        }
        _ => Err(decode_error(raw, format!("unknown type tag {}", tag))),
    }
}

/// Decode a cell; a group becomes `Value::Map`.
pub fn decode_cell(cell: &Cell) -> CodecResult<Value> {
    match cell {
        Cell::Value(raw) => decode(raw),
        Cell::Group(group) => {
            let mut map = BTreeMap::new();
            for (key, raw) in group {
                map.insert(key.clone(), decode(raw)?);
            }
            Ok(Value::Map(map))
        }
    }
}

/// Encode every attribute, dropping nulls.
pub fn encode_all(attributes: &AttributeMap) -> CodecResult<Row> {
    let mut row = Row::new();
    for (key, value) in attributes {
        if value.is_null() {
            continue;
        }
        row.insert(key.clone(), encode(value)?);
    }
    Ok(row)
}

/// Decode every column of a row or group.
pub fn decode_all(row: &Row) -> CodecResult<AttributeMap> {
    let mut attributes = AttributeMap::new();
    for (key, cell) in row {
        attributes.insert(key.clone(), decode_cell(cell)?);
    }
    Ok(attributes)
}
