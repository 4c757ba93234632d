//! Row codec: the mapping between a typed row and its compact byte buffer.
//!
//! A row is the concatenation, in schema column order, of
//! `value_len:u16 (big-endian) | value_bytes`. INTEGER values are 4-byte
//! big-endian two's complement; TEXT values are their UTF-8 bytes.
//!
//! Decoding is strictly schema-driven and defensive: a buffer that runs out
//! before the schema does yields the decoded prefix, so rows written under an
//! older, shorter schema still read back (missing tail columns are absent,
//! not an error).

use catalog::Column;
use common::{DbError, DbResult};
use types::{SqlType, Value};

/// Encode a full row. `values` must be positional and match `columns`.
///
/// Every value must be non-null and match its column's declared type.
pub fn encode(columns: &[Column], values: &[Value]) -> DbResult<Vec<u8>> {
    if values.len() != columns.len() {
        return Err(DbError::Schema(format!(
            "column count mismatch: expected {} values, got {}",
            columns.len(),
            values.len()
        )));
    }

    let mut buf = Vec::new();
    for (column, value) in columns.iter().zip(values) {
        match (column.ty, value) {
            (SqlType::Integer, Value::Int(i)) => {
                buf.extend_from_slice(&4u16.to_be_bytes());
                buf.extend_from_slice(&i.to_be_bytes());
            }
            (SqlType::Text, Value::Text(s)) => {
                if s.len() > u16::MAX as usize {
                    return Err(DbError::Data(format!(
                        "TEXT value for column '{}' exceeds {} bytes",
                        column.name,
                        u16::MAX
                    )));
                }
                buf.extend_from_slice(&(s.len() as u16).to_be_bytes());
                buf.extend_from_slice(s.as_bytes());
            }
            (_, Value::Null) => {
                return Err(DbError::Data(format!(
                    "column '{}' has no value",
                    column.name
                )));
            }
            (ty, other) => {
                return Err(DbError::Schema(format!(
                    "type mismatch for column '{}': expected {ty}, got {other}",
                    column.name
                )));
            }
        }
    }
    Ok(buf)
}

/// Decode a row buffer against its schema.
///
/// Stops at the first column the buffer cannot satisfy and returns the
/// values decoded so far.
pub fn decode(columns: &[Column], bytes: &[u8]) -> Vec<Value> {
    let mut values = Vec::with_capacity(columns.len());
    let mut offset = 0;

    for column in columns {
        if offset + 2 > bytes.len() {
            break;
        }
        let len = u16::from_be_bytes(bytes[offset..offset + 2].try_into().unwrap()) as usize;
        let start = offset + 2;
        let end = start + len;
        if end > bytes.len() {
            break;
        }

        let field = &bytes[start..end];
        let value = match column.ty {
            SqlType::Integer => match <[u8; 4]>::try_from(field) {
                Ok(raw) => Value::Int(i32::from_be_bytes(raw)),
                Err(_) => break,
            },
            SqlType::Text => Value::Text(String::from_utf8_lossy(field).into_owned()),
        };
        values.push(value);
        offset = end;
    }
    values
}
