use std::fmt;

/// Column types supported by the engine.
///
/// Serialized names match the catalog's on-disk format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SqlType {
    #[serde(rename = "INTEGER")]
    Integer,
    #[serde(rename = "TEXT")]
    Text,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Integer => write!(f, "INTEGER"),
            SqlType::Text => write!(f, "TEXT"),
        }
    }
}

/// A single column value.
///
/// `Null` is a marker only: it can appear in a `Command` (an omitted or
/// explicitly-NULL value, e.g. to request an auto-assigned primary key) but is
/// never storable; the row codec rejects it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int(i32),
    Text(String),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the type this value inhabits, or `None` for the null marker.
    pub fn sql_type(&self) -> Option<SqlType> {
        match self {
            Value::Int(_) => Some(SqlType::Integer),
            Value::Text(_) => Some(SqlType::Text),
            Value::Null => None,
        }
    }

    /// Returns true if this value can be stored in a column of `ty`.
    pub fn matches(&self, ty: SqlType) -> bool {
        self.sql_type() == Some(ty)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Null => write!(f, "NULL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_of_value() {
        assert_eq!(Value::Int(1).sql_type(), Some(SqlType::Integer));
        assert_eq!(Value::Text("a".into()).sql_type(), Some(SqlType::Text));
        assert_eq!(Value::Null.sql_type(), None);
    }

    #[test]
    fn matches_is_strict() {
        assert!(Value::Int(1).matches(SqlType::Integer));
        assert!(!Value::Int(1).matches(SqlType::Text));
        assert!(!Value::Text("1".into()).matches(SqlType::Integer));
        // The null marker matches no column type.
        assert!(!Value::Null.matches(SqlType::Integer));
        assert!(!Value::Null.matches(SqlType::Text));
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::Int(-42).as_int(), Some(-42));
        assert_eq!(Value::Text("x".into()).as_int(), None);
        assert_eq!(Value::Text("x".into()).as_text(), Some("x"));
        assert!(Value::Null.is_null());
    }

    #[test]
    fn sql_type_serde_names() {
        assert_eq!(
            serde_json::to_string(&SqlType::Integer).unwrap(),
            "\"INTEGER\""
        );
        assert_eq!(
            serde_json::from_str::<SqlType>("\"TEXT\"").unwrap(),
            SqlType::Text
        );
    }
}
