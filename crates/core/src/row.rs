use rusqlite::types::ValueRef;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// A single SQL value decoded from the storage engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(r) => SqlValue::Real(r),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SqlValue::Null => serializer.serialize_unit(),
            SqlValue::Integer(i) => serializer.serialize_i64(*i),
            SqlValue::Real(r) => serializer.serialize_f64(*r),
            SqlValue::Text(t) => serializer.serialize_str(t),
            SqlValue::Blob(b) => serializer.collect_seq(b.iter()),
        }
    }
}

/// One materialized result row: an ordered list of (column, value) pairs.
///
/// Serializes as a JSON object that preserves the statement's column order.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new(columns: Vec<(String, SqlValue)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_preserves_column_order() {
        let row = Row::new(vec![
            ("z".to_string(), SqlValue::Integer(1)),
            ("a".to_string(), SqlValue::Text("x".to_string())),
        ]);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"z":1,"a":"x"}"#);
    }

    #[test]
    fn test_value_variants_serialize() {
        let row = Row::new(vec![
            ("n".to_string(), SqlValue::Null),
            ("i".to_string(), SqlValue::Integer(-7)),
            ("r".to_string(), SqlValue::Real(1.5)),
            ("b".to_string(), SqlValue::Blob(vec![1, 2])),
        ]);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"n":null,"i":-7,"r":1.5,"b":[1,2]}"#);
    }

    #[test]
    fn test_row_get() {
        let row = Row::new(vec![("id".to_string(), SqlValue::Integer(42))]);
        assert_eq!(row.get("id"), Some(&SqlValue::Integer(42)));
        assert_eq!(row.get("missing"), None);
    }
}
