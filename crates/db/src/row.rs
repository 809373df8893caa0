//! Result rows returned by [`run_query`](crate::ConnectionManager::run_query)

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::error::{DatabaseError, DatabaseResult};
use crate::value::DatabaseValue;

/// A decoded result row. Column names are shared by every row of one result.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<DatabaseValue>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<DatabaseValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn column_count(&self) -> usize {
        self.values.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn get_by_index(&self, index: usize) -> DatabaseResult<&DatabaseValue> {
        self.values
            .get(index)
            .ok_or_else(|| DatabaseError::ColumnNotFound(format!("#{}", index)))
    }

    pub fn get_by_name(&self, name: &str) -> DatabaseResult<&DatabaseValue> {
        self.columns
            .iter()
            .position(|column| column == name)
            .map(|index| &self.values[index])
            .ok_or_else(|| DatabaseError::ColumnNotFound(name.to_string()))
    }

    /// Get a typed value from a column
    pub fn get<T>(&self, column: &str) -> DatabaseResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let value = self.get_by_name(column)?;
        serde_json::from_value(value.to_json()).map_err(|e| DatabaseError::Decode {
            column: column.to_string(),
            message: e.to_string(),
        })
    }

    /// Like [`get`](Self::get), but NULL and missing columns become `None`
    pub fn try_get<T>(&self, column: &str) -> DatabaseResult<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        match self.get_by_name(column) {
            Ok(value) if value.is_null() => Ok(None),
            Ok(_) => self.get(column).map(Some),
            Err(DatabaseError::ColumnNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        let map = self
            .columns
            .iter()
            .zip(&self.values)
            .map(|(column, value)| (column.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        JsonValue::Object(map)
    }

    pub fn to_map(&self) -> HashMap<String, DatabaseValue> {
        self.columns
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }
}

/// Outcome of one statement: rows for reads, counters for writes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub rows_affected: u64,
    pub last_insert_id: Option<u64>,
}

impl QueryResult {
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as a JSON array of objects
    pub fn rows_json(&self) -> JsonValue {
        JsonValue::Array(self.rows.iter().map(Row::to_json).collect())
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::json!({
            "rows": self.rows_json(),
            "rows_affected": self.rows_affected,
            "last_insert_id": self.last_insert_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn customer_row() -> Row {
        let columns: Arc<[String]> = vec![
            "id".to_string(),
            "name".to_string(),
            "delivery".to_string(),
            "status".to_string(),
        ]
        .into();
        Row::new(
            columns,
            vec![
                DatabaseValue::UInt64(5),
                DatabaseValue::String("Acme Hardware".to_string()),
                DatabaseValue::Json(json!({ "street": "1 Main St", "city": "Leeds" })),
                DatabaseValue::Null,
            ],
        )
    }

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Delivery {
        street: String,
        city: String,
    }

    #[test]
    fn test_typed_access() {
        let row = customer_row();
        assert_eq!(row.get::<u64>("id").unwrap(), 5);
        assert_eq!(row.get::<String>("name").unwrap(), "Acme Hardware");

        let delivery: Delivery = row.get("delivery").unwrap();
        assert_eq!(delivery.city, "Leeds");
    }

    #[test]
    fn test_try_get_null_and_missing() {
        let row = customer_row();
        assert_eq!(row.try_get::<String>("status").unwrap(), None);
        assert_eq!(row.try_get::<String>("email").unwrap(), None);
        assert!(matches!(
            row.get::<String>("email"),
            Err(DatabaseError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_decode_error_names_column() {
        let row = customer_row();
        match row.get::<u64>("name") {
            Err(DatabaseError::Decode { column, .. }) => assert_eq!(column, "name"),
            other => panic!("Expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_row_json() {
        let row = customer_row();
        assert_eq!(
            row.to_json(),
            json!({
                "id": 5,
                "name": "Acme Hardware",
                "delivery": { "street": "1 Main St", "city": "Leeds" },
                "status": null,
            })
        );
        assert_eq!(row.to_map().len(), 4);
    }

    #[test]
    fn test_query_result_json() {
        let result = QueryResult {
            rows: vec![customer_row()],
            rows_affected: 0,
            last_insert_id: None,
        };
        let json = result.to_json();
        assert_eq!(json["rows"][0]["name"], "Acme Hardware");
        assert_eq!(json["last_insert_id"], JsonValue::Null);

        let insert = QueryResult {
            rows: Vec::new(),
            rows_affected: 1,
            last_insert_id: Some(42),
        };
        assert!(insert.is_empty());
        assert_eq!(insert.to_json()["last_insert_id"], 42);
    }
}
