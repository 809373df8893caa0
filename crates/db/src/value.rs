//! Scalar values for parameter binding and column decoding

use serde_json::Value as JsonValue;

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    DateTime(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    Json(JsonValue),
}

impl DatabaseValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            DatabaseValue::Null => JsonValue::Null,
            DatabaseValue::Bool(b) => JsonValue::Bool(*b),
            DatabaseValue::Int64(i) => JsonValue::from(*i),
            DatabaseValue::UInt64(u) => JsonValue::from(*u),
            DatabaseValue::Float64(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::String(s) => JsonValue::String(s.clone()),
            DatabaseValue::Bytes(b) => match std::str::from_utf8(b) {
                Ok(text) => JsonValue::String(text.to_string()),
                Err(_) => JsonValue::Array(b.iter().map(|&x| JsonValue::from(x)).collect()),
            },
            DatabaseValue::Uuid(u) => JsonValue::String(u.to_string()),
            DatabaseValue::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            DatabaseValue::Date(d) => JsonValue::String(d.to_string()),
            DatabaseValue::Time(t) => JsonValue::String(t.to_string()),
            DatabaseValue::Json(j) => j.clone(),
        }
    }

    /// Create a value from JSON. Arrays and objects become `Json`.
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => DatabaseValue::Null,
            JsonValue::Bool(b) => DatabaseValue::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    DatabaseValue::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    DatabaseValue::UInt64(u)
                } else {
                    n.as_f64()
                        .map(DatabaseValue::Float64)
                        .unwrap_or(DatabaseValue::Null)
                }
            }
            JsonValue::String(s) => DatabaseValue::String(s),
            other => DatabaseValue::Json(other),
        }
    }

    /// Infer a value from a command-line argument
    pub fn parse_cli_arg(arg: &str) -> Self {
        if arg.eq_ignore_ascii_case("null") {
            return DatabaseValue::Null;
        }
        if let Ok(b) = arg.parse::<bool>() {
            return DatabaseValue::Bool(b);
        }
        if let Ok(i) = arg.parse::<i64>() {
            return DatabaseValue::Int64(i);
        }
        if let Ok(u) = arg.parse::<u64>() {
            return DatabaseValue::UInt64(u);
        }
        match arg.parse::<f64>() {
            Ok(f) if f.is_finite() => DatabaseValue::Float64(f),
            _ => DatabaseValue::String(arg.to_string()),
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int64(value.into())
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<u32> for DatabaseValue {
    fn from(value: u32) -> Self {
        DatabaseValue::UInt64(value.into())
    }
}

impl From<u64> for DatabaseValue {
    fn from(value: u64) -> Self {
        DatabaseValue::UInt64(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(value: Vec<u8>) -> Self {
        DatabaseValue::Bytes(value)
    }
}

impl From<uuid::Uuid> for DatabaseValue {
    fn from(value: uuid::Uuid) -> Self {
        DatabaseValue::Uuid(value)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for DatabaseValue {
    fn from(value: chrono::DateTime<chrono::Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl From<chrono::NaiveDate> for DatabaseValue {
    fn from(value: chrono::NaiveDate) -> Self {
        DatabaseValue::Date(value)
    }
}

impl From<chrono::NaiveTime> for DatabaseValue {
    fn from(value: chrono::NaiveTime) -> Self {
        DatabaseValue::Time(value)
    }
}

impl From<JsonValue> for DatabaseValue {
    fn from(value: JsonValue) -> Self {
        DatabaseValue::Json(value)
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_cli_arg() {
        assert_eq!(DatabaseValue::parse_cli_arg("5"), DatabaseValue::Int64(5));
        assert_eq!(DatabaseValue::parse_cli_arg("-12"), DatabaseValue::Int64(-12));
        assert_eq!(
            DatabaseValue::parse_cli_arg("18446744073709551615"),
            DatabaseValue::UInt64(u64::MAX)
        );
        assert_eq!(DatabaseValue::parse_cli_arg("19.99"), DatabaseValue::Float64(19.99));
        assert_eq!(DatabaseValue::parse_cli_arg("NULL"), DatabaseValue::Null);
        assert_eq!(DatabaseValue::parse_cli_arg("true"), DatabaseValue::Bool(true));
        assert_eq!(
            DatabaseValue::parse_cli_arg("INV-0042"),
            DatabaseValue::String("INV-0042".to_string())
        );
        // "inf" parses as f64 but is not a usable SQL literal
        assert_eq!(
            DatabaseValue::parse_cli_arg("inf"),
            DatabaseValue::String("inf".to_string())
        );
    }

    #[test]
    fn test_to_json() {
        assert_eq!(DatabaseValue::Int64(7).to_json(), json!(7));
        assert_eq!(DatabaseValue::UInt64(7).to_json(), json!(7));
        assert_eq!(DatabaseValue::Null.to_json(), JsonValue::Null);
        assert_eq!(DatabaseValue::Float64(f64::NAN).to_json(), JsonValue::Null);
        assert_eq!(DatabaseValue::Bytes(b"abc".to_vec()).to_json(), json!("abc"));
        assert_eq!(DatabaseValue::Bytes(vec![0xff, 0x00]).to_json(), json!([255, 0]));

        let items = json!([{ "sku": "A-1", "qty": 2 }]);
        assert_eq!(DatabaseValue::Json(items.clone()).to_json(), items);
    }

    #[test]
    fn test_from_json() {
        assert_eq!(DatabaseValue::from_json(json!(3)), DatabaseValue::Int64(3));
        assert_eq!(DatabaseValue::from_json(json!(1.5)), DatabaseValue::Float64(1.5));
        assert_eq!(
            DatabaseValue::from_json(json!("active")),
            DatabaseValue::String("active".to_string())
        );
        assert!(matches!(
            DatabaseValue::from_json(json!({ "currency": "EUR" })),
            DatabaseValue::Json(_)
        ));
    }

    #[test]
    fn test_option_conversion() {
        let missing: Option<i64> = None;
        assert!(DatabaseValue::from(missing).is_null());
        assert_eq!(DatabaseValue::from(Some("x")), DatabaseValue::String("x".to_string()));
    }
}
