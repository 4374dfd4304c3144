//! Response codec for askdb.
//!
//! The single boundary where native driver values become transport-safe JSON.
//! Every record sent over the wire passes through [`encode`]; the match is
//! exhaustive over the driver `Value` variant, so a new driver type cannot be
//! forgotten silently.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{json, Map, Number};

use crate::db::{ColumnInfo, Row, Value};

/// A transport-safe record: ordered column name to JSON value.
pub type Record = Map<String, serde_json::Value>;

/// Encodes one driver value as a transport-safe JSON value.
///
/// Temporal values become ISO-8601 strings, decimals become floats (accepted
/// precision loss), binary data becomes base64, unique identifiers become
/// their canonical string form. JSON-native scalars pass through unchanged,
/// so re-encoding an already-encoded value is a no-op.
pub fn encode(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => json!(s),
        Value::Bytes(b) => json!(BASE64.encode(b)),
        Value::Timestamp(ts) => json!(ts.to_rfc3339()),
        Value::Decimal(d) => d
            .to_f64()
            .and_then(Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::UniqueId(id) => json!(id.to_string()),
    }
}

/// Materializes one row into a record, encoding every value.
///
/// Columns and values are zipped positionally; a duplicate column name keeps
/// the last value, as a JSON object cannot hold both.
pub fn encode_record(columns: &[ColumnInfo], row: &Row) -> Record {
    columns
        .iter()
        .zip(row.iter())
        .map(|(col, value)| (col.name.clone(), encode(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use uuid::Uuid;

    #[test]
    fn test_encode_null() {
        assert_eq!(encode(&Value::Null), serde_json::Value::Null);
    }

    #[test]
    fn test_encode_json_native_values_pass_through() {
        assert_eq!(encode(&Value::Bool(true)), json!(true));
        assert_eq!(encode(&Value::Int(42)), json!(42));
        assert_eq!(encode(&Value::Float(2.5)), json!(2.5));
        assert_eq!(encode(&Value::Text("hello".into())), json!("hello"));
    }

    #[test]
    fn test_encoded_values_are_stable_through_the_json_layer() {
        // Running an already-encoded value through JSON serialization again
        // must change nothing: encoding is a fixed point of the transport
        // layer for every variant.
        for value in [
            Value::Null,
            Value::Bool(false),
            Value::Int(-7),
            Value::Float(1.25),
            Value::Text("x".into()),
            Value::Bytes(vec![0xde, 0xad]),
            Value::Timestamp(Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 45).unwrap()),
            Value::Decimal(Decimal::from_str("12.50").unwrap()),
            Value::UniqueId(Uuid::from_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap()),
        ] {
            let encoded = encode(&value);
            let reencoded: serde_json::Value =
                serde_json::from_str(&serde_json::to_string(&encoded).unwrap()).unwrap();
            assert_eq!(reencoded, encoded, "encoding of {value:?} is not stable");
        }
    }

    #[test]
    fn test_encode_timestamp_iso8601() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 45).unwrap();
        let encoded = encode(&Value::Timestamp(ts));

        assert_eq!(encoded, json!("2024-05-17T09:30:45+00:00"));

        // Round-trips with calendar/time fields intact
        let parsed = chrono::DateTime::parse_from_rfc3339(encoded.as_str().unwrap()).unwrap();
        assert_eq!(parsed.with_timezone(&Utc), ts);
    }

    #[test]
    fn test_encode_decimal_as_float() {
        let d = Decimal::from_str("12.50").unwrap();
        assert_eq!(encode(&Value::Decimal(d)), json!(12.5));
    }

    #[test]
    fn test_encode_bytes_as_base64() {
        let encoded = encode(&Value::Bytes(vec![0x68, 0x69]));
        assert_eq!(encoded, json!("aGk="));
    }

    #[test]
    fn test_encode_unique_id_as_canonical_string() {
        let id = Uuid::from_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(
            encode(&Value::UniqueId(id)),
            json!("67e55044-10b1-426f-9247-bb680e5fe0c8")
        );
    }

    #[test]
    fn test_encode_nan_float_as_null() {
        assert_eq!(encode(&Value::Float(f64::NAN)), serde_json::Value::Null);
    }

    #[test]
    fn test_encode_record() {
        let columns = vec![
            ColumnInfo::new("id", "integer"),
            ColumnInfo::new("name", "varchar"),
        ];
        let row = vec![Value::Int(1), Value::Text("Alice".into())];

        let record = encode_record(&columns, &row);

        assert_eq!(record.len(), 2);
        assert_eq!(record["id"], json!(1));
        assert_eq!(record["name"], json!("Alice"));
    }

    #[test]
    fn test_encode_record_preserves_column_order() {
        let columns = vec![
            ColumnInfo::new("z", "integer"),
            ColumnInfo::new("a", "integer"),
        ];
        let row = vec![Value::Int(1), Value::Int(2)];

        let record = encode_record(&columns, &row);
        let keys: Vec<&String> = record.keys().collect();

        assert_eq!(keys, vec!["z", "a"]);
    }
}
