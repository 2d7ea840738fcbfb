//! Conversion between JSON documents and DynamoDB attribute values.
//!
//! Numbers cross as their literal text (`N`), so nothing passes through a
//! float. String and number sets read back as JSON arrays. Binary attributes
//! have no JSON form and are reported as malformed.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Map, Number, Value};

use crate::error::ServiceError;

pub fn to_attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attribute_value).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute_value(v)))
                .collect(),
        ),
    }
}

/// Convert a JSON object into an item map.
pub fn to_item(value: &Value) -> Result<HashMap<String, AttributeValue>, ServiceError> {
    match value {
        Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), to_attribute_value(v)))
            .collect()),
        other => Err(ServiceError::validation(format!(
            "expected a map of attributes, got {other}"
        ))),
    }
}

fn parse_number(text: &str) -> Result<Value, ServiceError> {
    serde_json::from_str::<Number>(text)
        .map(Value::Number)
        .map_err(|_| ServiceError::malformed_item(format!("invalid number attribute '{text}'")))
}

pub fn from_attribute_value(attr: &AttributeValue) -> Result<Value, ServiceError> {
    Ok(match attr {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::N(text) => parse_number(text)?,
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::Ss(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(items) => Value::Array(
            items
                .iter()
                .map(|t| parse_number(t))
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::L(items) => Value::Array(
            items
                .iter()
                .map(from_attribute_value)
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::M(map) => from_item(map)?,
        AttributeValue::B(_) | AttributeValue::Bs(_) => {
            return Err(ServiceError::malformed_item(
                "binary attributes are not supported",
            ));
        }
        _ => {
            return Err(ServiceError::malformed_item(
                "unknown attribute value type",
            ));
        }
    })
}

pub fn from_item(item: &HashMap<String, AttributeValue>) -> Result<Value, ServiceError> {
    let mut map = Map::new();
    for (k, v) in item {
        map.insert(k.clone(), from_attribute_value(v)?);
    }
    Ok(Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::primitives::Blob;

    #[test]
    fn test_movie_round_trip_keeps_number_text() {
        let doc: Value = serde_json::from_str(
            r#"{"year": 2013, "title": "Rush", "info": {"rating": 8.30, "actors": ["A"], "rank": null, "flag": true}}"#,
        )
        .unwrap();
        let item = to_item(&doc).unwrap();
        assert_eq!(item["year"], AttributeValue::N("2013".to_string()));
        match &item["info"] {
            AttributeValue::M(info) => {
                assert_eq!(info["rating"], AttributeValue::N("8.30".to_string()));
                assert_eq!(info["rank"], AttributeValue::Null(true));
            }
            other => panic!("expected map, got {other:?}"),
        }

        let back = from_item(&item).unwrap();
        assert_eq!(back["info"]["rating"].to_string(), "8.30");
        assert_eq!(back["title"], "Rush");
        assert_eq!(back["info"]["flag"], true);
    }

    #[test]
    fn test_sets_read_as_arrays() {
        let ss = AttributeValue::Ss(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(from_attribute_value(&ss).unwrap(), serde_json::json!(["a", "b"]));
        let ns = AttributeValue::Ns(vec!["1.50".to_string()]);
        assert_eq!(from_attribute_value(&ns).unwrap()[0].to_string(), "1.50");
    }

    #[test]
    fn test_binary_is_malformed() {
        let err = from_attribute_value(&AttributeValue::B(Blob::new(vec![1, 2]))).unwrap_err();
        assert_eq!(err.code, ServiceError::MALFORMED_ITEM);
    }

    #[test]
    fn test_bad_number_is_malformed() {
        let err = from_attribute_value(&AttributeValue::N("abc".to_string())).unwrap_err();
        assert_eq!(err.code, ServiceError::MALFORMED_ITEM);
    }

    #[test]
    fn test_non_object_item_rejected() {
        assert!(to_item(&serde_json::json!([1, 2])).is_err());
    }
}
