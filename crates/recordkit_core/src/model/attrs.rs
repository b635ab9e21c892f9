//! Attribute bag primitives.

use crate::model::error::RecordError;
use serde::Serialize;
use std::collections::BTreeMap;

/// Arbitrary serializable attribute value.
pub type AttrValue = serde_json::Value;

/// Attribute name to value mapping.
///
/// Semantically unordered; `BTreeMap` keeps snapshots and event order
/// deterministic.
pub type Attributes = BTreeMap<String, AttrValue>;

/// Checks that `name` is usable as an attribute key.
///
/// Names are case-sensitive and are not normalized; only the empty name is
/// rejected.
pub fn validate_attribute_name(name: &str) -> Result<(), RecordError> {
    if name.is_empty() {
        return Err(RecordError::InvalidAttributeName(name.to_string()));
    }
    Ok(())
}

/// Converts a JSON object into validated attributes.
///
/// # Errors
/// - `ExpectedObject` when `value` is not an object.
/// - `InvalidAttributeName` when any key is empty.
pub fn attributes_from_json(value: AttrValue) -> Result<Attributes, RecordError> {
    let AttrValue::Object(map) = value else {
        return Err(RecordError::ExpectedObject(json_kind(&value)));
    };
    let attributes: Attributes = map.into_iter().collect();
    for name in attributes.keys() {
        validate_attribute_name(name)?;
    }
    Ok(attributes)
}

/// Converts any serializable struct or map into validated attributes.
pub fn attributes_from_serializable<T>(value: &T) -> Result<Attributes, RecordError>
where
    T: Serialize + ?Sized,
{
    let json =
        serde_json::to_value(value).map_err(|err| RecordError::Serialization(err.to_string()))?;
    attributes_from_json(json)
}

/// Short JSON type label used in error messages.
pub fn json_kind(value: &AttrValue) -> &'static str {
    match value {
        AttrValue::Null => "null",
        AttrValue::Bool(_) => "bool",
        AttrValue::Number(_) => "number",
        AttrValue::String(_) => "string",
        AttrValue::Array(_) => "array",
        AttrValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::{attributes_from_json, attributes_from_serializable, validate_attribute_name};
    use crate::model::error::RecordError;
    use serde::Serialize;
    use serde_json::json;

    #[test]
    fn rejects_only_empty_names() {
        assert_eq!(
            validate_attribute_name("").expect_err("empty name must fail"),
            RecordError::InvalidAttributeName(String::new())
        );
        validate_attribute_name("  ").expect("whitespace is a valid name");
        validate_attribute_name("Title").expect("case is preserved, not rejected");
    }

    #[test]
    fn object_becomes_attributes() {
        let attrs = attributes_from_json(json!({"title": "x", "completed": true}))
            .expect("object should convert");
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["completed"], json!(true));
    }

    #[test]
    fn non_object_is_rejected() {
        let err = attributes_from_json(json!([1, 2])).expect_err("array must fail");
        assert_eq!(err, RecordError::ExpectedObject("array"));
    }

    #[test]
    fn serializable_struct_becomes_attributes() {
        #[derive(Serialize)]
        struct Draft {
            title: &'static str,
            priority: u8,
        }

        let attrs = attributes_from_serializable(&Draft {
            title: "ship",
            priority: 2,
        })
        .expect("struct should convert");
        assert_eq!(attrs["title"], json!("ship"));
        assert_eq!(attrs["priority"], json!(2));
    }
}
