//! JSON message codec.
//!
//! Bodies are flat JSON objects: every field is a scalar. Nested objects
//! and arrays are rejected on encode so that any consumer can read a body
//! without knowing the producer's types.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

/// Encodes `value` as a flat JSON object.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, Error> {
    let value = serde_json::to_value(value)?;
    let Value::Object(fields) = &value else {
        return Err(Error::InvalidArgument(
            "message body must encode to a JSON object".into(),
        ));
    };

    if let Some((name, _)) = fields
        .iter()
        .find(|(_, field)| matches!(field, Value::Object(_) | Value::Array(_)))
    {
        return Err(Error::InvalidArgument(format!(
            "message body field `{name}` is not a scalar"
        )));
    }

    Ok(serde_json::to_string(&value)?)
}

pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    Ok(serde_json::from_str(body)?)
}
