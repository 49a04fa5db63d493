//! CBOR encoding and decoding for state values.
//!
//! Values travel the wire as CBOR. Map keys must be text strings; anything
//! else fails decoding rather than being coerced.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use ciborium::value::Value as Cbor;
use std::collections::BTreeMap;

/// Encodes a value to CBOR bytes.
pub fn to_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let cbor = to_cbor_value(value);
    let mut bytes = Vec::new();
    ciborium::into_writer(&cbor, &mut bytes).map_err(|e| CodecError::InvalidCbor(e.to_string()))?;
    Ok(bytes)
}

/// Decodes a value from CBOR bytes.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let cbor: Cbor =
        ciborium::from_reader(bytes).map_err(|e| CodecError::InvalidCbor(e.to_string()))?;
    from_cbor_value(cbor)
}

fn to_cbor_value(value: &Value) -> Cbor {
    match value {
        Value::Null => Cbor::Null,
        Value::Bool(b) => Cbor::Bool(*b),
        Value::Integer(n) => Cbor::Integer((*n).into()),
        Value::Float(f) => Cbor::Float(*f),
        Value::Text(s) => Cbor::Text(s.clone()),
        Value::Array(items) => Cbor::Array(items.iter().map(to_cbor_value).collect()),
        Value::Map(entries) => Cbor::Map(
            entries
                .iter()
                .map(|(k, v)| (Cbor::Text(k.clone()), to_cbor_value(v)))
                .collect(),
        ),
    }
}

fn from_cbor_value(cbor: Cbor) -> CodecResult<Value> {
    match cbor {
        Cbor::Null => Ok(Value::Null),
        Cbor::Bool(b) => Ok(Value::Bool(b)),
        Cbor::Integer(n) => {
            let n = i64::try_from(n).map_err(|_| CodecError::IntegerOutOfRange)?;
            Ok(Value::Integer(n))
        }
        Cbor::Float(f) => Ok(Value::Float(f)),
        Cbor::Text(s) => Ok(Value::Text(s)),
        Cbor::Array(items) => {
            let items: CodecResult<Vec<Value>> = items.into_iter().map(from_cbor_value).collect();
            Ok(Value::Array(items?))
        }
        Cbor::Map(entries) => {
            let mut map = BTreeMap::new();
            for (key, value) in entries {
                let Cbor::Text(key) = key else {
                    return Err(CodecError::NonTextKey);
                };
                map.insert(key, from_cbor_value(value)?);
            }
            Ok(Value::Map(map))
        }
        Cbor::Bytes(_) | Cbor::Tag(..) => Err(CodecError::invalid_structure(
            "unsupported CBOR type in state value",
        )),
        _ => Err(CodecError::invalid_structure("unsupported CBOR type")),
    }
}
