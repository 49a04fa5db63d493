//! RPC wire messages.
//!
//! Requests are `{id, service, method, args}`; responses carry the same
//! id with either `value` or `error`.

use crate::error::{RpcError, RpcResult};
use statebus_state::Value;

/// One outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    /// Correlation id, unique per client.
    pub id: u64,
    /// The registered service name.
    pub service: String,
    /// The method on that service.
    pub method: String,
    /// Call arguments.
    pub args: Value,
}

impl RpcRequest {
    /// Encodes to a wire value.
    pub fn to_value(&self) -> Value {
        Value::map(vec![
            ("id", Value::from(self.id)),
            ("service", Value::from(self.service.as_str())),
            ("method", Value::from(self.method.as_str())),
            ("args", self.args.clone()),
        ])
    }

    /// Decodes from a wire value.
    pub fn from_value(value: &Value) -> RpcResult<Self> {
        let id = request_id(value)?;
        let service = text_field(value, "service")?;
        let method = text_field(value, "method")?;
        let args = value.get("args").cloned().unwrap_or(Value::Null);
        Ok(Self {
            id,
            service,
            method,
            args,
        })
    }
}

/// The answer to one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    /// The id of the request being answered.
    pub id: u64,
    /// The outcome; errors carry only the client-visible message.
    pub result: Result<Value, String>,
}

impl RpcResponse {
    /// Encodes to a wire value.
    pub fn to_value(&self) -> Value {
        match &self.result {
            Ok(value) => Value::map(vec![("id", Value::from(self.id)), ("value", value.clone())]),
            Err(message) => Value::map(vec![
                ("id", Value::from(self.id)),
                ("error", Value::from(message.as_str())),
            ]),
        }
    }

    /// Decodes from a wire value.
    pub fn from_value(value: &Value) -> RpcResult<Self> {
        let id = request_id(value)?;
        if let Some(error) = value.get("error").and_then(Value::as_text) {
            return Ok(Self {
                id,
                result: Err(error.to_string()),
            });
        }
        let result = value
            .get("value")
            .cloned()
            .ok_or_else(|| RpcError::malformed("response missing value and error"))?;
        Ok(Self {
            id,
            result: Ok(result),
        })
    }
}

fn request_id(value: &Value) -> RpcResult<u64> {
    value
        .get("id")
        .and_then(Value::as_integer)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| RpcError::malformed("missing or invalid id"))
}

fn text_field(value: &Value, field: &str) -> RpcResult<String> {
    value
        .get(field)
        .and_then(Value::as_text)
        .map(str::to_string)
        .ok_or_else(|| RpcError::malformed(format!("missing field {field}")))
}
