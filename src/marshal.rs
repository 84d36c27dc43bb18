// src/marshal.rs
//! Value marshaling between host plain data and boundary values
//!
//! Plain data (JSON-shaped values) is marshaled by deep structural copy
//! in both directions; [`pass_through`] marshals an object by live
//! reference instead, mirroring the object-view pattern of embedded
//! runtimes. For all plain data `x`, `to_host(to_guest(x)) == x`.

use crate::value::{BoundaryValue, OpaqueRef};
use crate::Side;
use ahash::HashMap;
use serde_json::{Map as JsonMap, Number, Value as JsonValue};
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

/// A value could not be converted across the boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("marshal error: {message}")]
pub struct MarshalError {
    pub message: String,
}

impl MarshalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Marshal host plain data into a guest-visible boundary value.
///
/// Deep structural copy; the result shares no storage with the input.
/// Unsigned integers above `i64::MAX` are rejected rather than
/// truncated (the documented narrowing rule for `BoundaryValue::Int`).
pub fn to_guest(value: &JsonValue) -> Result<BoundaryValue, MarshalError> {
    match value {
        JsonValue::Null => Ok(BoundaryValue::Null),
        JsonValue::Bool(b) => Ok(BoundaryValue::Bool(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(BoundaryValue::Int(i))
            } else if n.is_u64() {
                Err(MarshalError::new(format!(
                    "integer {} exceeds the i64 boundary range",
                    n
                )))
            } else {
                // serde_json numbers are i64, u64, or finite f64
                Ok(BoundaryValue::Float(n.as_f64().unwrap_or_default()))
            }
        }
        JsonValue::String(s) => Ok(BoundaryValue::Str(s.clone())),
        JsonValue::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(to_guest(item)?);
            }
            Ok(BoundaryValue::List(out))
        }
        JsonValue::Object(fields) => {
            let mut out = HashMap::default();
            for (k, v) in fields {
                out.insert(k.clone(), to_guest(v)?);
            }
            Ok(BoundaryValue::Map(out))
        }
    }
}

/// Marshal a boundary value back into host plain data.
///
/// Inverse of [`to_guest`] for primitives and containers. Callables and
/// opaque references are not plain data: host code keeps the
/// [`BoundaryValue`] itself and goes through the proxy, so asking for a
/// plain-data copy of one is an error.
pub fn to_host(value: &BoundaryValue) -> Result<JsonValue, MarshalError> {
    match value {
        BoundaryValue::Null => Ok(JsonValue::Null),
        BoundaryValue::Bool(b) => Ok(JsonValue::Bool(*b)),
        BoundaryValue::Int(n) => Ok(JsonValue::Number(Number::from(*n))),
        BoundaryValue::Float(x) => Number::from_f64(*x)
            .map(JsonValue::Number)
            .ok_or_else(|| MarshalError::new(format!("float {} has no plain-data form", x))),
        BoundaryValue::Str(s) => Ok(JsonValue::String(s.clone())),
        BoundaryValue::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(to_host(item)?);
            }
            Ok(JsonValue::Array(out))
        }
        BoundaryValue::Map(fields) => {
            let mut out = JsonMap::new();
            for (k, v) in fields {
                out.insert(k.clone(), to_host(v)?);
            }
            Ok(JsonValue::Object(out))
        }
        BoundaryValue::Callable(proxy) => Err(MarshalError::new(format!(
            "{} callable crosses by proxy, not by copy",
            proxy.origin()
        ))),
        BoundaryValue::Opaque(obj) => Err(MarshalError::new(format!(
            "{} object crosses by reference, not by copy",
            obj.origin()
        ))),
    }
}

/// Marshal an object by live reference instead of by copy.
///
/// The returned value is a view: both sides observe mutations of the
/// underlying object, and cycles inside it are never traversed.
pub fn pass_through(origin: Side, object: Arc<dyn Any + Send + Sync>) -> BoundaryValue {
    BoundaryValue::Opaque(OpaqueRef::new(origin, object))
}
