// src/value.rs
//! Boundary value type shared by host and guest code
//!
//! Every value that crosses the runtime boundary is expressed as a
//! [`BoundaryValue`]. Plain data (primitives and containers) crosses by
//! structural copy; callables cross as [`CallableProxy`] and arbitrary
//! objects cross by live reference as [`OpaqueRef`].

use crate::proxy::CallableProxy;
use crate::Side;
use ahash::HashMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Dynamic value crossing the host/guest boundary
#[derive(Debug, Clone)]
pub enum BoundaryValue {
    Null,
    Bool(bool),
    /// Signed 64-bit integer. Guests with arbitrary-precision integers
    /// must reject values outside the `i64` range at the boundary with a
    /// marshal error; silent truncation is never allowed.
    Int(i64),
    Float(f64),
    Str(String),
    /// Ordered sequence, marshaled by deep structural copy.
    List(Vec<BoundaryValue>),
    /// String-keyed mapping, marshaled by deep structural copy.
    Map(HashMap<String, BoundaryValue>),
    /// A callable owned by one side, invocable from the other.
    Callable(CallableProxy),
    /// A live object reference that crosses without copying.
    Opaque(OpaqueRef),
}

/// The four-way grouping of the value space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Primitive,
    Container,
    Callable,
    Opaque,
}

impl BoundaryValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            BoundaryValue::Null
            | BoundaryValue::Bool(_)
            | BoundaryValue::Int(_)
            | BoundaryValue::Float(_)
            | BoundaryValue::Str(_) => ValueKind::Primitive,
            BoundaryValue::List(_) | BoundaryValue::Map(_) => ValueKind::Container,
            BoundaryValue::Callable(_) => ValueKind::Callable,
            BoundaryValue::Opaque(_) => ValueKind::Opaque,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, BoundaryValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BoundaryValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            BoundaryValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            BoundaryValue::Float(f) => Some(*f),
            BoundaryValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            BoundaryValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[BoundaryValue]> {
        match self {
            BoundaryValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, BoundaryValue>> {
        match self {
            BoundaryValue::Map(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&CallableProxy> {
        match self {
            BoundaryValue::Callable(proxy) => Some(proxy),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&OpaqueRef> {
        match self {
            BoundaryValue::Opaque(obj) => Some(obj),
            _ => None,
        }
    }
}

impl PartialEq for BoundaryValue {
    /// Structural equality for plain data; identity for callables and
    /// opaque references. Round-tripped proxies are behaviorally
    /// equivalent, not equal.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (BoundaryValue::Null, BoundaryValue::Null) => true,
            (BoundaryValue::Bool(a), BoundaryValue::Bool(b)) => a == b,
            (BoundaryValue::Int(a), BoundaryValue::Int(b)) => a == b,
            (BoundaryValue::Float(a), BoundaryValue::Float(b)) => a == b,
            (BoundaryValue::Str(a), BoundaryValue::Str(b)) => a == b,
            (BoundaryValue::List(a), BoundaryValue::List(b)) => a == b,
            (BoundaryValue::Map(a), BoundaryValue::Map(b)) => a == b,
            (BoundaryValue::Callable(a), BoundaryValue::Callable(b)) => a.same_target(b),
            (BoundaryValue::Opaque(a), BoundaryValue::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for BoundaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryValue::Null => write!(f, "null"),
            BoundaryValue::Bool(b) => write!(f, "{}", b),
            BoundaryValue::Int(n) => write!(f, "{}", n),
            BoundaryValue::Float(x) => write!(f, "{}", x),
            BoundaryValue::Str(s) => write!(f, "\"{}\"", s),
            BoundaryValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            BoundaryValue::Map(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\": {}", k, v)?;
                }
                write!(f, "}}")
            }
            BoundaryValue::Callable(proxy) => write!(f, "<{} callable>", proxy.origin()),
            BoundaryValue::Opaque(obj) => write!(f, "<{} object>", obj.origin()),
        }
    }
}

/// A live reference to a host or guest object, marshaled without copying
///
/// This is the pass-through case: cloning an `OpaqueRef` clones the
/// reference, never the object behind it.
#[derive(Clone)]
pub struct OpaqueRef {
    origin: Side,
    object: Arc<dyn Any + Send + Sync>,
}

impl OpaqueRef {
    pub fn new(origin: Side, object: Arc<dyn Any + Send + Sync>) -> Self {
        Self { origin, object }
    }

    pub fn origin(&self) -> Side {
        self.origin
    }

    /// Recover the concrete object, if it is a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.object).downcast::<T>().ok()
    }
}

impl PartialEq for OpaqueRef {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin && Arc::ptr_eq(&self.object, &other.object)
    }
}

impl fmt::Debug for OpaqueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueRef")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

// Convenient conversions
impl From<bool> for BoundaryValue {
    fn from(b: bool) -> Self {
        BoundaryValue::Bool(b)
    }
}

impl From<i32> for BoundaryValue {
    fn from(n: i32) -> Self {
        BoundaryValue::Int(n as i64)
    }
}

impl From<i64> for BoundaryValue {
    fn from(n: i64) -> Self {
        BoundaryValue::Int(n)
    }
}

impl From<f64> for BoundaryValue {
    fn from(x: f64) -> Self {
        BoundaryValue::Float(x)
    }
}

impl From<String> for BoundaryValue {
    fn from(s: String) -> Self {
        BoundaryValue::Str(s)
    }
}

impl From<&str> for BoundaryValue {
    fn from(s: &str) -> Self {
        BoundaryValue::Str(s.to_string())
    }
}

impl From<CallableProxy> for BoundaryValue {
    fn from(proxy: CallableProxy) -> Self {
        BoundaryValue::Callable(proxy)
    }
}

impl From<OpaqueRef> for BoundaryValue {
    fn from(obj: OpaqueRef) -> Self {
        BoundaryValue::Opaque(obj)
    }
}

impl<T: Into<BoundaryValue>> From<Vec<T>> for BoundaryValue {
    fn from(items: Vec<T>) -> Self {
        BoundaryValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<BoundaryValue>> From<Option<T>> for BoundaryValue {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => BoundaryValue::Null,
        }
    }
}
