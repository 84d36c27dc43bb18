// src/lib.rs
//! # Runtime Bridge
//!
//! A cross-runtime interop bridge: asynchronous initialization of an
//! embedded guest-language runtime inside a host process, bidirectional
//! value marshaling across the runtime boundary, and exposure of host
//! callables to guest code (and vice versa) through capability-style
//! proxies.
//!
//! The guest interpreter itself is an external collaborator: the bridge
//! drives it through the [`GuestRuntime`] and [`RuntimeDistribution`]
//! traits and never interprets guest source text.
//!
//! ## Example
//!
//! ```rust
//! use runtime_bridge::{marshal, BoundaryValue};
//! use serde_json::json;
//!
//! let v = marshal::to_guest(&json!({"amount": 42, "tags": ["a", "b"]})).unwrap();
//! match &v {
//!     BoundaryValue::Map(fields) => assert_eq!(fields["amount"], BoundaryValue::Int(42)),
//!     _ => unreachable!(),
//! }
//!
//! // Plain data round-trips structurally unchanged.
//! assert_eq!(marshal::to_host(&v).unwrap(), json!({"amount": 42, "tags": ["a", "b"]}));
//! ```

pub mod bindings;
pub mod loader;
pub mod marshal;
pub mod proxy;
pub mod runtime;
pub mod session;
pub mod value;

use std::fmt;
use thiserror::Error;

pub use bindings::BindingTable;
pub use loader::{LoaderConfig, RuntimeLoader};
pub use marshal::MarshalError;
pub use proxy::{CallableProxy, HostError, HostFn};
pub use runtime::{
    GlobalScope, GuestError, GuestRuntime, ReadyState, RuntimeDistribution, RuntimeHandle,
};
pub use session::{ExecutionSession, ExecutionUnit};
pub use value::{BoundaryValue, OpaqueRef, ValueKind};

/// Which side of the boundary a value, callable, or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Host,
    Guest,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Host => write!(f, "host"),
            Side::Guest => write!(f, "guest"),
        }
    }
}

/// Errors surfaced by bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The runtime distribution or a preloaded package failed to load.
    /// Fatal to the handle, not to the process.
    #[error("initialization failed: {reason}")]
    Initialization { reason: String },

    /// Operation attempted against a handle outside its Ready lifetime.
    #[error("runtime is not ready (state: {state})")]
    NotReady { state: ReadyState },

    /// Guest code raised an uncaught exception. The scope keeps whatever
    /// bindings were committed before the raise; the caller decides
    /// whether to keep using it.
    #[error("guest execution failed: {message}")]
    GuestExecution {
        message: String,
        trace: Option<String>,
    },

    /// A cross-boundary call failed on the callee side.
    #[error("{origin}-side callee failed: {message}")]
    Callee { origin: Side, message: String },

    /// Use after `RuntimeHandle::close`, or after the handle failed or
    /// was dropped.
    #[error("runtime handle is closed")]
    HandleClosed,

    /// A binding name violated the non-empty name contract.
    #[error("invalid binding name: {name:?}")]
    InvalidName { name: String },
}
