// src/runtime/mod.rs
//! Runtime handle, global scope, and guest collaborator traits

pub mod handle;
pub(crate) mod lock;
pub mod scope;

pub use handle::{ReadyState, RuntimeHandle};
pub use scope::GlobalScope;

use crate::value::BoundaryValue;
use async_trait::async_trait;
use thiserror::Error;

/// An exception raised inside the guest runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct GuestError {
    pub message: String,
    /// Structured traceback, where the guest can produce one
    pub trace: Option<String>,
}

impl GuestError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: None,
        }
    }

    pub fn with_trace(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: Some(trace.into()),
        }
    }
}

impl From<crate::MarshalError> for GuestError {
    fn from(err: crate::MarshalError) -> Self {
        GuestError::new(err.message)
    }
}

/// The embedded guest interpreter, treated as a black box.
///
/// The bridge only needs "execute a source unit against a scope" and
/// "load an extension package"; what the source text means is entirely
/// the guest's business. Implementations whose code never suspends can
/// rely on the default `execute_async`.
#[async_trait]
pub trait GuestRuntime: Send + Sync {
    /// Version identifier of the guest runtime distribution
    fn version(&self) -> &str;

    /// Execute a source unit synchronously. Top-level bindings created
    /// by the unit must be written into `scope`.
    fn execute(&self, source: &str, scope: &GlobalScope) -> Result<BoundaryValue, GuestError>;

    /// Execute a source unit that may itself suspend (guest-side
    /// package loads, I/O).
    async fn execute_async(
        &self,
        source: &str,
        scope: &GlobalScope,
    ) -> Result<BoundaryValue, GuestError> {
        self.execute(source, scope)
    }

    /// Load one extension package into the runtime.
    async fn load_package(&self, name: &str) -> Result<(), GuestError>;
}

/// Source of guest runtime distributions (CDN, local path, ...)
#[async_trait]
pub trait RuntimeDistribution: Send + Sync {
    /// Fetch and instantiate the runtime found at `url`.
    async fn fetch(&self, url: &str) -> Result<Box<dyn GuestRuntime>, GuestError>;
}
