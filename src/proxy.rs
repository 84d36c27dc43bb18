// src/proxy.rs
//! Callable proxies across the runtime boundary
//!
//! A [`CallableProxy`] wraps a callable owned by one side so the other
//! side can invoke it. Every invocation runs under the handle's
//! reentrant execution lock, and callee failures come back tagged with
//! the side they originated on. Proxies are valid exactly as long as
//! their handle is Ready.

use crate::runtime::handle::HandleShared;
use crate::runtime::ReadyState;
use crate::value::BoundaryValue;
use crate::{BridgeError, RuntimeHandle, Side};
use std::fmt;
use std::sync::{Arc, Weak};
use thiserror::Error;
use tracing::trace;

/// A failure raised by the wrapped callable itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HostError {
    pub message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<crate::MarshalError> for HostError {
    fn from(err: crate::MarshalError) -> Self {
        HostError::new(err.message)
    }
}

impl From<crate::runtime::GuestError> for HostError {
    fn from(err: crate::runtime::GuestError) -> Self {
        HostError::new(err.message)
    }
}

/// A callable exposed across the boundary.
///
/// Argument and return values are [`BoundaryValue`]s; plain data crosses
/// by copy, opaque references by reference.
pub trait HostFn: Send + Sync + 'static {
    fn call(&self, args: &[BoundaryValue]) -> Result<BoundaryValue, HostError>;
}

impl<F> HostFn for F
where
    F: Fn(&[BoundaryValue]) -> Result<BoundaryValue, HostError> + Send + Sync + 'static,
{
    fn call(&self, args: &[BoundaryValue]) -> Result<BoundaryValue, HostError> {
        self(args)
    }
}

type ProxyFn = Arc<dyn Fn(&[BoundaryValue]) -> Result<BoundaryValue, HostError> + Send + Sync>;

/// Side-tagged wrapper making a callable invocable from the other side
#[derive(Clone)]
pub struct CallableProxy {
    origin: Side,
    handle: Weak<HandleShared>,
    func: ProxyFn,
}

impl CallableProxy {
    /// Wrap a host callable for invocation from guest code.
    pub fn for_host(handle: &RuntimeHandle, f: impl HostFn) -> Self {
        Self::new(Side::Host, handle, f)
    }

    /// Wrap a guest callable for invocation from host code. Guest
    /// adapters call this when a guest function crosses the boundary.
    pub fn for_guest(handle: &RuntimeHandle, f: impl HostFn) -> Self {
        Self::new(Side::Guest, handle, f)
    }

    fn new(origin: Side, handle: &RuntimeHandle, f: impl HostFn) -> Self {
        Self {
            origin,
            handle: handle.downgrade(),
            func: Arc::new(move |args| f.call(args)),
        }
    }

    /// Side that owns the wrapped callable
    pub fn origin(&self) -> Side {
        self.origin
    }

    /// Invoke the wrapped callable.
    ///
    /// Fails with [`BridgeError::HandleClosed`] once the handle is
    /// closed, failed, or dropped — never a silent no-op, never an
    /// unrelated error.
    pub fn invoke(&self, args: &[BoundaryValue]) -> Result<BoundaryValue, BridgeError> {
        let shared = self.handle.upgrade().ok_or(BridgeError::HandleClosed)?;
        match shared.state() {
            ReadyState::Ready => {}
            ReadyState::Loading => {
                return Err(BridgeError::NotReady {
                    state: ReadyState::Loading,
                })
            }
            ReadyState::Failed | ReadyState::Closed => return Err(BridgeError::HandleClosed),
        }

        let _guard = shared.exec_lock().lock();
        trace!(origin = %self.origin, argc = args.len(), "proxy invocation");
        (self.func)(args).map_err(|e| BridgeError::Callee {
            origin: self.origin,
            message: e.message,
        })
    }

    /// Whether two proxies forward to the same underlying callable
    pub fn same_target(&self, other: &CallableProxy) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for CallableProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableProxy")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
