// src/bindings.rs
//! Host binding table
//!
//! The set of host objects intentionally exposed into a handle's global
//! scope under stable names, and the symmetric lookup of guest-scope
//! bindings for host consumption. The host never exposes a reflective
//! surface; guest code only sees what was explicitly bound here.

use crate::proxy::{CallableProxy, HostFn};
use crate::runtime::{ReadyState, RuntimeHandle};
use crate::value::BoundaryValue;
use crate::BridgeError;
use tracing::debug;

/// Named host/guest bindings over one handle's global scope
pub struct BindingTable {
    handle: RuntimeHandle,
}

impl BindingTable {
    pub fn new(handle: &RuntimeHandle) -> Self {
        Self {
            handle: handle.clone(),
        }
    }

    /// Install a value under `name`, visible to subsequently executed
    /// guest source. No uniqueness enforcement: last bind wins, which
    /// also makes conflicting bindings from independent callers the
    /// caller's responsibility.
    pub fn bind(&self, name: &str, value: impl Into<BoundaryValue>) -> Result<(), BridgeError> {
        if name.is_empty() {
            return Err(BridgeError::InvalidName {
                name: name.to_string(),
            });
        }
        self.check_open()?;
        debug!(name = %name, "installing host binding");
        self.handle.scope().set(name, value.into());
        Ok(())
    }

    /// Wrap a host callable as a proxy and bind it under `name`.
    pub fn bind_fn(&self, name: &str, f: impl HostFn) -> Result<(), BridgeError> {
        let proxy = CallableProxy::for_host(&self.handle, f);
        self.bind(name, BoundaryValue::Callable(proxy))
    }

    /// Retrieve a scope binding for host consumption. `Ok(None)` means
    /// no binding exists under that name.
    pub fn lookup(&self, name: &str) -> Result<Option<BoundaryValue>, BridgeError> {
        self.check_open()?;
        Ok(self.handle.scope().get(name))
    }

    fn check_open(&self) -> Result<(), BridgeError> {
        if self.handle.state() == ReadyState::Closed {
            return Err(BridgeError::HandleClosed);
        }
        Ok(())
    }
}
