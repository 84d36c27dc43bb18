// src/runtime/handle.rs
//! Runtime handle lifecycle and extension package registry

use crate::runtime::lock::ReentrantLock;
use crate::runtime::{GlobalScope, GuestRuntime};
use crate::BridgeError;
use ahash::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Readiness state of a [`RuntimeHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Ready,
    Failed,
    Closed,
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadyState::Loading => write!(f, "loading"),
            ReadyState::Ready => write!(f, "ready"),
            ReadyState::Failed => write!(f, "failed"),
            ReadyState::Closed => write!(f, "closed"),
        }
    }
}

/// Opaque handle to an initialized guest runtime instance
///
/// Cheap to clone; all clones refer to the same runtime, scope, and
/// lifecycle state. Multiple independent handles may coexist in one
/// process — nothing here is process-global.
#[derive(Clone)]
pub struct RuntimeHandle {
    shared: Arc<HandleShared>,
}

pub(crate) struct HandleShared {
    state: Mutex<ReadyState>,
    version: OnceLock<String>,
    runtime: OnceLock<Box<dyn GuestRuntime>>,
    scope: GlobalScope,
    exec_lock: ReentrantLock,
    packages: Mutex<PackageRegistry>,
}

/// Loaded-package set plus per-name gates that collapse concurrent
/// loads of the same package to a single underlying load.
struct PackageRegistry {
    loaded: HashSet<String>,
    gates: HashMap<String, Arc<AsyncMutex<()>>>,
}

impl HandleShared {
    pub(crate) fn state(&self) -> ReadyState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn exec_lock(&self) -> &ReentrantLock {
        &self.exec_lock
    }

    pub(crate) fn runtime(&self) -> Option<&dyn GuestRuntime> {
        self.runtime.get().map(|rt| rt.as_ref())
    }

    fn set_state(&self, next: ReadyState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }
}

impl RuntimeHandle {
    /// New handle in Loading state, before the distribution is fetched.
    pub(crate) fn new_loading() -> Self {
        Self {
            shared: Arc::new(HandleShared {
                state: Mutex::new(ReadyState::Loading),
                version: OnceLock::new(),
                runtime: OnceLock::new(),
                scope: GlobalScope::new(),
                exec_lock: ReentrantLock::new(),
                packages: Mutex::new(PackageRegistry {
                    loaded: HashSet::default(),
                    gates: HashMap::default(),
                }),
            }),
        }
    }

    /// Install the fetched runtime. Called once by the loader.
    pub(crate) fn install(&self, runtime: Box<dyn GuestRuntime>) {
        let _ = self.shared.version.set(runtime.version().to_string());
        if self.shared.runtime.set(runtime).is_err() {
            warn!("guest runtime installed twice; keeping the first");
        }
    }

    pub(crate) fn mark_ready(&self) {
        self.shared.set_state(ReadyState::Ready);
        info!(version = ?self.version(), "guest runtime ready");
    }

    pub(crate) fn mark_failed(&self) {
        self.shared.set_state(ReadyState::Failed);
        warn!("guest runtime marked failed");
    }

    pub fn state(&self) -> ReadyState {
        self.shared.state()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ReadyState::Ready
    }

    /// Guest runtime version, available once initialization has fetched
    /// the distribution.
    pub fn version(&self) -> Option<&str> {
        self.shared.version.get().map(String::as_str)
    }

    /// The handle's persistent global scope
    pub fn scope(&self) -> &GlobalScope {
        &self.shared.scope
    }

    /// Names of extension packages loaded so far
    pub fn packages(&self) -> Vec<String> {
        let registry = self.lock_packages();
        registry.loaded.iter().cloned().collect()
    }

    /// Close the handle. Idempotent. Outstanding proxies and further
    /// run/load/bind calls fail with [`BridgeError::HandleClosed`];
    /// effects already committed to the scope remain.
    pub fn close(&self) {
        self.shared.set_state(ReadyState::Closed);
        info!("runtime handle closed");
    }

    /// Load an extension package after the handle is Ready.
    ///
    /// Idempotent: loading an already-loaded package is a no-op.
    /// Concurrent calls for the same name collapse to a single
    /// underlying load; calls for disjoint names may proceed
    /// concurrently. A failed load leaves the package unloaded and may
    /// simply be re-issued.
    pub async fn load_package(&self, name: &str) -> Result<(), BridgeError> {
        match self.state() {
            ReadyState::Ready => {}
            ReadyState::Closed => return Err(BridgeError::HandleClosed),
            state => return Err(BridgeError::NotReady { state }),
        }
        self.load_package_inner(name).await
    }

    /// Package load used by the loader before the handle is Ready.
    pub(crate) async fn preload_package(&self, name: &str) -> Result<(), BridgeError> {
        self.load_package_inner(name).await
    }

    async fn load_package_inner(&self, name: &str) -> Result<(), BridgeError> {
        let gate = {
            let mut registry = self.lock_packages();
            if registry.loaded.contains(name) {
                return Ok(());
            }
            registry
                .gates
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let _in_flight = gate.lock().await;

        // A racing call may have finished the load while we waited.
        if self.lock_packages().loaded.contains(name) {
            return Ok(());
        }

        let runtime = self
            .shared
            .runtime
            .get()
            .ok_or(BridgeError::NotReady {
                state: ReadyState::Loading,
            })?;

        debug!(package = %name, "loading extension package");
        runtime
            .load_package(name)
            .await
            .map_err(|e| BridgeError::Initialization {
                reason: format!("package '{}' failed to load: {}", name, e),
            })?;

        let mut registry = self.lock_packages();
        registry.loaded.insert(name.to_string());
        registry.gates.remove(name);
        Ok(())
    }

    pub(crate) fn shared(&self) -> &Arc<HandleShared> {
        &self.shared
    }

    pub(crate) fn downgrade(&self) -> Weak<HandleShared> {
        Arc::downgrade(&self.shared)
    }

    fn lock_packages(&self) -> std::sync::MutexGuard<'_, PackageRegistry> {
        self.shared.packages.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("state", &self.state())
            .field("version", &self.version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::GuestError;
    use crate::value::BoundaryValue;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct SlowPackageGuest {
        loads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl GuestRuntime for SlowPackageGuest {
        fn version(&self) -> &str {
            "slow-guest 0.1"
        }

        fn execute(
            &self,
            _source: &str,
            _scope: &GlobalScope,
        ) -> Result<BoundaryValue, GuestError> {
            Ok(BoundaryValue::Null)
        }

        async fn load_package(&self, name: &str) -> Result<(), GuestError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if name == "broken" {
                return Err(GuestError::new("package is broken"));
            }
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn ready_handle(loads: Arc<AtomicUsize>) -> RuntimeHandle {
        let handle = RuntimeHandle::new_loading();
        handle.install(Box::new(SlowPackageGuest { loads }));
        handle.mark_ready();
        handle
    }

    #[tokio::test]
    async fn test_concurrent_same_package_loads_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let handle = ready_handle(loads.clone());

        let (a, b) = tokio::join!(handle.load_package("numpy"), handle.load_package("numpy"));
        a.unwrap();
        b.unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(handle.packages(), vec!["numpy".to_string()]);
    }

    #[tokio::test]
    async fn test_reload_is_idempotent() {
        let loads = Arc::new(AtomicUsize::new(0));
        let handle = ready_handle(loads.clone());

        handle.load_package("plotting").await.unwrap();
        handle.load_package("plotting").await.unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disjoint_packages_load_concurrently() {
        let loads = Arc::new(AtomicUsize::new(0));
        let handle = ready_handle(loads.clone());

        let (a, b) = tokio::join!(handle.load_package("numpy"), handle.load_package("plotting"));
        a.unwrap();
        b.unwrap();

        let mut packages = handle.packages();
        packages.sort();
        assert_eq!(packages, vec!["numpy".to_string(), "plotting".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_package_load_is_retriable() {
        let loads = Arc::new(AtomicUsize::new(0));
        let handle = ready_handle(loads.clone());

        let err = handle.load_package("broken").await.unwrap_err();
        assert!(matches!(err, BridgeError::Initialization { .. }));
        assert!(handle.packages().is_empty());

        // The handle itself stays Ready; the caller may re-issue.
        assert_eq!(handle.state(), ReadyState::Ready);
        assert!(handle.load_package("broken").await.is_err());
    }

    #[tokio::test]
    async fn test_load_package_after_close_fails() {
        let handle = ready_handle(Arc::new(AtomicUsize::new(0)));
        handle.close();
        let err = handle.load_package("numpy").await.unwrap_err();
        assert!(matches!(err, BridgeError::HandleClosed));
    }

    #[test]
    fn test_close_is_idempotent() {
        let handle = ready_handle(Arc::new(AtomicUsize::new(0)));
        handle.close();
        handle.close();
        assert_eq!(handle.state(), ReadyState::Closed);
    }
}
