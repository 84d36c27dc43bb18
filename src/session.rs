// src/session.rs
//! Guest source execution against a persistent scope

use crate::runtime::{GlobalScope, GuestError, ReadyState, RuntimeHandle};
use crate::value::BoundaryValue;
use crate::BridgeError;
use tracing::debug;

/// One unit of guest source plus the scope it executes against.
/// Ephemeral: construct one per execution call.
#[derive(Debug, Clone)]
pub struct ExecutionUnit {
    source: String,
    scope: Option<GlobalScope>,
}

impl ExecutionUnit {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            scope: None,
        }
    }

    /// Execute against an explicit scope instead of the handle's
    /// persistent global scope.
    pub fn with_scope(mut self, scope: GlobalScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Executes guest source units against a runtime handle.
///
/// Top-level bindings created by a unit persist in the target scope
/// after the call returns; there is no isolation between executions.
/// Guest exceptions are caught at the boundary and surfaced as
/// [`BridgeError::GuestExecution`]; bindings committed before the raise
/// are preserved, never rolled back.
pub struct ExecutionSession {
    handle: RuntimeHandle,
}

impl ExecutionSession {
    pub fn new(handle: RuntimeHandle) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &RuntimeHandle {
        &self.handle
    }

    /// Execute a unit synchronously.
    ///
    /// Must not be used for guest code that itself suspends; use
    /// [`run_async`](Self::run_async) for that. A host callback invoked
    /// by the unit may re-enter `run` on the same handle: the execution
    /// lock is reentrant per call stack.
    pub fn run(&self, unit: &ExecutionUnit) -> Result<BoundaryValue, BridgeError> {
        let scope = self.target_scope(unit);
        self.check_ready()?;

        let shared = self.handle.shared().clone();
        let _guard = shared.exec_lock().lock();
        let runtime = self.runtime_or_not_ready(&shared)?;

        debug!(bytes = unit.source().len(), "executing guest source");
        runtime.execute(unit.source(), &scope).map_err(raise)
    }

    /// Execute a unit that may suspend (guest-side package loads, I/O).
    ///
    /// The execution lock is keyed by scheduler thread, not by task, so
    /// it does not exclude other tasks on the same thread across this
    /// future's suspension points: concurrent `run_async` calls against
    /// one handle may interleave at guest await points. Callers that
    /// need ordering between units chain the futures instead of racing
    /// them.
    pub async fn run_async(&self, unit: &ExecutionUnit) -> Result<BoundaryValue, BridgeError> {
        let scope = self.target_scope(unit);
        self.check_ready()?;

        let shared = self.handle.shared().clone();
        let _guard = shared.exec_lock().lock();
        let runtime = self.runtime_or_not_ready(&shared)?;

        debug!(bytes = unit.source().len(), "executing guest source (suspending)");
        runtime
            .execute_async(unit.source(), &scope)
            .await
            .map_err(raise)
    }

    fn target_scope(&self, unit: &ExecutionUnit) -> GlobalScope {
        unit.scope
            .clone()
            .unwrap_or_else(|| self.handle.scope().clone())
    }

    fn check_ready(&self) -> Result<(), BridgeError> {
        match self.handle.state() {
            ReadyState::Ready => Ok(()),
            ReadyState::Closed => Err(BridgeError::HandleClosed),
            state => Err(BridgeError::NotReady { state }),
        }
    }

    fn runtime_or_not_ready<'a>(
        &self,
        shared: &'a crate::runtime::handle::HandleShared,
    ) -> Result<&'a dyn crate::runtime::GuestRuntime, BridgeError> {
        shared.runtime().ok_or(BridgeError::NotReady {
            state: ReadyState::Loading,
        })
    }
}

fn raise(err: GuestError) -> BridgeError {
    BridgeError::GuestExecution {
        message: err.message,
        trace: err.trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::GuestRuntime;
    use async_trait::async_trait;

    /// Records assignments of the form `name = <int>` into the scope,
    /// raising on a `raise <msg>` line. A fixture, not an interpreter.
    struct RecordingGuest;

    #[async_trait]
    impl GuestRuntime for RecordingGuest {
        fn version(&self) -> &str {
            "recording 0.1"
        }

        fn execute(&self, source: &str, scope: &GlobalScope) -> Result<BoundaryValue, GuestError> {
            let mut last = BoundaryValue::Null;
            for line in source.lines().map(str::trim).filter(|l| !l.is_empty()) {
                if let Some(message) = line.strip_prefix("raise ") {
                    return Err(GuestError::with_trace(message, format!("at: {}", line)));
                }
                if let Some((name, value)) = line.split_once('=') {
                    let parsed: i64 = value.trim().parse().map_err(|_| {
                        GuestError::new(format!("bad literal: {}", value.trim()))
                    })?;
                    last = BoundaryValue::Int(parsed);
                    scope.set(name.trim(), last.clone());
                }
            }
            Ok(last)
        }

        async fn execute_async(
            &self,
            source: &str,
            scope: &GlobalScope,
        ) -> Result<BoundaryValue, GuestError> {
            tokio::task::yield_now().await;
            self.execute(source, scope)
        }

        async fn load_package(&self, _name: &str) -> Result<(), GuestError> {
            Ok(())
        }
    }

    fn ready_handle() -> RuntimeHandle {
        let handle = RuntimeHandle::new_loading();
        handle.install(Box::new(RecordingGuest));
        handle.mark_ready();
        handle
    }

    #[test]
    fn test_run_on_loading_handle_fails_immediately() {
        // A handle that has not finished initializing: run must fail
        // with NotReady, never hang.
        let handle = RuntimeHandle::new_loading();
        let session = ExecutionSession::new(handle);

        match session.run(&ExecutionUnit::new("x = 1")).unwrap_err() {
            BridgeError::NotReady { state } => assert_eq!(state, ReadyState::Loading),
            other => panic!("expected NotReady, got {:?}", other),
        }
    }

    #[test]
    fn test_run_on_failed_handle_fails_not_ready() {
        let handle = RuntimeHandle::new_loading();
        handle.mark_failed();
        let session = ExecutionSession::new(handle);

        assert!(matches!(
            session.run(&ExecutionUnit::new("x = 1")).unwrap_err(),
            BridgeError::NotReady {
                state: ReadyState::Failed
            }
        ));
    }

    #[test]
    fn test_run_on_closed_handle_fails_handle_closed() {
        let handle = ready_handle();
        handle.close();
        let session = ExecutionSession::new(handle);

        assert!(matches!(
            session.run(&ExecutionUnit::new("x = 1")).unwrap_err(),
            BridgeError::HandleClosed
        ));
    }

    #[test]
    fn test_bindings_persist_across_runs() {
        let handle = ready_handle();
        let session = ExecutionSession::new(handle.clone());

        session.run(&ExecutionUnit::new("x = 1")).unwrap();
        session.run(&ExecutionUnit::new("y = 2")).unwrap();

        assert_eq!(handle.scope().get("x"), Some(BoundaryValue::Int(1)));
        assert_eq!(handle.scope().get("y"), Some(BoundaryValue::Int(2)));
    }

    #[test]
    fn test_guest_raise_preserves_partial_bindings() {
        let handle = ready_handle();
        let session = ExecutionSession::new(handle.clone());
        handle.scope().set("x", BoundaryValue::Int(1));

        let err = session
            .run(&ExecutionUnit::new("y = 2\nraise boom"))
            .unwrap_err();

        match err {
            BridgeError::GuestExecution { message, trace } => {
                assert_eq!(message, "boom");
                assert!(trace.is_some());
            }
            other => panic!("expected GuestExecution, got {:?}", other),
        }

        // No rollback: both the prior binding and the partial one stay.
        assert_eq!(handle.scope().get("x"), Some(BoundaryValue::Int(1)));
        assert_eq!(handle.scope().get("y"), Some(BoundaryValue::Int(2)));
    }

    #[test]
    fn test_explicit_scope_leaves_global_scope_untouched() {
        let handle = ready_handle();
        let session = ExecutionSession::new(handle.clone());
        let sandbox = GlobalScope::new();

        session
            .run(&ExecutionUnit::new("x = 5").with_scope(sandbox.clone()))
            .unwrap();

        assert_eq!(sandbox.get("x"), Some(BoundaryValue::Int(5)));
        assert_eq!(handle.scope().get("x"), None);
    }

    #[tokio::test]
    async fn test_concurrent_run_async_calls_interleave_and_complete() {
        // The execution lock serializes call stacks, not tasks: two
        // units racing on one handle both finish and both commit.
        let handle = ready_handle();
        let session = ExecutionSession::new(handle.clone());

        let unit_a = ExecutionUnit::new("a = 1");
        let unit_b = ExecutionUnit::new("b = 2");
        let (a, b) = tokio::join!(session.run_async(&unit_a), session.run_async(&unit_b));
        a.unwrap();
        b.unwrap();

        assert_eq!(handle.scope().get("a"), Some(BoundaryValue::Int(1)));
        assert_eq!(handle.scope().get("b"), Some(BoundaryValue::Int(2)));
    }

    #[tokio::test]
    async fn test_run_async_suspends_and_completes() {
        let handle = ready_handle();
        let session = ExecutionSession::new(handle.clone());

        let result = session.run_async(&ExecutionUnit::new("z = 9")).await.unwrap();
        assert_eq!(result, BoundaryValue::Int(9));
        assert_eq!(handle.scope().get("z"), Some(BoundaryValue::Int(9)));
    }
}
