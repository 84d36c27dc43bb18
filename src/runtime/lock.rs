// src/runtime/lock.rs
//! Reentrant execution lock
//!
//! Serializes call stacks, not tasks: a guest callback invoked through a
//! proxy may call back into the session on the same handle without
//! deadlocking, because re-entry from the owning thread only bumps the
//! depth. Threads other than the owner wait on a condvar.

use std::sync::{Condvar, Mutex};
use std::thread::{self, ThreadId};

pub(crate) struct ReentrantLock {
    state: Mutex<LockState>,
    cond: Condvar,
}

struct LockState {
    owner: Option<ThreadId>,
    depth: usize,
}

pub(crate) struct ReentrantGuard<'a> {
    lock: &'a ReentrantLock,
}

impl ReentrantLock {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockState {
                owner: None,
                depth: 0,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn lock(&self) -> ReentrantGuard<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    break;
                }
                Some(owner) if owner == me => {
                    state.depth += 1;
                    break;
                }
                Some(_) => {
                    state = self.cond.wait(state).unwrap_or_else(|e| e.into_inner());
                }
            }
        }
        ReentrantGuard { lock: self }
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        self.state.lock().unwrap().depth
    }
}

impl Drop for ReentrantGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.lock.state.lock().unwrap_or_else(|e| e.into_inner());
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.lock.cond.notify_one();
        }
    }
}
