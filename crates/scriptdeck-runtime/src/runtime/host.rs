// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! State shared between the runtime and its native bindings

use super::event_loop::EventLoop;
use crate::globals::console::{CaptureSession, ConsoleLevel};
use crate::module_system::ModuleRegistry;
use boa_engine::{JsNativeError, JsResult};
use boa_gc::{Finalize, Trace};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

/// Mutable state reachable from native functions.
///
/// Borrows of the inner cells must never be held across a call into
/// JavaScript: scripts re-enter `require` and the timer bindings.
pub struct HostState {
    /// Module, external and URL tables
    pub registry: RefCell<ModuleRegistry>,
    /// Timers and pending URL loads
    pub event_loop: RefCell<EventLoop>,
    sessions: RefCell<Vec<CaptureSession>>,
    loading: RefCell<HashSet<String>>,
    depth: Cell<usize>,
    forward_console: bool,
}

impl HostState {
    /// Create host state
    pub fn new(forward_console: bool) -> Self {
        Self {
            registry: RefCell::new(ModuleRegistry::new()),
            event_loop: RefCell::new(EventLoop::new()),
            sessions: RefCell::new(Vec::new()),
            loading: RefCell::new(HashSet::new()),
            depth: Cell::new(0),
            forward_console,
        }
    }

    /// Route a console line to the host log and the active capture session
    pub fn record(&self, level: ConsoleLevel, text: &str) {
        if self.forward_console {
            level.forward(text);
        }
        let session = self.sessions.borrow().last().cloned();
        if let Some(session) = session {
            session.record(level.decorate(text));
        }
    }

    /// Make `session` receive console output until the guard is dropped
    pub fn attach_session(self: &Rc<Self>, session: CaptureSession) -> SessionGuard {
        self.sessions.borrow_mut().push(session.clone());
        SessionGuard {
            host: Rc::clone(self),
            session,
        }
    }

    /// Whether a remote module is currently being executed
    pub fn is_loading(&self, url: &str) -> bool {
        self.loading.borrow().contains(url)
    }

    /// Mark `url` as executing. Returns `None` if it already is.
    pub fn begin_load(self: &Rc<Self>, url: &str) -> Option<LoadGuard> {
        if !self.loading.borrow_mut().insert(url.to_string()) {
            return None;
        }
        Some(LoadGuard {
            host: Rc::clone(self),
            url: url.to_string(),
        })
    }

    /// Enter an execution. The outermost guard discards leftover work on drop.
    pub fn enter_run(self: &Rc<Self>) -> RunGuard {
        let depth = self.depth.get();
        self.depth.set(depth + 1);
        RunGuard {
            host: Rc::clone(self),
            top_level: depth == 0,
        }
    }

    /// Whether no execution is in progress
    pub fn is_idle(&self) -> bool {
        self.depth.get() == 0
    }
}

/// Closes and detaches a capture session
#[must_use]
pub struct SessionGuard {
    host: Rc<HostState>,
    session: CaptureSession,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.close();
        self.host
            .sessions
            .borrow_mut()
            .retain(|s| !s.same_session(&self.session));
    }
}

/// Clears the in-flight mark of a remote module
#[must_use]
pub struct LoadGuard {
    host: Rc<HostState>,
    url: String,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.host.loading.borrow_mut().remove(&self.url);
    }
}

/// Tracks execution nesting
#[must_use]
pub struct RunGuard {
    host: Rc<HostState>,
    top_level: bool,
}

impl RunGuard {
    /// Whether this guard belongs to the outermost execution
    pub fn is_top_level(&self) -> bool {
        self.top_level
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let depth = self.host.depth.get();
        self.host.depth.set(depth.saturating_sub(1));
        if self.top_level {
            let (timers, loads) = self.host.event_loop.borrow_mut().discard();
            if timers > 0 || loads > 0 {
                tracing::warn!(
                    "Discarded {} pending timer(s) and {} module load(s) after the run settled",
                    timers,
                    loads
                );
            }
        }
    }
}

/// Handle to [`HostState`] captured by native functions.
///
/// Holds a weak reference so bindings stored in the interpreter do not keep
/// the host alive.
#[derive(Clone, Trace, Finalize)]
pub struct Host {
    #[unsafe_ignore_trace]
    state: Weak<HostState>,
}

impl Host {
    /// Create a handle
    pub fn new(state: &Rc<HostState>) -> Self {
        Self {
            state: Rc::downgrade(state),
        }
    }

    /// Upgrade to the shared state
    pub fn state(&self) -> JsResult<Rc<HostState>> {
        self.state.upgrade().ok_or_else(|| {
            JsNativeError::error()
                .with_message("script runtime has been shut down")
                .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_goes_to_innermost_session() {
        let host = Rc::new(HostState::new(false));
        let outer = CaptureSession::new();
        let inner = CaptureSession::new();

        let outer_guard = host.attach_session(outer.clone());
        host.record(ConsoleLevel::Log, "a");
        {
            let _inner_guard = host.attach_session(inner.clone());
            host.record(ConsoleLevel::Error, "b");
        }
        host.record(ConsoleLevel::Warn, "c");
        drop(outer_guard);
        host.record(ConsoleLevel::Log, "dropped");

        assert_eq!(outer.lines(), vec!["a".to_string(), "[WARN] c".to_string()]);
        assert_eq!(inner.lines(), vec!["[ERROR] b".to_string()]);
        assert!(!outer.is_open());
        assert!(!inner.is_open());
    }

    #[test]
    fn test_load_guard() {
        let host = Rc::new(HostState::new(false));
        let guard = host.begin_load("https://example.com/a.js").unwrap();
        assert!(host.is_loading("https://example.com/a.js"));
        assert!(host.begin_load("https://example.com/a.js").is_none());
        drop(guard);
        assert!(!host.is_loading("https://example.com/a.js"));
    }

    #[test]
    fn test_run_guard_depth() {
        let host = Rc::new(HostState::new(false));
        let outer = host.enter_run();
        assert!(outer.is_top_level());
        let inner = host.enter_run();
        assert!(!inner.is_top_level());
        drop(inner);
        assert!(!host.is_idle());
        drop(outer);
        assert!(host.is_idle());
    }

    #[test]
    fn test_host_handle_after_drop() {
        let state = Rc::new(HostState::new(false));
        let host = Host::new(&state);
        assert!(host.state().is_ok());
        drop(state);
        assert!(host.state().is_err());
    }
}
