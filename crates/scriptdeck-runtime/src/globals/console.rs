// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Console object with per-run output capture
//!
//! One console object exists per runtime. Each call formats its arguments,
//! forwards the line to `tracing`, and appends it to the capture session of
//! the run currently in progress, if any. Runs never swap the console object
//! itself, so `console` is the same object before, during and after a run.

use crate::runtime::Host;
use boa_engine::{
    Context, JsArgs, JsObject, JsResult, JsValue, NativeFunction, js_string,
    object::ObjectInitializer,
};
use boa_gc::{Finalize, Trace};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Prefix of lines written through `console.error`
pub const ERROR_MARKER: &str = "[ERROR]";

/// Prefix of lines written through `console.warn`
pub const WARN_MARKER: &str = "[WARN]";

/// Console method family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    /// `console.log`
    Log,
    /// `console.info`
    Info,
    /// `console.debug`
    Debug,
    /// `console.warn`
    Warn,
    /// `console.error` and failed assertions
    Error,
}

impl ConsoleLevel {
    /// Captured form of a formatted line
    pub fn decorate(self, text: &str) -> String {
        match self {
            ConsoleLevel::Error => format!("{ERROR_MARKER} {text}"),
            ConsoleLevel::Warn => format!("{WARN_MARKER} {text}"),
            ConsoleLevel::Log | ConsoleLevel::Info | ConsoleLevel::Debug => text.to_string(),
        }
    }

    /// Forward a line to the host log
    pub fn forward(self, text: &str) {
        match self {
            ConsoleLevel::Error => tracing::error!(target: "scriptdeck::console", "{}", text),
            ConsoleLevel::Warn => tracing::warn!(target: "scriptdeck::console", "{}", text),
            ConsoleLevel::Log | ConsoleLevel::Info => {
                tracing::info!(target: "scriptdeck::console", "{}", text)
            }
            ConsoleLevel::Debug => tracing::debug!(target: "scriptdeck::console", "{}", text),
        }
    }
}

#[derive(Debug)]
struct SessionState {
    lines: RefCell<Vec<String>>,
    open: Cell<bool>,
}

/// Ordered output of one run.
///
/// Cloning shares the same buffer. Once closed, further lines are dropped.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    state: Rc<SessionState>,
}

impl CaptureSession {
    /// Create an open, empty session
    pub fn new() -> Self {
        Self {
            state: Rc::new(SessionState {
                lines: RefCell::new(Vec::new()),
                open: Cell::new(true),
            }),
        }
    }

    /// Append a line. Returns `false` if the session is already closed.
    pub fn record(&self, line: String) -> bool {
        if !self.state.open.get() {
            return false;
        }
        self.state.lines.borrow_mut().push(line);
        true
    }

    /// Close the session
    pub fn close(&self) {
        self.state.open.set(false);
    }

    /// Whether lines are still accepted
    pub fn is_open(&self) -> bool {
        self.state.open.get()
    }

    /// Copy of the captured lines
    pub fn lines(&self) -> Vec<String> {
        self.state.lines.borrow().clone()
    }

    /// Move the captured lines out of the session
    pub fn take_lines(&self) -> Vec<String> {
        std::mem::take(&mut *self.state.lines.borrow_mut())
    }

    /// Whether two handles refer to the same session
    pub fn same_session(&self, other: &CaptureSession) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Format console arguments the way `String(arg)` joined by spaces would
pub fn format_args(args: &[JsValue], context: &mut Context) -> String {
    args.iter()
        .map(|arg| match arg.to_string(context) {
            Ok(text) => text.to_std_string_escaped(),
            // Symbols refuse ToString
            Err(_) => arg.display().to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Trace, Finalize)]
struct ConsoleCaptures {
    host: Host,
    #[unsafe_ignore_trace]
    level: ConsoleLevel,
}

fn console_method(
    _this: &JsValue,
    args: &[JsValue],
    captures: &ConsoleCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let line = format_args(args, context);
    captures.host.state()?.record(captures.level, &line);
    Ok(JsValue::undefined())
}

fn console_assert(
    _this: &JsValue,
    args: &[JsValue],
    captures: &ConsoleCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    if args.get_or_undefined(0).to_boolean() {
        return Ok(JsValue::undefined());
    }
    let line = match args.get(1..) {
        Some(rest) if !rest.is_empty() => {
            format!("Assertion failed: {}", format_args(rest, context))
        }
        _ => "Assertion failed".to_string(),
    };
    captures.host.state()?.record(captures.level, &line);
    Ok(JsValue::undefined())
}

/// Build the console object bound to `host`
pub fn create_console(host: &Host, context: &mut Context) -> JsObject {
    let method = |level| {
        NativeFunction::from_copy_closure_with_captures(
            console_method,
            ConsoleCaptures {
                host: host.clone(),
                level,
            },
        )
    };
    let assert = NativeFunction::from_copy_closure_with_captures(
        console_assert,
        ConsoleCaptures {
            host: host.clone(),
            level: ConsoleLevel::Error,
        },
    );

    ObjectInitializer::new(context)
        .function(method(ConsoleLevel::Log), js_string!("log"), 0)
        .function(method(ConsoleLevel::Info), js_string!("info"), 0)
        .function(method(ConsoleLevel::Debug), js_string!("debug"), 0)
        .function(method(ConsoleLevel::Warn), js_string!("warn"), 0)
        .function(method(ConsoleLevel::Error), js_string!("error"), 0)
        .function(assert, js_string!("assert"), 0)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::{JsString, Source};

    #[test]
    fn test_decorate() {
        assert_eq!(ConsoleLevel::Log.decorate("hi"), "hi");
        assert_eq!(ConsoleLevel::Info.decorate("hi"), "hi");
        assert_eq!(ConsoleLevel::Error.decorate("boom"), "[ERROR] boom");
        assert_eq!(ConsoleLevel::Warn.decorate("careful"), "[WARN] careful");
    }

    #[test]
    fn test_session_closes() {
        let session = CaptureSession::new();
        assert!(session.record("one".into()));
        let shared = session.clone();
        shared.close();
        assert!(!session.record("two".into()));
        assert!(!session.is_open());
        assert_eq!(session.lines(), vec!["one".to_string()]);
        assert!(session.same_session(&shared));
        assert!(!session.same_session(&CaptureSession::new()));
    }

    #[test]
    fn test_format_args() {
        let mut context = Context::default();
        let object = context
            .eval(Source::from_bytes("({ a: 1 })"))
            .unwrap();
        let args = [
            JsValue::from(JsString::from("x")),
            JsValue::from(1),
            JsValue::from(true),
            JsValue::undefined(),
            JsValue::null(),
            object,
        ];
        assert_eq!(
            format_args(&args, &mut context),
            "x 1 true undefined null [object Object]"
        );
    }

    #[test]
    fn test_format_symbol() {
        let mut context = Context::default();
        let symbol = context
            .eval(Source::from_bytes("Symbol('tag')"))
            .unwrap();
        assert_eq!(format_args(&[symbol], &mut context), "Symbol(tag)");
    }
}
