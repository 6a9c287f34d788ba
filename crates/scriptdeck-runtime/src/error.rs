// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the script runtime

use boa_engine::{Context, JsError, JsNativeError, JsString, JsValue, js_string};
use std::time::Duration;
use thiserror::Error;

/// Result type for script runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that can occur while registering, loading or running scripts
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Specifier matched neither an external module nor the module cache
    #[error("Cannot find module '{0}'")]
    ModuleNotFound(String),

    /// Remote specifier requested through the synchronous `require`
    #[error("External URL modules must be loaded with `await require.async('{0}')`")]
    ExternalModuleSync(String),

    /// Module body failed while being registered
    #[error("Failed to register module '{module}': {reason}")]
    ModuleCompile {
        /// Module name
        module: String,
        /// Underlying failure
        reason: String,
    },

    /// Script threw an error-shaped value
    #[error("{identity}: {name}: {message}")]
    Script {
        /// Identity of the failing unit
        identity: String,
        /// Error name (`Error`, `TypeError`, ...)
        name: String,
        /// Error message
        message: String,
    },

    /// Script threw something that is not an error object
    #[error("{identity}: uncaught {value}")]
    Thrown {
        /// Identity of the failing unit
        identity: String,
        /// Display form of the thrown value
        value: String,
    },

    /// Remote module could not be fetched
    #[error("Failed to load external module from {url}: {reason}")]
    Fetch {
        /// Requested URL
        url: String,
        /// Network or HTTP failure
        reason: String,
    },

    /// Remote module was fetched but failed while executing
    #[error("Failed to load external module from {url}: {reason}")]
    UrlModule {
        /// Requested URL
        url: String,
        /// Execution failure
        reason: String,
    },

    /// Remote module required itself while loading
    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    /// Script is waiting on work that can never arrive
    #[error("{0}: script did not settle and has no pending timers or module loads")]
    Stalled(String),

    /// Run deadline elapsed
    #[error("{identity}: execution timed out after {}ms", .after.as_millis())]
    Timeout {
        /// Identity of the top-level run
        identity: String,
        /// Configured deadline
        after: Duration,
    },

    /// Run was cancelled through its cancel handle
    #[error("{0}: execution cancelled")]
    Cancelled(String),

    /// Interpreter setup failure
    #[error("Engine error: {0}")]
    Engine(String),

    /// File system error
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl RuntimeError {
    /// Create a module not found error
    pub fn module_not_found(module: impl Into<String>) -> Self {
        Self::ModuleNotFound(module.into())
    }

    /// Create a fetch error
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Error name exposed to scripts
    pub fn js_name(&self) -> &'static str {
        match self {
            Self::ModuleNotFound(_) => "ModuleNotFoundError",
            Self::ExternalModuleSync(_) => "ExternalModuleSyncError",
            Self::ModuleCompile { .. } => "ModuleCompileError",
            Self::Fetch { .. } => "FetchError",
            Self::UrlModule { .. } => "ExternalModuleError",
            _ => "Error",
        }
    }

    /// Node-style error code exposed to scripts
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::ModuleNotFound(_) => Some("MODULE_NOT_FOUND"),
            Self::ExternalModuleSync(_) => Some("ERR_REQUIRE_ASYNC"),
            Self::ModuleCompile { .. } => Some("ERR_MODULE_COMPILE"),
            Self::Fetch { .. } => Some("ERR_MODULE_FETCH"),
            Self::UrlModule { .. } => Some("ERR_MODULE_EXECUTION"),
            Self::CircularDependency(_) => Some("ERR_REQUIRE_CYCLE"),
            _ => None,
        }
    }

    /// Message shown to the user when a run fails.
    ///
    /// Error-shaped throws report their own message, host failures their
    /// full text, and anything else the generic `Unknown error`.
    pub fn user_message(&self) -> String {
        match self {
            Self::Script { message, .. } => message.clone(),
            Self::Thrown { .. } => "Unknown error".to_string(),
            other => other.to_string(),
        }
    }

    /// Failure text without the identity prefix, as `String(error)` would
    /// render a thrown error
    pub fn reason(&self) -> String {
        match self {
            Self::Script { name, message, .. } => format!("{name}: {message}"),
            Self::Thrown { value, .. } => value.clone(),
            other => other.to_string(),
        }
    }

    /// Convert into a JavaScript exception with `name` and `code` set
    pub fn to_js_error(&self, context: &mut Context) -> JsError {
        let message = match self {
            Self::Script { message, .. } => message.clone(),
            other => other.to_string(),
        };
        let error: JsError = JsNativeError::error()
            .with_message(message)
            .into();
        let value = error.to_opaque(context);
        if let Some(object) = value.as_object() {
            let _ = object.set(
                js_string!("name"),
                JsString::from(self.js_name()),
                false,
                context,
            );
            if let Some(code) = self.code() {
                let _ = object.set(js_string!("code"), JsString::from(code), false, context);
            }
        }
        JsError::from_opaque(value)
    }

    /// Classify a value thrown by the unit running as `identity`
    pub fn from_thrown(identity: &str, thrown: &JsValue, context: &mut Context) -> Self {
        if let Some(object) = thrown.as_object() {
            let message = object.get(js_string!("message"), context).ok();
            if let Some(message) = message.as_ref().and_then(JsValue::as_string) {
                let name = object
                    .get(js_string!("name"), context)
                    .ok()
                    .and_then(|name| name.as_string().map(JsString::to_std_string_escaped))
                    .unwrap_or_else(|| "Error".to_string());
                return Self::Script {
                    identity: identity.to_string(),
                    name,
                    message: message.to_std_string_escaped(),
                };
            }
        }
        Self::Thrown {
            identity: identity.to_string(),
            value: thrown.display().to_string(),
        }
    }

    /// Classify an engine exception raised by the unit running as `identity`
    pub fn from_js(identity: &str, error: &JsError, context: &mut Context) -> Self {
        // Native errors include uncatchable runtime limits, which cannot be
        // turned into script values
        if let Some(native) = error.as_native() {
            let text = native.to_string();
            let (name, message) = text.split_once(": ").unwrap_or((text.as_str(), ""));
            return Self::Script {
                identity: identity.to_string(),
                name: name.to_string(),
                message: message.to_string(),
            };
        }
        let thrown = error.to_opaque(context);
        Self::from_thrown(identity, &thrown, context)
    }
}
