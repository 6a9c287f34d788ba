// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Script execution with captured output
//!
//! [`ExecutionService::execute_script`] never fails: every outcome, including
//! errors thrown by the script, is folded into an [`ExecutionResult`].

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::globals::console::CaptureSession;
use crate::runtime::ScriptRuntime;
use serde::{Deserialize, Serialize};

/// Outcome of one script run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the script completed without throwing
    pub success: bool,
    /// Console lines in the order they were written
    pub output: Vec<String>,
    /// Failure message, present only when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Successful run
    pub fn success(output: Vec<String>) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    /// Failed run
    pub fn failure(output: Vec<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output,
            error: Some(error.into()),
        }
    }
}

/// Lifecycle of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No script has run yet
    Idle,
    /// A script is running
    Running,
    /// The last script has finished
    Settled,
}

/// Runs scripts on a [`ScriptRuntime`] and captures their console output
pub struct ExecutionService {
    runtime: ScriptRuntime,
    state: RunState,
}

impl ExecutionService {
    /// Create a service with its own runtime
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Ok(Self::with_runtime(ScriptRuntime::new(config)?))
    }

    /// Wrap an existing runtime
    pub fn with_runtime(runtime: ScriptRuntime) -> Self {
        Self {
            runtime,
            state: RunState::Idle,
        }
    }

    /// The runtime, for registering modules
    pub fn runtime(&self) -> &ScriptRuntime {
        &self.runtime
    }

    /// The runtime, for registering modules
    pub fn runtime_mut(&mut self) -> &mut ScriptRuntime {
        &mut self.runtime
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        // A run whose future was dropped never reached Settled
        if self.state == RunState::Running && self.runtime.is_idle() {
            RunState::Settled
        } else {
            self.state
        }
    }

    /// Run `code` as the module identified by `label`.
    ///
    /// Output captured before a failure is kept. The error message is the
    /// thrown error's `message`, the runtime's description of a host-side
    /// failure, or `Unknown error` for thrown non-error values.
    pub async fn execute_script(&mut self, code: &str, label: &str) -> ExecutionResult {
        let session = CaptureSession::new();
        self.state = RunState::Running;

        let outcome = self.runtime.execute_captured(code, label, &session).await;

        self.state = RunState::Settled;
        let output = session.take_lines();
        match outcome {
            Ok(_) => {
                tracing::debug!("{} completed with {} output line(s)", label, output.len());
                ExecutionResult::success(output)
            }
            Err(err) => {
                tracing::debug!("{} failed: {}", label, err);
                ExecutionResult::failure(output, err.user_message())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_json_shape() {
        let ok = ExecutionResult::success(vec!["hi".into()]);
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({ "success": true, "output": ["hi"] })
        );

        let failed = ExecutionResult::failure(vec![], "boom");
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({ "success": false, "output": [], "error": "boom" })
        );

        let parsed: ExecutionResult =
            serde_json::from_str(r#"{ "success": true, "output": [] }"#).unwrap();
        assert_eq!(parsed, ExecutionResult::success(vec![]));
    }
}
