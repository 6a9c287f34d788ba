// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # scriptdeck-runtime
//!
//! Embedded script execution for the scriptdeck workspace.
//!
//! This crate runs user-authored JavaScript as modules, including:
//!
//! - A private module registry (`register_module` / `get_module`)
//! - Host-provided external modules, with `timers` and `logger` built in
//! - `require()` with relative resolution and `require.async()` for
//!   `http(s)://` modules, fetched once and cached
//! - `import { a } from "x"` rewritten onto `require`
//! - Console output captured per run
//! - Timers, run deadlines and cancellation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use scriptdeck_runtime::{ExecutionService, RuntimeConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let mut service = ExecutionService::new(RuntimeConfig::default())?;
//!     service
//!         .runtime_mut()
//!         .register_module("greet", "module.exports = (n) => `hello ${n}`;")?;
//!
//!     let result = service
//!         .execute_script("console.log(require('greet')('deck'));", "main.js")
//!         .await;
//!     assert_eq!(result.output, vec!["hello deck"]);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod execution;
pub mod fetch;
pub mod globals;
pub mod module_system;
pub mod runtime;

// Re-exports
pub use boa_engine::JsValue;
pub use config::RuntimeConfig;
pub use error::{Result, RuntimeError};
pub use execution::{ExecutionResult, ExecutionService, RunState};
pub use fetch::{HttpFetcher, ModuleFetcher};
pub use globals::console::{CaptureSession, ERROR_MARKER, WARN_MARKER};
pub use runtime::{CancelHandle, ScriptRuntime};

/// Version of the scriptdeck runtime
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
