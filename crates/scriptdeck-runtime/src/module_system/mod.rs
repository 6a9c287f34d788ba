// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module registry and `require()`
//!
//! ## Lookup order of `require(s)`
//! 1. `http://` / `https://` specifiers fail: they need `require.async`
//! 2. External modules registered by the host
//! 3. Registered modules, with `./` and `../` resolved against the caller
//!
//! ## Import rewriting
//! Named and side-effect `import` declarations are rewritten onto `require`
//! before a unit is compiled.

pub mod imports;
mod registry;
mod require;
pub mod resolver;

pub use imports::{Rewrite, UnsupportedImport, rewrite_imports};
pub use registry::ModuleRegistry;
pub use require::create_require;
pub use resolver::{Specifier, is_remote, resolve_relative};
