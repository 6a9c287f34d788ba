// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compilation of script text into callable units

use crate::error::{Result, RuntimeError};
use crate::globals::BINDINGS;
use boa_engine::{Context, Source, object::builtins::JsFunction};

/// Turns a script body into a function taking [`BINDINGS`] as parameters
pub trait ScriptUnit {
    /// Function expression source wrapping `body`.
    ///
    /// The body must start on the second line so error line numbers are off
    /// by exactly one.
    fn wrap(&self, body: &str) -> String;

    /// Compile `body` for the unit running as `identity`
    fn compile(&self, body: &str, identity: &str, context: &mut Context) -> Result<JsFunction> {
        let wrapped = self.wrap(body);
        let value = context
            .eval(Source::from_bytes(&wrapped))
            .map_err(|err| RuntimeError::from_js(identity, &err, context))?;

        value
            .as_object()
            .and_then(|object| JsFunction::from_object(object.clone()))
            .ok_or_else(|| {
                RuntimeError::Engine(format!("{identity}: unit did not compile to a function"))
            })
    }
}

/// Synchronous CommonJS body, used for registered modules
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonJsUnit;

impl ScriptUnit for CommonJsUnit {
    fn wrap(&self, body: &str) -> String {
        format!("(function ({}) {{\n{}\n}})", BINDINGS.join(", "), body)
    }
}

/// Asynchronous body, used for executed scripts and URL modules.
///
/// Top-level `await` is allowed; calling the unit returns a promise.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsyncUnit;

impl ScriptUnit for AsyncUnit {
    fn wrap(&self, body: &str) -> String {
        format!("(async function ({}) {{\n{}\n}})", BINDINGS.join(", "), body)
    }
}
