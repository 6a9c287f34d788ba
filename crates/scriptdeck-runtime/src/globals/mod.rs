// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bindings injected into every script
//!
//! Implements:
//! - `console` - Output routed to the active capture session
//! - `setTimeout`, `setInterval` - Timer functions
//! - `clearTimeout`, `clearInterval` - Timer cancellation
//! - `Auxiliary` - Object difference helpers
//! - `module`, `exports`, `require` - Per-execution module bindings
//! - `__dirname`, `__filename` - Identity metadata

pub mod auxiliary;
pub mod console;
pub mod logger;
pub mod timers;

use crate::module_system::resolver;
use crate::runtime::Host;
use boa_engine::{
    Context, JsObject, JsResult, JsString, JsValue, js_string, object::builtins::JsFunction,
    property::Attribute,
};
use timers::TimerFunctions;

/// Parameter names of a compiled unit, in argument order
pub const BINDINGS: [&str; 11] = [
    "module",
    "exports",
    "require",
    "Auxiliary",
    "console",
    "setTimeout",
    "clearTimeout",
    "setInterval",
    "clearInterval",
    "__filename",
    "__dirname",
];

/// Bindings created once per runtime and shared by every execution
#[derive(Clone)]
pub struct SharedBindings {
    /// The `Auxiliary` object
    pub auxiliary: JsObject,
    /// The console object, also installed as the global `console`
    pub console: JsObject,
    /// Timer functions
    pub timers: TimerFunctions,
}

impl SharedBindings {
    /// Create the shared bindings for `host`
    pub fn new(host: &Host, context: &mut Context) -> Self {
        let auxiliary = auxiliary::create_auxiliary(context);
        let console = console::create_console(host, context);
        let timers = timers::create_timer_functions(host, context);
        Self {
            auxiliary,
            console,
            timers,
        }
    }

    /// Install the shared bindings as globals of the interpreter
    pub fn install(&self, context: &mut Context) -> JsResult<()> {
        let attribute = Attribute::WRITABLE | Attribute::CONFIGURABLE;
        let globals: [(&str, JsValue); 6] = [
            ("console", self.console.clone().into()),
            ("Auxiliary", self.auxiliary.clone().into()),
            ("setTimeout", self.timers.set_timeout.clone().into()),
            ("clearTimeout", self.timers.clear_timeout.clone().into()),
            ("setInterval", self.timers.set_interval.clone().into()),
            ("clearInterval", self.timers.clear_interval.clone().into()),
        ];
        for (name, value) in globals {
            context.register_global_property(JsString::from(name), value, attribute)?;
        }
        Ok(())
    }
}

/// Fresh bindings of one execution
pub struct ExecutionContext {
    /// The `module` object; its `exports` property is the unit's result
    pub module: JsObject,
    /// The initial `exports` object
    pub exports: JsObject,
    /// `require` scoped to this execution's identity
    pub require: JsFunction,
    /// `__filename`
    pub filename: String,
    /// `__dirname`
    pub dirname: String,
}

impl ExecutionContext {
    /// Create the bindings for a unit running as `identity`
    pub fn new(identity: &str, require: JsFunction, context: &mut Context) -> JsResult<Self> {
        let exports = JsObject::with_object_proto(context.intrinsics());
        let module = JsObject::with_object_proto(context.intrinsics());
        module.set(js_string!("exports"), exports.clone(), false, context)?;
        module.set(js_string!("id"), JsString::from(identity), false, context)?;
        module.set(js_string!("require"), require.clone(), false, context)?;

        Ok(Self {
            module,
            exports,
            require,
            filename: identity.to_string(),
            dirname: resolver::dirname(identity),
        })
    }

    /// Argument list matching [`BINDINGS`]
    pub fn arguments(&self, shared: &SharedBindings) -> Vec<JsValue> {
        vec![
            self.module.clone().into(),
            self.exports.clone().into(),
            self.require.clone().into(),
            shared.auxiliary.clone().into(),
            shared.console.clone().into(),
            shared.timers.set_timeout.clone().into(),
            shared.timers.clear_timeout.clone().into(),
            shared.timers.set_interval.clone().into(),
            shared.timers.clear_interval.clone().into(),
            JsString::from(self.filename.as_str()).into(),
            JsString::from(self.dirname.as_str()).into(),
        ]
    }

    /// Current value of `module.exports`
    pub fn module_exports(&self, context: &mut Context) -> JsResult<JsValue> {
        self.module.get(js_string!("exports"), context)
    }
}
