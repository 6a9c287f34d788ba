// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The `logger` external module
//!
//! Named loggers for long-running scripts. Lines go to the same capture
//! session as `console`, prefixed with the logger name. Setting
//! `logger.enabled = false` silences one logger without touching the others.

use super::console::{ConsoleLevel, format_args};
use super::timers::TimerFunctions;
use crate::runtime::Host;
use boa_engine::{
    Context, JsArgs, JsObject, JsResult, JsString, JsValue, NativeFunction, js_string,
    object::ObjectInitializer, property::Attribute,
};
use boa_gc::{Finalize, Trace};

/// Name under which the module is registered
pub const LOGGER_MODULE: &str = "logger";

const LEVELS: [(ConsoleLevel, &str); 5] = [
    (ConsoleLevel::Log, "log"),
    (ConsoleLevel::Info, "info"),
    (ConsoleLevel::Debug, "debug"),
    (ConsoleLevel::Warn, "warn"),
    (ConsoleLevel::Error, "error"),
];

#[derive(Trace, Finalize)]
struct LineCaptures {
    host: Host,
    #[unsafe_ignore_trace]
    level: ConsoleLevel,
    #[unsafe_ignore_trace]
    name: Option<String>,
}

fn is_disabled(this: &JsValue, context: &mut Context) -> JsResult<bool> {
    let Some(object) = this.as_object() else {
        return Ok(false);
    };
    let enabled = object.get(js_string!("enabled"), context)?;
    Ok(enabled.as_boolean() == Some(false))
}

fn write_line(
    this: &JsValue,
    args: &[JsValue],
    captures: &LineCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    if is_disabled(this, context)? {
        return Ok(JsValue::undefined());
    }
    let text = format_args(args, context);
    let line = match &captures.name {
        Some(name) => format!("[{name}] {text}"),
        None => text,
    };
    captures.host.state()?.record(captures.level, &line);
    Ok(JsValue::undefined())
}

fn logger_object(
    host: &Host,
    name: Option<String>,
    extra: Vec<(&'static str, JsValue)>,
    context: &mut Context,
) -> JsObject {
    let mut object = ObjectInitializer::new(context);
    for (level, method) in LEVELS {
        let function = NativeFunction::from_copy_closure_with_captures(
            write_line,
            LineCaptures {
                host: host.clone(),
                level,
                name: name.clone(),
            },
        );
        object.function(function, JsString::from(method), 0);
    }
    let label = name.map_or_else(JsValue::null, |name| JsString::from(name.as_str()).into());
    object
        .property(js_string!("name"), label, Attribute::all())
        .property(js_string!("enabled"), true, Attribute::all());
    for (key, value) in extra {
        object.property(JsString::from(key), value, Attribute::all());
    }
    object.build()
}

#[derive(Trace, Finalize)]
struct FactoryCaptures {
    host: Host,
}

fn create_logger(
    _this: &JsValue,
    args: &[JsValue],
    captures: &FactoryCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let name = match args.get_or_undefined(0) {
        value if value.is_null_or_undefined() => None,
        value => Some(value.to_string(context)?.to_std_string_escaped()),
    };
    Ok(logger_object(&captures.host, name, Vec::new(), context).into())
}

/// Exports of the `logger` module: `createLogger(name)`, a default unnamed
/// logger's methods and `sleep`
pub fn create_logger_module(
    host: &Host,
    timers: &TimerFunctions,
    context: &mut Context,
) -> JsObject {
    let factory = NativeFunction::from_copy_closure_with_captures(
        create_logger,
        FactoryCaptures { host: host.clone() },
    )
    .to_js_function(context.realm());
    let extra = vec![
        ("createLogger", factory.into()),
        ("sleep", timers.sleep.clone().into()),
    ];
    logger_object(host, None, extra, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globals::console::CaptureSession;
    use crate::globals::timers::create_timer_functions;
    use crate::runtime::HostState;
    use boa_engine::Source;
    use std::rc::Rc;

    fn run(script: &str) -> Vec<String> {
        let state = Rc::new(HostState::new(false));
        let host = Host::new(&state);
        let mut context = Context::default();
        let timers = create_timer_functions(&host, &mut context);
        let module = create_logger_module(&host, &timers, &mut context);
        context
            .register_global_property(js_string!("logger"), module, Attribute::all())
            .unwrap();

        let session = CaptureSession::new();
        let _guard = state.attach_session(session.clone());
        context.eval(Source::from_bytes(script)).unwrap();
        session.lines()
    }

    #[test]
    fn test_default_logger_levels() {
        let lines = run("logger.log('a', 1); logger.info('b'); logger.warn('c'); logger.error('d');");
        assert_eq!(lines, vec!["a 1", "b", "[WARN] c", "[ERROR] d"]);
    }

    #[test]
    fn test_named_logger_prefix() {
        let lines = run(
            r#"
            const jobs = logger.createLogger('jobs');
            jobs.log('started');
            jobs.error('failed', 3);
            const log = jobs.log;
            log('detached');
            "#,
        );
        assert_eq!(
            lines,
            vec!["[jobs] started", "[ERROR] [jobs] failed 3", "[jobs] detached"]
        );
    }

    #[test]
    fn test_disabled_logger_is_silent() {
        let lines = run(
            r#"
            const quiet = logger.createLogger('quiet');
            quiet.enabled = false;
            quiet.warn('hidden');
            logger.createLogger().log('shown');
            "#,
        );
        assert_eq!(lines, vec!["shown"]);
    }
}
