// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Timer functions: setTimeout, setInterval, clearTimeout, clearInterval, sleep

use crate::runtime::{Host, MAX_TIMER_DELAY, TimerId, TimerTask};
use boa_engine::{
    Context, JsArgs, JsNativeError, JsObject, JsResult, JsString, JsValue, NativeFunction,
    js_string,
    object::{
        FunctionObjectBuilder, ObjectInitializer,
        builtins::{JsFunction, JsPromise},
    },
    property::Attribute,
};
use boa_gc::{Finalize, Trace};
use std::time::Duration;

/// Name of the built-in external module exposing the timer functions
pub const TIMERS_MODULE: &str = "timers";

/// Timer bindings shared by every run
#[derive(Clone)]
pub struct TimerFunctions {
    /// `setTimeout(callback, ms, ...args)`
    pub set_timeout: JsFunction,
    /// `clearTimeout(id)`
    pub clear_timeout: JsFunction,
    /// `setInterval(callback, ms, ...args)`
    pub set_interval: JsFunction,
    /// `clearInterval(id)`
    pub clear_interval: JsFunction,
    /// `sleep(ms)`, a promise fulfilled after `ms`
    pub sleep: JsFunction,
}

#[derive(Trace, Finalize)]
struct TimerCaptures {
    host: Host,
    #[unsafe_ignore_trace]
    repeat: bool,
}

/// Delay in milliseconds as a duration. Non-finite and negative values mean
/// no delay; anything above [`MAX_TIMER_DELAY`] is clamped to it.
fn delay_arg(value: &JsValue, context: &mut Context) -> JsResult<Duration> {
    if value.is_undefined() {
        return Ok(Duration::ZERO);
    }
    let ms = value.to_number(context)?;
    if !(ms.is_finite() && ms > 0.0) {
        return Ok(Duration::ZERO);
    }
    if ms >= MAX_TIMER_DELAY.as_millis() as f64 {
        return Ok(MAX_TIMER_DELAY);
    }
    Ok(Duration::from_secs_f64(ms / 1000.0))
}

fn schedule(
    _this: &JsValue,
    args: &[JsValue],
    captures: &TimerCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let function = args
        .get_or_undefined(0)
        .as_object()
        .and_then(|object| JsFunction::from_object(object.clone()))
        .ok_or_else(|| JsNativeError::typ().with_message("Callback must be a function"))?;
    let delay = delay_arg(args.get_or_undefined(1), context)?;
    let extra = args.get(2..).map(<[JsValue]>::to_vec).unwrap_or_default();

    let host = captures.host.state()?;
    let id = host.event_loop.borrow_mut().set_timer(
        TimerTask::Callback {
            function,
            args: extra,
        },
        delay,
        captures.repeat,
    );
    Ok(JsValue::from(id.0 as f64))
}

fn clear(
    _this: &JsValue,
    args: &[JsValue],
    captures: &TimerCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let id = args.get_or_undefined(0);
    if id.is_undefined() || id.is_null() {
        return Ok(JsValue::undefined());
    }
    let id = id.to_number(context)?;
    if id.is_finite() && id >= 1.0 {
        captures
            .host
            .state()?
            .event_loop
            .borrow_mut()
            .clear_timer(TimerId(id as u64));
    }
    Ok(JsValue::undefined())
}

fn sleep(
    _this: &JsValue,
    args: &[JsValue],
    captures: &TimerCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let delay = delay_arg(args.get_or_undefined(0), context)?;
    let (promise, resolvers) = JsPromise::new_pending(context);
    captures.host.state()?.event_loop.borrow_mut().set_timer(
        TimerTask::Resolve(resolvers.resolve),
        delay,
        false,
    );
    Ok(promise.into())
}

fn build(
    host: &Host,
    repeat: bool,
    function: fn(&JsValue, &[JsValue], &TimerCaptures, &mut Context) -> JsResult<JsValue>,
    name: &'static str,
    length: usize,
    context: &mut Context,
) -> JsFunction {
    let native = NativeFunction::from_copy_closure_with_captures(
        function,
        TimerCaptures {
            host: host.clone(),
            repeat,
        },
    );
    FunctionObjectBuilder::new(context.realm(), native)
        .name(JsString::from(name))
        .length(length)
        .constructor(false)
        .build()
}

/// Create the timer functions bound to `host`
pub fn create_timer_functions(host: &Host, context: &mut Context) -> TimerFunctions {
    TimerFunctions {
        set_timeout: build(host, false, schedule, "setTimeout", 2, context),
        clear_timeout: build(host, false, clear, "clearTimeout", 1, context),
        set_interval: build(host, true, schedule, "setInterval", 2, context),
        clear_interval: build(host, true, clear, "clearInterval", 1, context),
        sleep: build(host, false, sleep, "sleep", 1, context),
    }
}

/// Exports of the `timers` external module
pub fn create_timers_module(functions: &TimerFunctions, context: &mut Context) -> JsObject {
    ObjectInitializer::new(context)
        .property(js_string!("setTimeout"), functions.set_timeout.clone(), Attribute::all())
        .property(js_string!("clearTimeout"), functions.clear_timeout.clone(), Attribute::all())
        .property(js_string!("setInterval"), functions.set_interval.clone(), Attribute::all())
        .property(js_string!("clearInterval"), functions.clear_interval.clone(), Attribute::all())
        .property(js_string!("sleep"), functions.sleep.clone(), Attribute::all())
        .build()
}
