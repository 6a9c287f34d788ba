// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Scoped `require()`, `require.async()` and `require.resolve()`

use super::resolver::{Specifier, resolve_key};
use crate::error::RuntimeError;
use crate::runtime::{Host, Waiter};
use boa_engine::{
    Context, JsArgs, JsNativeError, JsResult, JsString, JsValue, NativeFunction, js_string,
    object::{
        FunctionObjectBuilder,
        builtins::{JsFunction, JsPromise},
    },
};
use boa_gc::{Finalize, Trace};

#[derive(Trace, Finalize)]
struct RequireCaptures {
    host: Host,
    #[unsafe_ignore_trace]
    identity: String,
}

fn specifier_arg(args: &[JsValue]) -> JsResult<String> {
    args.get_or_undefined(0)
        .as_string()
        .map(JsString::to_std_string_escaped)
        .ok_or_else(|| {
            JsNativeError::typ()
                .with_message("The module specifier must be a string")
                .into()
        })
}

fn require(
    _this: &JsValue,
    args: &[JsValue],
    captures: &RequireCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let specifier = specifier_arg(args)?;
    let host = captures.host.state()?;
    let resolved = host
        .registry
        .borrow()
        .resolve(&captures.identity, &specifier);
    resolved.map_err(|err| {
        tracing::debug!("{}: require('{}') failed: {}", captures.identity, specifier, err);
        err.to_js_error(context)
    })
}

fn require_async(
    _this: &JsValue,
    args: &[JsValue],
    captures: &RequireCaptures,
    context: &mut Context,
) -> JsResult<JsValue> {
    let (promise, resolvers) = JsPromise::new_pending(context);
    let waiter = Waiter {
        resolve: resolvers.resolve,
        reject: resolvers.reject,
    };

    let specifier = match specifier_arg(args) {
        Ok(specifier) => specifier,
        Err(err) => {
            let reason = err.to_opaque(context);
            waiter.reject.call(&JsValue::undefined(), &[reason], context)?;
            return Ok(promise.into());
        }
    };
    let host = captures.host.state()?;

    let outcome = match Specifier::parse(&specifier) {
        Specifier::Remote(url) => {
            let cached = host.registry.borrow().url(url);
            match cached {
                Some(exports) => {
                    tracing::debug!("require.async('{}') -> URL cache hit", url);
                    Ok(exports)
                }
                None if host.is_loading(url) => Err(RuntimeError::CircularDependency(url.to_string())),
                None => {
                    let first = host.event_loop.borrow_mut().queue_url_load(url, waiter);
                    if first {
                        tracing::debug!("require.async('{}') -> queued fetch", url);
                    } else {
                        tracing::debug!("require.async('{}') -> joined queued fetch", url);
                    }
                    return Ok(promise.into());
                }
            }
        }
        Specifier::Relative(_) | Specifier::Bare(_) => host
            .registry
            .borrow()
            .resolve(&captures.identity, &specifier),
    };

    match outcome {
        Ok(value) => {
            waiter.resolve.call(&JsValue::undefined(), &[value], context)?;
        }
        Err(err) => {
            let reason = err.to_js_error(context).to_opaque(context);
            waiter.reject.call(&JsValue::undefined(), &[reason], context)?;
        }
    }
    Ok(promise.into())
}

fn require_resolve(
    _this: &JsValue,
    args: &[JsValue],
    captures: &RequireCaptures,
    _context: &mut Context,
) -> JsResult<JsValue> {
    let specifier = specifier_arg(args)?;
    Ok(JsString::from(resolve_key(&captures.identity, &specifier).as_str()).into())
}

fn function(
    host: &Host,
    identity: &str,
    body: fn(&JsValue, &[JsValue], &RequireCaptures, &mut Context) -> JsResult<JsValue>,
    name: JsString,
    context: &mut Context,
) -> JsFunction {
    let native = NativeFunction::from_copy_closure_with_captures(
        body,
        RequireCaptures {
            host: host.clone(),
            identity: identity.to_string(),
        },
    );
    FunctionObjectBuilder::new(context.realm(), native)
        .name(name)
        .length(1)
        .constructor(false)
        .build()
}

/// Build the `require` function of a unit running as `identity`.
///
/// Synchronous lookups consult external modules first, then the module cache
/// with relative specifiers resolved against `identity`. Remote URLs are
/// only reachable through `require.async`, which defers uncached URLs to the
/// runtime's event loop.
pub fn create_require(host: &Host, identity: &str, context: &mut Context) -> JsResult<JsFunction> {
    let require_fn = function(host, identity, require, js_string!("require"), context);
    let async_fn = function(host, identity, require_async, js_string!("async"), context);
    let resolve_fn = function(host, identity, require_resolve, js_string!("resolve"), context);

    require_fn.set(js_string!("async"), async_fn, false, context)?;
    require_fn.set(js_string!("resolve"), resolve_fn, false, context)?;
    Ok(require_fn)
}
