// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! `Auxiliary` helper object handed to every script
//!
//! Values cross the boundary as JSON, so functions and `undefined` members
//! are not compared.

use boa_engine::{
    Context, JsArgs, JsNativeError, JsObject, JsResult, JsValue, NativeFunction, js_string,
    object::ObjectInitializer,
};
use serde_json::{Map, Value, json};

/// Shallow difference between two objects.
///
/// `added` holds keys only in `right`, `deleted` keys only in `left`, and
/// `updated` keys present in both whose values are not deeply equal.
pub fn object_difference(left: &Map<String, Value>, right: &Map<String, Value>) -> Value {
    let mut added = Map::new();
    let mut deleted = Map::new();
    let mut updated = Map::new();

    for (key, to) in right {
        match left.get(key) {
            None => {
                added.insert(key.clone(), to.clone());
            }
            Some(from) if from != to => {
                updated.insert(key.clone(), json!({ "from": from, "to": to }));
            }
            Some(_) => {}
        }
    }
    for (key, from) in left {
        if !right.contains_key(key) {
            deleted.insert(key.clone(), from.clone());
        }
    }

    json!({ "added": added, "deleted": deleted, "updated": updated })
}

/// Keys of `left` whose value differs from `right`.
///
/// Nested objects on both sides are compared recursively; any other
/// difference keeps `left`'s value.
pub fn deep_object_difference(left: &Map<String, Value>, right: &Map<String, Value>) -> Map<String, Value> {
    let mut result = Map::new();
    for (key, value) in left {
        let other = right.get(key);
        if other == Some(value) {
            continue;
        }
        let diff = match (value, other) {
            (Value::Object(nested), Some(Value::Object(other_nested))) => {
                Value::Object(deep_object_difference(nested, other_nested))
            }
            _ => value.clone(),
        };
        result.insert(key.clone(), diff);
    }
    result
}

fn object_arg(value: &JsValue, context: &mut Context) -> JsResult<Map<String, Value>> {
    if value.is_undefined() || value.is_null() {
        return Ok(Map::new());
    }
    match value.to_json(context)? {
        Value::Object(map) => Ok(map),
        _ => Err(JsNativeError::typ()
            .with_message("Auxiliary expects plain objects")
            .into()),
    }
}

fn obj_difference(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let left = object_arg(args.get_or_undefined(0), context)?;
    let right = object_arg(args.get_or_undefined(1), context)?;
    JsValue::from_json(&object_difference(&left, &right), context)
}

fn deep_obj_difference(
    _this: &JsValue,
    args: &[JsValue],
    context: &mut Context,
) -> JsResult<JsValue> {
    let left = object_arg(args.get_or_undefined(0), context)?;
    let right = object_arg(args.get_or_undefined(1), context)?;
    JsValue::from_json(&Value::Object(deep_object_difference(&left, &right)), context)
}

/// Build the `Auxiliary` object
pub fn create_auxiliary(context: &mut Context) -> JsObject {
    ObjectInitializer::new(context)
        .function(
            NativeFunction::from_fn_ptr(obj_difference),
            js_string!("objDifference"),
            2,
        )
        .function(
            NativeFunction::from_fn_ptr(deep_obj_difference),
            js_string!("deepObjDifference"),
            2,
        )
        .build()
}
