// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Structural difference between two reactor snapshots, expressed as an RFC 6902 JSON Patch.

use serde_json::{json, Map, Value};

/// Computes the patch turning `before` into `after`.
///
/// Only `add`, `remove` and `replace` operations are produced. Array elements beyond the
/// common length are removed from the back, so every emitted index is valid at the time the
/// operation is applied.
pub fn heap_diff(before: &Value, after: &Value) -> Value {
    let mut ops = Vec::new();
    diff_into(&mut ops, String::new(), before, after);
    Value::Array(ops)
}

fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn diff_into(ops: &mut Vec<Value>, path: String, before: &Value, after: &Value) {
    if before == after {
        return;
    }
    match (before, after) {
        (Value::Object(before), Value::Object(after)) => diff_objects(ops, &path, before, after),
        (Value::Array(before), Value::Array(after)) => {
            let common = before.len().min(after.len());
            for (i, (b, a)) in before.iter().zip(after).enumerate() {
                diff_into(ops, format!("{path}/{i}"), b, a);
            }
            for (i, value) in after.iter().enumerate().skip(common) {
                ops.push(json!({"op": "add", "path": format!("{path}/{i}"), "value": value}));
            }
            for i in (common..before.len()).rev() {
                ops.push(json!({"op": "remove", "path": format!("{path}/{i}")}));
            }
        }
        _ => ops.push(json!({"op": "replace", "path": path, "value": after})),
    }
}

fn diff_objects(
    ops: &mut Vec<Value>,
    path: &str,
    before: &Map<String, Value>,
    after: &Map<String, Value>,
) {
    for (key, old) in before {
        let child = format!("{path}/{}", escape(key));
        match after.get(key) {
            Some(new) => diff_into(ops, child, old, new),
            None => ops.push(json!({"op": "remove", "path": child})),
        }
    }
    for (key, new) in after {
        if !before.contains_key(key) {
            ops.push(json!({"op": "add", "path": format!("{path}/{}", escape(key)), "value": new}));
        }
    }
}
