//! Taint marking helpers shared by the taint layer and the library.

use super::{KeyValuePair, Scalar, ScalarValue};
use std::collections::HashSet;
use std::sync::Arc;

/// Mark `value` tainted along with every element, map value and key/value
/// pair reachable from it. Self-referential containers are visited once.
pub fn taint_deep(value: &Scalar) {
    let mut seen = HashSet::new();
    taint_walk(value, &mut seen);
}

fn taint_walk(value: &Scalar, seen: &mut HashSet<usize>) {
    if !seen.insert(value.id()) {
        return;
    }
    value.taint();
    match value.get().inner() {
        ScalarValue::Array(array) => {
            if !seen.insert(Arc::as_ptr(array) as *const () as usize) {
                return;
            }
            for item in array.snapshot().unwrap_or_default() {
                taint_walk(&item, seen);
            }
        }
        ScalarValue::Hash(map) => {
            if !seen.insert(Arc::as_ptr(map) as *const () as usize) {
                return;
            }
            for (_, item) in map.entries() {
                taint_walk(&item, seen);
            }
        }
        ScalarValue::Object(object) => {
            if let Some(pair) = object.as_any().downcast_ref::<KeyValuePair>() {
                taint_walk(&pair.key, seen);
                taint_walk(&pair.value, seen);
            }
        }
        _ => {}
    }
}

/// Strip the taint decorator from `value` only.
pub fn sanitize(value: &Scalar) {
    value.untaint();
}

/// Strip taint from `value` and everything reachable from it.
pub fn sanitize_deep(value: &Scalar) {
    let mut seen = HashSet::new();
    sanitize_walk(value, &mut seen);
}

fn sanitize_walk(value: &Scalar, seen: &mut HashSet<usize>) {
    if !seen.insert(value.id()) {
        return;
    }
    value.untaint();
    match value.get() {
        ScalarValue::Array(array) => {
            for item in array.snapshot().unwrap_or_default() {
                sanitize_walk(&item, seen);
            }
        }
        ScalarValue::Hash(map) => {
            for (_, item) in map.entries() {
                sanitize_walk(&item, seen);
            }
        }
        _ => {}
    }
}

pub fn any_tainted<'a>(values: impl IntoIterator<Item = &'a Scalar>) -> bool {
    values.into_iter().any(|v| v.is_tainted())
}
