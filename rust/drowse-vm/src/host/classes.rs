//! Standard host classes every engine starts with.

use super::class::HostClass;
use super::proxy::ClosureProxy;
use super::registry::HostRegistry;
use super::types::{HostFault, HostType, HostValue};
use drowse_core::value::{HostObject, KeyValuePair};
use drowse_core::ObjectRef;
use parking_lot::Mutex;
use std::any::Any;
use std::cmp::Ordering;
use std::sync::Arc;

/// Host-side string, the receiver for `String` methods.
pub struct StringObject(pub String);

impl HostObject for StringObject {
    fn type_name(&self) -> &str {
        "String"
    }

    fn describe(&self) -> String {
        self.0.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Default)]
pub struct StringBuilderObject {
    text: Mutex<String>,
}

impl HostObject for StringBuilderObject {
    fn type_name(&self) -> &str {
        "StringBuilder"
    }

    fn describe(&self) -> String {
        self.text.lock().clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn receiver<'a, T: 'static>(object: &'a ObjectRef, class: &str) -> Result<&'a T, HostFault> {
    object
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| HostFault::IllegalArgument(format!("receiver is not a {}", class)))
}

fn arg_str(args: &[HostValue], i: usize) -> String {
    match args.get(i) {
        Some(HostValue::Str(s)) => s.clone(),
        Some(other) => other.render(),
        None => String::new(),
    }
}

fn arg_int(args: &[HostValue], i: usize) -> i64 {
    args.get(i).and_then(HostValue::as_i64).unwrap_or(0)
}

fn arg_float(args: &[HostValue], i: usize) -> f64 {
    args.get(i).and_then(HostValue::as_f64).unwrap_or(0.0)
}

fn char_range(text: &str, from: i64, to: i64) -> Result<String, HostFault> {
    let count = text.chars().count() as i64;
    if from < 0 || to > count || from > to {
        return Err(HostFault::Thrown(format!(
            "StringIndexOutOfBoundsException: begin {}, end {}, length {}",
            from, to, count
        )));
    }
    Ok(text
        .chars()
        .skip(from as usize)
        .take((to - from) as usize)
        .collect())
}

fn math() -> HostClass {
    use HostType::{Double, Long};
    HostClass::new("Math")
        .static_field("PI", Double, HostValue::Float(std::f64::consts::PI))
        .static_field("E", Double, HostValue::Float(std::f64::consts::E))
        .static_method("abs", vec![Long], Long, |a| Ok(HostValue::Int(arg_int(&a, 0).wrapping_abs())))
        .static_method("abs", vec![Double], Double, |a| Ok(HostValue::Float(arg_float(&a, 0).abs())))
        .static_method("max", vec![Long, Long], Long, |a| {
            Ok(HostValue::Int(arg_int(&a, 0).max(arg_int(&a, 1))))
        })
        .static_method("max", vec![Double, Double], Double, |a| {
            Ok(HostValue::Float(arg_float(&a, 0).max(arg_float(&a, 1))))
        })
        .static_method("min", vec![Long, Long], Long, |a| {
            Ok(HostValue::Int(arg_int(&a, 0).min(arg_int(&a, 1))))
        })
        .static_method("min", vec![Double, Double], Double, |a| {
            Ok(HostValue::Float(arg_float(&a, 0).min(arg_float(&a, 1))))
        })
        .static_method("pow", vec![Double, Double], Double, |a| {
            Ok(HostValue::Float(arg_float(&a, 0).powf(arg_float(&a, 1))))
        })
        .static_method("sqrt", vec![Double], Double, |a| Ok(HostValue::Float(arg_float(&a, 0).sqrt())))
}

fn integer() -> HostClass {
    HostClass::new("Integer")
        .static_field("MAX_VALUE", HostType::Int, HostValue::Int(i32::MAX as i64))
        .static_field("MIN_VALUE", HostType::Int, HostValue::Int(i32::MIN as i64))
        .static_method("parseInt", vec![HostType::Str], HostType::Int, |a| {
            let text = arg_str(&a, 0);
            text.trim()
                .parse::<i32>()
                .map(|n| HostValue::Int(n as i64))
                .map_err(|_| HostFault::Thrown(format!("NumberFormatException: For input string: \"{}\"", text)))
        })
        .static_method("toHexString", vec![HostType::Int], HostType::Str, |a| {
            Ok(HostValue::Str(format!("{:x}", arg_int(&a, 0) as i32)))
        })
}

fn string() -> HostClass {
    use HostType::{Char, Int, Object, Str};
    HostClass::new("String")
        .constructor(vec![], |_| Ok(HostValue::Object(Arc::new(StringObject(String::new())))))
        .constructor(vec![Str], |a| Ok(HostValue::Object(Arc::new(StringObject(arg_str(&a, 0))))))
        .method("length", vec![], Int, |r, _| {
            Ok(HostValue::Int(receiver::<StringObject>(r, "String")?.0.chars().count() as i64))
        })
        .method("toUpperCase", vec![], Str, |r, _| {
            Ok(HostValue::Str(receiver::<StringObject>(r, "String")?.0.to_uppercase()))
        })
        .method("toLowerCase", vec![], Str, |r, _| {
            Ok(HostValue::Str(receiver::<StringObject>(r, "String")?.0.to_lowercase()))
        })
        .method("trim", vec![], Str, |r, _| {
            Ok(HostValue::Str(receiver::<StringObject>(r, "String")?.0.trim().to_string()))
        })
        .method("substring", vec![Int], Str, |r, a| {
            let text = &receiver::<StringObject>(r, "String")?.0;
            let end = text.chars().count() as i64;
            char_range(text, arg_int(&a, 0), end).map(HostValue::Str)
        })
        .method("substring", vec![Int, Int], Str, |r, a| {
            let text = &receiver::<StringObject>(r, "String")?.0;
            char_range(text, arg_int(&a, 0), arg_int(&a, 1)).map(HostValue::Str)
        })
        .method("indexOf", vec![Str], Int, |r, a| {
            let text = &receiver::<StringObject>(r, "String")?.0;
            let needle = arg_str(&a, 0);
            Ok(HostValue::Int(match text.find(&needle) {
                Some(byte) => text[..byte].chars().count() as i64,
                None => -1,
            }))
        })
        .method("charAt", vec![Int], Char, |r, a| {
            let text = &receiver::<StringObject>(r, "String")?.0;
            let index = arg_int(&a, 0);
            usize::try_from(index)
                .ok()
                .and_then(|i| text.chars().nth(i))
                .map(HostValue::Char)
                .ok_or_else(|| HostFault::Thrown(format!("StringIndexOutOfBoundsException: index {}", index)))
        })
        .method("startsWith", vec![Str], HostType::Boolean, |r, a| {
            Ok(HostValue::Bool(receiver::<StringObject>(r, "String")?.0.starts_with(&arg_str(&a, 0))))
        })
        .method("equals", vec![Object], HostType::Boolean, |r, a| {
            let text = &receiver::<StringObject>(r, "String")?.0;
            Ok(HostValue::Bool(match a.first() {
                Some(HostValue::Str(other)) => other == text,
                Some(HostValue::Object(o)) => o
                    .as_any()
                    .downcast_ref::<StringObject>()
                    .is_some_and(|s| &s.0 == text),
                _ => false,
            }))
        })
        .method("toString", vec![], Str, |r, _| {
            Ok(HostValue::Str(receiver::<StringObject>(r, "String")?.0.clone()))
        })
}

fn string_builder() -> HostClass {
    use HostType::{Char, Double, Int, Long, Object, Str};
    fn append(r: &ObjectRef, text: String) -> Result<HostValue, HostFault> {
        receiver::<StringBuilderObject>(r, "StringBuilder")?
            .text
            .lock()
            .push_str(&text);
        Ok(HostValue::Object(r.clone()))
    }
    let this = HostType::class("StringBuilder");
    HostClass::new("StringBuilder")
        .constructor(vec![], |_| Ok(HostValue::Object(Arc::new(StringBuilderObject::default()))))
        .constructor(vec![Str], |a| {
            Ok(HostValue::Object(Arc::new(StringBuilderObject {
                text: Mutex::new(arg_str(&a, 0)),
            })))
        })
        .constructor(vec![Int], |a| {
            let capacity = usize::try_from(arg_int(&a, 0))
                .map_err(|_| HostFault::Thrown("NegativeArraySizeException".into()))?;
            Ok(HostValue::Object(Arc::new(StringBuilderObject {
                text: Mutex::new(String::with_capacity(capacity)),
            })))
        })
        .method("append", vec![Str], this.clone(), |r, a| append(r, arg_str(&a, 0)))
        .method("append", vec![Char], this.clone(), |r, a| append(r, arg_str(&a, 0)))
        .method("append", vec![Long], this.clone(), |r, a| append(r, arg_int(&a, 0).to_string()))
        .method("append", vec![Double], this.clone(), |r, a| {
            append(r, HostValue::Float(arg_float(&a, 0)).render())
        })
        .method("append", vec![Object], this, |r, a| append(r, arg_str(&a, 0)))
        .method("length", vec![], Int, |r, _| {
            let builder = receiver::<StringBuilderObject>(r, "StringBuilder")?;
            let length = builder.text.lock().chars().count();
            Ok(HostValue::Int(length as i64))
        })
        .method("reverse", vec![], HostType::class("StringBuilder"), |r, _| {
            let builder = receiver::<StringBuilderObject>(r, "StringBuilder")?;
            let mut text = builder.text.lock();
            *text = text.chars().rev().collect();
            Ok(HostValue::Object(r.clone()))
        })
        .method("toString", vec![], Str, |r, _| {
            let builder = receiver::<StringBuilderObject>(r, "StringBuilder")?;
            let text = builder.text.lock().clone();
            Ok(HostValue::Str(text))
        })
}

fn key_value_pair(registry: &Arc<HostRegistry>) -> HostClass {
    let keys = Arc::downgrade(registry);
    let values = Arc::downgrade(registry);
    HostClass::new("KeyValuePair")
        .method("getKey", vec![], HostType::Object, move |r, _| {
            let registry = keys
                .upgrade()
                .ok_or_else(|| HostFault::Fatal("host registry was dropped".into()))?;
            super::marshal::natural(&receiver::<KeyValuePair>(r, "KeyValuePair")?.key, &registry)
        })
        .method("getValue", vec![], HostType::Object, move |r, _| {
            let registry = values
                .upgrade()
                .ok_or_else(|| HostFault::Fatal("host registry was dropped".into()))?;
            super::marshal::natural(&receiver::<KeyValuePair>(r, "KeyValuePair")?.value, &registry)
        })
}

fn compare(comparator: &ObjectRef, a: &HostValue, b: &HostValue) -> Result<Ordering, HostFault> {
    let proxy = comparator
        .as_any()
        .downcast_ref::<ClosureProxy>()
        .ok_or_else(|| HostFault::IllegalArgument("comparator is not callable".into()))?;
    let verdict = proxy.invoke("compare", vec![a.clone(), b.clone()])?;
    Ok(verdict.as_i64().unwrap_or(0).cmp(&0))
}

/// Stable merge sort that stops at the first comparator failure.
fn sort_with(items: Vec<HostValue>, comparator: &ObjectRef) -> Result<Vec<HostValue>, HostFault> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let mut left = items;
    let right = left.split_off(left.len() / 2);
    let left = sort_with(left, comparator)?;
    let right = sort_with(right, comparator)?;
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut right = right.into_iter().peekable();
    for item in left {
        while let Some(next) = right.peek() {
            if compare(comparator, next, &item)? == Ordering::Less {
                merged.extend(right.next());
            } else {
                break;
            }
        }
        merged.push(item);
    }
    merged.extend(right);
    Ok(merged)
}

fn collections() -> HostClass {
    let comparator = HostType::class("Comparator");
    HostClass::new("Collections")
        .static_method(
            "sort",
            vec![HostType::Collection, comparator],
            HostType::Collection,
            |mut a| {
                let comparator = match a.pop() {
                    Some(HostValue::Object(o)) => o,
                    _ => return Err(HostFault::IllegalArgument("a Comparator is required".into())),
                };
                match a.pop() {
                    Some(HostValue::List(items)) | Some(HostValue::Array(items)) => {
                        Ok(HostValue::List(sort_with(items, &comparator)?))
                    }
                    _ => Ok(HostValue::Null),
                }
            },
        )
        .static_method("reverse", vec![HostType::Collection], HostType::Collection, |mut a| {
            match a.pop() {
                Some(HostValue::List(mut items)) | Some(HostValue::Array(mut items)) => {
                    items.reverse();
                    Ok(HostValue::List(items))
                }
                _ => Ok(HostValue::Null),
            }
        })
}

pub(crate) fn install(registry: &Arc<HostRegistry>) {
    registry.register(
        HostClass::interface("Comparator").abstract_method(
            "compare",
            vec![HostType::Object, HostType::Object],
            HostType::Int,
        ),
    );
    registry.register(HostClass::interface("Runnable").abstract_method("run", vec![], HostType::Void));
    registry.register(math());
    registry.register(integer());
    registry.register(string());
    registry.register(string_builder());
    registry.register(key_value_pair(registry));
    registry.register(collections());
}
