use super::operators::numeric_order;
use super::strings::pattern;
use crate::context::Context;
use crate::env::Environment;
use drowse_core::{EngineError, Scalar, ScalarValue};
use std::cmp::Ordering;
use std::sync::Arc;

fn pair(name: &str, args: &[Scalar]) -> Result<(Scalar, Scalar), EngineError> {
    match args {
        [lhs, rhs] => Ok((lhs.clone(), rhs.clone())),
        _ => Err(EngineError::runtime(format!(
            "predicate {} expects 2 operands, got {}",
            name,
            args.len()
        ))),
    }
}

fn single(name: &str, args: &[Scalar]) -> Result<Scalar, EngineError> {
    match args {
        [value] => Ok(value.clone()),
        _ => Err(EngineError::runtime(format!(
            "predicate {} expects 1 operand, got {}",
            name,
            args.len()
        ))),
    }
}

fn numeric(name: &str, _: &mut Context, args: Vec<Scalar>) -> Result<bool, EngineError> {
    let (lhs, rhs) = pair(name, &args)?;
    let order = numeric_order(&lhs, &rhs);
    Ok(match name {
        "==" => order == Ordering::Equal,
        "!=" => order != Ordering::Equal,
        "<" => order == Ordering::Less,
        ">" => order == Ordering::Greater,
        "<=" => order != Ordering::Greater,
        ">=" => order != Ordering::Less,
        _ => return Err(EngineError::runtime(format!("unknown predicate '{}'", name))),
    })
}

fn textual(name: &str, _: &mut Context, args: Vec<Scalar>) -> Result<bool, EngineError> {
    let (lhs, rhs) = pair(name, &args)?;
    let order = lhs.as_string().cmp(&rhs.as_string());
    Ok(match name {
        "eq" => order == Ordering::Equal,
        "ne" => order != Ordering::Equal,
        "lt" => order == Ordering::Less,
        "gt" => order == Ordering::Greater,
        _ => return Err(EngineError::runtime(format!("unknown predicate '{}'", name))),
    })
}

/// Reference identity for shared values, cell identity otherwise.
fn identical(lhs: &Scalar, rhs: &Scalar) -> bool {
    let (a, b) = (lhs.get(), rhs.get());
    match (a.inner(), b.inner()) {
        (ScalarValue::Array(x), ScalarValue::Array(y)) => Arc::ptr_eq(x, y),
        (ScalarValue::Hash(x), ScalarValue::Hash(y)) => Arc::ptr_eq(x, y),
        (ScalarValue::Object(x), ScalarValue::Object(y)) => {
            std::ptr::eq(Arc::as_ptr(x) as *const (), Arc::as_ptr(y) as *const ())
        }
        (ScalarValue::Closure(x), ScalarValue::Closure(y)) => {
            std::ptr::eq(Arc::as_ptr(x) as *const (), Arc::as_ptr(y) as *const ())
        }
        _ => lhs.same_cell(rhs),
    }
}

/// `*` matches any run of characters, `?` exactly one.
pub(crate) fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}

fn type_check(name: &str, _: &mut Context, args: Vec<Scalar>) -> Result<bool, EngineError> {
    let value = single(name, &args)?;
    let held = value.get();
    Ok(match name {
        "-istrue" => held.is_truthy(),
        "-isarray" => matches!(held.inner(), ScalarValue::Array(_)),
        "-ishash" => matches!(held.inner(), ScalarValue::Hash(_)),
        "-isfunction" => matches!(held.inner(), ScalarValue::Closure(_)),
        "-isnumber" => held.is_number(),
        "-isnull" => held.is_null(),
        "-istainted" => value.is_tainted(),
        _ => return Err(EngineError::runtime(format!("unknown predicate '{}'", name))),
    })
}

pub(super) fn install(env: &Environment) {
    for name in ["==", "!=", "<", ">", "<=", ">="] {
        env.define_predicate(name, numeric);
    }
    for name in ["eq", "ne", "lt", "gt"] {
        env.define_predicate(name, textual);
    }
    for name in [
        "-istrue",
        "-isarray",
        "-ishash",
        "-isfunction",
        "-isnumber",
        "-isnull",
        "-istainted",
    ] {
        env.define_predicate(name, type_check);
    }

    env.define_predicate("is", |name: &str, _: &mut Context, args: Vec<Scalar>| -> Result<bool, EngineError> {
        let (lhs, rhs) = pair(name, &args)?;
        Ok(identical(&lhs, &rhs))
    });

    // "ell" isin "hello"; with an array on the right, membership.
    env.define_predicate("isin", |name: &str, _: &mut Context, args: Vec<Scalar>| -> Result<bool, EngineError> {
        let (needle, haystack) = pair(name, &args)?;
        let needle = needle.as_string();
        match haystack.as_array() {
            Some(list) => Ok(list.snapshot()?.iter().any(|item| item.as_string() == needle)),
            None => Ok(haystack.as_string().contains(&needle)),
        }
    });

    // "a*c" iswm "abc"
    env.define_predicate("iswm", |name: &str, _: &mut Context, args: Vec<Scalar>| -> Result<bool, EngineError> {
        let (pattern, text) = pair(name, &args)?;
        Ok(wildcard_match(&pattern.as_string(), &text.as_string()))
    });

    // "abc" ismatch "a.c" matches the whole string.
    env.define_predicate("ismatch", |name: &str, _: &mut Context, args: Vec<Scalar>| -> Result<bool, EngineError> {
        let (text, regex) = pair(name, &args)?;
        let regex = pattern(&format!("^(?:{})$", regex.as_string()))?;
        Ok(regex.is_match(&text.as_string()))
    });

    // %hash -haskey "key"
    env.define_predicate("-haskey", |name: &str, _: &mut Context, args: Vec<Scalar>| -> Result<bool, EngineError> {
        let (map, key) = pair(name, &args)?;
        let map = map.as_hash().ok_or_else(|| {
            EngineError::bad_cast(format!("{} expects a hash, got {}", name, map.type_name()))
        })?;
        Ok(map.peek(&key.as_string()).is_some_and(|v| !v.is_null()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards() {
        assert!(wildcard_match("a*c", "abbbc"));
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("h?llo", "hello"));
        assert!(!wildcard_match("h?llo", "hllo"));
        assert!(wildcard_match("*.rs", "main.rs"));
        assert!(!wildcard_match("*.rs", "main.rsx"));
    }

    #[test]
    fn test_identity_of_shared_values() {
        let list = Scalar::new_array();
        let alias = Scalar::new(list.get());
        assert!(identical(&list, &alias));
        assert!(!identical(&Scalar::int(1), &Scalar::int(1)));
        let cell = Scalar::int(1);
        assert!(identical(&cell, &cell.clone()));
    }
}
