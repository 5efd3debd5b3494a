//! Overload resolution.
//!
//! Each argument is scored against each declared parameter type. The first
//! candidate, in declaration order, on which every argument scores `Yes`
//! wins outright. Otherwise the candidate with the most `Yes` scores wins,
//! ties going to the more specific parameter types and then to the earlier
//! declaration. A candidate with any `No` is never chosen.

use super::class::HostMethod;
use super::registry::HostRegistry;
use super::types::HostType;
use drowse_core::{Scalar, ScalarValue};
use std::cmp::Reverse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Match {
    No,
    Maybe,
    Yes,
}

pub fn score(value: &Scalar, ty: &HostType, registry: &HostRegistry) -> Match {
    let held = value.get();
    match (held.inner(), ty) {
        (_, HostType::Void) => Match::No,
        (ScalarValue::Null, ty) if ty.is_primitive() => Match::Maybe,
        (ScalarValue::Null, _) => Match::Yes,

        (ScalarValue::Int(_), HostType::Long) => Match::Yes,
        (ScalarValue::Int(_), ty) if ty.is_numeric() => Match::Maybe,
        (ScalarValue::Int(_), HostType::Object) => Match::Maybe,
        (ScalarValue::Int(_), _) => Match::No,

        (ScalarValue::Float(_), HostType::Double) => Match::Yes,
        (ScalarValue::Float(_), ty) if ty.is_numeric() => Match::Maybe,
        (ScalarValue::Float(_), HostType::Object) => Match::Maybe,
        (ScalarValue::Float(_), _) => Match::No,

        (ScalarValue::Str(_), HostType::Str) => Match::Yes,
        (ScalarValue::Str(_), HostType::Class(name)) if name == "String" => Match::Yes,
        (ScalarValue::Str(s), HostType::Char) if s.chars().count() == 1 => Match::Maybe,
        (ScalarValue::Str(_), ty) if !ty.is_primitive() => Match::Maybe,
        (ScalarValue::Str(_), _) => Match::No,

        (ScalarValue::Array(_), HostType::Array(_) | HostType::Collection) => Match::Yes,
        (ScalarValue::Array(_), HostType::Object) => Match::Maybe,
        (ScalarValue::Hash(_), HostType::Map) => Match::Yes,
        (ScalarValue::Hash(_), HostType::Object) => Match::Maybe,
        (ScalarValue::Array(_) | ScalarValue::Hash(_), _) => Match::No,

        (ScalarValue::Closure(_), HostType::Class(name)) if registry.is_interface(name) => Match::Yes,
        (ScalarValue::Closure(_), HostType::Object) => Match::Maybe,
        (ScalarValue::Closure(_), _) => Match::No,

        (ScalarValue::Object(_), HostType::Object) => Match::Yes,
        (ScalarValue::Object(object), HostType::Class(name)) => {
            if registry.is_assignable(object.type_name(), name) {
                Match::Yes
            } else {
                Match::No
            }
        }
        (ScalarValue::Object(_), _) => Match::No,

        (ScalarValue::Tainted(_), _) => Match::No,
    }
}

/// Choose the method to call for `args` among `candidates`.
pub fn resolve<'a>(candidates: &'a [HostMethod], args: &[Scalar], registry: &HostRegistry) -> Option<&'a HostMethod> {
    let scored: Vec<(usize, &HostMethod, Vec<Match>)> = candidates
        .iter()
        .enumerate()
        .filter(|(_, m)| m.params.len() == args.len())
        .map(|(i, m)| {
            let scores: Vec<Match> = args
                .iter()
                .zip(&m.params)
                .map(|(arg, ty)| score(arg, ty, registry))
                .collect();
            (i, m, scores)
        })
        .filter(|(_, _, scores)| !scores.contains(&Match::No))
        .collect();

    if let Some((_, method, _)) = scored
        .iter()
        .find(|(_, _, scores)| scores.iter().all(|s| *s == Match::Yes))
    {
        return Some(*method);
    }
    scored
        .iter()
        .max_by_key(|(i, m, scores)| {
            let exact = scores.iter().filter(|s| **s == Match::Yes).count();
            let specific: u32 = m.params.iter().map(HostType::specificity).sum();
            (exact, specific, Reverse(*i))
        })
        .map(|(_, m, _)| *m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostClass, HostValue};

    fn overloads(order: &[HostType]) -> Vec<HostMethod> {
        let mut class = HostClass::new("T");
        for ty in order {
            let label = ty.to_string();
            class = class.static_method("f", vec![ty.clone()], HostType::Str, move |_| {
                Ok(HostValue::Str(label.clone()))
            });
        }
        class.methods().to_vec()
    }

    #[test]
    fn test_string_overload_wins_in_either_order() {
        let registry = HostRegistry::new();
        let arg = [Scalar::string("x")];
        for order in [[HostType::Object, HostType::Str], [HostType::Str, HostType::Object]] {
            let methods = overloads(&order);
            let chosen = resolve(&methods, &arg, &registry).unwrap();
            assert_eq!(chosen.params, vec![HostType::Str]);
        }
    }

    #[test]
    fn test_int_prefers_long() {
        let registry = HostRegistry::new();
        let methods = overloads(&[HostType::Double, HostType::Int, HostType::Long]);
        let chosen = resolve(&methods, &[Scalar::int(3)], &registry).unwrap();
        assert_eq!(chosen.params, vec![HostType::Long]);
    }

    #[test]
    fn test_maybe_ties_break_on_specificity_then_order() {
        let registry = HostRegistry::new();
        let methods = overloads(&[HostType::Object, HostType::Int, HostType::Short]);
        let chosen = resolve(&methods, &[Scalar::int(3)], &registry).unwrap();
        assert_eq!(chosen.params, vec![HostType::Int]);
    }

    #[test]
    fn test_no_candidate_for_mismatch() {
        let registry = HostRegistry::new();
        let methods = overloads(&[HostType::Long]);
        assert!(resolve(&methods, &[Scalar::new_array()], &registry).is_none());
        assert!(resolve(&methods, &[], &registry).is_none());
    }

    #[test]
    fn test_null_scores() {
        let registry = HostRegistry::new();
        assert_eq!(score(&Scalar::null(), &HostType::Str, &registry), Match::Yes);
        assert_eq!(score(&Scalar::null(), &HostType::Long, &registry), Match::Maybe);
    }
}
