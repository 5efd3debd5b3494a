//! Conversion between scalars and host values.
//!
//! Declared primitive parameters always receive the converted primitive.
//! A closure passed where an interface is declared is wrapped in a
//! [`ClosureProxy`]; the proxy unwraps back to the closure on return.

use super::proxy::ClosureProxy;
use super::registry::HostRegistry;
use super::types::{HostFault, HostType, HostValue};
use drowse_core::value::MapOrder;
use drowse_core::{Scalar, ScalarValue};
use std::sync::Arc;

pub fn to_host(value: &Scalar, ty: &HostType, registry: &Arc<HostRegistry>) -> Result<HostValue, HostFault> {
    let held = value.get();
    let inner = held.inner();
    if inner.is_null() {
        return Ok(match ty {
            HostType::Boolean => HostValue::Bool(false),
            HostType::Char => HostValue::Char('\0'),
            HostType::Float | HostType::Double => HostValue::Float(0.0),
            ty if ty.is_numeric() => HostValue::Int(0),
            _ => HostValue::Null,
        });
    }
    match ty {
        HostType::Void => Ok(HostValue::Null),
        HostType::Boolean => Ok(HostValue::Bool(inner.is_truthy())),
        HostType::Char => inner
            .as_string()
            .chars()
            .next()
            .map(HostValue::Char)
            .ok_or_else(|| HostFault::IllegalArgument("empty string where a char is declared".into())),
        HostType::Byte => Ok(HostValue::Int(inner.as_int() as i8 as i64)),
        HostType::Short => Ok(HostValue::Int(inner.as_int() as i16 as i64)),
        HostType::Int => Ok(HostValue::Int(inner.as_int() as i32 as i64)),
        HostType::Long => Ok(HostValue::Int(inner.as_int())),
        HostType::Float => Ok(HostValue::Float(inner.as_float() as f32 as f64)),
        HostType::Double => Ok(HostValue::Float(inner.as_float())),
        HostType::Str => Ok(HostValue::Str(inner.as_string())),
        HostType::Array(element) => match inner {
            ScalarValue::Array(array) => Ok(HostValue::Array(
                array
                    .snapshot()
                    .map_err(|e| HostFault::IllegalArgument(e.to_string()))?
                    .iter()
                    .map(|item| to_host(item, element, registry))
                    .collect::<Result<_, _>>()?,
            )),
            other => Err(HostFault::IllegalArgument(format!(
                "{} given where {} is declared",
                other.type_name(),
                ty
            ))),
        },
        HostType::Class(name) => match inner {
            ScalarValue::Closure(function) if registry.is_interface(name) => Ok(HostValue::Object(Arc::new(
                ClosureProxy::new(function.clone(), name, registry),
            ))),
            ScalarValue::Str(s) if name == "String" => Ok(HostValue::Str(s.clone())),
            _ => natural(value, registry),
        },
        HostType::Object | HostType::Collection | HostType::Map => natural(value, registry),
    }
}

/// The host value a scalar converts to when no type is declared.
pub fn natural(value: &Scalar, registry: &Arc<HostRegistry>) -> Result<HostValue, HostFault> {
    let held = value.get();
    Ok(match held.inner() {
        ScalarValue::Null => HostValue::Null,
        ScalarValue::Int(n) => HostValue::Int(*n),
        ScalarValue::Float(f) => HostValue::Float(*f),
        ScalarValue::Str(s) => HostValue::Str(s.clone()),
        ScalarValue::Array(array) => HostValue::List(
            array
                .snapshot()
                .map_err(|e| HostFault::IllegalArgument(e.to_string()))?
                .iter()
                .map(|item| natural(item, registry))
                .collect::<Result<_, _>>()?,
        ),
        ScalarValue::Hash(map) => HostValue::Map(
            map.entries()
                .iter()
                .map(|(k, v)| Ok((k.clone(), natural(v, registry)?)))
                .collect::<Result<_, HostFault>>()?,
        ),
        ScalarValue::Object(object) => HostValue::Object(object.clone()),
        ScalarValue::Closure(function) => HostValue::Function(function.clone()),
        ScalarValue::Tainted(_) => HostValue::Null,
    })
}

pub fn from_host(value: HostValue) -> Scalar {
    match value {
        HostValue::Null => Scalar::null(),
        HostValue::Bool(b) => Scalar::int(b as i64),
        HostValue::Char(c) => Scalar::string(c.to_string()),
        HostValue::Int(n) => Scalar::int(n),
        HostValue::Float(f) => Scalar::float(f),
        HostValue::Str(s) => Scalar::string(s),
        HostValue::Array(items) | HostValue::List(items) => {
            Scalar::array_of(items.into_iter().map(from_host).collect())
        }
        HostValue::Map(entries) => {
            let map = drowse_core::value::ScalarHash::with_order(MapOrder::Insertion);
            for (key, item) in entries {
                if map.put(&key, from_host(item)).is_err() {
                    break;
                }
            }
            Scalar::hash(map)
        }
        HostValue::Object(object) => match object.as_any().downcast_ref::<ClosureProxy>() {
            Some(proxy) => Scalar::closure(proxy.closure().clone()),
            None => Scalar::object(object),
        },
        HostValue::Function(function) => Scalar::closure(function),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_are_converted() {
        let registry = Arc::new(HostRegistry::new());
        let v = to_host(&Scalar::string("42"), &HostType::Long, &registry).unwrap();
        assert_eq!(v.as_i64(), Some(42));
        let v = to_host(&Scalar::int(300), &HostType::Byte, &registry).unwrap();
        assert_eq!(v.as_i64(), Some(44));
        let v = to_host(&Scalar::null(), &HostType::Double, &registry).unwrap();
        assert_eq!(v.as_f64(), Some(0.0));
    }

    #[test]
    fn test_typed_array() {
        let registry = Arc::new(HostRegistry::new());
        let arr = Scalar::array_of(vec![Scalar::int(1), Scalar::string("2")]);
        match to_host(&arr, &HostType::array_of(HostType::Long), &registry).unwrap() {
            HostValue::Array(items) => {
                assert_eq!(items.iter().filter_map(HostValue::as_i64).sum::<i64>(), 3)
            }
            other => panic!("expected an array, got {:?}", other),
        }
        assert!(to_host(&Scalar::int(1), &HostType::array_of(HostType::Long), &registry).is_err());
    }

    #[test]
    fn test_from_host_builds_containers() {
        let list = from_host(HostValue::List(vec![HostValue::Int(1), HostValue::Bool(true)]));
        let array = list.as_array().unwrap();
        assert_eq!(array.len().unwrap(), 2);
        let map = from_host(HostValue::Map(vec![("a".into(), HostValue::Str("x".into()))]));
        assert_eq!(map.as_hash().unwrap().peek("a").unwrap().as_string(), "x");
    }
}
