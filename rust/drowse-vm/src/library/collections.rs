//! Array and hash functions.

use super::{arg, array_arg, hash_arg, Library};
use crate::context::Context;
use crate::dispatch;
use drowse_core::value::{ClosurePolicy, KeyValuePair, MapOrder, MapRef, ScalarHash};
use drowse_core::{EngineError, Scalar, ScalarValue};
use std::cmp::Ordering;
use std::sync::Arc;

/// Order used by `&sort` without a comparator: numbers numerically, then
/// everything else by its string form.
fn natural_order(a: &Scalar, b: &Scalar) -> Ordering {
    if a.is_number() && b.is_number() {
        a.as_float()
            .partial_cmp(&b.as_float())
            .unwrap_or(Ordering::Equal)
    } else {
        a.as_string().cmp(&b.as_string())
    }
}

fn merge_sort<F>(items: Vec<Scalar>, compare: &mut F) -> Result<Vec<Scalar>, EngineError>
where
    F: FnMut(&Scalar, &Scalar) -> Result<Ordering, EngineError>,
{
    if items.len() <= 1 {
        return Ok(items);
    }
    let mut left = items;
    let right = left.split_off(left.len() / 2);
    let left = merge_sort(left, compare)?;
    let right = merge_sort(right, compare)?;
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut right = right.into_iter().peekable();
    for item in left {
        while let Some(next) = right.peek() {
            if compare(next, &item)? == Ordering::Less {
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

/// Copy the element values into a new array.
fn copy_array(items: &[Scalar]) -> Scalar {
    Scalar::array_of(items.iter().map(Scalar::copy).collect())
}

fn pair_of(value: &Scalar) -> Option<(String, Scalar)> {
    let object = value.as_object()?;
    let pair = object.as_any().downcast_ref::<KeyValuePair>()?;
    Some((pair.key.as_string(), pair.value.copy()))
}

fn hash_from_pairs(map: MapRef, args: &[Scalar], function: &str) -> Result<Scalar, EngineError> {
    for value in args {
        let (key, value) = pair_of(value).ok_or_else(|| {
            EngineError::bad_cast(format!(
                "{}: expected key => value, got {}",
                function,
                value.describe()
            ))
        })?;
        map.put(&key, value)?;
    }
    Ok(Scalar::hash(map))
}

fn callable(args: &[Scalar], i: usize, function: &str) -> Result<Scalar, EngineError> {
    let target = arg(args, i);
    if crate::closure::is_callable(&target) {
        Ok(target)
    } else {
        Err(EngineError::bad_cast(format!(
            "{}: argument {} must be a function, got {}",
            function,
            i + 1,
            target.type_name()
        )))
    }
}

fn sort(ctx: &mut Context, args: &[Scalar]) -> Result<Scalar, EngineError> {
    let (comparator, list) = match args.len() {
        0 | 1 => (None, array_arg(args, 0, "&sort")?),
        _ => (Some(callable(args, 0, "&sort")?), array_arg(args, 1, "&sort")?),
    };
    let items = list.snapshot()?;
    let sorted = match comparator {
        Some(comparator) => merge_sort(items, &mut |a: &Scalar, b: &Scalar| {
            let verdict = dispatch::call_scalar(ctx, &comparator, None, vec![a.clone(), b.clone()])?;
            Ok(verdict.as_int().cmp(&0))
        })?,
        None => merge_sort(items, &mut |a: &Scalar, b: &Scalar| Ok(natural_order(a, b)))?,
    };
    Ok(Scalar::array_of(sorted))
}

pub(super) fn install(lib: &mut Library<'_>) {
    lib.define("&size", |_, args| {
        let value = arg(&args, 0).get();
        Ok(Scalar::int(match value.inner() {
            ScalarValue::Array(list) => list.len()? as i64,
            ScalarValue::Hash(map) => map.len() as i64,
            ScalarValue::Null => 0,
            _ => 1,
        }))
    });

    lib.define("&push", |_, args| {
        let list = array_arg(&args, 0, "&push")?;
        let mut last = Scalar::null();
        for value in args.iter().skip(1) {
            last = value.copy();
            list.push(last.clone())?;
        }
        Ok(last)
    });

    lib.define("&pop", |_, args| {
        Ok(array_arg(&args, 0, "&pop")?.pop()?.unwrap_or_default())
    });

    lib.define("&shift", |_, args| {
        Ok(array_arg(&args, 0, "&shift")?.shift()?.unwrap_or_default())
    });

    lib.define("&unshift", |_, args| {
        let list = array_arg(&args, 0, "&unshift")?;
        for value in args.iter().skip(1).rev() {
            list.unshift(value.copy())?;
        }
        Ok(arg(&args, 0))
    });

    // &add(@array, value, index) inserts, default at the front;
    // &add(%hash, key => value, ...) puts pairs.
    lib.define("&add", |_, args| {
        let target = arg(&args, 0);
        if let Some(map) = target.as_hash() {
            for value in args.iter().skip(1) {
                let (key, value) = pair_of(value)
                    .ok_or_else(|| EngineError::bad_cast("&add: expected key => value"))?;
                map.put(&key, value)?;
            }
            return Ok(target);
        }
        let list = array_arg(&args, 0, "&add")?;
        let index = args.get(2).map(Scalar::as_int).unwrap_or(0);
        list.insert(index, arg(&args, 1).copy())?;
        Ok(target)
    });

    // &remove(@array, values...) drops every equal element;
    // &remove(%hash, keys...) drops the keys.
    lib.define("&remove", |_, args| {
        let target = arg(&args, 0);
        if let Some(map) = target.as_hash() {
            for key in args.iter().skip(1) {
                map.remove(&key.as_string());
            }
            return Ok(target);
        }
        let list = array_arg(&args, 0, "&remove")?;
        for value in args.iter().skip(1) {
            list.remove_value(&value.get())?;
        }
        Ok(target)
    });

    lib.define("&sublist", |_, args| {
        let list = array_arg(&args, 0, "&sublist")?;
        let from = arg(&args, 1).as_int();
        let to = match args.get(2) {
            Some(to) => to.as_int(),
            None => list.len()? as i64,
        };
        Ok(Scalar::array(list.sublist(from, to)?))
    });

    lib.define("&copy", |_, args| {
        let value = arg(&args, 0).get();
        Ok(match value.inner() {
            ScalarValue::Array(list) => copy_array(&list.snapshot()?),
            ScalarValue::Hash(map) => {
                let copy = ScalarHash::with_order(map.order());
                for (key, value) in map.entries() {
                    copy.put(&key, value.copy())?;
                }
                Scalar::hash(copy)
            }
            _ => arg(&args, 0).copy(),
        })
    });

    lib.define("&reverse", |_, args| {
        let mut items = array_arg(&args, 0, "&reverse")?.snapshot()?;
        items.reverse();
        Ok(Scalar::array_of(items))
    });

    lib.define("&sort", |ctx, args| sort(ctx, &args));

    lib.define("&keys", |_, args| {
        let map = hash_arg(&args, 0, "&keys")?;
        Ok(Scalar::array_of(map.keys().into_iter().map(Scalar::string).collect()))
    });

    lib.define("&values", |_, args| {
        let map = hash_arg(&args, 0, "&values")?;
        Ok(Scalar::array_of(map.values()))
    });

    lib.define("&array", |_, args| Ok(copy_array(&args)));
    lib.define("&hash", |_, args| hash_from_pairs(ScalarHash::new(), &args, "&hash"));
    lib.define("&ohash", |_, args| {
        hash_from_pairs(ScalarHash::with_order(MapOrder::Insertion), &args, "&ohash")
    });
    lib.define("&ohasha", |_, args| {
        hash_from_pairs(ScalarHash::with_order(MapOrder::Access), &args, "&ohasha")
    });

    lib.define("&setMissPolicy", |_, args| {
        let map = hash_arg(&args, 0, "&setMissPolicy")?;
        let policy = arg(&args, 1)
            .as_closure()
            .map(|f| Arc::new(ClosurePolicy(f)) as Arc<dyn drowse_core::value::MissPolicy>);
        map.set_miss_policy(policy);
        Ok(arg(&args, 0))
    });

    lib.define("&setRemovalPolicy", |_, args| {
        let map = hash_arg(&args, 0, "&setRemovalPolicy")?;
        let policy = arg(&args, 1)
            .as_closure()
            .map(|f| Arc::new(ClosurePolicy(f)) as Arc<dyn drowse_core::value::RemovalPolicy>);
        map.set_removal_policy(policy);
        Ok(arg(&args, 0))
    });

    lib.define("&setCapacity", |_, args| {
        let map = hash_arg(&args, 0, "&setCapacity")?;
        let capacity = args.get(1).filter(|c| !c.is_null()).map(|c| c.as_int().max(0) as usize);
        map.set_capacity(capacity);
        Ok(arg(&args, 0))
    });

    // &putAll(%hash, @keys, @values); without values the keys array
    // alternates key, value.
    lib.define("&putAll", |_, args| {
        let map = hash_arg(&args, 0, "&putAll")?;
        let keys = array_arg(&args, 1, "&putAll")?.snapshot()?;
        match args.get(2).and_then(Scalar::as_array) {
            Some(values) => {
                let values = values.snapshot()?;
                for (i, key) in keys.iter().enumerate() {
                    let value = values.get(i).map(Scalar::copy).unwrap_or_default();
                    map.put(&key.as_string(), value)?;
                }
            }
            None => {
                for pair in keys.chunks(2) {
                    let value = pair.get(1).map(Scalar::copy).unwrap_or_default();
                    map.put(&pair[0].as_string(), value)?;
                }
            }
        }
        Ok(arg(&args, 0))
    });

    lib.define("&map", |ctx, args| {
        let function = callable(&args, 0, "&map")?;
        let mut results = Vec::new();
        for item in array_arg(&args, 1, "&map")?.snapshot()? {
            results.push(dispatch::call_scalar(ctx, &function, None, vec![item])?);
        }
        Ok(Scalar::array_of(results))
    });

    lib.define("&filter", |ctx, args| {
        let function = callable(&args, 0, "&filter")?;
        let mut kept = Vec::new();
        for item in array_arg(&args, 1, "&filter")?.snapshot()? {
            if dispatch::call_scalar(ctx, &function, None, vec![item.clone()])?.is_truthy() {
                kept.push(item);
            }
        }
        Ok(Scalar::array_of(kept))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_order_mixes_numbers_and_strings() {
        let mut items = vec![Scalar::int(10), Scalar::float(2.5), Scalar::int(3)];
        items.sort_by(natural_order);
        let seen: Vec<String> = items.iter().map(Scalar::as_string).collect();
        assert_eq!(seen, vec!["2.5", "3", "10"]);
    }

    #[test]
    fn test_merge_sort_is_stable_and_stops_on_error() {
        let items = vec![
            Scalar::string("b1"),
            Scalar::string("a"),
            Scalar::string("b2"),
        ];
        let sorted = merge_sort(items, &mut |a: &Scalar, b: &Scalar| {
            Ok(a.as_string()[..1].cmp(&b.as_string()[..1]))
        })
        .unwrap();
        let seen: Vec<String> = sorted.iter().map(Scalar::as_string).collect();
        assert_eq!(seen, vec!["a", "b1", "b2"]);

        let failed = merge_sort(vec![Scalar::int(1), Scalar::int(2)], &mut |_: &Scalar, _: &Scalar| {
            Err(EngineError::runtime("boom"))
        });
        assert!(failed.is_err());
    }

    #[test]
    fn test_hash_from_pairs_rejects_plain_values() {
        let pairs = [KeyValuePair::new(Scalar::string("a"), Scalar::int(1)).into_object()];
        let pairs: Vec<Scalar> = pairs.into_iter().map(Scalar::object).collect();
        let hash = hash_from_pairs(ScalarHash::new(), &pairs, "&hash").unwrap();
        assert_eq!(hash.as_hash().unwrap().peek("a").unwrap().as_int(), 1);
        assert!(hash_from_pairs(ScalarHash::new(), &[Scalar::int(3)], "&hash").is_err());
    }
}
