//! String-keyed map with optional access ordering and cache policies.
//!
//! With a removal policy attached the map becomes a bounded cache: after a
//! new key is inserted the policy is asked about the eldest entry (least
//! recently used in access order) and decides whether it goes. A capacity,
//! when set, restricts the question to inserts that push the map past it.

use super::function::ClosureRef;
use super::Scalar;
use crate::error::EngineError;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub type MapRef = Arc<ScalarHash>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapOrder {
    #[default]
    Insertion,
    /// Reads and writes move the key to the young end.
    Access,
}

/// Materializes a value for a key that is not in the map. The result is
/// stored under the key.
pub trait MissPolicy: Send + Sync {
    fn materialize(&self, map: &MapRef, key: &str) -> Result<Scalar, EngineError>;
}

/// Decides whether the eldest entry should be evicted.
pub trait RemovalPolicy: Send + Sync {
    fn should_remove(&self, map: &MapRef, key: &str, value: &Scalar) -> Result<bool, EngineError>;
}

impl<F> MissPolicy for F
where
    F: Fn(&MapRef, &str) -> Result<Scalar, EngineError> + Send + Sync,
{
    fn materialize(&self, map: &MapRef, key: &str) -> Result<Scalar, EngineError> {
        self(map, key)
    }
}

impl<F> RemovalPolicy for F
where
    F: Fn(&MapRef, &str, &Scalar) -> Result<bool, EngineError> + Send + Sync,
{
    fn should_remove(&self, map: &MapRef, key: &str, value: &Scalar) -> Result<bool, EngineError> {
        self(map, key, value)
    }
}

/// Adapts a script closure to either policy. The closure receives the map
/// and key (and the value, for removal) as positional arguments.
pub struct ClosurePolicy(pub ClosureRef);

impl MissPolicy for ClosurePolicy {
    fn materialize(&self, map: &MapRef, key: &str) -> Result<Scalar, EngineError> {
        self.0
            .call(None, vec![Scalar::hash(map.clone()), Scalar::string(key)])
    }
}

impl RemovalPolicy for ClosurePolicy {
    fn should_remove(&self, map: &MapRef, key: &str, value: &Scalar) -> Result<bool, EngineError> {
        let verdict = self.0.call(
            None,
            vec![Scalar::hash(map.clone()), Scalar::string(key), value.clone()],
        )?;
        Ok(verdict.is_truthy())
    }
}

struct MapEntry {
    value: Scalar,
    stamp: u64,
}

#[derive(Default)]
struct MapState {
    entries: HashMap<String, MapEntry>,
    order: BTreeMap<u64, String>,
    next_stamp: u64,
    miss: Option<Arc<dyn MissPolicy>>,
    removal: Option<Arc<dyn RemovalPolicy>>,
    capacity: Option<usize>,
}

impl MapState {
    fn stamp(&mut self) -> u64 {
        self.next_stamp += 1;
        self.next_stamp
    }

    fn touch(&mut self, key: &str) {
        let stamp = self.stamp();
        if let Some(entry) = self.entries.get_mut(key) {
            self.order.remove(&entry.stamp);
            entry.stamp = stamp;
            self.order.insert(stamp, key.to_string());
        }
    }

    fn insert_new(&mut self, key: &str, value: Scalar) {
        let stamp = self.stamp();
        self.order.insert(stamp, key.to_string());
        self.entries.insert(key.to_string(), MapEntry { value, stamp });
    }

    fn remove(&mut self, key: &str) -> Option<Scalar> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.stamp);
        Some(entry.value)
    }
}

pub struct ScalarHash {
    order_mode: MapOrder,
    state: Mutex<MapState>,
}

impl ScalarHash {
    pub fn new() -> MapRef {
        ScalarHash::with_order(MapOrder::Insertion)
    }

    pub fn with_order(order_mode: MapOrder) -> MapRef {
        Arc::new(ScalarHash {
            order_mode,
            state: Mutex::new(MapState::default()),
        })
    }

    pub fn order(&self) -> MapOrder {
        self.order_mode
    }

    pub fn set_miss_policy(&self, policy: Option<Arc<dyn MissPolicy>>) {
        self.state.lock().miss = policy;
    }

    pub fn set_removal_policy(&self, policy: Option<Arc<dyn RemovalPolicy>>) {
        self.state.lock().removal = policy;
    }

    pub fn set_capacity(&self, capacity: Option<usize>) {
        self.state.lock().capacity = capacity;
    }

    pub fn capacity(&self) -> Option<usize> {
        self.state.lock().capacity
    }

    /// The cell stored under `key`, creating it when absent. A miss policy,
    /// if any, supplies the initial value.
    pub fn get_or_create(self: &Arc<Self>, key: &str) -> Result<Scalar, EngineError> {
        let miss = {
            let mut state = self.state.lock();
            if let Some(entry) = state.entries.get(key) {
                let value = entry.value.clone();
                if self.order_mode == MapOrder::Access {
                    state.touch(key);
                }
                return Ok(value);
            }
            state.miss.clone()
        };
        let value = match miss {
            Some(policy) => policy.materialize(self, key)?,
            None => Scalar::null(),
        };
        {
            let mut state = self.state.lock();
            // The policy may have stored the key itself.
            if let Some(entry) = state.entries.get(key) {
                return Ok(entry.value.clone());
            }
            state.insert_new(key, value.clone());
        }
        self.evict_if_needed()?;
        Ok(value)
    }

    /// Store `value` as the cell for `key`.
    pub fn put(self: &Arc<Self>, key: &str, value: Scalar) -> Result<(), EngineError> {
        let inserted = {
            let mut state = self.state.lock();
            let access = self.order_mode == MapOrder::Access;
            match state.entries.get_mut(key) {
                Some(entry) => {
                    entry.value = value;
                    if access {
                        state.touch(key);
                    }
                    false
                }
                None => {
                    state.insert_new(key, value);
                    true
                }
            }
        };
        if inserted {
            self.evict_if_needed()?;
        }
        Ok(())
    }

    /// The cell for `key`, counting as an access.
    pub fn lookup(&self, key: &str) -> Option<Scalar> {
        let mut state = self.state.lock();
        let value = state.entries.get(key).map(|e| e.value.clone())?;
        if self.order_mode == MapOrder::Access {
            state.touch(key);
        }
        Some(value)
    }

    /// The cell for `key` without touching the access order.
    pub fn peek(&self, key: &str) -> Option<Scalar> {
        self.state.lock().entries.get(key).map(|e| e.value.clone())
    }

    pub fn remove(&self, key: &str) -> Option<Scalar> {
        self.state.lock().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.state
            .lock()
            .entries
            .get(key)
            .map(|e| !e.value.is_null())
            .unwrap_or(false)
    }

    /// Key/value pairs in map order, skipping keys that hold the empty value.
    pub fn entries(&self) -> Vec<(String, Scalar)> {
        let state = self.state.lock();
        state
            .order
            .values()
            .filter_map(|key| {
                let entry = state.entries.get(key)?;
                if entry.value.is_null() {
                    None
                } else {
                    Some((key.clone(), entry.value.clone()))
                }
            })
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries().into_iter().map(|(k, _)| k).collect()
    }

    pub fn values(&self) -> Vec<Scalar> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }

    /// Number of keys holding a non-empty value.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .entries
            .values()
            .filter(|e| !e.value.is_null())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
    }

    fn evict_if_needed(self: &Arc<Self>) -> Result<(), EngineError> {
        let (policy, key, value) = {
            let state = self.state.lock();
            let Some(policy) = state.removal.clone() else {
                return Ok(());
            };
            if let Some(capacity) = state.capacity {
                if state.entries.len() <= capacity {
                    return Ok(());
                }
            }
            let Some((_, key)) = state.order.iter().next() else {
                return Ok(());
            };
            let value = state
                .entries
                .get(key)
                .map(|e| e.value.clone())
                .unwrap_or_default();
            (policy, key.clone(), value)
        };
        if policy.should_remove(self, &key, &value)? {
            tracing::trace!(key = %key, "evicting eldest map entry");
            self.state.lock().remove(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn always_evict() -> Arc<dyn RemovalPolicy> {
        Arc::new(|_: &MapRef, _: &str, _: &Scalar| -> Result<bool, EngineError> { Ok(true) })
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let map = ScalarHash::new();
        for key in ["b", "a", "c"] {
            map.put(key, Scalar::int(1)).unwrap();
        }
        assert_eq!(map.keys(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_null_entries_are_not_listed() {
        let map = ScalarHash::new();
        map.get_or_create("ghost").unwrap();
        map.put("real", Scalar::int(2)).unwrap();
        assert_eq!(map.keys(), vec!["real"]);
        assert_eq!(map.len(), 1);
        assert!(!map.contains_key("ghost"));
    }

    #[test]
    fn test_bounded_map_evicts_least_recently_used() {
        let map = ScalarHash::with_order(MapOrder::Access);
        map.set_capacity(Some(3));
        map.set_removal_policy(Some(always_evict()));
        for key in ["a", "b", "c"] {
            map.put(key, Scalar::string(key)).unwrap();
        }
        map.lookup("a");
        map.put("d", Scalar::string("d")).unwrap();
        assert_eq!(map.keys().len(), 3);
        assert!(map.peek("b").is_none());
        assert_eq!(map.keys(), vec!["c", "a", "d"]);
    }

    #[test]
    fn test_removal_without_capacity_consults_every_insert() {
        let map = ScalarHash::new();
        let policy: Arc<dyn RemovalPolicy> =
            Arc::new(|m: &MapRef, _: &str, _: &Scalar| -> Result<bool, EngineError> {
                Ok(m.len() > 2)
            });
        map.set_removal_policy(Some(policy));
        for key in ["a", "b", "c", "d"] {
            map.put(key, Scalar::int(0)).unwrap();
        }
        assert_eq!(map.keys(), vec!["c", "d"]);
    }

    #[test]
    fn test_miss_policy_value_is_cached() {
        let map = ScalarHash::new();
        let policy: Arc<dyn MissPolicy> =
            Arc::new(|_: &MapRef, key: &str| -> Result<Scalar, EngineError> {
                Ok(Scalar::string(key.to_uppercase()))
            });
        map.set_miss_policy(Some(policy));
        let cell = map.get_or_create("abc").unwrap();
        assert_eq!(cell.as_string(), "ABC");
        assert!(map.get_or_create("abc").unwrap().same_cell(&cell));
    }

    #[test]
    fn test_put_replaces_cell_and_remove() {
        let map = ScalarHash::new();
        map.put("k", Scalar::int(1)).unwrap();
        map.put("k", Scalar::int(2)).unwrap();
        assert_eq!(map.peek("k").unwrap().as_int(), 2);
        assert_eq!(map.remove("k").unwrap().as_int(), 2);
        assert!(map.is_empty());
    }
}
