//! Variable storage contract.
//!
//! The engine never assumes a backing for variables. Scopes are created
//! through the factory methods so an embedder can hand out per-script,
//! shared or persistent stores.

use drowse_core::Scalar;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub type VarsRef = Arc<dyn Variables>;

pub trait Variables: Send + Sync {
    fn exists(&self, name: &str) -> bool;

    fn get(&self, name: &str) -> Option<Scalar>;

    fn put(&self, name: &str, value: Scalar);

    fn remove(&self, name: &str) -> Option<Scalar>;

    fn keys(&self) -> Vec<String>;

    /// A fresh container for one local scope level.
    fn create_local(&self) -> VarsRef;

    /// A fresh container for a closure's private (`this`) scope.
    fn create_internal(&self) -> VarsRef;
}

/// Hash-map backed storage. Internally synchronized, so one instance can be
/// shared as the global scope of several scripts.
#[derive(Default)]
pub struct HashVariables {
    values: RwLock<HashMap<String, Scalar>>,
}

impl HashVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> VarsRef {
        Arc::new(Self::new())
    }
}

impl Variables for HashVariables {
    fn exists(&self, name: &str) -> bool {
        self.values.read().contains_key(name)
    }

    fn get(&self, name: &str) -> Option<Scalar> {
        self.values.read().get(name).cloned()
    }

    fn put(&self, name: &str, value: Scalar) {
        self.values.write().insert(name.to_string(), value);
    }

    fn remove(&self, name: &str) -> Option<Scalar> {
        self.values.write().remove(name)
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn create_local(&self) -> VarsRef {
        HashVariables::shared()
    }

    fn create_internal(&self) -> VarsRef {
        HashVariables::shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_remove() {
        let vars = HashVariables::new();
        assert!(!vars.exists("$x"));
        vars.put("$x", Scalar::int(3));
        assert_eq!(vars.get("$x").map(|s| s.as_int()), Some(3));
        assert!(vars.remove("$x").is_some());
        assert!(vars.get("$x").is_none());
    }

    #[test]
    fn factories_return_independent_scopes() {
        let vars = HashVariables::new();
        let local = vars.create_local();
        local.put("$y", Scalar::int(1));
        assert!(!vars.exists("$y"));
        assert_eq!(local.keys(), vec!["$y".to_string()]);
    }
}
