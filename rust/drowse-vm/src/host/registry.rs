use super::class::{HostClass, HostField, HostMethod};
use super::classes;
use drowse_core::ObjectRef;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Classes and interfaces the script can reach through `new` and `[ ]`.
#[derive(Default)]
pub struct HostRegistry {
    classes: RwLock<HashMap<String, Arc<HostClass>>>,
    aliases: RwLock<HashMap<String, String>>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the standard host classes.
    pub fn with_builtins() -> Arc<Self> {
        let registry = Arc::new(Self::new());
        classes::install(&registry);
        registry
    }

    pub fn register(&self, class: HostClass) -> Arc<HostClass> {
        let class = Arc::new(class);
        tracing::debug!(class = class.name(), "registered host class");
        self.classes
            .write()
            .insert(class.name().to_string(), class.clone());
        class
    }

    /// Make `short` another name for the class registered as `full`.
    pub fn alias(&self, short: &str, full: &str) {
        self.aliases
            .write()
            .insert(short.to_string(), full.to_string());
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<HostClass>> {
        let name = self
            .aliases
            .read()
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string());
        self.classes.read().get(&name).cloned()
    }

    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_interface(&self, name: &str) -> bool {
        self.lookup(name).is_some_and(|c| c.is_interface())
    }

    pub fn class_of(&self, object: &ObjectRef) -> Option<Arc<HostClass>> {
        self.lookup(object.type_name())
    }

    /// Whether a value of class `from` can stand where `to` is declared,
    /// following superclasses and implemented interfaces.
    pub fn is_assignable(&self, from: &str, to: &str) -> bool {
        let target = self
            .lookup(to)
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| to.to_string());
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([from.to_string()]);
        while let Some(name) = queue.pop_front() {
            if name == target {
                return true;
            }
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(class) = self.lookup(&name) {
                if class.name() == target {
                    return true;
                }
                queue.extend(class.superclass().map(str::to_string));
                queue.extend(class.interfaces().iter().cloned());
            }
        }
        false
    }

    /// Methods named `name` with `arity` parameters, the class's own
    /// declarations first and then each superclass in turn.
    pub fn methods(&self, class: &HostClass, name: &str, arity: usize, is_static: bool) -> Vec<HostMethod> {
        let mut found = class.methods_named(name, arity, is_static);
        let mut seen = HashSet::from([class.name().to_string()]);
        let mut parent = class.superclass().map(str::to_string);
        while let Some(parent_name) = parent.take() {
            if !seen.insert(parent_name.clone()) {
                break;
            }
            if let Some(parent_class) = self.lookup(&parent_name) {
                found.extend(parent_class.methods_named(name, arity, is_static));
                parent = parent_class.superclass().map(str::to_string);
            }
        }
        found
    }

    pub fn field(&self, class: &HostClass, name: &str) -> Option<HostField> {
        if let Some(field) = class.field_named(name) {
            return Some(field.clone());
        }
        let parent = self.lookup(class.superclass()?)?;
        if parent.name() == class.name() {
            return None;
        }
        self.field(&parent, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostType, HostValue};

    fn registry() -> HostRegistry {
        let registry = HostRegistry::new();
        registry.register(HostClass::interface("Shape").abstract_method("area", vec![], HostType::Double));
        registry.register(
            HostClass::new("Base").static_method("id", vec![], HostType::Long, |_| Ok(HostValue::Int(1))),
        );
        registry.register(HostClass::new("Square").extends("Base").implements("Shape"));
        registry
    }

    #[test]
    fn test_assignable_through_superclass_and_interface() {
        let registry = registry();
        assert!(registry.is_assignable("Square", "Base"));
        assert!(registry.is_assignable("Square", "Shape"));
        assert!(!registry.is_assignable("Base", "Square"));
    }

    #[test]
    fn test_alias_lookup() {
        let registry = registry();
        registry.alias("Sq", "Square");
        assert_eq!(registry.lookup("Sq").map(|c| c.name().to_string()), Some("Square".into()));
        assert!(registry.is_interface("Shape"));
    }

    #[test]
    fn test_inherited_static_method() {
        let registry = registry();
        let square = registry.lookup("Square").unwrap();
        assert_eq!(registry.methods(&square, "id", 0, true).len(), 1);
        assert!(registry.methods(&square, "id", 1, true).is_empty());
    }
}
