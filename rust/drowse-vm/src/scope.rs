//! Variable scope chain.
//!
//! Each call pushes a [`ScopeLevel`]: a stack of local containers (the call's
//! own plus any pushed for catch handlers or inline code) and the closure's
//! private `this` scope. Lookup walks the current level's locals top down,
//! then `this`, then the global scope. Names that are not declared anywhere
//! live in the global scope.

use drowse_core::Scalar;
use drowse_runtime::VarsRef;

#[derive(Clone)]
pub struct ScopeLevel {
    locals: Vec<VarsRef>,
    this: Option<VarsRef>,
}

impl ScopeLevel {
    pub fn new(local: VarsRef, this: Option<VarsRef>) -> Self {
        ScopeLevel {
            locals: vec![local],
            this,
        }
    }

    /// The call's own local container.
    pub fn base_local(&self) -> Option<&VarsRef> {
        self.locals.first()
    }
}

pub struct ScopeChain {
    levels: Vec<ScopeLevel>,
    global: VarsRef,
}

impl ScopeChain {
    pub fn new(global: VarsRef) -> Self {
        let base = ScopeLevel::new(global.create_local(), None);
        ScopeChain {
            levels: vec![base],
            global,
        }
    }

    pub fn global(&self) -> &VarsRef {
        &self.global
    }

    pub fn push_level(&mut self, level: ScopeLevel) {
        self.levels.push(level);
    }

    /// Pop the current call's level. The base level is never removed.
    pub fn pop_level(&mut self) -> Option<ScopeLevel> {
        if self.levels.len() > 1 {
            self.levels.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn push_local(&mut self, vars: VarsRef) {
        if let Some(level) = self.levels.last_mut() {
            level.locals.push(vars);
        }
    }

    pub fn pop_local(&mut self) {
        if let Some(level) = self.levels.last_mut() {
            if level.locals.len() > 1 {
                level.locals.pop();
            }
        }
    }

    /// Local containers on the current level.
    pub fn local_depth(&self) -> usize {
        self.levels.last().map_or(0, |level| level.locals.len())
    }

    /// Drop locals above `depth`, keeping the call's own container.
    pub fn truncate_locals(&mut self, depth: usize) {
        if let Some(level) = self.levels.last_mut() {
            level.locals.truncate(depth.max(1));
        }
    }

    fn current(&self) -> Option<&ScopeLevel> {
        self.levels.last()
    }

    /// The container that currently holds `name`, if any.
    pub fn find(&self, name: &str) -> Option<VarsRef> {
        if let Some(level) = self.current() {
            if let Some(vars) = level.locals.iter().rev().find(|v| v.exists(name)) {
                return Some(vars.clone());
            }
            if let Some(this) = level.this.as_ref().filter(|t| t.exists(name)) {
                return Some(this.clone());
            }
        }
        if self.global.exists(name) {
            return Some(self.global.clone());
        }
        None
    }

    pub fn lookup(&self, name: &str) -> Option<Scalar> {
        self.find(name).and_then(|vars| vars.get(name))
    }

    /// Point `name` at `cell` where it is declared, or globally.
    pub fn bind(&self, name: &str, cell: Scalar) {
        match self.find(name) {
            Some(vars) => vars.put(name, cell),
            None => self.global.put(name, cell),
        }
    }

    pub fn declare_local(&self, name: &str, cell: Scalar) {
        match self.current().and_then(|l| l.locals.last()) {
            Some(local) => local.put(name, cell),
            None => self.global.put(name, cell),
        }
    }

    /// Declare in the closure's private scope. False outside a closure.
    pub fn declare_this(&self, name: &str, cell: Scalar) -> bool {
        match self.current().and_then(|l| l.this.as_ref()) {
            Some(this) => {
                if !this.exists(name) {
                    this.put(name, cell);
                }
                true
            }
            None => false,
        }
    }

    /// Names visible from the current level, innermost first, without
    /// duplicates.
    pub fn visible_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut add = |vars: &VarsRef| {
            for key in vars.keys() {
                if !names.contains(&key) {
                    names.push(key);
                }
            }
        };
        if let Some(level) = self.current() {
            level.locals.iter().rev().for_each(&mut add);
            if let Some(this) = &level.this {
                add(this);
            }
        }
        add(&self.global);
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drowse_runtime::{HashVariables, Variables};

    #[test]
    fn test_locals_shadow_globals() {
        let global = HashVariables::shared();
        global.put("$x", Scalar::int(1));
        let mut scope = ScopeChain::new(global.clone());
        scope.push_level(ScopeLevel::new(global.create_local(), None));
        scope.declare_local("$x", Scalar::int(2));
        assert_eq!(scope.lookup("$x").unwrap().as_int(), 2);
        scope.pop_level();
        assert_eq!(scope.lookup("$x").unwrap().as_int(), 1);
    }

    #[test]
    fn test_catch_scope_is_popped() {
        let global = HashVariables::shared();
        let mut scope = ScopeChain::new(global);
        scope.push_local(HashVariables::shared());
        scope.declare_local("$e", Scalar::int(5));
        assert!(scope.lookup("$e").is_some());
        scope.pop_local();
        assert!(scope.lookup("$e").is_none());
    }

    #[test]
    fn test_truncate_locals_keeps_call_container() {
        let global = HashVariables::shared();
        let mut scope = ScopeChain::new(global.clone());
        scope.push_level(ScopeLevel::new(global.create_local(), None));
        let depth = scope.local_depth();
        scope.push_local(HashVariables::shared());
        scope.push_local(HashVariables::shared());
        assert_eq!(scope.local_depth(), depth + 2);
        scope.truncate_locals(depth);
        assert_eq!(scope.local_depth(), depth);
        scope.truncate_locals(0);
        assert_eq!(scope.local_depth(), 1);
    }

    #[test]
    fn test_undeclared_binds_globally() {
        let global = HashVariables::shared();
        let mut scope = ScopeChain::new(global.clone());
        scope.push_level(ScopeLevel::new(global.create_local(), None));
        scope.bind("$y", Scalar::int(9));
        assert_eq!(global.get("$y").unwrap().as_int(), 9);
        assert!(!scope.declare_this("$z", Scalar::null()));
    }

    #[test]
    fn test_this_scope_keeps_first_declaration() {
        let global = HashVariables::shared();
        let this = global.create_internal();
        let mut scope = ScopeChain::new(global.clone());
        scope.push_level(ScopeLevel::new(global.create_local(), Some(this.clone())));
        assert!(scope.declare_this("$count", Scalar::int(1)));
        assert!(scope.declare_this("$count", Scalar::int(7)));
        assert_eq!(this.get("$count").unwrap().as_int(), 1);
    }
}
