//! Environment tables: the seam where hosts register functions, operators,
//! predicates and inline blocks.

use crate::context::Context;
use crate::taint::TaintPolicy;
use drowse_core::{Block, EngineError, Scalar};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub trait Function: Send + Sync {
    fn evaluate(&self, name: &str, ctx: &mut Context, args: Vec<Scalar>) -> Result<Scalar, EngineError>;

    fn taint_policy(&self) -> TaintPolicy {
        TaintPolicy::Permeable
    }

    /// The closure behind a bound `sub`, when there is one.
    fn closure(&self) -> Option<Scalar> {
        None
    }
}

pub trait Operator: Send + Sync {
    fn operate(&self, op: &str, ctx: &mut Context, args: Vec<Scalar>) -> Result<Scalar, EngineError>;
}

pub trait Predicate: Send + Sync {
    fn decide(&self, name: &str, ctx: &mut Context, args: Vec<Scalar>) -> Result<bool, EngineError>;
}

impl<F> Function for F
where
    F: Fn(&mut Context, Vec<Scalar>) -> Result<Scalar, EngineError> + Send + Sync,
{
    fn evaluate(&self, _name: &str, ctx: &mut Context, args: Vec<Scalar>) -> Result<Scalar, EngineError> {
        self(ctx, args)
    }
}

impl<F> Operator for F
where
    F: Fn(&str, &mut Context, Vec<Scalar>) -> Result<Scalar, EngineError> + Send + Sync,
{
    fn operate(&self, op: &str, ctx: &mut Context, args: Vec<Scalar>) -> Result<Scalar, EngineError> {
        self(op, ctx, args)
    }
}

impl<F> Predicate for F
where
    F: Fn(&str, &mut Context, Vec<Scalar>) -> Result<bool, EngineError> + Send + Sync,
{
    fn decide(&self, name: &str, ctx: &mut Context, args: Vec<Scalar>) -> Result<bool, EngineError> {
        self(name, ctx, args)
    }
}

pub type FunctionRef = Arc<dyn Function>;
pub type OperatorRef = Arc<dyn Operator>;
pub type PredicateRef = Arc<dyn Predicate>;

#[derive(Default)]
pub struct Environment {
    functions: RwLock<HashMap<String, FunctionRef>>,
    operators: RwLock<HashMap<String, OperatorRef>>,
    predicates: RwLock<HashMap<String, PredicateRef>>,
    inlines: RwLock<HashMap<String, Arc<Block>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_function(&self, name: &str, function: impl Function + 'static) {
        self.put_function(name, Arc::new(function));
    }

    pub fn put_function(&self, name: &str, function: FunctionRef) {
        self.functions.write().insert(name.to_string(), function);
    }

    pub fn function(&self, name: &str) -> Option<FunctionRef> {
        self.functions.read().get(name).cloned()
    }

    pub fn remove_function(&self, name: &str) -> Option<FunctionRef> {
        self.functions.write().remove(name)
    }

    pub fn define_operator(&self, op: &str, operator: impl Operator + 'static) {
        self.operators
            .write()
            .insert(op.to_string(), Arc::new(operator));
    }

    pub fn operator(&self, op: &str) -> Option<OperatorRef> {
        self.operators.read().get(op).cloned()
    }

    pub fn define_predicate(&self, name: &str, predicate: impl Predicate + 'static) {
        self.predicates
            .write()
            .insert(name.to_string(), Arc::new(predicate));
    }

    pub fn predicate(&self, name: &str) -> Option<PredicateRef> {
        self.predicates.read().get(name).cloned()
    }

    pub fn put_inline(&self, name: &str, block: Arc<Block>) {
        self.inlines.write().insert(name.to_string(), block);
    }

    pub fn inline(&self, name: &str) -> Option<Arc<Block>> {
        self.inlines.read().get(name).cloned()
    }

    /// Sorted names of every function and inline block.
    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.read().keys().cloned().collect();
        names.extend(self.inlines.read().keys().cloned());
        names.sort();
        names.dedup();
        names
    }

    pub fn operator_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.operators.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn predicate_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.predicates.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Copy every table entry of `other` into this environment.
    pub fn extend_from(&self, other: &Environment) {
        self.functions
            .write()
            .extend(other.functions.read().iter().map(|(k, v)| (k.clone(), v.clone())));
        self.operators
            .write()
            .extend(other.operators.read().iter().map(|(k, v)| (k.clone(), v.clone())));
        self.predicates
            .write()
            .extend(other.predicates.read().iter().map(|(k, v)| (k.clone(), v.clone())));
        self.inlines
            .write()
            .extend(other.inlines.read().iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}
