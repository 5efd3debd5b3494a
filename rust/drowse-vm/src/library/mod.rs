//! Standard library: the functions, operators and predicates every engine
//! installs before loading a script.

mod collections;
mod functions;
mod io;
mod operators;
mod predicates;
mod strings;

pub use io::{HandleObject, TaskObject};

use crate::context::Context;
use crate::env::Environment;
use crate::taint::{self, TaintPolicy};
use drowse_core::value::{ArrayRef, MapRef};
use drowse_core::{EngineError, Scalar};
use std::sync::Arc;

/// Install every library table into `env`. With `taint` set, classified
/// functions are wrapped for taint checking.
pub fn install(env: &Environment, taint: bool) {
    let mut lib = Library { env, taint };
    functions::install(&mut lib);
    collections::install(&mut lib);
    strings::install(&mut lib);
    io::install(&mut lib);
    operators::install(env);
    predicates::install(env);
    tracing::debug!(
        functions = env.function_names().len(),
        operators = env.operator_names().len(),
        predicates = env.predicate_names().len(),
        "standard library installed"
    );
}

pub(crate) struct Library<'a> {
    env: &'a Environment,
    taint: bool,
}

impl Library<'_> {
    pub(crate) fn define<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&mut Context, Vec<Scalar>) -> Result<Scalar, EngineError> + Send + Sync + 'static,
    {
        self.classified(name, TaintPolicy::Permeable, f);
    }

    pub(crate) fn classified<F>(&mut self, name: &str, policy: TaintPolicy, f: F)
    where
        F: Fn(&mut Context, Vec<Scalar>) -> Result<Scalar, EngineError> + Send + Sync + 'static,
    {
        self.env
            .put_function(name, taint::wrap(Arc::new(f), policy, self.taint));
    }
}

pub(crate) fn arg(args: &[Scalar], i: usize) -> Scalar {
    args.get(i).cloned().unwrap_or_default()
}

pub(crate) fn array_arg(args: &[Scalar], i: usize, function: &str) -> Result<ArrayRef, EngineError> {
    let value = arg(args, i);
    value.as_array().ok_or_else(|| {
        EngineError::bad_cast(format!(
            "{}: argument {} must be an array, got {}",
            function,
            i + 1,
            value.type_name()
        ))
    })
}

pub(crate) fn hash_arg(args: &[Scalar], i: usize, function: &str) -> Result<MapRef, EngineError> {
    let value = arg(args, i);
    value.as_hash().ok_or_else(|| {
        EngineError::bad_cast(format!(
            "{}: argument {} must be a hash, got {}",
            function,
            i + 1,
            value.type_name()
        ))
    })
}
