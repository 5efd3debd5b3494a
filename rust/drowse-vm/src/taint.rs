//! Taint-propagation layer.
//!
//! Only active when [`EngineConfig::taint`](crate::EngineConfig) is set.
//! Library functions are then wrapped in a [`TaintedFunction`] carrying their
//! classification; Steps consult [`propagate`] for permeable results.

use crate::context::Context;
use crate::env::{Function, FunctionRef};
use drowse_core::value::taint::{any_tainted, sanitize, taint_deep};
use drowse_core::{EngineError, Scalar};
use std::sync::Arc;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TaintPolicy {
    /// Tainted input gives a tainted result.
    #[default]
    Permeable,
    /// Refuses tainted arguments before running.
    Sensitive,
    /// Result is always tainted.
    Tainter,
    /// Result is always clean.
    Sanitizer,
}

pub struct TaintedFunction {
    inner: FunctionRef,
    policy: TaintPolicy,
}

impl TaintedFunction {
    pub fn new(inner: FunctionRef, policy: TaintPolicy) -> Self {
        TaintedFunction { inner, policy }
    }
}

impl Function for TaintedFunction {
    fn evaluate(&self, name: &str, ctx: &mut Context, args: Vec<Scalar>) -> Result<Scalar, EngineError> {
        match self.policy {
            TaintPolicy::Sensitive => {
                if let Some((i, arg)) = args.iter().enumerate().find(|(_, a)| a.is_tainted()) {
                    let message = format!(
                        "{}: argument {} is tainted: {}",
                        name,
                        i + 1,
                        arg.describe()
                    );
                    ctx.trace_taint(&message);
                    return Err(EngineError::TaintViolation(message));
                }
                self.inner.evaluate(name, ctx, args)
            }
            TaintPolicy::Tainter => {
                let result = self.inner.evaluate(name, ctx, args)?;
                taint_deep(&result);
                ctx.trace_taint(&format!("{} tainted its result", name));
                Ok(result)
            }
            TaintPolicy::Sanitizer => {
                let result = self.inner.evaluate(name, ctx, args)?;
                sanitize(&result);
                Ok(result)
            }
            TaintPolicy::Permeable => self.inner.evaluate(name, ctx, args),
        }
    }

    fn taint_policy(&self) -> TaintPolicy {
        self.policy
    }

    fn closure(&self) -> Option<Scalar> {
        self.inner.closure()
    }
}

/// Wrap `function` only when taint mode is on and the policy needs it.
pub fn wrap(function: FunctionRef, policy: TaintPolicy, enabled: bool) -> FunctionRef {
    if enabled && policy != TaintPolicy::Permeable {
        Arc::new(TaintedFunction::new(function, policy))
    } else {
        function
    }
}

/// The value to hand on for `result`: a tainted copy when any of `inputs`
/// is tainted, `result` itself otherwise. The cell that came back is never
/// marked, since it may be a variable the callee returned.
pub fn propagate(ctx: &Context, inputs: &[Scalar], result: Scalar, what: &str) -> Scalar {
    if !ctx.taint_enabled() || result.is_tainted() || !any_tainted(inputs) {
        return result;
    }
    let marked = result.copy();
    taint_deep(&marked);
    ctx.trace_taint(&format!("{} passed taint to its result", what));
    marked
}
