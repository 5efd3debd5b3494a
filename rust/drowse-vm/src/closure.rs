//! Script closures.
//!
//! A closure owns its body, a private `this` scope and a weak link to the
//! script that created it. A closure body that ends in `yield` or `callcc`
//! is suspended: the resume cursor, its local scope level and the iterators
//! it had open are kept, and the next call continues from there. Each
//! suspension is resumed exactly once.

use crate::context::Context;
use crate::dispatch::{self, ClosureCall};
use crate::env::Function;
use crate::eval::iter::IterState;
use crate::flow::{Cursor, Flow};
use crate::scope::ScopeLevel;
use crate::script::{ScriptRef, ScriptShared};
use drowse_core::value::ScriptFunction;
use drowse_core::{Block, ClosureRef, EngineError, Scalar, ScalarValue};
use drowse_runtime::VarsRef;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::{Arc, Weak};

struct Suspended {
    cursor: Cursor,
    level: Option<ScopeLevel>,
    iterators: Vec<IterState>,
}

/// How a closure body finished.
pub(crate) enum Outcome {
    Value(Scalar),
    /// Suspended by `callcc`; the target still has to be called.
    Continue(Scalar),
}

pub struct Closure {
    me: Weak<Closure>,
    owner: Weak<ScriptShared>,
    body: Arc<Block>,
    this: VarsRef,
    source: Option<String>,
    name: Option<String>,
    suspended: Mutex<Option<Suspended>>,
}

/// Bind the conventional argument variables into a call's local scope.
pub(crate) fn bind_arguments(vars: &VarsRef, message: Option<&str>, args: &[Scalar]) {
    vars.put("@_", Scalar::array_of(args.to_vec()));
    for (i, arg) in args.iter().enumerate() {
        vars.put(&format!("${}", i + 1), arg.clone());
    }
    vars.put(
        "$0",
        message.map(Scalar::string).unwrap_or_default(),
    );
}

impl Closure {
    pub fn new(
        owner: Weak<ScriptShared>,
        body: Arc<Block>,
        this: VarsRef,
        source: Option<String>,
        name: Option<String>,
    ) -> Arc<Closure> {
        Arc::new_cyclic(|me| Closure {
            me: me.clone(),
            owner,
            body,
            this,
            source,
            name,
            suspended: Mutex::new(None),
        })
    }

    pub fn from_ref(function: &ClosureRef) -> Option<Arc<Closure>> {
        function
            .as_any()
            .downcast_ref::<Closure>()
            .and_then(|c| c.me.upgrade())
    }

    pub fn from_scalar(value: &Scalar) -> Option<Arc<Closure>> {
        value.as_closure().as_ref().and_then(Closure::from_ref)
    }

    pub fn to_scalar(&self) -> Scalar {
        match self.me.upgrade() {
            Some(me) => Scalar::closure(me),
            None => Scalar::null(),
        }
    }

    pub fn body(&self) -> &Arc<Block> {
        &self.body
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Private variables declared with `&this`.
    pub fn this_scope(&self) -> &VarsRef {
        &self.this
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.lock().is_some()
    }

    pub(crate) fn owned_by(&self, script: &ScriptRef) -> bool {
        std::ptr::eq(self.owner.as_ptr(), Arc::as_ptr(script))
    }

    pub(crate) fn describe_call(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!(
                "&closure[{}:{}]",
                self.source.as_deref().unwrap_or("<unknown>"),
                self.body.first_line()
            ),
        }
    }

    /// Run the body in `ctx` and settle a `callcc` by calling its target
    /// with this closure.
    pub(crate) fn run(
        &self,
        ctx: &mut Context,
        message: Option<&str>,
        args: Vec<Scalar>,
    ) -> Result<Scalar, EngineError> {
        match self.invoke(ctx, message, args)? {
            Outcome::Value(value) => Ok(value),
            Outcome::Continue(target) => {
                ctx.create_frame();
                let result = dispatch::call_scalar(ctx, &target, None, vec![self.to_scalar()]);
                ctx.kill_frame();
                result
            }
        }
    }

    fn invoke(
        &self,
        ctx: &mut Context,
        message: Option<&str>,
        args: Vec<Scalar>,
    ) -> Result<Outcome, EngineError> {
        let suspended = self.suspended.lock().take();
        let (level, cursor, iterators) = match suspended {
            Some(Suspended {
                cursor,
                level: Some(level),
                iterators,
            }) => (level, Some(cursor), iterators),
            _ => (
                ScopeLevel::new(ctx.globals().create_local(), Some(self.this.clone())),
                None,
                Vec::new(),
            ),
        };
        if let Some(local) = level.base_local() {
            bind_arguments(local, message, &args);
            local.put("$this", self.to_scalar());
        }
        if cursor.is_some() {
            tracing::trace!(closure = %self.describe_call(), "resuming suspended closure");
        }

        ctx.scope.push_level(level);
        if let Some(source) = &self.source {
            ctx.push_source(source.clone());
        }
        let iter_mark = ctx.iterators.len();
        ctx.iterators.extend(iterators);
        ctx.create_frame();
        let flow = ctx.eval_block(&self.body, cursor);
        ctx.kill_frame();
        if self.source.is_some() {
            ctx.pop_source();
        }
        let level = ctx.scope.pop_level();

        let flow = match flow {
            Ok(flow) => flow,
            Err(err) => {
                ctx.iterators.truncate(iter_mark);
                return Err(err);
            }
        };
        match flow {
            Flow::Yield { value, cursor } => {
                self.suspend(ctx, iter_mark, cursor, level);
                Ok(Outcome::Value(value))
            }
            Flow::CallCC { target, cursor } => {
                self.suspend(ctx, iter_mark, cursor, level);
                Ok(Outcome::Continue(target))
            }
            other => {
                ctx.iterators.truncate(iter_mark);
                match other {
                    Flow::Return(value) => Ok(Outcome::Value(value)),
                    Flow::Throw(value) => Err(EngineError::Thrown(value)),
                    _ => Ok(Outcome::Value(Scalar::null())),
                }
            }
        }
    }

    fn suspend(&self, ctx: &mut Context, iter_mark: usize, cursor: Cursor, level: Option<ScopeLevel>) {
        let iterators = if ctx.iterators.len() > iter_mark {
            ctx.iterators.split_off(iter_mark)
        } else {
            Vec::new()
        };
        *self.suspended.lock() = Some(Suspended {
            cursor,
            level,
            iterators,
        });
    }

    /// Call from outside any running context, in a fresh context of the
    /// owning script.
    pub(crate) fn call_detached(&self, message: Option<&str>, args: Vec<Scalar>) -> Result<Scalar, EngineError> {
        let owner = self
            .owner
            .upgrade()
            .ok_or_else(|| EngineError::runtime("the script that owns this closure was unloaded"))?;
        let me = self
            .me
            .upgrade()
            .ok_or_else(|| EngineError::runtime("closure was released"))?;
        let mut ctx = Context::new(owner);
        let request = ClosureCall {
            closure: me,
            message,
        };
        dispatch::dispatch(&mut ctx, &request, args)
    }
}

impl ScriptFunction for Closure {
    fn call(&self, message: Option<&str>, args: Vec<Scalar>) -> Result<Scalar, EngineError> {
        self.call_detached(message, args)
    }

    fn describe(&self) -> String {
        self.describe_call()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Function-table adapters
// ---------------------------------------------------------------------------

/// A `sub` bound into the function table.
pub struct BoundClosure {
    closure: Arc<Closure>,
}

impl BoundClosure {
    pub fn new(closure: Arc<Closure>) -> Self {
        BoundClosure { closure }
    }
}

impl Function for BoundClosure {
    fn evaluate(&self, _name: &str, ctx: &mut Context, args: Vec<Scalar>) -> Result<Scalar, EngineError> {
        if self.closure.owned_by(ctx.script()) {
            self.closure.run(ctx, None, args)
        } else {
            self.closure.call_detached(None, args)
        }
    }

    fn closure(&self) -> Option<Scalar> {
        Some(self.closure.to_scalar())
    }
}

/// `&name` taken as a value for a function without a closure behind it.
pub struct NamedFunction {
    name: String,
    owner: Weak<ScriptShared>,
}

impl NamedFunction {
    pub fn scalar(name: &str, owner: &ScriptRef) -> Scalar {
        Scalar::closure(Arc::new(NamedFunction {
            name: name.to_string(),
            owner: Arc::downgrade(owner),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn owned_by(&self, script: &ScriptRef) -> bool {
        std::ptr::eq(self.owner.as_ptr(), Arc::as_ptr(script))
    }
}

impl ScriptFunction for NamedFunction {
    fn call(&self, _message: Option<&str>, args: Vec<Scalar>) -> Result<Scalar, EngineError> {
        let owner = self
            .owner
            .upgrade()
            .ok_or_else(|| EngineError::runtime("the script that owns this function was unloaded"))?;
        let mut ctx = Context::new(owner);
        dispatch::call_function(&mut ctx, &self.name, args)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Whether `value` holds something [`dispatch::call_scalar`] can call.
pub fn is_callable(value: &Scalar) -> bool {
    matches!(value.get().inner(), ScalarValue::Closure(_))
}
