//! Unified call dispatch.
//!
//! Functions, closures and inline blocks all go through [`dispatch`], which
//! enforces the call depth limit, times the call for the profiler, writes
//! the call trace and records a stack-trace frame when the call fails.

use crate::closure::{Closure, NamedFunction};
use crate::context::Context;
use crate::env::FunctionRef;
use crate::flow::{Flow, StackFrame};
use drowse_core::{Block, EngineError, Scalar, ScalarValue};
use std::cell::Cell;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Remaining native stack below which a call continues on a new segment.
const STACK_RED_ZONE: usize = 256 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

thread_local! {
    /// Script calls in progress on this thread, across every context.
    /// Detached callbacks run in a fresh context but still count.
    static ACTIVE_CALLS: Cell<usize> = const { Cell::new(0) };
}

/// One slot of the call depth budget, released on drop.
struct DepthGuard;

impl DepthGuard {
    fn enter(limit: usize) -> Result<DepthGuard, EngineError> {
        ACTIVE_CALLS.with(|active| {
            let depth = active.get();
            if depth >= limit {
                return Err(EngineError::runtime(format!(
                    "stack overflow: call depth exceeded {}",
                    limit
                )));
            }
            active.set(depth + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        ACTIVE_CALLS.with(|active| active.set(active.get().saturating_sub(1)));
    }
}

/// Script calls in progress on the current thread.
pub fn active_calls() -> usize {
    ACTIVE_CALLS.with(Cell::get)
}

/// One pending call.
pub(crate) trait CallRequest {
    /// Name used in traces, profiles and stack frames.
    fn describe(&self) -> String;

    fn execute(&self, ctx: &mut Context, args: Vec<Scalar>) -> Result<Scalar, EngineError>;
}

pub(crate) fn dispatch(
    ctx: &mut Context,
    request: &dyn CallRequest,
    args: Vec<Scalar>,
) -> Result<Scalar, EngineError> {
    let guard = DepthGuard::enter(ctx.max_depth())?;
    let mark = ctx.frame_depth();
    let line = ctx.line();
    let source = ctx.current_source().map(str::to_string);
    let flags = ctx.flags();
    let name = request.describe();
    let pending = flags.trace_calls.then(|| describe_args(&args));

    let started = flags.timing().then(Instant::now);
    if started.is_some() {
        ctx.nested.push(Duration::ZERO);
    }
    let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || request.execute(ctx, args));
    drop(guard);

    if let Some(started) = started {
        let elapsed = started.elapsed();
        let nested = ctx.nested.pop().unwrap_or_default();
        if let Some(parent) = ctx.nested.last_mut() {
            *parent += elapsed;
        }
        if flags.profile {
            ctx.script()
                .profiler()
                .record(&name, source.as_deref(), line, elapsed.saturating_sub(nested));
        }
    }

    match &result {
        Ok(value) => {
            if let Some(pending) = &pending {
                ctx.trace_line(&format!("{}({}) = {}", name, pending, value.describe()), line);
            }
        }
        Err(err) => {
            ctx.truncate_frames(mark);
            if let Some(pending) = &pending {
                ctx.trace_line(&format!("{}({}) - FAILED!", name, pending), line);
            }
            if !err.is_fatal() {
                ctx.record_frame(StackFrame {
                    description: name,
                    source,
                    line,
                });
            }
        }
    }
    ctx.set_line(line);
    result
}

fn describe_args(args: &[Scalar]) -> String {
    args.iter()
        .map(Scalar::describe)
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

struct FunctionCall<'a> {
    name: &'a str,
    function: FunctionRef,
}

impl CallRequest for FunctionCall<'_> {
    fn describe(&self) -> String {
        self.name.to_string()
    }

    fn execute(&self, ctx: &mut Context, args: Vec<Scalar>) -> Result<Scalar, EngineError> {
        self.function.evaluate(self.name, ctx, args)
    }
}

pub(crate) struct ClosureCall<'a> {
    pub(crate) closure: Arc<Closure>,
    pub(crate) message: Option<&'a str>,
}

impl CallRequest for ClosureCall<'_> {
    fn describe(&self) -> String {
        self.closure.describe_call()
    }

    fn execute(&self, ctx: &mut Context, args: Vec<Scalar>) -> Result<Scalar, EngineError> {
        self.closure.run(ctx, self.message, args)
    }
}

struct InlineCall<'a> {
    name: &'a str,
    block: Arc<Block>,
}

impl CallRequest for InlineCall<'_> {
    fn describe(&self) -> String {
        self.name.to_string()
    }

    fn execute(&self, ctx: &mut Context, args: Vec<Scalar>) -> Result<Scalar, EngineError> {
        let vars = ctx.globals().create_local();
        crate::closure::bind_arguments(&vars, None, &args);
        let locals = ctx.scope.local_depth();
        ctx.scope.push_local(vars);
        ctx.create_frame();
        let flow = ctx.eval_block(&self.block, None);
        ctx.kill_frame();
        ctx.scope.truncate_locals(locals);
        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Throw(value) => Err(EngineError::Thrown(value)),
            Flow::Yield { .. } | Flow::CallCC { .. } => Err(EngineError::runtime(format!(
                "yield and callcc are not allowed in inline code ({})",
                self.name
            ))),
            _ => Ok(Scalar::null()),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Call a named function or inline block.
pub fn call_function(ctx: &mut Context, name: &str, args: Vec<Scalar>) -> Result<Scalar, EngineError> {
    if let Some(function) = ctx.env().function(name) {
        return dispatch(ctx, &FunctionCall { name, function }, args);
    }
    if let Some(block) = ctx.env().inline(name) {
        return dispatch(ctx, &InlineCall { name, block }, args);
    }
    ctx.soft_fault(&format!("Attempted to call non-existent function {}", name))
}

/// Call a script closure. A closure owned by another script runs detached in
/// that script's own context.
pub fn call_closure(
    ctx: &mut Context,
    closure: &Arc<Closure>,
    message: Option<&str>,
    args: Vec<Scalar>,
) -> Result<Scalar, EngineError> {
    if !closure.owned_by(ctx.script()) {
        return closure.call_detached(message, args);
    }
    let request = ClosureCall {
        closure: closure.clone(),
        message,
    };
    dispatch(ctx, &request, args)
}

/// Call whatever `target` holds: a closure, a function handle or a
/// function name.
pub fn call_scalar(
    ctx: &mut Context,
    target: &Scalar,
    message: Option<&str>,
    args: Vec<Scalar>,
) -> Result<Scalar, EngineError> {
    let value = target.get();
    match value.inner() {
        ScalarValue::Closure(function) => {
            if let Some(closure) = Closure::from_ref(function) {
                return call_closure(ctx, &closure, message, args);
            }
            if let Some(named) = function.as_any().downcast_ref::<NamedFunction>() {
                if named.owned_by(ctx.script()) {
                    return call_function(ctx, named.name(), args);
                }
            }
            function.call(message, args)
        }
        ScalarValue::Str(name) if name.starts_with('&') => call_function(ctx, name, args),
        ScalarValue::Null => Err(EngineError::NullDereference("cannot call $null".to_string())),
        other => Err(EngineError::bad_cast(format!(
            "a value of type {} is not callable",
            other.type_name()
        ))),
    }
}
