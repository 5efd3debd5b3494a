//! Host object bridge.
//!
//! Scripts construct host classes with `new`, call static members with
//! `[Class member: args]` and instance members with `[$object member: args]`.
//! Overloads are chosen by [`resolve`], arguments converted by [`marshal`],
//! and every call into host code runs inside the panic boundary.

mod class;
mod classes;
pub mod marshal;
mod proxy;
mod registry;
pub mod resolve;
mod types;

pub use class::{FieldGetter, HostClass, HostField, HostMethod, Invoker};
pub use classes::{StringBuilderObject, StringObject};
pub use proxy::ClosureProxy;
pub use registry::HostRegistry;
pub use resolve::Match;
pub use types::{HostFault, HostType, HostValue};

use crate::context::Context;
use crate::flow::StackFrame;
use drowse_core::{EngineError, ObjectRef, Scalar, ScalarValue};
use drowse_runtime::panic_boundary::guard_host_call;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

fn describe_args(args: &[Scalar]) -> String {
    args.iter()
        .map(|a| a.type_name())
        .collect::<Vec<_>>()
        .join(", ")
}

fn no_match(ctx: &Context, what: &str, candidates: &[HostMethod], args: &[Scalar]) -> Result<Scalar, EngineError> {
    let known = candidates
        .iter()
        .map(HostMethod::signature)
        .collect::<Vec<_>>()
        .join(", ");
    if known.is_empty() {
        ctx.soft_fault(&format!("{}({}) not found", what, describe_args(args)))
    } else {
        ctx.soft_fault(&format!(
            "no overload of {} accepts ({}); candidates: {}",
            what,
            describe_args(args),
            known
        ))
    }
}

fn call_host(
    ctx: &mut Context,
    method: &HostMethod,
    receiver: Option<ObjectRef>,
    args: Vec<Scalar>,
    description: String,
) -> Result<Scalar, EngineError> {
    let registry = ctx.hosts().clone();
    let mut host_args = Vec::with_capacity(args.len());
    for (arg, ty) in args.iter().zip(&method.params) {
        match marshal::to_host(arg, ty, &registry) {
            Ok(value) => host_args.push(value),
            Err(fault) => return ctx.soft_fault(&format!("{}: {}", description, fault)),
        }
    }

    tracing::trace!(call = %description, "entering host code");
    let invoker = method.invoker.clone();
    let outcome = guard_host_call(AssertUnwindSafe(move || Ok(invoker(receiver.as_ref(), host_args))))?;
    match outcome {
        Ok(value) => Ok(marshal::from_host(value)),
        Err(HostFault::Thrown(message)) => {
            let source = ctx.current_source().map(str::to_string);
            let line = ctx.line();
            ctx.record_frame(StackFrame {
                description,
                source,
                line,
            });
            Err(EngineError::Thrown(Scalar::string(message)))
        }
        Err(HostFault::Fatal(message)) => Err(EngineError::Fatal(message)),
        Err(HostFault::TaintViolation(message)) => Err(EngineError::TaintViolation(message)),
        Err(other) => ctx.soft_fault(&format!("{}: {}", description, other)),
    }
}

/// `new Class(args)`
pub(crate) fn construct(ctx: &mut Context, class: &str, args: Vec<Scalar>) -> Result<Scalar, EngineError> {
    let Some(descriptor) = ctx.hosts().lookup(class) else {
        return ctx.soft_fault(&format!("class {} not found", class));
    };
    if descriptor.is_interface() {
        return ctx.soft_fault(&format!("cannot instantiate interface {}", class));
    }
    let candidates = descriptor.constructors();
    let chosen = resolve::resolve(candidates, &args, ctx.hosts()).cloned();
    match chosen {
        Some(ctor) => call_host(ctx, &ctor, None, args, format!("new {}", descriptor.name())),
        None => no_match(ctx, &format!("new {}", descriptor.name()), candidates, &args),
    }
}

/// `[Class member: args]`
pub(crate) fn invoke_static(
    ctx: &mut Context,
    class: &str,
    member: &str,
    args: Vec<Scalar>,
) -> Result<Scalar, EngineError> {
    let registry = ctx.hosts().clone();
    let Some(descriptor) = registry.lookup(class) else {
        return ctx.soft_fault(&format!("class {} not found", class));
    };
    let candidates = registry.methods(&descriptor, member, args.len(), true);
    let what = format!("{}.{}", descriptor.name(), member);
    if let Some(method) = resolve::resolve(&candidates, &args, &registry).cloned() {
        return call_host(ctx, &method, None, args, what);
    }
    if args.is_empty() {
        if let Some(field) = registry.field(&descriptor, member).filter(|f| f.is_static) {
            return read_field(ctx, &field, None, what);
        }
    }
    no_match(ctx, &what, &candidates, &args)
}

/// `[$object member: args]`
pub(crate) fn invoke_member(
    ctx: &mut Context,
    receiver: &Scalar,
    member: &str,
    args: Vec<Scalar>,
) -> Result<Scalar, EngineError> {
    let registry = ctx.hosts().clone();
    let held = receiver.get();
    let object: ObjectRef = match held.inner() {
        ScalarValue::Object(object) => object.clone(),
        ScalarValue::Str(_) | ScalarValue::Int(_) | ScalarValue::Float(_) => {
            Arc::new(StringObject(held.as_string()))
        }
        other => {
            return Err(EngineError::bad_cast(format!(
                "cannot send {} to a value of type {}",
                member,
                other.type_name()
            )))
        }
    };
    let Some(descriptor) = registry.class_of(&object) else {
        return ctx.soft_fault(&format!("no host class registered for {}", object.type_name()));
    };
    let candidates = registry.methods(&descriptor, member, args.len(), false);
    let what = format!("{}.{}", descriptor.name(), member);
    if let Some(method) = resolve::resolve(&candidates, &args, &registry).cloned() {
        return call_host(ctx, &method, Some(object), args, what);
    }
    if args.is_empty() {
        if let Some(field) = registry.field(&descriptor, member) {
            return read_field(ctx, &field, Some(object), what);
        }
    }
    no_match(ctx, &what, &candidates, &args)
}

fn read_field(
    ctx: &mut Context,
    field: &HostField,
    receiver: Option<ObjectRef>,
    what: String,
) -> Result<Scalar, EngineError> {
    let getter = field.getter.clone();
    let outcome = guard_host_call(AssertUnwindSafe(move || Ok(getter(receiver.as_ref()))))?;
    match outcome {
        Ok(value) => Ok(marshal::from_host(value)),
        Err(HostFault::Fatal(message)) => Err(EngineError::Fatal(message)),
        Err(HostFault::TaintViolation(message)) => Err(EngineError::TaintViolation(message)),
        Err(fault) => ctx.soft_fault(&format!("{}: {}", what, fault)),
    }
}
