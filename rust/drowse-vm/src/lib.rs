//! Drowse VM — tree-walking engine for compiled Drowse programs.
//!
//! Evaluation, call dispatch, closures with `yield`/`callcc`, the host
//! object bridge, the taint layer and the standard library.

pub mod closure;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod eval;
pub mod flow;
pub mod host;
pub mod library;
pub mod profile;
pub mod scope;
pub mod script;
pub mod taint;

pub use closure::{is_callable, Closure};
pub use config::{DebugFlags, EngineConfig, DEFAULT_MAX_CALL_DEPTH};
pub use context::{Context, FrameStats};
pub use env::{Environment, Function, Operator, Predicate};
pub use flow::{format_stack_trace, Flow, StackFrame};
pub use host::{HostClass, HostRegistry, HostType, HostValue};
pub use profile::{ProfileEntry, Profiler};
pub use script::{Engine, Script, ScriptRef};
pub use taint::TaintPolicy;
