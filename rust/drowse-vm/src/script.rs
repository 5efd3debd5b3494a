//! Script and engine API.
//!
//! An [`Engine`] holds what every script it loads shares: configuration,
//! console, watchers, host classes and port listeners. [`Engine::load`]
//! produces a [`Script`] with its own function tables and global scope.

use crate::config::{DebugFlags, EngineConfig};
use crate::context::{Context, FrameStats};
use crate::dispatch;
use crate::env::Environment;
use crate::flow::{format_stack_trace, Flow, StackFrame};
use crate::host::HostRegistry;
use crate::library;
use crate::profile::{ProfileEntry, Profiler};
use drowse_core::{EngineError, Program, Scalar};
use drowse_runtime::{
    Console, HashVariables, ListenerRegistry, LogWatcher, StdConsole, VarsRef, Warning, Watcher,
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// State of a loaded script shared by every context running it.
pub struct ScriptShared {
    name: String,
    program: Program,
    env: Environment,
    globals: VarsRef,
    config: RwLock<EngineConfig>,
    watchers: RwLock<Vec<Arc<dyn Watcher>>>,
    console: Arc<dyn Console>,
    hosts: Arc<HostRegistry>,
    listeners: Arc<ListenerRegistry>,
    profiler: Profiler,
    last_trace: Mutex<Vec<StackFrame>>,
    last_stats: Mutex<FrameStats>,
}

pub type ScriptRef = Arc<ScriptShared>;

impl ScriptShared {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> EngineConfig {
        self.config.read().clone()
    }

    pub fn set_debug(&self, flags: DebugFlags) {
        self.config.write().debug = flags;
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn globals(&self) -> &VarsRef {
        &self.globals
    }

    pub fn console(&self) -> Arc<dyn Console> {
        self.console.clone()
    }

    pub fn hosts(&self) -> &Arc<HostRegistry> {
        &self.hosts
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    /// Deliver a diagnostic to every watcher, or to the log when nobody is
    /// watching.
    pub fn notify(&self, warning: &Warning) {
        let watchers = self.watchers.read();
        if watchers.is_empty() {
            LogWatcher.warning(warning);
            return;
        }
        for watcher in watchers.iter() {
            watcher.warning(warning);
        }
    }

    /// Settle the outcome of a top-level evaluation.
    fn finish(&self, ctx: &Context, outcome: Result<Scalar, EngineError>) -> Result<Scalar, EngineError> {
        let trace = if ctx.pending_trace().is_empty() {
            ctx.last_trace().to_vec()
        } else {
            ctx.pending_trace().to_vec()
        };
        *self.last_stats.lock() = ctx.frame_stats();
        let result = match outcome {
            Err(EngineError::Thrown(value)) => {
                let message = format!("Uncaught exception: {}", value.as_string());
                tracing::warn!(script = %self.name, "{}", message);
                if !trace.is_empty() {
                    tracing::debug!(script = %self.name, "{}", format_stack_trace(&trace));
                }
                self.notify(&Warning::new(message, ctx.line()).with_source(Some(self.name.clone())));
                Ok(Scalar::null())
            }
            Err(err) => {
                tracing::error!(script = %self.name, error = %err, "script aborted");
                Err(err)
            }
            ok => ok,
        };
        *self.last_trace.lock() = trace;
        result
    }
}

/// A loaded script.
#[derive(Clone)]
pub struct Script {
    shared: ScriptRef,
}

impl Script {
    /// Evaluate the top-level Block. A throw nobody catches is reported as
    /// an `Uncaught exception` warning and the run yields the empty value;
    /// fatal faults and taint violations come back as `Err`.
    pub fn run(&self) -> Result<Scalar, EngineError> {
        let shared = &self.shared;
        let mut ctx = Context::new(shared.clone());
        tracing::debug!(script = %shared.name, "running script");
        let outcome = ctx.eval_block(&shared.program.main, None).and_then(|flow| match flow {
            Flow::Return(value) => Ok(value),
            Flow::Throw(value) => Err(EngineError::Thrown(value)),
            Flow::Yield { value, .. } => Ok(value),
            Flow::CallCC { target, .. } => Err(EngineError::runtime(format!(
                "callcc outside a closure (target {})",
                target.describe()
            ))),
            _ => Ok(Scalar::null()),
        });
        shared.finish(&ctx, outcome)
    }

    /// Call a function this script defines (or any library function) from
    /// the host.
    pub fn call(&self, function: &str, args: Vec<Scalar>) -> Result<Scalar, EngineError> {
        let mut ctx = Context::new(self.shared.clone());
        let outcome = dispatch::call_function(&mut ctx, function, args);
        self.shared.finish(&ctx, outcome)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn program(&self) -> &Program {
        &self.shared.program
    }

    pub fn environment(&self) -> &Environment {
        &self.shared.env
    }

    pub fn globals(&self) -> &VarsRef {
        &self.shared.globals
    }

    pub fn config(&self) -> EngineConfig {
        self.shared.config()
    }

    pub fn set_debug(&self, flags: DebugFlags) {
        self.shared.set_debug(flags);
    }

    pub fn profile(&self) -> Vec<ProfileEntry> {
        self.shared.profiler.entries()
    }

    pub fn profiler(&self) -> &Profiler {
        &self.shared.profiler
    }

    /// Stack trace of the last throw, caught or not.
    pub fn last_trace(&self) -> Vec<StackFrame> {
        self.shared.last_trace.lock().clone()
    }

    /// Frame counters of the last top-level run or call.
    pub fn last_frame_stats(&self) -> FrameStats {
        *self.shared.last_stats.lock()
    }

    pub fn add_watcher(&self, watcher: Arc<dyn Watcher>) {
        self.shared.watchers.write().push(watcher);
    }

    pub fn shared(&self) -> &ScriptRef {
        &self.shared
    }
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Script").field("name", &self.shared.name).finish()
    }
}

/// Loads scripts against a shared configuration.
pub struct Engine {
    config: EngineConfig,
    console: Arc<dyn Console>,
    watchers: Vec<Arc<dyn Watcher>>,
    globals: Option<VarsRef>,
    hosts: Arc<HostRegistry>,
    listeners: Arc<ListenerRegistry>,
    environment: Environment,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            config: EngineConfig::default(),
            console: Arc::new(StdConsole),
            watchers: Vec::new(),
            globals: None,
            hosts: HostRegistry::with_builtins(),
            listeners: Arc::new(ListenerRegistry::new()),
            environment: Environment::new(),
        }
    }

    pub fn with_console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = console;
        self
    }

    pub fn with_watcher(mut self, watcher: Arc<dyn Watcher>) -> Self {
        self.watchers.push(watcher);
        self
    }

    /// Share one global variable store between every script loaded.
    pub fn with_globals(mut self, globals: VarsRef) -> Self {
        self.globals = Some(globals);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn hosts(&self) -> &Arc<HostRegistry> {
        &self.hosts
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// Functions, operators and predicates added here are installed into
    /// every script loaded afterwards, over the standard library.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn load(&self, program: Program) -> Result<Script, EngineError> {
        let env = Environment::new();
        library::install(&env, self.config.taint);
        env.extend_from(&self.environment);

        let shared = Arc::new(ScriptShared {
            name: program.name.clone(),
            program,
            env,
            globals: self.globals.clone().unwrap_or_else(HashVariables::shared),
            config: RwLock::new(self.config.clone()),
            watchers: RwLock::new(self.watchers.clone()),
            console: self.console.clone(),
            hosts: self.hosts.clone(),
            listeners: self.listeners.clone(),
            profiler: Profiler::new(),
            last_trace: Mutex::new(Vec::new()),
            last_stats: Mutex::new(FrameStats::default()),
        });

        let mut ctx = Context::new(shared.clone());
        let main = shared.program.main.clone();
        let bound = ctx.hoist_bindings(&main)?;
        tracing::debug!(script = %shared.name, functions = bound, taint = self.config.taint, "loaded script");
        Ok(Script { shared })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drowse_core::build::{BlockBuilder, Expr};
    use drowse_runtime::{BufferConsole, CollectingWatcher};

    #[test]
    fn test_uncaught_throw_is_a_warning() {
        let watcher = Arc::new(CollectingWatcher::new());
        let engine = Engine::new()
            .with_console(Arc::new(BufferConsole::new()))
            .with_watcher(watcher.clone());
        let main = BlockBuilder::new().throw(Expr::str("boom")).build();
        let script = engine.load(Program::new("uncaught", main)).unwrap();
        assert!(script.run().unwrap().is_null());
        let warnings = watcher.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "Uncaught exception: boom");
    }

    #[test]
    fn test_scripts_do_not_share_functions() {
        let engine = Engine::new().with_console(Arc::new(BufferConsole::new()));
        let first = BlockBuilder::new()
            .sub(
                "&twice",
                BlockBuilder::new()
                    .ret(Expr::op("*", Expr::var("$1"), Expr::int(2)))
                    .build(),
            )
            .build();
        let a = engine.load(Program::new("a", first)).unwrap();
        let b = engine.load(Program::new("b", BlockBuilder::new().build())).unwrap();
        assert_eq!(a.call("&twice", vec![Scalar::int(4)]).unwrap().as_int(), 8);
        assert!(a.environment().function("&twice").is_some());
        assert!(b.environment().function("&twice").is_none());
    }
}
