//! Execution context: the state of one running invocation.
//!
//! A context owns the frame stack operands are evaluated into, the
//! exception-handler stack, the source-location stack, the iterator stack,
//! the scope chain and the recorded stack trace. It is created per top-level
//! run (and per detached callback) and never shared between threads.

use crate::config::DebugFlags;
use crate::env::Environment;
use crate::eval::iter::IterState;
use crate::flow::StackFrame;
use crate::host::HostRegistry;
use crate::scope::ScopeChain;
use crate::script::ScriptRef;
use drowse_core::{EngineError, Scalar};
use drowse_runtime::{Console, ListenerRegistry, VarsRef, Warning};
use std::sync::Arc;
use std::time::Duration;

/// Counters of frame creations and kills. Equal on every exit path of a
/// well-formed Block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub created: u64,
    pub killed: u64,
}

impl FrameStats {
    pub fn balanced(&self) -> bool {
        self.created == self.killed
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Handler {
    pub(crate) var: String,
}

/// Stack depths recorded when a Block starts, restored when it exits early.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Marks {
    pub(crate) frames: usize,
    pub(crate) handlers: usize,
    pub(crate) sources: usize,
    pub(crate) iterators: usize,
}

pub struct Context {
    script: ScriptRef,
    frames: Vec<Vec<Scalar>>,
    stats: FrameStats,
    handlers: Vec<Handler>,
    sources: Vec<String>,
    pub(crate) iterators: Vec<IterState>,
    pub(crate) scope: ScopeChain,
    trace: Vec<StackFrame>,
    last_trace: Vec<StackFrame>,
    line: u32,
    /// Elapsed time of nested callees, one slot per active timed call.
    pub(crate) nested: Vec<Duration>,
    flags: DebugFlags,
    taint: bool,
    max_depth: usize,
}

impl Context {
    pub fn new(script: ScriptRef) -> Self {
        let config = script.config();
        let scope = ScopeChain::new(script.globals().clone());
        Context {
            frames: vec![Vec::new()],
            stats: FrameStats::default(),
            handlers: Vec::new(),
            sources: Vec::new(),
            iterators: Vec::new(),
            scope,
            trace: Vec::new(),
            last_trace: Vec::new(),
            line: 0,
            nested: Vec::new(),
            flags: config.debug,
            taint: config.taint,
            max_depth: config.max_call_depth,
            script,
        }
    }

    pub fn script(&self) -> &ScriptRef {
        &self.script
    }

    pub fn env(&self) -> &Environment {
        self.script.env()
    }

    pub fn globals(&self) -> &VarsRef {
        self.scope.global()
    }

    pub fn console(&self) -> Arc<dyn Console> {
        self.script.console()
    }

    pub fn hosts(&self) -> &Arc<HostRegistry> {
        self.script.hosts()
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        self.script.listeners()
    }

    pub fn flags(&self) -> DebugFlags {
        self.flags
    }

    /// Change the debug flags of this run and of the script.
    pub fn set_flags(&mut self, flags: DebugFlags) {
        self.flags = flags;
        self.script.set_debug(flags);
    }

    pub fn taint_enabled(&self) -> bool {
        self.taint
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub(crate) fn set_line(&mut self, line: u32) {
        self.line = line;
    }

    pub fn current_source(&self) -> Option<&str> {
        self.sources.last().map(String::as_str)
    }

    pub(crate) fn push_source(&mut self, source: String) {
        self.sources.push(source);
    }

    pub(crate) fn pop_source(&mut self) {
        self.sources.pop();
    }

    // -----------------------------------------------------------------------
    // Frames
    // -----------------------------------------------------------------------

    pub fn create_frame(&mut self) {
        self.frames.push(Vec::new());
        self.stats.created += 1;
    }

    /// Pop the current frame and return its operands. The base frame stays.
    pub fn kill_frame(&mut self) -> Vec<Scalar> {
        if self.frames.len() <= 1 {
            return Vec::new();
        }
        self.stats.killed += 1;
        self.frames.pop().unwrap_or_default()
    }

    pub fn push(&mut self, value: Scalar) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(value);
        }
    }

    /// Remove and return the last operand of the current frame.
    pub fn pop_value(&mut self) -> Scalar {
        self.frames
            .last_mut()
            .and_then(Vec::pop)
            .unwrap_or_default()
    }

    pub fn current_frame(&self) -> &[Scalar] {
        self.frames.last().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn clear_frame(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.clear();
        }
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn truncate_frames(&mut self, depth: usize) {
        while self.frames.len() > depth.max(1) {
            self.kill_frame();
        }
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.stats
    }

    pub(crate) fn marks(&self) -> Marks {
        Marks {
            frames: self.frames.len(),
            handlers: self.handlers.len(),
            sources: self.sources.len(),
            iterators: self.iterators.len(),
        }
    }

    /// Restore the stacks after an early exit. Suspensions keep their
    /// iterators for the resume.
    pub(crate) fn unwind(&mut self, marks: Marks, keep_iterators: bool) {
        self.truncate_frames(marks.frames);
        self.handlers.truncate(marks.handlers);
        self.sources.truncate(marks.sources);
        if !keep_iterators {
            self.iterators.truncate(marks.iterators);
        }
    }

    // -----------------------------------------------------------------------
    // Exception handlers and traces
    // -----------------------------------------------------------------------

    pub(crate) fn install_handler(&mut self, handler: Handler) -> usize {
        self.handlers.push(handler);
        self.handlers.len() - 1
    }

    pub(crate) fn remove_handlers(&mut self, from: usize) {
        self.handlers.truncate(from);
    }

    /// Whether a `try` is active anywhere in this invocation.
    pub fn has_handler(&self) -> bool {
        !self.handlers.is_empty()
    }

    pub(crate) fn handler_var(&self, index: usize) -> Option<&str> {
        self.handlers.get(index).map(|h| h.var.as_str())
    }

    pub(crate) fn record_frame(&mut self, frame: StackFrame) {
        self.trace.push(frame);
    }

    /// Move the pending trace to "last trace" (a throw was caught).
    pub(crate) fn settle_trace(&mut self) {
        self.last_trace = std::mem::take(&mut self.trace);
    }

    pub fn pending_trace(&self) -> &[StackFrame] {
        &self.trace
    }

    pub fn last_trace(&self) -> &[StackFrame] {
        &self.last_trace
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    fn located(&self, warning: Warning) -> Warning {
        warning.with_source(self.current_source().map(str::to_string))
    }

    /// A script problem. Shown when `show_warnings` is on.
    pub fn warn(&self, message: &str) {
        if self.flags.show_warnings {
            self.script.notify(&self.located(Warning::new(message, self.line)));
        }
    }

    /// A fault report. Shown when `show_errors` is on.
    pub fn error(&self, message: &str) {
        if self.flags.show_errors {
            self.script.notify(&self.located(Warning::new(message, self.line)));
        }
    }

    pub(crate) fn error_at(&self, message: &str, line: u32) {
        if self.flags.show_errors {
            self.script.notify(&self.located(Warning::new(message, line)));
        }
    }

    /// Warn and produce the empty value, or throw the warning when
    /// `throw_warnings` is set.
    pub fn soft_fault(&self, message: &str) -> Result<Scalar, EngineError> {
        if self.flags.throw_warnings {
            return Err(EngineError::Thrown(Scalar::string(message)));
        }
        self.warn(message);
        Ok(Scalar::null())
    }

    pub(crate) fn trace_line(&self, message: &str, line: u32) {
        self.script.notify(&self.located(Warning::trace(message, line)));
    }

    pub fn trace_taint(&self, message: &str) {
        if self.flags.trace_taint {
            self.trace_line(&format!("taint: {}", message), self.line);
        }
    }

    pub(crate) fn trace_logic(&self, message: &str) {
        if self.flags.trace_logic {
            self.trace_line(message, self.line);
        }
    }
}
