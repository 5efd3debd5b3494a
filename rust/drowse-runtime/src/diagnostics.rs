//! Diagnostics event contract.
//!
//! The engine reports warnings and call traces to watchers and never waits
//! on them or inspects what they do.

use parking_lot::Mutex;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub message: String,
    pub line: u32,
    pub source: Option<String>,
    /// Set for call trace and profiling output rather than a problem report.
    pub trace: bool,
}

impl Warning {
    pub fn new(message: impl Into<String>, line: u32) -> Self {
        Warning {
            message: message.into(),
            line,
            source: None,
            trace: false,
        }
    }

    pub fn trace(message: impl Into<String>, line: u32) -> Self {
        Warning {
            trace: true,
            ..Warning::new(message, line)
        }
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.trace { "Trace" } else { "Warning" };
        match &self.source {
            Some(source) => write!(f, "{}: {} at {}:{}", kind, self.message, source, self.line),
            None => write!(f, "{}: {} at line {}", kind, self.message, self.line),
        }
    }
}

pub trait Watcher: Send + Sync {
    fn warning(&self, warning: &Warning);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default)]
pub struct LogWatcher;

impl Watcher for LogWatcher {
    fn warning(&self, warning: &Warning) {
        let source = warning.source.as_deref().unwrap_or("<unknown>");
        if warning.trace {
            tracing::info!(target: "drowse::trace", source, line = warning.line, "{}", warning.message);
        } else {
            tracing::warn!(target: "drowse::script", source, line = warning.line, "{}", warning.message);
        }
    }
}

/// Keeps every event it receives. Used by tests and by the console to
/// replay diagnostics.
#[derive(Debug, Default)]
pub struct CollectingWatcher {
    events: Mutex<Vec<Warning>>,
}

impl CollectingWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Warning> {
        self.events.lock().clone()
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.events.lock().iter().filter(|w| !w.trace).cloned().collect()
    }

    pub fn traces(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|w| w.trace)
            .map(|w| w.message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Watcher for CollectingWatcher {
    fn warning(&self, warning: &Warning) {
        self.events.lock().push(warning.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location() {
        let w = Warning::new("oops", 4).with_source(Some("main.sl".into()));
        assert_eq!(w.to_string(), "Warning: oops at main.sl:4");
        assert_eq!(Warning::trace("f() = 1", 2).to_string(), "Trace: f() = 1 at line 2");
    }

    #[test]
    fn collecting_watcher_splits_traces() {
        let watcher = CollectingWatcher::new();
        watcher.warning(&Warning::new("bad", 1));
        watcher.warning(&Warning::trace("add(3, 4) = 7", 1));
        assert_eq!(watcher.warnings().len(), 1);
        assert_eq!(watcher.traces(), vec!["add(3, 4) = 7".to_string()]);
    }
}
