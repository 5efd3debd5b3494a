//! Flow signalling between Steps, Blocks and the dispatcher.

use drowse_core::Scalar;
use std::fmt;

/// Resume position inside a closure body.
///
/// Innermost entry first: a Block pushes the index it should restart at as
/// the flow leaves it, so the outermost Block pops from the end.
pub type Cursor = Vec<usize>;

/// Result of evaluating a Step or a Block.
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Return(Scalar),
    Break,
    Continue,
    Throw(Scalar),
    Yield { value: Scalar, cursor: Cursor },
    CallCC { target: Scalar, cursor: Cursor },
}

impl Flow {
    pub fn is_normal(&self) -> bool {
        matches!(self, Flow::Normal)
    }

    /// Yield and callcc keep iterator state alive for the resume.
    pub(crate) fn suspends(&self) -> bool {
        matches!(self, Flow::Yield { .. } | Flow::CallCC { .. })
    }

    /// Record that the flow left a compound Step through branch `branch`.
    pub(crate) fn through(mut self, branch: usize) -> Flow {
        if let Flow::Yield { cursor, .. } | Flow::CallCC { cursor, .. } = &mut self {
            cursor.push(branch);
        }
        self
    }

    pub fn name(&self) -> &'static str {
        match self {
            Flow::Normal => "normal",
            Flow::Return(_) => "return",
            Flow::Break => "break",
            Flow::Continue => "continue",
            Flow::Throw(_) => "throw",
            Flow::Yield { .. } => "yield",
            Flow::CallCC { .. } => "callcc",
        }
    }
}

/// One entry of a recorded script stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub description: String,
    pub source: Option<String>,
    pub line: u32,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} at {}:{}", self.description, source, self.line),
            None => write!(f, "{} at line {}", self.description, self.line),
        }
    }
}

/// Render frames most recent first, one per line.
pub fn format_stack_trace(frames: &[StackFrame]) -> String {
    let mut out = String::new();
    for (i, frame) in frames.iter().rev().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("  #{}: {}", i, frame));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_through_only_touches_suspensions() {
        let flow = Flow::Yield {
            value: Scalar::int(1),
            cursor: vec![3],
        }
        .through(0);
        match flow {
            Flow::Yield { cursor, .. } => assert_eq!(cursor, vec![3, 0]),
            other => panic!("unexpected {}", other.name()),
        }
        assert!(Flow::Break.through(1).name() == "break");
    }

    #[test]
    fn test_trace_is_most_recent_first() {
        let frames = vec![
            StackFrame {
                description: "&outer()".into(),
                source: Some("main.sl".into()),
                line: 3,
            },
            StackFrame {
                description: "&inner()".into(),
                source: None,
                line: 9,
            },
        ];
        let text = format_stack_trace(&frames);
        assert_eq!(
            text,
            "  #0: &inner() at line 9\n  #1: &outer() at main.sl:3"
        );
    }
}
