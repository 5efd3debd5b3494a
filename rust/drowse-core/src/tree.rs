//! Instruction tree: immutable Blocks of Steps.
//!
//! A compiled script is a tree of [`Block`]s. Blocks are shared through
//! `Arc` so one compiled program can be executed by many contexts at once;
//! the address of a Block doubles as its identity for exception handlers.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Source identity used in stack traces, usually a file name.
    #[serde(default)]
    pub source: Option<String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub line: u32,
    pub kind: StepKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Fragment {
    Text(String),
    Var(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowKind {
    Return,
    Break,
    Continue,
    Throw,
    Yield,
    CallCC,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Check {
    /// Evaluate `setup` into a fresh frame, then ask the named predicate.
    Predicate {
        setup: Arc<Block>,
        name: String,
        negated: bool,
    },
    And(Vec<Check>),
    Or(Vec<Check>),
    /// Advance the innermost iterator; false once it is exhausted.
    IterNext,
    Always,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepKind {
    CreateFrame,
    Literal(Literal),
    Interpolate(Vec<Fragment>),
    Get {
        name: String,
    },
    Operate {
        op: String,
    },
    Assign {
        target: Arc<Block>,
        #[serde(default)]
        op: Option<String>,
    },
    AssignMulti {
        targets: Vec<Arc<Block>>,
        #[serde(default)]
        op: Option<String>,
    },
    Index,
    Call {
        function: String,
    },
    Closure {
        body: Arc<Block>,
    },
    Bind {
        name: String,
        body: Arc<Block>,
        #[serde(default)]
        inline: bool,
    },
    Decide {
        check: Check,
        then: Arc<Block>,
        #[serde(default)]
        otherwise: Option<Arc<Block>>,
    },
    Loop {
        check: Check,
        body: Arc<Block>,
        #[serde(default)]
        increment: Option<Arc<Block>>,
    },
    IterCreate {
        #[serde(default)]
        key: Option<String>,
        value: String,
    },
    IterDestroy,
    ObjectNew {
        class: String,
    },
    /// With `class` set this is a static access; otherwise the first frame
    /// element is the receiver. A missing `member` calls a closure receiver
    /// without a message.
    ObjectAccess {
        #[serde(default)]
        member: Option<String>,
        #[serde(default)]
        class: Option<String>,
    },
    Try {
        body: Arc<Block>,
        handler: Arc<Block>,
        var: String,
    },
    /// `value` means the flow carries the last Scalar of the current frame,
    /// which is then killed.
    Flow {
        kind: FlowKind,
        #[serde(default)]
        value: bool,
    },
}

impl Step {
    pub fn new(line: u32, kind: StepKind) -> Self {
        Step { line, kind }
    }
}

impl Block {
    pub fn new(steps: Vec<Step>) -> Self {
        Block {
            source: None,
            steps,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Line of the first step, or 0 for an empty block.
    pub fn first_line(&self) -> u32 {
        self.steps.first().map(|s| s.line).unwrap_or(0)
    }

    /// Indented listing of the tree, one step per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        dump_block(self, 0, &mut out);
        out
    }
}

fn dump_block(block: &Block, depth: usize, out: &mut String) {
    for step in &block.steps {
        let pad = "  ".repeat(depth);
        let _ = write!(out, "{}[{}] ", pad, step.line);
        match &step.kind {
            StepKind::CreateFrame => out.push_str("CreateFrame\n"),
            StepKind::Literal(lit) => {
                let _ = writeln!(out, "Literal {:?}", lit);
            }
            StepKind::Interpolate(parts) => {
                let _ = writeln!(out, "Interpolate {:?}", parts);
            }
            StepKind::Get { name } => {
                let _ = writeln!(out, "Get {}", name);
            }
            StepKind::Operate { op } => {
                let _ = writeln!(out, "Operate {}", op);
            }
            StepKind::Assign { target, op } => {
                let _ = writeln!(out, "Assign {}", op.as_deref().unwrap_or("="));
                dump_block(target, depth + 1, out);
            }
            StepKind::AssignMulti { targets, op } => {
                let _ = writeln!(
                    out,
                    "AssignMulti {} x{}",
                    op.as_deref().unwrap_or("="),
                    targets.len()
                );
                for target in targets {
                    dump_block(target, depth + 1, out);
                }
            }
            StepKind::Index => out.push_str("Index\n"),
            StepKind::Call { function } => {
                let _ = writeln!(out, "Call {}", function);
            }
            StepKind::Closure { body } => {
                out.push_str("Closure\n");
                dump_block(body, depth + 1, out);
            }
            StepKind::Bind { name, body, inline } => {
                let _ = writeln!(out, "Bind {}{}", name, if *inline { " (inline)" } else { "" });
                dump_block(body, depth + 1, out);
            }
            StepKind::Decide {
                check,
                then,
                otherwise,
            } => {
                let _ = writeln!(out, "Decide {}", describe_check(check));
                dump_block(then, depth + 1, out);
                if let Some(otherwise) = otherwise {
                    let _ = writeln!(out, "{}else", pad);
                    dump_block(otherwise, depth + 1, out);
                }
            }
            StepKind::Loop {
                check,
                body,
                increment,
            } => {
                let _ = writeln!(out, "Loop {}", describe_check(check));
                dump_block(body, depth + 1, out);
                if let Some(increment) = increment {
                    let _ = writeln!(out, "{}increment", pad);
                    dump_block(increment, depth + 1, out);
                }
            }
            StepKind::IterCreate { key, value } => match key {
                Some(key) => {
                    let _ = writeln!(out, "IterCreate {}, {}", key, value);
                }
                None => {
                    let _ = writeln!(out, "IterCreate {}", value);
                }
            },
            StepKind::IterDestroy => out.push_str("IterDestroy\n"),
            StepKind::ObjectNew { class } => {
                let _ = writeln!(out, "ObjectNew {}", class);
            }
            StepKind::ObjectAccess { member, class } => {
                let _ = writeln!(
                    out,
                    "ObjectAccess {}{}",
                    class.as_deref().map(|c| format!("{}.", c)).unwrap_or_default(),
                    member.as_deref().unwrap_or("<call>")
                );
            }
            StepKind::Try { body, handler, var } => {
                out.push_str("Try\n");
                dump_block(body, depth + 1, out);
                let _ = writeln!(out, "{}catch {}", pad, var);
                dump_block(handler, depth + 1, out);
            }
            StepKind::Flow { kind, value } => {
                let _ = writeln!(out, "Flow {:?}{}", kind, if *value { " (value)" } else { "" });
            }
        }
    }
}

fn describe_check(check: &Check) -> String {
    match check {
        Check::Predicate { name, negated, .. } => {
            format!("{}{}", if *negated { "!" } else { "" }, name)
        }
        Check::And(parts) => parts
            .iter()
            .map(describe_check)
            .collect::<Vec<_>>()
            .join(" && "),
        Check::Or(parts) => parts
            .iter()
            .map(describe_check)
            .collect::<Vec<_>>()
            .join(" || "),
        Check::IterNext => "next".to_string(),
        Check::Always => "true".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_nests_child_blocks() {
        let body = Arc::new(Block::new(vec![Step::new(2, StepKind::Flow {
            kind: FlowKind::Break,
            value: false,
        })]));
        let block = Block::new(vec![Step::new(1, StepKind::Loop {
            check: Check::Always,
            body,
            increment: None,
        })]);
        let dump = block.dump();
        assert!(dump.contains("[1] Loop true"));
        assert!(dump.contains("  [2] Flow Break"));
    }

    #[test]
    fn test_first_line() {
        assert_eq!(Block::default().first_line(), 0);
        let block = Block::new(vec![Step::new(7, StepKind::CreateFrame)]);
        assert_eq!(block.first_line(), 7);
    }
}
