//! Tree-walking evaluator.
//!
//! Every Step returns a [`Flow`]. A Block stops at the first abnormal flow,
//! unwinds what it installed and hands the flow to its evaluator. Native
//! faults are caught here, at the Block boundary: fatal ones are re-raised,
//! the rest are reported and become a throw of the fault message.

mod check;
pub(crate) mod iter;
mod step;

use crate::context::Context;
use crate::flow::{Cursor, Flow};
use drowse_core::{Block, EngineError, Scalar, StepKind};

/// Split a resume cursor into the Step index to start at and the cursor
/// for that Step, if it has to be resumed rather than started.
fn split_cursor(resume: Option<Cursor>) -> (usize, Option<Cursor>) {
    match resume {
        Some(mut cursor) => {
            let start = cursor.pop().unwrap_or(0);
            if cursor.is_empty() {
                (start, None)
            } else {
                (start, Some(cursor))
            }
        }
        None => (0, None),
    }
}

impl Context {
    /// Evaluate `block`, optionally resuming a suspended position inside it.
    pub fn eval_block(&mut self, block: &Block, resume: Option<Cursor>) -> Result<Flow, EngineError> {
        let marks = self.marks();
        if let Some(source) = &block.source {
            self.push_source(source.clone());
        }
        let (start, mut inner) = split_cursor(resume);
        let mut outcome = Ok(Flow::Normal);
        for (index, step) in block.steps.iter().enumerate().skip(start) {
            self.set_line(step.line);
            let resume_here = if index == start { inner.take() } else { None };
            let flow = match self.eval_step(step, resume_here) {
                Ok(flow) => flow,
                Err(EngineError::Thrown(value)) => Flow::Throw(value),
                Err(err) if err.is_fatal() => {
                    outcome = Err(err);
                    break;
                }
                Err(err) => {
                    self.error_at(&err.to_string(), step.line);
                    Flow::Throw(err.to_scalar())
                }
            };
            if flow.is_normal() {
                continue;
            }
            outcome = Ok(match flow {
                Flow::Yield { value, mut cursor } => {
                    cursor.push(resume_index(&cursor, index));
                    Flow::Yield { value, cursor }
                }
                Flow::CallCC { target, mut cursor } => {
                    cursor.push(resume_index(&cursor, index));
                    Flow::CallCC { target, cursor }
                }
                other => other,
            });
            break;
        }
        match &outcome {
            Ok(Flow::Normal) => {
                if block.source.is_some() {
                    self.pop_source();
                }
            }
            Ok(flow) => self.unwind(marks, flow.suspends()),
            Err(_) => self.unwind(marks, false),
        }
        outcome
    }

    /// Register the named functions declared at the top level of `block`,
    /// so a script can call a `sub` defined further down.
    pub(crate) fn hoist_bindings(&mut self, block: &Block) -> Result<usize, EngineError> {
        let mut bound = 0;
        for step in &block.steps {
            if let StepKind::Bind { .. } = step.kind {
                self.set_line(step.line);
                self.eval_step(step, None)?;
                bound += 1;
            }
        }
        Ok(bound)
    }

    /// Evaluate an expression-only block into a fresh frame and return the
    /// operands it left there. A throw inside comes back as
    /// [`EngineError::Thrown`].
    pub(crate) fn eval_into_frame(&mut self, block: &Block) -> Result<Vec<Scalar>, EngineError> {
        self.create_frame();
        let depth = self.frame_depth();
        let flow = self.eval_block(block, None);
        self.truncate_frames(depth);
        let values = self.kill_frame();
        match flow? {
            Flow::Normal => Ok(values),
            Flow::Throw(value) => Err(EngineError::Thrown(value)),
            other => Err(EngineError::runtime(format!(
                "{} is not allowed inside an expression",
                other.name()
            ))),
        }
    }
}

/// A Flow step suspends with an empty cursor and resumes after itself; a
/// compound step has already pushed its branch and is resumed in place.
fn resume_index(cursor: &Cursor, index: usize) -> usize {
    if cursor.is_empty() {
        index + 1
    } else {
        index
    }
}

/// Split off the branch a compound step was suspended in.
pub(crate) fn split_branch(resume: Option<Cursor>) -> Option<(usize, Option<Cursor>)> {
    resume.map(|mut cursor| {
        let branch = cursor.pop().unwrap_or(0);
        let rest = if cursor.is_empty() { None } else { Some(cursor) };
        (branch, rest)
    })
}
