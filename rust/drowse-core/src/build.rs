//! Builder API for assembling instruction trees.
//!
//! Front ends and embedders describe statements with [`Expr`] and [`Cond`]
//! and let [`BlockBuilder`] lower them into Steps that follow the frame
//! protocol: an operation that consumes operands opens a frame, evaluates
//! each operand into it and then collapses it with a single consuming Step.
//!
//! ```
//! use drowse_core::build::{BlockBuilder, Expr};
//!
//! let block = BlockBuilder::new()
//!     .assign(Expr::var("$x"), Expr::int(3))
//!     .ret(Expr::op("+", Expr::var("$x"), Expr::int(4)))
//!     .build();
//! assert!(!block.is_empty());
//! ```

use crate::tree::{Block, Check, FlowKind, Fragment, Literal, Step, StepKind};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Interpolate(Vec<Fragment>),
    Var(String),
    Op(String, Vec<Expr>),
    Call(String, Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Assign {
        target: Box<Expr>,
        op: Option<String>,
        value: Box<Expr>,
    },
    AssignMulti {
        targets: Vec<Expr>,
        op: Option<String>,
        source: Box<Expr>,
    },
    Closure(Block),
    New(String, Vec<Expr>),
    /// Message send to a host object or closure receiver.
    Send {
        receiver: Box<Expr>,
        member: Option<String>,
        args: Vec<Expr>,
    },
    Static {
        class: String,
        member: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn null() -> Self {
        Expr::Literal(Literal::Null)
    }

    pub fn int(n: i64) -> Self {
        Expr::Literal(Literal::Int(n))
    }

    pub fn float(f: f64) -> Self {
        Expr::Literal(Literal::Float(f))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Expr::Literal(Literal::Str(s.into()))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn op(op: impl Into<String>, lhs: Expr, rhs: Expr) -> Self {
        Expr::Op(op.into(), vec![lhs, rhs])
    }

    pub fn unary(op: impl Into<String>, operand: Expr) -> Self {
        Expr::Op(op.into(), vec![operand])
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call(name.into(), args)
    }

    pub fn index(container: Expr, index: Expr) -> Self {
        Expr::Index(Box::new(container), Box::new(index))
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Expr::Assign {
            target: Box::new(target),
            op: None,
            value: Box::new(value),
        }
    }

    pub fn assign_op(target: Expr, op: impl Into<String>, value: Expr) -> Self {
        Expr::Assign {
            target: Box::new(target),
            op: Some(op.into()),
            value: Box::new(value),
        }
    }

    pub fn closure(body: Block) -> Self {
        Expr::Closure(body)
    }

    pub fn new_object(class: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::New(class.into(), args)
    }

    pub fn send(receiver: Expr, member: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Send {
            receiver: Box::new(receiver),
            member: Some(member.into()),
            args,
        }
    }

    /// Call a closure value directly: `[$f]` or `[$f: args]`.
    pub fn invoke(receiver: Expr, args: Vec<Expr>) -> Self {
        Expr::Send {
            receiver: Box::new(receiver),
            member: None,
            args,
        }
    }

    pub fn static_call(class: impl Into<String>, member: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Static {
            class: class.into(),
            member: member.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    Pred(String, Vec<Expr>),
    Not(Box<Cond>),
    And(Vec<Cond>),
    Or(Vec<Cond>),
    /// True when the expression's value is truthy.
    Truthy(Expr),
    Always,
}

impl Cond {
    pub fn pred(name: impl Into<String>, lhs: Expr, rhs: Expr) -> Self {
        Cond::Pred(name.into(), vec![lhs, rhs])
    }

    pub fn unary(name: impl Into<String>, operand: Expr) -> Self {
        Cond::Pred(name.into(), vec![operand])
    }

    pub fn not(cond: Cond) -> Self {
        Cond::Not(Box::new(cond))
    }
}

/// Lower one expression into `steps`, leaving one Scalar on the current frame.
fn lower_expr(expr: &Expr, line: u32, steps: &mut Vec<Step>) {
    let push = |steps: &mut Vec<Step>, kind| steps.push(Step::new(line, kind));
    match expr {
        Expr::Literal(lit) => push(steps, StepKind::Literal(lit.clone())),
        Expr::Interpolate(parts) => push(steps, StepKind::Interpolate(parts.clone())),
        Expr::Var(name) => push(steps, StepKind::Get { name: name.clone() }),
        Expr::Op(op, operands) => {
            push(steps, StepKind::CreateFrame);
            for operand in operands {
                lower_expr(operand, line, steps);
            }
            push(steps, StepKind::Operate { op: op.clone() });
        }
        Expr::Call(name, args) => {
            push(steps, StepKind::CreateFrame);
            for arg in args {
                lower_expr(arg, line, steps);
            }
            push(steps, StepKind::Call {
                function: name.clone(),
            });
        }
        Expr::Index(container, index) => {
            push(steps, StepKind::CreateFrame);
            lower_expr(container, line, steps);
            lower_expr(index, line, steps);
            push(steps, StepKind::Index);
        }
        Expr::Assign { target, op, value } => {
            push(steps, StepKind::CreateFrame);
            lower_expr(value, line, steps);
            push(steps, StepKind::Assign {
                target: Arc::new(lower_target(target, line)),
                op: op.clone(),
            });
        }
        Expr::AssignMulti {
            targets,
            op,
            source,
        } => {
            push(steps, StepKind::CreateFrame);
            lower_expr(source, line, steps);
            push(steps, StepKind::AssignMulti {
                targets: targets
                    .iter()
                    .map(|t| Arc::new(lower_target(t, line)))
                    .collect(),
                op: op.clone(),
            });
        }
        Expr::Closure(body) => push(steps, StepKind::Closure {
            body: Arc::new(body.clone()),
        }),
        Expr::New(class, args) => {
            push(steps, StepKind::CreateFrame);
            for arg in args {
                lower_expr(arg, line, steps);
            }
            push(steps, StepKind::ObjectNew {
                class: class.clone(),
            });
        }
        Expr::Send {
            receiver,
            member,
            args,
        } => {
            push(steps, StepKind::CreateFrame);
            lower_expr(receiver, line, steps);
            for arg in args {
                lower_expr(arg, line, steps);
            }
            push(steps, StepKind::ObjectAccess {
                member: member.clone(),
                class: None,
            });
        }
        Expr::Static {
            class,
            member,
            args,
        } => {
            push(steps, StepKind::CreateFrame);
            for arg in args {
                lower_expr(arg, line, steps);
            }
            push(steps, StepKind::ObjectAccess {
                member: Some(member.clone()),
                class: Some(class.clone()),
            });
        }
    }
}

fn lower_target(target: &Expr, line: u32) -> Block {
    let mut steps = Vec::new();
    lower_expr(target, line, &mut steps);
    Block::new(steps)
}

fn lower_cond(cond: &Cond, line: u32) -> Check {
    match cond {
        Cond::Pred(name, args) => Check::Predicate {
            setup: Arc::new(lower_args(args, line)),
            name: name.clone(),
            negated: false,
        },
        Cond::Truthy(expr) => Check::Predicate {
            setup: Arc::new(lower_args(std::slice::from_ref(expr), line)),
            name: "-istrue".to_string(),
            negated: false,
        },
        Cond::And(parts) => Check::And(parts.iter().map(|c| lower_cond(c, line)).collect()),
        Cond::Or(parts) => Check::Or(parts.iter().map(|c| lower_cond(c, line)).collect()),
        Cond::Always => Check::Always,
        Cond::Not(inner) => negate(lower_cond(inner, line), line),
    }
}

fn negate(check: Check, line: u32) -> Check {
    match check {
        Check::Predicate {
            setup,
            name,
            negated,
        } => Check::Predicate {
            setup,
            name,
            negated: !negated,
        },
        Check::And(parts) => Check::Or(parts.into_iter().map(|c| negate(c, line)).collect()),
        Check::Or(parts) => Check::And(parts.into_iter().map(|c| negate(c, line)).collect()),
        Check::Always => Check::Predicate {
            setup: Arc::new(Block::new(vec![Step::new(
                line,
                StepKind::Literal(Literal::Int(1)),
            )])),
            name: "-istrue".to_string(),
            negated: true,
        },
        Check::IterNext => Check::IterNext,
    }
}

fn lower_args(args: &[Expr], line: u32) -> Block {
    let mut steps = Vec::new();
    for arg in args {
        lower_expr(arg, line, &mut steps);
    }
    Block::new(steps)
}

/// Accumulates statements into a [`Block`]. Every statement takes the
/// current line and advances it by one; [`BlockBuilder::line`] moves it.
#[derive(Debug, Default)]
pub struct BlockBuilder {
    steps: Vec<Step>,
    line: u32,
    source: Option<String>,
}

impl BlockBuilder {
    pub fn new() -> Self {
        BlockBuilder {
            steps: Vec::new(),
            line: 1,
            source: None,
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    fn next_line(&mut self) -> u32 {
        let line = self.line;
        self.line += 1;
        line
    }

    fn flow(mut self, kind: FlowKind, value: Option<Expr>) -> Self {
        let line = self.next_line();
        match value {
            Some(expr) => {
                self.steps.push(Step::new(line, StepKind::CreateFrame));
                lower_expr(&expr, line, &mut self.steps);
                self.steps
                    .push(Step::new(line, StepKind::Flow { kind, value: true }));
            }
            None => self
                .steps
                .push(Step::new(line, StepKind::Flow { kind, value: false })),
        }
        self
    }

    /// An expression statement.
    pub fn expr(mut self, expr: Expr) -> Self {
        let line = self.next_line();
        lower_expr(&expr, line, &mut self.steps);
        self
    }

    pub fn assign(self, target: Expr, value: Expr) -> Self {
        self.expr(Expr::assign(target, value))
    }

    pub fn call(self, name: impl Into<String>, args: Vec<Expr>) -> Self {
        self.expr(Expr::call(name, args))
    }

    /// Declare names in the current local scope.
    pub fn local(self, names: &[&str]) -> Self {
        let args = names.iter().map(|n| Expr::str(*n)).collect();
        self.expr(Expr::call("&local", args))
    }

    pub fn ret(self, value: Expr) -> Self {
        self.flow(FlowKind::Return, Some(value))
    }

    pub fn ret_empty(self) -> Self {
        self.flow(FlowKind::Return, None)
    }

    pub fn throw(self, value: Expr) -> Self {
        self.flow(FlowKind::Throw, Some(value))
    }

    pub fn yield_value(self, value: Expr) -> Self {
        self.flow(FlowKind::Yield, Some(value))
    }

    /// Suspend the enclosing closure and hand it to `target`.
    pub fn callcc(self, target: Expr) -> Self {
        self.flow(FlowKind::CallCC, Some(target))
    }

    pub fn brk(self) -> Self {
        self.flow(FlowKind::Break, None)
    }

    pub fn cont(self) -> Self {
        self.flow(FlowKind::Continue, None)
    }

    pub fn if_then(self, cond: Cond, then: Block) -> Self {
        self.if_else(cond, then, None)
    }

    pub fn if_else(mut self, cond: Cond, then: Block, otherwise: Option<Block>) -> Self {
        let line = self.next_line();
        self.steps.push(Step::new(line, StepKind::Decide {
            check: lower_cond(&cond, line),
            then: Arc::new(then),
            otherwise: otherwise.map(Arc::new),
        }));
        self
    }

    pub fn while_loop(mut self, cond: Cond, body: Block) -> Self {
        let line = self.next_line();
        self.steps.push(Step::new(line, StepKind::Loop {
            check: lower_cond(&cond, line),
            body: Arc::new(body),
            increment: None,
        }));
        self
    }

    /// `for (init; cond; increment) { body }`
    pub fn for_loop(mut self, init: Vec<Expr>, cond: Cond, increment: Vec<Expr>, body: Block) -> Self {
        let line = self.next_line();
        for expr in &init {
            lower_expr(expr, line, &mut self.steps);
        }
        let mut inc = Vec::new();
        for expr in &increment {
            lower_expr(expr, line, &mut inc);
        }
        self.steps.push(Step::new(line, StepKind::Loop {
            check: lower_cond(&cond, line),
            body: Arc::new(body),
            increment: if inc.is_empty() {
                None
            } else {
                Some(Arc::new(Block::new(inc)))
            },
        }));
        self
    }

    /// `foreach $key => $value (source) { body }`
    pub fn foreach(mut self, key: Option<&str>, value: &str, source: Expr, body: Block) -> Self {
        let line = self.next_line();
        self.steps.push(Step::new(line, StepKind::CreateFrame));
        lower_expr(&source, line, &mut self.steps);
        self.steps.push(Step::new(line, StepKind::IterCreate {
            key: key.map(str::to_string),
            value: value.to_string(),
        }));
        self.steps.push(Step::new(line, StepKind::Loop {
            check: Check::IterNext,
            body: Arc::new(body),
            increment: None,
        }));
        self.steps.push(Step::new(line, StepKind::IterDestroy));
        self
    }

    pub fn try_catch(mut self, body: Block, var: &str, handler: Block) -> Self {
        let line = self.next_line();
        self.steps.push(Step::new(line, StepKind::Try {
            body: Arc::new(body),
            handler: Arc::new(handler),
            var: var.to_string(),
        }));
        self
    }

    /// `sub name { body }`
    pub fn sub(mut self, name: &str, body: Block) -> Self {
        let line = self.next_line();
        self.steps.push(Step::new(line, StepKind::Bind {
            name: name.to_string(),
            body: Arc::new(body),
            inline: false,
        }));
        self
    }

    /// `inline name { body }`
    pub fn inline(mut self, name: &str, body: Block) -> Self {
        let line = self.next_line();
        self.steps.push(Step::new(line, StepKind::Bind {
            name: name.to_string(),
            body: Arc::new(body),
            inline: true,
        }));
        self
    }

    /// Append a raw step at the current line.
    pub fn step(mut self, kind: StepKind) -> Self {
        let line = self.next_line();
        self.steps.push(Step::new(line, kind));
        self
    }

    pub fn build(self) -> Block {
        Block {
            source: self.source,
            steps: self.steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(block: &Block) -> Vec<&StepKind> {
        block.steps.iter().map(|s| &s.kind).collect()
    }

    #[test]
    fn test_operator_lowering_opens_and_collapses_frame() {
        let block = BlockBuilder::new()
            .expr(Expr::op("+", Expr::int(1), Expr::var("$x")))
            .build();
        assert_eq!(
            kinds(&block),
            vec![
                &StepKind::CreateFrame,
                &StepKind::Literal(Literal::Int(1)),
                &StepKind::Get { name: "$x".into() },
                &StepKind::Operate { op: "+".into() },
            ]
        );
    }

    #[test]
    fn test_assignment_target_is_a_separate_block() {
        let block = BlockBuilder::new()
            .assign(Expr::var("$x"), Expr::int(2))
            .build();
        match &block.steps[2].kind {
            StepKind::Assign { target, op } => {
                assert!(op.is_none());
                assert_eq!(target.steps[0].kind, StepKind::Get { name: "$x".into() });
            }
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn test_foreach_wraps_loop_with_iterator_lifecycle() {
        let block = BlockBuilder::new()
            .foreach(None, "$v", Expr::var("@list"), Block::default())
            .build();
        let ks = kinds(&block);
        assert!(matches!(ks[2], StepKind::IterCreate { .. }));
        assert!(matches!(ks[3], StepKind::Loop { check: Check::IterNext, .. }));
        assert_eq!(ks[4], &StepKind::IterDestroy);
    }

    #[test]
    fn test_negation_applies_de_morgan() {
        let cond = Cond::not(Cond::And(vec![
            Cond::pred("==", Expr::int(1), Expr::int(1)),
            Cond::Truthy(Expr::var("$x")),
        ]));
        match lower_cond(&cond, 1) {
            Check::Or(parts) => {
                assert!(parts
                    .iter()
                    .all(|p| matches!(p, Check::Predicate { negated: true, .. })));
            }
            other => panic!("expected or, got {:?}", other),
        }
    }

    #[test]
    fn test_lines_advance_per_statement() {
        let block = BlockBuilder::new()
            .line(10)
            .call("&println", vec![Expr::str("a")])
            .ret(Expr::int(1))
            .build();
        assert_eq!(block.steps.first().map(|s| s.line), Some(10));
        assert_eq!(block.steps.last().map(|s| s.line), Some(11));
    }
}
