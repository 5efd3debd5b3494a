use super::split_branch;
use crate::closure::{BoundClosure, Closure};
use crate::context::{Context, Handler};
use crate::dispatch;
use crate::flow::{Cursor, Flow};
use crate::host;
use crate::taint::{self, TaintPolicy};
use drowse_core::value::ScalarArray;
use drowse_core::{
    Block, Check, EngineError, FlowKind, Fragment, Literal, Scalar, ScalarValue, Step, StepKind,
};
use std::sync::Arc;

impl Context {
    pub(crate) fn eval_step(&mut self, step: &Step, resume: Option<Cursor>) -> Result<Flow, EngineError> {
        match &step.kind {
            StepKind::CreateFrame => self.create_frame(),
            StepKind::Literal(literal) => self.push(literal_scalar(literal)),
            StepKind::Interpolate(fragments) => self.interpolate(fragments),
            StepKind::Get { name } => {
                let cell = self.variable(name);
                self.push(cell);
            }
            StepKind::Operate { op } => self.operate(op)?,
            StepKind::Assign { target, op } => self.assign(target, op.as_deref())?,
            StepKind::AssignMulti { targets, op } => self.assign_multi(targets, op.as_deref())?,
            StepKind::Index => self.index()?,
            StepKind::Call { function } => self.call_step(function)?,
            StepKind::Closure { body } => {
                let closure = self.new_closure(body.clone(), None);
                self.push(closure.to_scalar());
            }
            StepKind::Bind { name, body, inline } => self.bind(name, body, *inline),
            StepKind::Decide {
                check,
                then,
                otherwise,
            } => return self.decide(check, then, otherwise.as_deref(), resume),
            StepKind::Loop {
                check,
                body,
                increment,
            } => return self.run_loop(check, body, increment.as_deref(), resume),
            StepKind::IterCreate { key, value } => self.iter_create(key.as_deref(), value)?,
            StepKind::IterDestroy => {
                self.iterators.pop();
            }
            StepKind::ObjectNew { class } => self.object_new(class)?,
            StepKind::ObjectAccess { member, class } => {
                self.object_access(member.as_deref(), class.as_deref())?
            }
            StepKind::Try { body, handler, var } => return self.run_try(body, handler, var, resume),
            StepKind::Flow { kind, value } => return Ok(self.flow_step(*kind, *value)),
        }
        Ok(Flow::Normal)
    }

    // -----------------------------------------------------------------------
    // Values and variables
    // -----------------------------------------------------------------------

    fn interpolate(&mut self, fragments: &[Fragment]) {
        let mut text = String::new();
        let mut inputs = Vec::new();
        for fragment in fragments {
            match fragment {
                Fragment::Text(t) => text.push_str(t),
                Fragment::Var(name) => match self.scope.lookup(name) {
                    Some(cell) => {
                        text.push_str(&cell.as_string());
                        inputs.push(cell);
                    }
                    None => {
                        if self.flags().strict {
                            self.warn(&format!("variable '{}' not declared", name));
                        }
                    }
                },
            }
        }
        let result = taint::propagate(self, &inputs, Scalar::string(text), "interpolation");
        self.push(result);
    }

    /// The cell for `name`, autovivified in the global scope by sigil.
    pub(crate) fn variable(&mut self, name: &str) -> Scalar {
        if name == "$null" {
            return Scalar::null();
        }
        if let Some(cell) = self.scope.lookup(name) {
            return cell;
        }
        if name.starts_with('&') {
            return self.function_value(name);
        }
        if self.flags().strict {
            self.warn(&format!("variable '{}' not declared", name));
        }
        let cell = match name.chars().next() {
            Some('@') => Scalar::new_array(),
            Some('%') => Scalar::new_hash(),
            _ => Scalar::null(),
        };
        self.scope.global().put(name, cell.clone());
        cell
    }

    /// `&name` used as a value: the bound closure, or a callable handle.
    fn function_value(&mut self, name: &str) -> Scalar {
        match self.env().function(name) {
            Some(function) => function
                .closure()
                .unwrap_or_else(|| crate::closure::NamedFunction::scalar(name, self.script())),
            None if self.env().inline(name).is_some() => {
                crate::closure::NamedFunction::scalar(name, self.script())
            }
            None => {
                self.warn(&format!("function {} is not defined", name));
                Scalar::null()
            }
        }
    }

    // -----------------------------------------------------------------------
    // Operators, assignment and indexing
    // -----------------------------------------------------------------------

    pub(crate) fn apply_operator(&mut self, op: &str, args: Vec<Scalar>) -> Result<Scalar, EngineError> {
        let operator = self
            .env()
            .operator(op)
            .ok_or_else(|| EngineError::runtime(format!("unknown operator '{}'", op)))?;
        let inputs = if self.taint_enabled() { args.clone() } else { Vec::new() };
        let result = operator.operate(op, self, args)?;
        Ok(taint::propagate(self, &inputs, result, op))
    }

    fn operate(&mut self, op: &str) -> Result<(), EngineError> {
        let args = self.kill_frame();
        let result = self.apply_operator(op, args)?;
        self.push(result);
        Ok(())
    }

    fn target_cell(&mut self, target: &Block) -> Result<Scalar, EngineError> {
        self.eval_into_frame(target)?
            .pop()
            .ok_or_else(|| EngineError::runtime("assignment target produced no value"))
    }

    fn store(&mut self, cell: &Scalar, value: &Scalar, op: Option<&str>) -> Result<(), EngineError> {
        match op {
            None => cell.assign_from(value),
            Some(op) => {
                let combined = self.apply_operator(op, vec![cell.clone(), value.clone()])?;
                cell.assign_from(&combined);
            }
        }
        Ok(())
    }

    fn assign(&mut self, target: &Block, op: Option<&str>) -> Result<(), EngineError> {
        let value = self.pop_value();
        self.kill_frame();
        let cell = self.target_cell(target)?;
        self.store(&cell, &value, op)?;
        self.push(cell);
        Ok(())
    }

    fn assign_multi(&mut self, targets: &[Arc<Block>], op: Option<&str>) -> Result<(), EngineError> {
        let source = self.pop_value();
        self.kill_frame();
        let elements = match source.get().inner() {
            ScalarValue::Array(array) => Some(array.snapshot()?),
            ScalarValue::Hash(map) => Some(map.values()),
            _ => None,
        };
        for (i, target) in targets.iter().enumerate() {
            let value = match &elements {
                Some(items) => items.get(i).cloned().unwrap_or_default(),
                None => source.clone(),
            };
            let cell = self.target_cell(target)?;
            self.store(&cell, &value, op)?;
        }
        self.push(source);
        Ok(())
    }

    fn index(&mut self) -> Result<(), EngineError> {
        let mut args = self.kill_frame();
        let index = args.pop().unwrap_or_default();
        let container = args.pop().unwrap_or_default();
        let cell = index_cell(&container, &index)?;
        self.push(cell);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Calls and closures
    // -----------------------------------------------------------------------

    fn call_step(&mut self, name: &str) -> Result<(), EngineError> {
        let args = self.kill_frame();
        let inputs = if self.taint_enabled() { args.clone() } else { Vec::new() };
        let mut result = dispatch::call_function(self, name, args)?;
        let permeable = self
            .env()
            .function(name)
            .map(|f| f.taint_policy() == TaintPolicy::Permeable)
            .unwrap_or(true);
        if permeable {
            result = taint::propagate(self, &inputs, result, name);
        }
        self.push(result);
        Ok(())
    }

    pub(crate) fn new_closure(&self, body: Arc<Block>, name: Option<&str>) -> Arc<Closure> {
        Closure::new(
            Arc::downgrade(self.script()),
            body,
            self.globals().create_internal(),
            self.current_source().map(str::to_string),
            name.map(str::to_string),
        )
    }

    fn bind(&mut self, name: &str, body: &Arc<Block>, inline: bool) {
        if inline {
            self.env().put_inline(name, body.clone());
            return;
        }
        let already_bound = self
            .env()
            .function(name)
            .and_then(|f| f.closure())
            .and_then(|c| Closure::from_scalar(&c))
            .map(|c| Arc::ptr_eq(c.body(), body))
            .unwrap_or(false);
        if already_bound {
            return;
        }
        let closure = self.new_closure(body.clone(), Some(name));
        self.env().put_function(name, Arc::new(BoundClosure::new(closure)));
        tracing::debug!(function = name, "bound function");
    }

    // -----------------------------------------------------------------------
    // Control flow
    // -----------------------------------------------------------------------

    fn decide(
        &mut self,
        check: &Check,
        then: &Block,
        otherwise: Option<&Block>,
        resume: Option<Cursor>,
    ) -> Result<Flow, EngineError> {
        let (take_then, inner) = match split_branch(resume) {
            Some((branch, inner)) => (branch == 0, inner),
            None => (self.eval_check(check)?, None),
        };
        if take_then {
            Ok(self.eval_block(then, inner)?.through(0))
        } else if let Some(otherwise) = otherwise {
            Ok(self.eval_block(otherwise, inner)?.through(1))
        } else {
            Ok(Flow::Normal)
        }
    }

    fn run_loop(
        &mut self,
        check: &Check,
        body: &Block,
        increment: Option<&Block>,
        resume: Option<Cursor>,
    ) -> Result<Flow, EngineError> {
        let mut resume = split_branch(resume);
        loop {
            let (run_body, body_resume, increment_resume) = match resume.take() {
                Some((1, inner)) => (false, None, inner),
                Some((_, inner)) => (true, inner, None),
                None => {
                    if !self.eval_check(check)? {
                        break;
                    }
                    (true, None, None)
                }
            };
            self.clear_frame();
            if run_body {
                match self.eval_block(body, body_resume)? {
                    Flow::Normal | Flow::Continue => {}
                    Flow::Break => break,
                    flow if flow.suspends() => return Ok(flow.through(0)),
                    flow => return Ok(flow),
                }
            }
            if let Some(increment) = increment {
                match self.eval_block(increment, increment_resume)? {
                    Flow::Normal => {}
                    flow if flow.suspends() => return Ok(flow.through(1)),
                    flow => return Ok(flow),
                }
            }
        }
        self.clear_frame();
        Ok(Flow::Normal)
    }

    fn run_try(
        &mut self,
        body: &Arc<Block>,
        handler: &Block,
        var: &str,
        resume: Option<Cursor>,
    ) -> Result<Flow, EngineError> {
        let (branch, inner) = match split_branch(resume) {
            Some((branch, inner)) => (Some(branch), inner),
            None => (None, None),
        };
        if branch == Some(1) {
            // The catch scope was saved with the suspended level.
            return self.run_handler(handler, inner);
        }
        let slot = self.install_handler(Handler {
            var: var.to_string(),
        });
        let flow = self.eval_block(body, inner);
        if let (Ok(Flow::Throw(value)), Some(var)) = (&flow, self.handler_var(slot)) {
            self.trace_logic(&format!("caught {} into {}", value.describe(), var));
        }
        self.remove_handlers(slot);
        match flow? {
            Flow::Throw(value) => {
                self.settle_trace();
                let vars = self.globals().create_local();
                vars.put(var, value);
                self.scope.push_local(vars);
                self.run_handler(handler, None)
            }
            flow => Ok(flow.through(0)),
        }
    }

    /// Run a handler over the catch scope on top of the current level. A
    /// handler that suspends leaves the catch scope in place for the resume.
    fn run_handler(&mut self, handler: &Block, resume: Option<Cursor>) -> Result<Flow, EngineError> {
        let flow = self.eval_block(handler, resume);
        if !matches!(&flow, Ok(flow) if flow.suspends()) {
            self.scope.pop_local();
        }
        Ok(flow?.through(1))
    }

    fn flow_step(&mut self, kind: FlowKind, has_value: bool) -> Flow {
        let value = if has_value {
            let value = self.pop_value();
            self.kill_frame();
            value
        } else {
            Scalar::null()
        };
        match kind {
            FlowKind::Return => Flow::Return(value),
            FlowKind::Break => Flow::Break,
            FlowKind::Continue => Flow::Continue,
            FlowKind::Throw => Flow::Throw(value),
            FlowKind::Yield => Flow::Yield {
                value,
                cursor: Vec::new(),
            },
            FlowKind::CallCC => Flow::CallCC {
                target: value,
                cursor: Vec::new(),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Host objects
    // -----------------------------------------------------------------------

    fn object_new(&mut self, class: &str) -> Result<(), EngineError> {
        let args = self.kill_frame();
        let inputs = if self.taint_enabled() { args.clone() } else { Vec::new() };
        let result = host::construct(self, class, args)?;
        let result = taint::propagate(self, &inputs, result, class);
        self.push(result);
        Ok(())
    }

    fn object_access(&mut self, member: Option<&str>, class: Option<&str>) -> Result<(), EngineError> {
        let mut args = self.kill_frame();
        let inputs = if self.taint_enabled() { args.clone() } else { Vec::new() };
        let result = match class {
            Some(class) => host::invoke_static(self, class, member.unwrap_or_default(), args)?,
            None => {
                if args.is_empty() {
                    return Err(EngineError::runtime("message send without a receiver"));
                }
                let receiver = args.remove(0);
                let value = receiver.get();
                match value.inner() {
                    ScalarValue::Closure(_) => dispatch::call_scalar(self, &receiver, member, args)?,
                    ScalarValue::Null => {
                        return Err(EngineError::NullDereference(format!(
                            "cannot send {} to $null",
                            member.unwrap_or("a call")
                        )))
                    }
                    _ => match member {
                        Some(member) => host::invoke_member(self, &receiver, member, args)?,
                        None => {
                            return Err(EngineError::bad_cast(format!(
                                "{} is not a function",
                                receiver.type_name()
                            )))
                        }
                    },
                }
            }
        };
        let result = taint::propagate(self, &inputs, result, member.unwrap_or("call"));
        self.push(result);
        Ok(())
    }
}

pub(crate) fn literal_scalar(literal: &Literal) -> Scalar {
    match literal {
        Literal::Null => Scalar::null(),
        Literal::Int(n) => Scalar::int(*n),
        Literal::Float(f) => Scalar::float(*f),
        Literal::Str(s) => Scalar::string(s.clone()),
    }
}

/// Element cell of `container` at `index`. An empty container cell becomes
/// a Sequence for a numeric index and a Map otherwise.
pub(crate) fn index_cell(container: &Scalar, index: &Scalar) -> Result<Scalar, EngineError> {
    let value = container.get();
    match value.inner() {
        ScalarValue::Null => {
            if index.is_number() {
                container.set(ScalarValue::Array(ScalarArray::new()));
            } else {
                container.set(ScalarValue::Hash(drowse_core::value::ScalarHash::new()));
            }
            index_cell(container, index)
        }
        ScalarValue::Array(array) => array.get(index.as_int()),
        ScalarValue::Hash(map) => map.get_or_create(&index.as_string()),
        ScalarValue::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len() as i64;
            let mut i = index.as_int();
            if i < 0 {
                i += len;
            }
            if i < 0 || i >= len {
                return Err(EngineError::BadIndex(format!(
                    "{} in a string of length {}",
                    index.as_int(),
                    len
                )));
            }
            Ok(Scalar::string(chars[i as usize].to_string()))
        }
        other => Err(EngineError::bad_cast(format!(
            "cannot index into a value of type {}",
            other.type_name()
        ))),
    }
}
