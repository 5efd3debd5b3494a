use crate::context::Context;
use drowse_core::{Check, EngineError, Scalar};

impl Context {
    pub(crate) fn eval_check(&mut self, check: &Check) -> Result<bool, EngineError> {
        match check {
            Check::Always => Ok(true),
            Check::IterNext => self.iter_next(),
            Check::And(parts) => {
                for part in parts {
                    if !self.eval_check(part)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Check::Or(parts) => {
                for part in parts {
                    if self.eval_check(part)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Check::Predicate {
                setup,
                name,
                negated,
            } => {
                let args = self.eval_into_frame(setup)?;
                let predicate = self
                    .env()
                    .predicate(name)
                    .ok_or_else(|| EngineError::runtime(format!("unknown predicate '{}'", name)))?;
                let described = self
                    .flags()
                    .trace_logic
                    .then(|| describe_predicate(name, *negated, &args));
                let verdict = predicate.decide(name, self, args)? != *negated;
                if let Some(described) = described {
                    self.trace_logic(&format!("{} -> {}", described, verdict));
                }
                Ok(verdict)
            }
        }
    }
}

fn describe_predicate(name: &str, negated: bool, args: &[Scalar]) -> String {
    let bang = if negated { "!" } else { "" };
    match args {
        [lhs, rhs] => format!("{} {}{} {}", lhs.describe(), bang, name, rhs.describe()),
        [operand] => format!("{}{} {}", bang, name, operand.describe()),
        _ => format!(
            "{}{}({})",
            bang,
            name,
            args.iter().map(Scalar::describe).collect::<Vec<_>>().join(", ")
        ),
    }
}
