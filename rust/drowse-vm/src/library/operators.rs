use crate::context::Context;
use crate::env::Environment;
use drowse_core::value::KeyValuePair;
use drowse_core::{EngineError, Scalar, ScalarValue};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Scalar) -> Num {
        let held = value.get();
        match held.inner() {
            ScalarValue::Int(n) => Num::Int(*n),
            ScalarValue::Float(f) => Num::Float(*f),
            ScalarValue::Str(s) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(n) => Num::Int(n),
                    Err(_) => s.parse::<f64>().map(Num::Float).unwrap_or(Num::Int(0)),
                }
            }
            other => Num::Int(other.as_int()),
        }
    }

    fn float(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(f) => f,
        }
    }

    fn scalar(self) -> Scalar {
        match self {
            Num::Int(n) => Scalar::int(n),
            Num::Float(f) => Scalar::float(f),
        }
    }
}

fn operands(op: &str, args: &[Scalar]) -> Result<(Scalar, Scalar), EngineError> {
    match args {
        [lhs, rhs] => Ok((lhs.clone(), rhs.clone())),
        _ => Err(EngineError::runtime(format!(
            "operator {} expects 2 operands, got {}",
            op,
            args.len()
        ))),
    }
}

fn arithmetic(op: &str, _: &mut Context, args: Vec<Scalar>) -> Result<Scalar, EngineError> {
    if op == "-" && args.len() == 1 {
        return Ok(match Num::of(&args[0]) {
            Num::Int(n) => Num::Int(n.wrapping_neg()),
            Num::Float(f) => Num::Float(-f),
        }
        .scalar());
    }
    let (lhs, rhs) = operands(op, &args)?;
    let result = match (Num::of(&lhs), Num::of(&rhs)) {
        (Num::Int(a), Num::Int(b)) => match op {
            "+" => Num::Int(a.wrapping_add(b)),
            "-" => Num::Int(a.wrapping_sub(b)),
            "*" => Num::Int(a.wrapping_mul(b)),
            "/" | "%" if b == 0 => return Err(EngineError::runtime("division by zero")),
            "/" => Num::Int(a.wrapping_div(b)),
            "%" => Num::Int(a.wrapping_rem(b)),
            "**" => match u32::try_from(b).ok().and_then(|e| a.checked_pow(e)) {
                Some(n) => Num::Int(n),
                None => Num::Float((a as f64).powf(b as f64)),
            },
            _ => return Err(EngineError::runtime(format!("unknown operator '{}'", op))),
        },
        (a, b) => {
            let (a, b) = (a.float(), b.float());
            Num::Float(match op {
                "+" => a + b,
                "-" => a - b,
                "*" => a * b,
                "/" => a / b,
                "%" => a % b,
                "**" => a.powf(b),
                _ => return Err(EngineError::runtime(format!("unknown operator '{}'", op))),
            })
        }
    };
    Ok(result.scalar())
}

fn bitwise(op: &str, _: &mut Context, args: Vec<Scalar>) -> Result<Scalar, EngineError> {
    let (lhs, rhs) = operands(op, &args)?;
    let (a, b) = (lhs.as_int(), rhs.as_int());
    Ok(Scalar::int(match op {
        "&" => a & b,
        "|" => a | b,
        "^" => a ^ b,
        "<<" => a.wrapping_shl(b as u32),
        ">>" => a.wrapping_shr(b as u32),
        _ => return Err(EngineError::runtime(format!("unknown operator '{}'", op))),
    }))
}

/// Numeric comparison the way `<=>` and the comparison predicates see it.
pub(super) fn numeric_order(lhs: &Scalar, rhs: &Scalar) -> Ordering {
    match (Num::of(lhs), Num::of(rhs)) {
        (Num::Int(a), Num::Int(b)) => a.cmp(&b),
        (a, b) => a.float().partial_cmp(&b.float()).unwrap_or(Ordering::Equal),
    }
}

fn ordering(order: Ordering) -> Scalar {
    Scalar::int(match order {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

pub(super) fn install(env: &Environment) {
    for op in ["+", "-", "*", "/", "%", "**"] {
        env.define_operator(op, arithmetic);
    }
    for op in ["&", "|", "^", "<<", ">>"] {
        env.define_operator(op, bitwise);
    }

    env.define_operator(".", |op: &str, _: &mut Context, args: Vec<Scalar>| -> Result<Scalar, EngineError> {
        let (lhs, rhs) = operands(op, &args)?;
        Ok(Scalar::string(lhs.as_string() + &rhs.as_string()))
    });

    env.define_operator("x", |op: &str, _: &mut Context, args: Vec<Scalar>| -> Result<Scalar, EngineError> {
        let (lhs, rhs) = operands(op, &args)?;
        let count = usize::try_from(rhs.as_int()).unwrap_or(0);
        Ok(Scalar::string(lhs.as_string().repeat(count)))
    });

    env.define_operator("<=>", |op: &str, _: &mut Context, args: Vec<Scalar>| -> Result<Scalar, EngineError> {
        let (lhs, rhs) = operands(op, &args)?;
        Ok(ordering(numeric_order(&lhs, &rhs)))
    });

    env.define_operator("cmp", |op: &str, _: &mut Context, args: Vec<Scalar>| -> Result<Scalar, EngineError> {
        let (lhs, rhs) = operands(op, &args)?;
        Ok(ordering(lhs.as_string().cmp(&rhs.as_string())))
    });

    env.define_operator("!", |_: &str, _: &mut Context, args: Vec<Scalar>| -> Result<Scalar, EngineError> {
        let truthy = args.first().is_some_and(Scalar::is_truthy);
        Ok(Scalar::int(!truthy as i64))
    });

    env.define_operator("=>", |op: &str, _: &mut Context, args: Vec<Scalar>| -> Result<Scalar, EngineError> {
        let (key, value) = operands(op, &args)?;
        Ok(Scalar::object(KeyValuePair::new(key.copy(), value.copy()).into_object()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_parses_strings() {
        assert_eq!(Num::of(&Scalar::string(" 12 ")), Num::Int(12));
        assert_eq!(Num::of(&Scalar::string("1.5")), Num::Float(1.5));
        assert_eq!(Num::of(&Scalar::string("abc")), Num::Int(0));
        assert_eq!(Num::of(&Scalar::null()), Num::Int(0));
    }

    #[test]
    fn test_ordering_values() {
        assert_eq!(ordering(Ordering::Less).as_int(), -1);
        assert_eq!(ordering(Ordering::Greater).as_int(), 1);
    }
}
