//! Tree-walking evaluation.

use super::parser::{BinOp, CmpOp, Function, Node};
use super::{Environment, ExpressionError};

pub(crate) fn eval<E: Environment + ?Sized>(node: &Node, env: &E) -> Result<f64, ExpressionError> {
    match node {
        Node::Number(n) => Ok(*n),
        Node::Var(name) => env
            .lookup(name)
            .ok_or_else(|| ExpressionError::UnknownIdentifier(name.clone())),
        Node::Neg(inner) => Ok(-eval(inner, env)?),
        Node::Binary(op, lhs, rhs) => {
            let a = eval(lhs, env)?;
            let b = eval(rhs, env)?;
            binary(*op, a, b)
        }
        Node::Compare(op, lhs, rhs) => {
            let a = eval(lhs, env)?;
            let b = eval(rhs, env)?;
            Ok(if compare(*op, a, b) { 1.0 } else { 0.0 })
        }
        Node::And(lhs, rhs) => {
            let a = eval(lhs, env)?;
            if a == 0.0 {
                Ok(a)
            } else {
                eval(rhs, env)
            }
        }
        Node::Or(lhs, rhs) => {
            let a = eval(lhs, env)?;
            if a == 0.0 {
                eval(rhs, env)
            } else {
                Ok(a)
            }
        }
        Node::Call(func, args) => {
            let values = args
                .iter()
                .map(|a| eval(a, env))
                .collect::<Result<Vec<_>, _>>()?;
            call(*func, &values)
        }
    }
}

fn checked(value: f64, what: &'static str) -> Result<f64, ExpressionError> {
    if value.is_nan() {
        Err(ExpressionError::Domain(what))
    } else if value.is_infinite() {
        Err(ExpressionError::NotFinite)
    } else {
        Ok(value)
    }
}

fn binary(op: BinOp, a: f64, b: f64) -> Result<f64, ExpressionError> {
    match op {
        BinOp::Add => checked(a + b, "+"),
        BinOp::Sub => checked(a - b, "-"),
        BinOp::Mul => checked(a * b, "*"),
        BinOp::Div => {
            if b == 0.0 {
                return Err(ExpressionError::DivisionByZero);
            }
            checked(a / b, "/")
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(ExpressionError::DivisionByZero);
            }
            // Floored modulo: the result takes the sign of the divisor.
            let r = a % b;
            let r = if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r };
            checked(r, "%")
        }
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(ExpressionError::DivisionByZero);
            }
            checked(a.powf(b), "**")
        }
    }
}

fn compare(op: CmpOp, a: f64, b: f64) -> bool {
    match op {
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
    }
}

fn call(func: Function, args: &[f64]) -> Result<f64, ExpressionError> {
    let x = args.first().copied().unwrap_or(0.0);
    match func {
        Function::Abs => Ok(x.abs()),
        Function::Min => Ok(args.iter().copied().fold(f64::INFINITY, f64::min)),
        Function::Max => Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        Function::Sin => checked(x.sin(), "sin"),
        Function::Cos => checked(x.cos(), "cos"),
        Function::Exp => checked(x.exp(), "exp"),
        Function::Sqrt => {
            if x < 0.0 {
                return Err(ExpressionError::Domain("sqrt"));
            }
            checked(x.sqrt(), "sqrt")
        }
        Function::Log => {
            if x <= 0.0 {
                return Err(ExpressionError::Domain("log"));
            }
            match args.get(1).copied() {
                None => checked(x.ln(), "log"),
                Some(base) if base <= 0.0 || base == 1.0 => Err(ExpressionError::Domain("log")),
                Some(base) => checked(x.ln() / base.ln(), "log"),
            }
        }
    }
}
