//! Safe evaluation of user-supplied price and filter expressions.
//!
//! Resources advertise a price expression and jobs may carry a maximum
//! price expression. Both are untrusted text, so they are never handed to
//! anything resembling a host `eval`: they are tokenized, parsed into a
//! small tree and walked by an evaluator whose only contact with the
//! outside world is the [`Environment`] passed to it.
//!
//! Accepted language:
//!
//! * integer and decimal literals (`3`, `2.5`, `.5`)
//! * parentheses and the operators `+ - * / % **` and unary `-`
//! * comparisons `< <= > >= == !=` yielding `0` or `1`
//! * short-circuit `and` / `or`, returning the deciding operand
//! * the functions `abs`, `min`, `max`, `sin`, `cos`, `exp`, `log`, `sqrt`
//! * identifiers, resolved only through the environment
//!
//! ```
//! use std::collections::HashMap;
//! use grid_scheduler::expr::{evaluate, Expression};
//!
//! let mut env = HashMap::new();
//! env.insert("cputime".to_string(), 7200.0);
//! assert_eq!(evaluate("2 * cputime / 3600", &env).unwrap(), 4.0);
//!
//! let expr = Expression::parse("max(1, cputime / 3600)").unwrap();
//! assert_eq!(expr.eval(&env).unwrap(), 2.0);
//! ```

mod eval;
mod lexer;
mod parser;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::BuildHasher;

use thiserror::Error;

use self::parser::{Node, Parser};

/// Longest accepted expression source, in bytes.
pub const MAX_SOURCE_LEN: usize = 4096;

/// Deepest accepted expression tree.
///
/// Every operator, call and unary minus adds a level, so `1+1+1` is three
/// levels deep. Parentheses alone add none.
pub const MAX_DEPTH: usize = 128;

/// Errors raised while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// The input does not follow the grammar.
    #[error("syntax error at byte {position}: {message}")]
    Syntax {
        /// Byte offset of the offending input.
        position: usize,
        /// Human-readable description.
        message: String,
    },
    /// The input uses a construct the language refuses on purpose.
    #[error("{construct} is not permitted in expressions (byte {position})")]
    Forbidden {
        /// Name of the refused construct.
        construct: String,
        /// Byte offset of the construct.
        position: usize,
    },
    /// An identifier was not present in the environment.
    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),
    /// A call names a function outside the whitelist.
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    /// A whitelisted function was called with the wrong number of arguments.
    #[error("function `{name}` takes {expected} argument(s), got {got}")]
    Arity {
        /// Function name.
        name: &'static str,
        /// Accepted argument count, as text.
        expected: &'static str,
        /// Argument count supplied.
        got: usize,
    },
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// A function or operator was applied outside its domain.
    #[error("math domain error in `{0}`")]
    Domain(&'static str),
    /// The result overflowed to infinity.
    #[error("result is not a finite number")]
    NotFinite,
    /// The input exceeds [`MAX_SOURCE_LEN`].
    #[error("expression longer than {limit} bytes")]
    TooLong {
        /// The byte limit.
        limit: usize,
    },
    /// The parsed tree is deeper than [`MAX_DEPTH`].
    #[error("expression tree deeper than {limit} levels")]
    TooDeep {
        /// The nesting limit.
        limit: usize,
    },
    /// The input contains no tokens.
    #[error("empty expression")]
    Empty,
}

/// Name lookup used while evaluating an expression.
///
/// This is the only capability the evaluator is given.
pub trait Environment {
    /// Return the value bound to `name`, if any.
    fn lookup(&self, name: &str) -> Option<f64>;
}

impl<S: BuildHasher> Environment for HashMap<String, f64, S> {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl Environment for BTreeMap<String, f64> {
    fn lookup(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl<E: Environment + ?Sized> Environment for &E {
    fn lookup(&self, name: &str) -> Option<f64> {
        (**self).lookup(name)
    }
}

/// A parsed expression, reusable across environments.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    /// Parse `source`, rejecting anything outside the accepted language.
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        if source.len() > MAX_SOURCE_LEN {
            return Err(ExpressionError::TooLong {
                limit: MAX_SOURCE_LEN,
            });
        }
        let tokens = lexer::tokenize(source)?;
        let root = Parser::new(tokens, source.len()).parse()?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// Evaluate against `env`.
    pub fn eval<E: Environment + ?Sized>(&self, env: &E) -> Result<f64, ExpressionError> {
        eval::eval(&self.root, env)
    }

    /// The original source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every variable name the expression reads, sorted.
    pub fn identifiers(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        collect_identifiers(&self.root, &mut names);
        names
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn collect_identifiers(node: &Node, names: &mut BTreeSet<String>) {
    match node {
        Node::Number(_) => {}
        Node::Var(name) => {
            names.insert(name.clone());
        }
        Node::Neg(inner) => collect_identifiers(inner, names),
        Node::Binary(_, a, b) | Node::Compare(_, a, b) | Node::And(a, b) | Node::Or(a, b) => {
            collect_identifiers(a, names);
            collect_identifiers(b, names);
        }
        Node::Call(_, args) => {
            for arg in args {
                collect_identifiers(arg, names);
            }
        }
    }
}

/// Parse and evaluate `source` in one step.
pub fn evaluate<E: Environment + ?Sized>(source: &str, env: &E) -> Result<f64, ExpressionError> {
    Expression::parse(source)?.eval(env)
}

/// True when `name` could be referenced as a variable in an expression.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !matches!(name, "and" | "or")
        && !lexer::RESERVED.contains(&name)
        && parser::Function::lookup(name).is_none()
}
