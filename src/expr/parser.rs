//! Recursive-descent parser producing the expression tree.

use super::lexer::{Spanned, Token};
use super::{ExpressionError, MAX_DEPTH};

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

/// Comparison operators; they evaluate to 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

/// The whitelisted callable functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Abs,
    Min,
    Max,
    Sin,
    Cos,
    Exp,
    Log,
    Sqrt,
}

impl Function {
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Self::Abs,
            "min" => Self::Min,
            "max" => Self::Max,
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "exp" => Self::Exp,
            "log" => Self::Log,
            "sqrt" => Self::Sqrt,
            _ => return None,
        })
    }

    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Min => "min",
            Self::Max => "max",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Sqrt => "sqrt",
        }
    }

    /// Inclusive bounds on the argument count.
    const fn arity(self) -> (usize, usize, &'static str) {
        match self {
            Self::Min | Self::Max => (1, usize::MAX, "at least 1"),
            Self::Log => (1, 2, "1 or 2"),
            _ => (1, 1, "exactly 1"),
        }
    }
}

/// Expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Number(f64),
    Var(String),
    Neg(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Compare(CmpOp, Box<Node>, Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Call(Function, Vec<Node>),
}

pub(crate) struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    end: usize,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Spanned>, source_len: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            end: source_len,
        }
    }

    pub(crate) fn parse(mut self) -> Result<Node, ExpressionError> {
        if self.tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }
        let node = self.parse_or()?;
        if let Some(extra) = self.tokens.get(self.pos) {
            return Err(ExpressionError::Syntax {
                position: extra.position,
                message: format!("unexpected trailing {}", describe(&extra.token)),
            });
        }
        // Left-associative chains grow the tree without recursing here.
        if height(&node) > MAX_DEPTH {
            return Err(ExpressionError::TooDeep { limit: MAX_DEPTH });
        }
        Ok(node)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.position)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn enter(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExpressionError::TooDeep { limit: MAX_DEPTH });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_or(&mut self) -> Result<Node, ExpressionError> {
        self.enter()?;
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Node::Or(Box::new(lhs), Box::new(rhs));
        }
        self.leave();
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Node, ExpressionError> {
        let mut lhs = self.parse_comparison()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_comparison()?;
            lhs = Node::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn comparison_op(&self) -> Option<CmpOp> {
        Some(match self.peek()? {
            Token::Lt => CmpOp::Lt,
            Token::Le => CmpOp::Le,
            Token::Gt => CmpOp::Gt,
            Token::Ge => CmpOp::Ge,
            Token::EqEq => CmpOp::Eq,
            Token::NotEq => CmpOp::Ne,
            _ => return None,
        })
    }

    fn parse_comparison(&mut self) -> Result<Node, ExpressionError> {
        let lhs = self.parse_additive()?;
        let Some(op) = self.comparison_op() else {
            return Ok(lhs);
        };
        self.pos += 1;
        let rhs = self.parse_additive()?;
        if self.comparison_op().is_some() {
            return Err(ExpressionError::Syntax {
                position: self.position(),
                message: "chained comparisons are not supported; combine with `and`".into(),
            });
        }
        Ok(Node::Compare(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_additive(&mut self) -> Result<Node, ExpressionError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_term()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Node, ExpressionError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Node, ExpressionError> {
        if self.eat(&Token::Minus) {
            self.enter()?;
            let operand = self.parse_unary()?;
            self.leave();
            return Ok(Node::Neg(Box::new(operand)));
        }
        self.parse_power()
    }

    // `**` binds tighter than a unary minus on its left and accepts one on
    // its right, so `-2**2 == -4` and `2**-1 == 0.5`.
    fn parse_power(&mut self) -> Result<Node, ExpressionError> {
        let base = self.parse_primary()?;
        if self.eat(&Token::StarStar) {
            self.enter()?;
            let exponent = self.parse_unary()?;
            self.leave();
            return Ok(Node::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Node, ExpressionError> {
        let position = self.position();
        let Some(Spanned { token, .. }) = self.advance() else {
            return Err(ExpressionError::Syntax {
                position,
                message: "unexpected end of expression".into(),
            });
        };
        match token {
            Token::Number(n) => Ok(Node::Number(n)),
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    return self.parse_call(&name, position);
                }
                if Function::lookup(&name).is_some() {
                    return Err(ExpressionError::Syntax {
                        position,
                        message: format!("function `{name}` used without a call"),
                    });
                }
                Ok(Node::Var(name))
            }
            Token::LParen => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err(ExpressionError::Syntax {
                        position: self.position(),
                        message: "expected `)`".into(),
                    });
                }
                Ok(inner)
            }
            other => Err(ExpressionError::Syntax {
                position,
                message: format!("unexpected {}", describe(&other)),
            }),
        }
    }

    fn parse_call(&mut self, name: &str, position: usize) -> Result<Node, ExpressionError> {
        let func = Function::lookup(name)
            .ok_or_else(|| ExpressionError::UnknownFunction(name.to_string()))?;
        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.parse_or()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                if self.eat(&Token::RParen) {
                    break;
                }
                return Err(ExpressionError::Syntax {
                    position: self.position(),
                    message: format!("expected `,` or `)` in call to `{name}`"),
                });
            }
        }
        let (min, max, expected) = func.arity();
        if args.len() < min || args.len() > max {
            return Err(ExpressionError::Arity {
                name: func.name(),
                expected,
                got: args.len(),
            });
        }
        // A call directly followed by `(` would be a call on the result.
        if self.peek() == Some(&Token::LParen) {
            return Err(ExpressionError::Forbidden {
                construct: "calling a call result".into(),
                position,
            });
        }
        Ok(Node::Call(func, args))
    }
}

/// Number of nodes on the longest root-to-leaf path, computed without recursion.
pub(crate) fn height(root: &Node) -> usize {
    let mut deepest = 0;
    let mut stack = vec![(root, 1_usize)];
    while let Some((node, level)) = stack.pop() {
        deepest = deepest.max(level);
        match node {
            Node::Number(_) | Node::Var(_) => {}
            Node::Neg(inner) => stack.push((inner, level + 1)),
            Node::Binary(_, a, b) | Node::Compare(_, a, b) | Node::And(a, b) | Node::Or(a, b) => {
                stack.push((a, level + 1));
                stack.push((b, level + 1));
            }
            Node::Call(_, args) => stack.extend(args.iter().map(|arg| (arg, level + 1))),
        }
    }
    deepest
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number `{n}`"),
        Token::Ident(name) => format!("identifier `{name}`"),
        Token::Plus => "`+`".into(),
        Token::Minus => "`-`".into(),
        Token::Star => "`*`".into(),
        Token::StarStar => "`**`".into(),
        Token::Slash => "`/`".into(),
        Token::Percent => "`%`".into(),
        Token::LParen => "`(`".into(),
        Token::RParen => "`)`".into(),
        Token::Comma => "`,`".into(),
        Token::Lt => "`<`".into(),
        Token::Le => "`<=`".into(),
        Token::Gt => "`>`".into(),
        Token::Ge => "`>=`".into(),
        Token::EqEq => "`==`".into(),
        Token::NotEq => "`!=`".into(),
        Token::And => "`and`".into(),
        Token::Or => "`or`".into(),
    }
}
