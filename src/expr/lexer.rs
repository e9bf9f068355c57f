//! Tokenizer for price expressions.

use super::ExpressionError;

/// Lexical tokens of the price-expression language.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    And,
    Or,
}

/// A token with the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// Words with meaning in general-purpose expression languages that are
/// refused outright rather than treated as unknown identifiers.
pub(crate) const RESERVED: &[&str] = &[
    "lambda", "for", "in", "if", "else", "not", "is", "import", "from", "def", "class",
    "return", "yield", "while", "with", "exec", "eval", "global", "del", "async", "await",
];

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ExpressionError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            let (value, next) = lex_number(source, pos)?;
            tokens.push(Spanned {
                token: Token::Number(value),
                position: start,
            });
            pos = next;
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                pos += 1;
            }
            let word = &source[start..pos];
            let token = match word {
                "and" => Token::And,
                "or" => Token::Or,
                w if RESERVED.contains(&w) => {
                    return Err(ExpressionError::Forbidden {
                        construct: format!("keyword `{w}`"),
                        position: start,
                    });
                }
                w => Token::Ident(w.to_string()),
            };
            tokens.push(Spanned {
                token,
                position: start,
            });
            continue;
        }

        let two = bytes.get(pos + 1).copied();
        let (token, width) = match (c, two) {
            (b'*', Some(b'*')) => (Token::StarStar, 2),
            (b'<', Some(b'=')) => (Token::Le, 2),
            (b'>', Some(b'=')) => (Token::Ge, 2),
            (b'=', Some(b'=')) => (Token::EqEq, 2),
            (b'!', Some(b'=')) => (Token::NotEq, 2),
            (b'/', Some(b'/')) => {
                return Err(forbidden("floor division", start));
            }
            (b'+', _) => (Token::Plus, 1),
            (b'-', _) => (Token::Minus, 1),
            (b'*', _) => (Token::Star, 1),
            (b'/', _) => (Token::Slash, 1),
            (b'%', _) => (Token::Percent, 1),
            (b'(', _) => (Token::LParen, 1),
            (b')', _) => (Token::RParen, 1),
            (b',', _) => (Token::Comma, 1),
            (b'<', _) => (Token::Lt, 1),
            (b'>', _) => (Token::Gt, 1),
            (b'.', _) => return Err(forbidden("attribute access", start)),
            (b'[' | b']', _) => return Err(forbidden("subscripting", start)),
            (b'{' | b'}', _) => return Err(forbidden("collection literals", start)),
            (b'\'' | b'"', _) => return Err(forbidden("string literals", start)),
            (b'=', _) => return Err(forbidden("assignment", start)),
            (b';', _) => return Err(forbidden("statement separators", start)),
            _ => {
                let shown = source[start..].chars().next().unwrap_or('?');
                return Err(ExpressionError::Syntax {
                    position: start,
                    message: format!("unexpected character `{shown}`"),
                });
            }
        };
        tokens.push(Spanned {
            token,
            position: start,
        });
        pos += width;
    }

    Ok(tokens)
}

fn forbidden(construct: &str, position: usize) -> ExpressionError {
    ExpressionError::Forbidden {
        construct: construct.to_string(),
        position,
    }
}

/// Lex an integer or decimal literal (`3`, `3.5`, `.5`, `5.`).
fn lex_number(source: &str, start: usize) -> Result<(f64, usize), ExpressionError> {
    let bytes = source.as_bytes();
    let mut pos = start;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if bytes
        .get(pos)
        .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_' || *b == b'.')
    {
        return Err(ExpressionError::Syntax {
            position: start,
            message: "invalid numeric literal".into(),
        });
    }
    let text = &source[start..pos];
    let value = text.parse::<f64>().map_err(|e| ExpressionError::Syntax {
        position: start,
        message: format!("invalid numeric literal `{text}`: {e}"),
    })?;
    Ok((value, pos))
}
