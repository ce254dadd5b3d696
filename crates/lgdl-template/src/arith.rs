//! Whitelisted arithmetic expression parser/evaluator for `${expr}` tokens.
//!
//! Only a fixed set of nodes are representable at all: literal numeric,
//! identifier, unary minus, binary add/sub/mul/div/floor-div/mod, and
//! parenthesization. There is no node for attribute access, subscript,
//! call, exponentiation, comprehension, or lambda - the grammar simply
//! doesn't have a production for them, so `DisallowedNode` below is reached
//! only through the tokenizer rejecting stray characters, not through a
//! parsed-then-rejected AST. This is a whitelist, never a blocklist.

use crate::context::as_number;
use crate::error::TemplateError;
use serde_json::Value;

const MAX_EXPR_LEN: usize = 256;
const MAX_MAGNITUDE: f64 = 1e9;

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(f64),
    Identifier(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    FloorDiv(Box<Expr>, Box<Expr>),
    Mod(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    SlashSlash,
    Percent,
    LParen,
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<Tok>, TemplateError> {
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    let mut toks = Vec::new();
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '+' => {
                toks.push(Tok::Plus);
                i += 1;
            }
            '-' => {
                toks.push(Tok::Minus);
                i += 1;
            }
            '*' => {
                if matches!(chars.get(i + 1), Some('*')) {
                    return Err(TemplateError::DisallowedNode {
                        detail: "exponentiation ('**') is not permitted".to_string(),
                    });
                }
                toks.push(Tok::Star);
                i += 1;
            }
            '/' => {
                if matches!(chars.get(i + 1), Some('/')) {
                    toks.push(Tok::SlashSlash);
                    i += 2;
                } else {
                    toks.push(Tok::Slash);
                    i += 1;
                }
            }
            '%' => {
                toks.push(Tok::Percent);
                i += 1;
            }
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '[' | ']' => {
                return Err(TemplateError::DisallowedNode {
                    detail: "subscript access is not permitted".to_string(),
                });
            }
            _ if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n: f64 = text.parse().map_err(|_| TemplateError::ParseError {
                    detail: format!("invalid numeric literal '{text}'"),
                })?;
                toks.push(Tok::Num(n));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                toks.push(Tok::Ident(text));
            }
            other => {
                return Err(TemplateError::DisallowedNode {
                    detail: format!("unsupported character '{other}'"),
                });
            }
        }
    }
    Ok(toks)
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn advance(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn parse_expr(&mut self) -> Result<Expr, TemplateError> {
        let mut left = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Tok::Plus) => {
                    self.advance();
                    let right = self.parse_term()?;
                    left = Expr::Add(Box::new(left), Box::new(right));
                }
                Some(Tok::Minus) => {
                    self.advance();
                    let right = self.parse_term()?;
                    left = Expr::Sub(Box::new(left), Box::new(right));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, TemplateError> {
        let mut left = self.parse_factor()?;
        loop {
            match self.peek() {
                Some(Tok::Star) => {
                    self.advance();
                    let right = self.parse_factor()?;
                    left = Expr::Mul(Box::new(left), Box::new(right));
                }
                Some(Tok::Slash) => {
                    self.advance();
                    let right = self.parse_factor()?;
                    left = Expr::Div(Box::new(left), Box::new(right));
                }
                Some(Tok::SlashSlash) => {
                    self.advance();
                    let right = self.parse_factor()?;
                    left = Expr::FloorDiv(Box::new(left), Box::new(right));
                }
                Some(Tok::Percent) => {
                    self.advance();
                    let right = self.parse_factor()?;
                    left = Expr::Mod(Box::new(left), Box::new(right));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, TemplateError> {
        match self.advance() {
            Some(Tok::Minus) => Ok(Expr::Neg(Box::new(self.parse_factor()?))),
            Some(Tok::Num(n)) => Ok(Expr::Literal(n)),
            Some(Tok::Ident(name)) => Ok(Expr::Identifier(name)),
            Some(Tok::LParen) => {
                let inner = self.parse_expr()?;
                match self.advance() {
                    Some(Tok::RParen) => Ok(inner),
                    _ => Err(TemplateError::ParseError {
                        detail: "expected closing parenthesis".to_string(),
                    }),
                }
            }
            other => Err(TemplateError::ParseError {
                detail: format!("unexpected token: {other:?}"),
            }),
        }
    }
}

fn check_magnitude(value: f64) -> Result<f64, TemplateError> {
    if !value.is_finite() || value.abs() > MAX_MAGNITUDE {
        return Err(TemplateError::MagnitudeOutOfBounds { value });
    }
    Ok(value)
}

fn eval(expr: &Expr, context: &Value) -> Result<f64, TemplateError> {
    let raw = match expr {
        Expr::Literal(n) => *n,
        Expr::Identifier(path) => {
            let value = crate::context::lookup(context, path).ok_or_else(|| {
                TemplateError::MissingVariable {
                    path: path.clone(),
                }
            })?;
            as_number(value).ok_or_else(|| TemplateError::MissingVariable {
                path: path.clone(),
            })?
        }
        Expr::Neg(inner) => -eval(inner, context)?,
        Expr::Add(a, b) => eval(a, context)? + eval(b, context)?,
        Expr::Sub(a, b) => eval(a, context)? - eval(b, context)?,
        Expr::Mul(a, b) => eval(a, context)? * eval(b, context)?,
        Expr::Div(a, b) => {
            let denom = eval(b, context)?;
            if denom == 0.0 {
                return Err(TemplateError::DivisionByZero);
            }
            eval(a, context)? / denom
        }
        Expr::FloorDiv(a, b) => {
            let denom = eval(b, context)?;
            if denom == 0.0 {
                return Err(TemplateError::DivisionByZero);
            }
            (eval(a, context)? / denom).floor()
        }
        Expr::Mod(a, b) => {
            let denom = eval(b, context)?;
            if denom == 0.0 {
                return Err(TemplateError::DivisionByZero);
            }
            eval(a, context)? % denom
        }
    };
    check_magnitude(raw)
}

/// Evaluate an arithmetic expression source string against a context.
pub fn evaluate(src: &str, context: &Value) -> Result<f64, TemplateError> {
    if src.len() > MAX_EXPR_LEN {
        return Err(TemplateError::ExpressionTooLong { len: src.len() });
    }
    let toks = tokenize(src)?;
    let mut parser = Parser { toks, pos: 0 };
    let expr = parser.parse_expr()?;
    if parser.pos != parser.toks.len() {
        return Err(TemplateError::ParseError {
            detail: "trailing tokens after expression".to_string(),
        });
    }
    eval(&expr, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evaluates_basic_arithmetic() {
        let ctx = json!({});
        assert_eq!(evaluate("1 + 2 * 3", &ctx).unwrap(), 7.0);
        assert_eq!(evaluate("(1 + 2) * 3", &ctx).unwrap(), 9.0);
        assert_eq!(evaluate("-5 + 2", &ctx).unwrap(), -3.0);
        assert_eq!(evaluate("7 // 2", &ctx).unwrap(), 3.0);
        assert_eq!(evaluate("7 % 2", &ctx).unwrap(), 1.0);
    }

    #[test]
    fn evaluates_identifiers_from_context() {
        let ctx = json!({"capacity": 10, "used": 4});
        assert_eq!(evaluate("capacity - used", &ctx).unwrap(), 6.0);
    }

    #[test]
    fn rejects_disallowed_nodes() {
        let ctx = json!({});
        assert!(matches!(
            evaluate("2 ** 3", &ctx),
            Err(TemplateError::DisallowedNode { .. })
        ));
        assert!(matches!(
            evaluate("foo[0]", &ctx),
            Err(TemplateError::DisallowedNode { .. })
        ));
    }

    #[test]
    fn rejects_overlong_expression() {
        let ctx = json!({});
        let long_expr = "1+".repeat(200);
        assert!(matches!(
            evaluate(&long_expr, &ctx),
            Err(TemplateError::ExpressionTooLong { .. })
        ));
    }

    #[test]
    fn rejects_magnitude_out_of_bounds() {
        let ctx = json!({});
        assert!(matches!(
            evaluate("2000000000 + 1", &ctx),
            Err(TemplateError::MagnitudeOutOfBounds { .. })
        ));
    }

    #[test]
    fn rejects_division_by_zero() {
        let ctx = json!({});
        assert!(matches!(
            evaluate("1 / 0", &ctx),
            Err(TemplateError::DivisionByZero)
        ));
    }
}
