//! Compiled boolean guard expressions over context (a Move's `guards`).
//!
//! Grounded in the data-driven requirement evaluation pattern used by
//! `ob-workflow::requirements::RequirementEvaluator` (a tagged enum
//! dispatched against a context), but guards here are a small expression
//! language compiled once at IR build time rather than a fixed requirement
//! catalog, since a game author needs arbitrary `slot == "value"`-style
//! conditions, not a closed set of workflow requirement kinds.

use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum GuardExpr {
    Compare {
        left: ValueExpr,
        op: CompareOp,
        right: ValueExpr,
    },
    And(Box<GuardExpr>, Box<GuardExpr>),
    Or(Box<GuardExpr>, Box<GuardExpr>),
    Not(Box<GuardExpr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    Identifier(String),
    Number(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardParseError(pub String);

impl fmt::Display for GuardParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid guard expression: {}", self.0)
    }
}

impl std::error::Error for GuardParseError {}

pub fn compile_guard(src: &str) -> Result<GuardExpr, GuardParseError> {
    let toks = tokenize(src)?;
    let mut parser = GuardParser { toks, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.toks.len() {
        return Err(GuardParseError(format!(
            "trailing tokens in guard expression '{src}'"
        )));
    }
    Ok(expr)
}

/// Evaluate a compiled guard against a JSON context.
pub fn eval_guard(expr: &GuardExpr, context: &Value) -> bool {
    match expr {
        GuardExpr::Compare { left, op, right } => eval_compare(left, *op, right, context),
        GuardExpr::And(a, b) => eval_guard(a, context) && eval_guard(b, context),
        GuardExpr::Or(a, b) => eval_guard(a, context) || eval_guard(b, context),
        GuardExpr::Not(a) => !eval_guard(a, context),
    }
}

fn resolve(expr: &ValueExpr, context: &Value) -> Option<Value> {
    match expr {
        ValueExpr::Identifier(path) => lgdl_template::context::lookup(context, path).cloned(),
        ValueExpr::Number(n) => Some(Value::from(*n)),
        ValueExpr::Str(s) => Some(Value::String(s.clone())),
    }
}

fn eval_compare(left: &ValueExpr, op: CompareOp, right: &ValueExpr, context: &Value) -> bool {
    let lv = resolve(left, context);
    let rv = resolve(right, context);
    let (Some(lv), Some(rv)) = (lv, rv) else {
        // Missing context values make the guard false rather than an
        // engine error: a guard is a soft gate, not a template render.
        return false;
    };
    if let (Some(ln), Some(rn)) = (
        lgdl_template::context::as_number(&lv),
        lgdl_template::context::as_number(&rv),
    ) {
        return match op {
            CompareOp::Eq => ln == rn,
            CompareOp::Ne => ln != rn,
            CompareOp::Lt => ln < rn,
            CompareOp::Le => ln <= rn,
            CompareOp::Gt => ln > rn,
            CompareOp::Ge => ln >= rn,
        };
    }
    let ls = lgdl_template::context::as_display_string(&lv);
    let rs = lgdl_template::context::as_display_string(&rv);
    match (op, ls, rs) {
        (CompareOp::Eq, Some(a), Some(b)) => a == b,
        (CompareOp::Ne, Some(a), Some(b)) => a != b,
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Num(f64),
    Str(String),
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<Tok>, GuardParseError> {
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
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                toks.push(Tok::Ne);
                i += 2;
            }
            '!' => {
                toks.push(Tok::Not);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                toks.push(Tok::Eq);
                i += 2;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                toks.push(Tok::Le);
                i += 2;
            }
            '<' => {
                toks.push(Tok::Lt);
                i += 1;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                toks.push(Tok::Ge);
                i += 2;
            }
            '>' => {
                toks.push(Tok::Gt);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                toks.push(Tok::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                toks.push(Tok::Or);
                i += 2;
            }
            '"' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != '"' {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(GuardParseError("unterminated string literal".to_string()));
                }
                toks.push(Tok::Str(chars[start..j].iter().collect()));
                i = j + 1;
            }
            _ if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n: f64 = text
                    .parse()
                    .map_err(|_| GuardParseError(format!("invalid number '{text}'")))?;
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
                match text.as_str() {
                    "and" => toks.push(Tok::And),
                    "or" => toks.push(Tok::Or),
                    "not" => toks.push(Tok::Not),
                    _ => toks.push(Tok::Ident(text)),
                }
            }
            other => {
                return Err(GuardParseError(format!("unsupported character '{other}'")));
            }
        }
    }
    Ok(toks)
}

struct GuardParser {
    toks: Vec<Tok>,
    pos: usize,
}

impl GuardParser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn advance(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn parse_or(&mut self) -> Result<GuardExpr, GuardParseError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Tok::Or)) {
            self.advance();
            let right = self.parse_and()?;
            left = GuardExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<GuardExpr, GuardParseError> {
        let mut left = self.parse_unary()?;
        while matches!(self.peek(), Some(Tok::And)) {
            self.advance();
            let right = self.parse_unary()?;
            left = GuardExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<GuardExpr, GuardParseError> {
        if matches!(self.peek(), Some(Tok::Not)) {
            self.advance();
            return Ok(GuardExpr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<GuardExpr, GuardParseError> {
        if matches!(self.peek(), Some(Tok::LParen)) {
            self.advance();
            let inner = self.parse_or()?;
            match self.advance() {
                Some(Tok::RParen) => return Ok(inner),
                _ => return Err(GuardParseError("expected closing parenthesis".to_string())),
            }
        }
        let left = self.parse_value()?;
        let op = match self.advance() {
            Some(Tok::Eq) => CompareOp::Eq,
            Some(Tok::Ne) => CompareOp::Ne,
            Some(Tok::Lt) => CompareOp::Lt,
            Some(Tok::Le) => CompareOp::Le,
            Some(Tok::Gt) => CompareOp::Gt,
            Some(Tok::Ge) => CompareOp::Ge,
            other => return Err(GuardParseError(format!("expected comparison operator, got {other:?}"))),
        };
        let right = self.parse_value()?;
        Ok(GuardExpr::Compare { left, op, right })
    }

    fn parse_value(&mut self) -> Result<ValueExpr, GuardParseError> {
        match self.advance() {
            Some(Tok::Ident(name)) => Ok(ValueExpr::Identifier(name)),
            Some(Tok::Num(n)) => Ok(ValueExpr::Number(n)),
            Some(Tok::Str(s)) => Ok(ValueExpr::Str(s)),
            other => Err(GuardParseError(format!("expected value, got {other:?}"))),
        }
    }
}
