// SPDX-License-Identifier: GPL-3.0-or-later

//! Override-formula evaluation.
//!
//! Magazine rules may derive volume, index, year or month from the captured
//! values with a small arithmetic formula, e.g. `Y * 12 + M - 23640`. The
//! evaluator is a closed sandbox: the only bindings are the four captured
//! values `V`, `I`, `Y` and `M`, and the only operations are integer
//! literals, `+ - * /`, unary minus and parentheses. Anything else is an
//! error, never a silent default.

use thiserror::Error;

/// Errors raised while evaluating an override formula.
#[derive(Debug, Error)]
pub enum FormulaError {
    #[error("unknown name `{0}` (only V, I, Y and M are defined)")]
    UnknownName(String),

    #[error("unexpected character `{0}`")]
    UnexpectedCharacter(char),

    #[error("unexpected `{0}`")]
    UnexpectedToken(String),

    #[error("unexpected end of formula")]
    UnexpectedEnd,

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow")]
    Overflow,
}

/// The four values a formula may reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormulaContext {
    pub volume: i64,
    pub index: i64,
    pub year: i64,
    pub month: i64,
}

impl FormulaContext {
    fn lookup(&self, name: &str) -> Option<i64> {
        match name {
            "V" => Some(self.volume),
            "I" => Some(self.index),
            "Y" => Some(self.year),
            "M" => Some(self.month),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number(i64),
    Name(String),
    Plus,
    Minus,
    Star,
    Slash,
    Open,
    Close,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Name(name) => write!(f, "{}", name),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Open => write!(f, "("),
            Token::Close => write!(f, ")"),
        }
    }
}

fn tokenize(formula: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = formula.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '0'..='9' => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number = digits.parse().map_err(|_| FormulaError::Overflow)?;
                tokens.push(Token::Number(number));
            }
            c if c.is_alphabetic() => {
                let mut name = String::new();
                while let Some(&a) = chars.peek() {
                    if a.is_alphanumeric() || a == '_' {
                        name.push(a);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Name(name));
            }
            other => return Err(FormulaError::UnexpectedCharacter(other)),
        }
    }
    Ok(tokens)
}

/// Recursive-descent evaluator over the token stream.
struct Parser<'a> {
    tokens: Vec<Token>,
    position: usize,
    context: &'a FormulaContext,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// expression := term (("+" | "-") term)*
    fn expression(&mut self) -> Result<i64, FormulaError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.next();
                    let rhs = self.term()?;
                    value = value.checked_add(rhs).ok_or(FormulaError::Overflow)?;
                }
                Some(Token::Minus) => {
                    self.next();
                    let rhs = self.term()?;
                    value = value.checked_sub(rhs).ok_or(FormulaError::Overflow)?;
                }
                _ => return Ok(value),
            }
        }
    }

    /// term := factor (("*" | "/") factor)*
    fn term(&mut self) -> Result<i64, FormulaError> {
        let mut value = self.factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.next();
                    let rhs = self.factor()?;
                    value = value.checked_mul(rhs).ok_or(FormulaError::Overflow)?;
                }
                Some(Token::Slash) => {
                    self.next();
                    let rhs = self.factor()?;
                    if rhs == 0 {
                        return Err(FormulaError::DivisionByZero);
                    }
                    value = value.checked_div(rhs).ok_or(FormulaError::Overflow)?;
                }
                _ => return Ok(value),
            }
        }
    }

    /// factor := number | name | "-" factor | "(" expression ")"
    fn factor(&mut self) -> Result<i64, FormulaError> {
        match self.next() {
            Some(Token::Number(number)) => Ok(number),
            Some(Token::Name(name)) => self
                .context
                .lookup(&name)
                .ok_or(FormulaError::UnknownName(name)),
            Some(Token::Minus) => {
                let value = self.factor()?;
                value.checked_neg().ok_or(FormulaError::Overflow)
            }
            Some(Token::Open) => {
                let value = self.expression()?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    Some(token) => Err(FormulaError::UnexpectedToken(token.to_string())),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            Some(token) => Err(FormulaError::UnexpectedToken(token.to_string())),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

/// Evaluate a formula over the captured values. Division truncates toward
/// zero; division by zero and overflow are reported, not propagated as
/// panics.
pub fn evaluate(formula: &str, context: &FormulaContext) -> Result<i64, FormulaError> {
    let mut parser = Parser {
        tokens: tokenize(formula)?,
        position: 0,
        context,
    };
    let value = parser.expression()?;
    match parser.next() {
        None => Ok(value),
        Some(token) => Err(FormulaError::UnexpectedToken(token.to_string())),
    }
}
