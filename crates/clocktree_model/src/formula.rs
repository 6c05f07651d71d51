//! Integer VCO expressions for PLLs whose output does not follow
//! `input × (n + frac / den)`.
//!
//! Operator precedence:
//!
//! | BP (L,R) | Operators |
//! |----------|-----------|
//! | (1,2)    | `+` `-`   |
//! | (3,4)    | `*` `/`   |
//! | prefix 5 | `-`       |
//!
//! Division truncates toward zero. Evaluation uses checked 128-bit
//! arithmetic; the result must be a non-negative frequency that fits `u64`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A free variable of a VCO formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Var {
    /// Reference input frequency in Hz.
    Input,
    /// Decoded integer feedback value.
    N,
    /// Decoded fractional feedback value (0 without a fractional descriptor).
    Frac,
    /// Fractional denominator (1 without a fractional descriptor).
    Den,
}

impl Var {
    fn from_name(name: &str) -> Option<Var> {
        match name {
            "input" => Some(Var::Input),
            "n" => Some(Var::N),
            "frac" => Some(Var::Frac),
            "den" => Some(Var::Den),
            _ => None,
        }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Var::Input => "input",
            Var::N => "n",
            Var::Frac => "frac",
            Var::Den => "den",
        })
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

impl BinOp {
    fn binding_power(self) -> (u8, u8) {
        match self {
            BinOp::Add | BinOp::Sub => (1, 2),
            BinOp::Mul | BinOp::Div => (3, 4),
        }
    }

    fn symbol(self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
            BinOp::Div => '/',
        }
    }
}

const PREFIX_NEG_BP: u8 = 5;

/// Deepest parenthesis or unary-minus nesting accepted.
const MAX_NESTING: usize = 64;

/// Longest formula accepted, in tokens. Bounds the depth of the parsed tree.
const MAX_TOKENS: usize = 1024;

/// Parsed formula AST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    /// Integer literal.
    Literal(u64),
    /// Variable reference.
    Var(Var),
    /// Arithmetic negation.
    Neg(Box<Expr>),
    /// Binary operation.
    Binary(Box<Expr>, BinOp, Box<Expr>),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Var(v) => write!(f, "{v}"),
            Expr::Neg(e) => write!(f, "-{e}"),
            Expr::Binary(l, op, r) => write!(f, "({l} {} {r})", op.symbol()),
        }
    }
}

/// Values bound to the formula variables for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bindings {
    /// Reference input in Hz.
    pub input: u64,
    /// Integer feedback value.
    pub n: u64,
    /// Fractional feedback value.
    pub frac: u64,
    /// Fractional denominator.
    pub den: u64,
}

impl Bindings {
    fn get(&self, var: Var) -> u64 {
        match var {
            Var::Input => self.input,
            Var::N => self.n,
            Var::Frac => self.frac,
            Var::Den => self.den,
        }
    }
}

/// A malformed formula, reported when the graph is loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at offset {offset}")]
pub struct FormulaError {
    /// Byte offset into the formula text.
    pub offset: usize,
    /// What went wrong.
    pub message: String,
}

/// Runtime failure of a well-formed formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
pub enum FormulaFault {
    /// Intermediate or final value outside the 128-bit range.
    #[error("arithmetic overflow")]
    Overflow,
    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// The result is negative or does not fit a 64-bit frequency.
    #[error("result {0} is not a valid frequency")]
    OutOfRange(i128),
}

/// A parsed VCO formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
    source: String,
    expr: Expr,
}

impl Formula {
    /// Parses formula text.
    pub fn parse(source: &str) -> Result<Formula, FormulaError> {
        let tokens = tokenize(source)?;
        if let Some(&(offset, _)) = tokens.get(MAX_TOKENS) {
            return Err(FormulaError {
                offset,
                message: format!("formula longer than {MAX_TOKENS} tokens"),
            });
        }
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            end: source.len(),
            depth: 0,
        };
        let expr = parser.parse_expr_bp(0)?;
        if let Some((offset, tok)) = parser.peek() {
            return Err(FormulaError {
                offset,
                message: format!("unexpected {tok}"),
            });
        }
        Ok(Formula {
            source: source.to_string(),
            expr,
        })
    }

    /// The original text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The parsed expression.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluates the formula to a frequency in Hz.
    pub fn eval(&self, bindings: &Bindings) -> Result<u64, FormulaFault> {
        let value = eval_expr(&self.expr, bindings)?;
        u64::try_from(value).map_err(|_| FormulaFault::OutOfRange(value))
    }
}

fn eval_expr(expr: &Expr, bindings: &Bindings) -> Result<i128, FormulaFault> {
    match expr {
        Expr::Literal(v) => Ok(i128::from(*v)),
        Expr::Var(v) => Ok(i128::from(bindings.get(*v))),
        Expr::Neg(e) => eval_expr(e, bindings)?
            .checked_neg()
            .ok_or(FormulaFault::Overflow),
        Expr::Binary(l, op, r) => {
            let lhs = eval_expr(l, bindings)?;
            let rhs = eval_expr(r, bindings)?;
            match op {
                BinOp::Add => lhs.checked_add(rhs).ok_or(FormulaFault::Overflow),
                BinOp::Sub => lhs.checked_sub(rhs).ok_or(FormulaFault::Overflow),
                BinOp::Mul => lhs.checked_mul(rhs).ok_or(FormulaFault::Overflow),
                BinOp::Div => {
                    if rhs == 0 {
                        Err(FormulaFault::DivisionByZero)
                    } else {
                        lhs.checked_div(rhs).ok_or(FormulaFault::Overflow)
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Number(u64),
    Ident(Var),
    Op(BinOp),
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(v) => write!(f, "number {v}"),
            Token::Ident(v) => write!(f, "`{v}`"),
            Token::Op(op) => write!(f, "`{}`", op.symbol()),
            Token::LParen => f.write_str("`(`"),
            Token::RParen => f.write_str("`)`"),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, FormulaError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        let tok = match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'+' => Token::Op(BinOp::Add),
            b'-' => Token::Op(BinOp::Sub),
            b'*' => Token::Op(BinOp::Mul),
            b'/' => Token::Op(BinOp::Div),
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'0'..=b'9' => {
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'_') {
                    i += 1;
                }
                let text: String = source[start..i].chars().filter(|c| *c != '_').collect();
                let value = text.parse::<u64>().map_err(|_| FormulaError {
                    offset: start,
                    message: format!("integer literal `{}` out of range", &source[start..i]),
                })?;
                tokens.push((start, Token::Number(value)));
                continue;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let name = &source[start..i];
                let var = Var::from_name(name).ok_or_else(|| FormulaError {
                    offset: start,
                    message: format!("unknown variable `{name}` (expected input, n, frac or den)"),
                })?;
                tokens.push((start, Token::Ident(var)));
                continue;
            }
            _ => {
                let ch = source[start..].chars().next().unwrap_or('?');
                return Err(FormulaError {
                    offset: start,
                    message: format!("unexpected character `{ch}`"),
                });
            }
        };
        tokens.push((start, tok));
        i += 1;
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [(usize, Token)],
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<(usize, Token)> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<(usize, Token)> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_prefix()?;

        while let Some((_, Token::Op(op))) = self.peek() {
            let (l_bp, r_bp) = op.binding_power();
            if l_bp < min_bp {
                break;
            }
            self.bump();
            let rhs = self.parse_expr_bp(r_bp)?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    /// Parses a sub-expression one nesting level down.
    fn parse_nested(&mut self, offset: usize, min_bp: u8) -> Result<Expr, FormulaError> {
        if self.depth >= MAX_NESTING {
            return Err(FormulaError {
                offset,
                message: format!("nested deeper than {MAX_NESTING} levels"),
            });
        }
        self.depth += 1;
        let expr = self.parse_expr_bp(min_bp);
        self.depth -= 1;
        expr
    }

    fn parse_prefix(&mut self) -> Result<Expr, FormulaError> {
        match self.bump() {
            Some((_, Token::Number(v))) => Ok(Expr::Literal(v)),
            Some((_, Token::Ident(var))) => Ok(Expr::Var(var)),
            Some((offset, Token::Op(BinOp::Sub))) => {
                let operand = self.parse_nested(offset, PREFIX_NEG_BP)?;
                Ok(Expr::Neg(Box::new(operand)))
            }
            Some((offset, Token::LParen)) => {
                let inner = self.parse_nested(offset, 0)?;
                match self.bump() {
                    Some((_, Token::RParen)) => Ok(inner),
                    Some((at, tok)) => Err(FormulaError {
                        offset: at,
                        message: format!("expected `)` to close `(` at offset {offset}, found {tok}"),
                    }),
                    None => Err(FormulaError {
                        offset: self.end,
                        message: format!("unclosed `(` at offset {offset}"),
                    }),
                }
            }
            Some((offset, tok)) => Err(FormulaError {
                offset,
                message: format!("expected operand, found {tok}"),
            }),
            None => Err(FormulaError {
                offset: self.end,
                message: "expected operand, found end of formula".to_string(),
            }),
        }
    }
}
