//! Integer expression parsing and evaluation.
//!
//! Expressions appear in operands, `ORG`/`END`, `EQU`, `FOR` counts and
//! `;assert` lines. The grammar follows pMARS: arithmetic with the usual
//! precedence, comparisons and logical operators yielding 0 or 1, unary
//! `-`, `+`, `!`, parentheses, numbers and symbols.

use std::collections::HashMap;

use crate::config::MarsConfig;
use crate::error::{AsmError, Location, Result};
use crate::lexer::{Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    fn from_token(token: &Token) -> Option<Self> {
        if token.kind != TokenKind::Punct {
            return None;
        }
        Some(match token.text.as_str() {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            ">" => BinaryOp::Gt,
            "<=" => BinaryOp::Le,
            ">=" => BinaryOp::Ge,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            _ => return None,
        })
    }

    /// Binding strength; larger binds tighter.
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Gt
            | BinaryOp::Le
            | BinaryOp::Ge => 3,
            BinaryOp::Add | BinaryOp::Sub => 4,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 5,
        }
    }
}

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Number(i64, Location),
    Symbol(String, Location),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        at: Location,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        at: Location,
    },
}

/// Symbol resolution for expression evaluation.
pub trait EvalContext {
    /// Look up a symbol's value by name.
    fn lookup(&self, name: &str) -> Option<i64>;
}

impl EvalContext for HashMap<String, i64> {
    fn lookup(&self, name: &str) -> Option<i64> {
        self.get(name).copied()
    }
}

/// The constants every Redcode expression can use, resolved from the
/// simulator configuration.
pub fn predefined(name: &str, config: &MarsConfig) -> Option<i64> {
    Some(match name {
        "CORESIZE" => config.core_size.into(),
        "MAXPROCESSES" => config.max_processes.into(),
        "MAXCYCLES" => config.max_cycles.into(),
        "MAXLENGTH" => config.max_length.into(),
        "MINDISTANCE" => config.min_distance.into(),
        "WARRIORS" => config.warriors as i64,
        "ROUNDS" => config.rounds.into(),
        "PSPACESIZE" => config.pspace_size.into(),
        "VERSION" => 93,
        _ => return None,
    })
}

/// Context resolving only the predefined constants.
pub struct ConstantContext<'a> {
    pub config: &'a MarsConfig,
}

impl EvalContext for ConstantContext<'_> {
    fn lookup(&self, name: &str) -> Option<i64> {
        predefined(name, self.config)
    }
}

/// Deepest nesting of parentheses and unary operators.
const MAX_NESTING: usize = 256;

/// Longest expression, in tokens. Also bounds the height of left-leaning
/// operator chains that `eval` recurses through.
const MAX_TOKENS: usize = 1024;

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    eol: Location,
    depth: usize,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn here(&self) -> Location {
        self.peek().map(Token::location).unwrap_or(self.eol)
    }

    fn enter(&mut self, at: Location) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(AsmError::syntax("expression nested too deeply", at));
        }
        Ok(())
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        while let Some(token) = self.peek() {
            let Some(op) = BinaryOp::from_token(token) else {
                break;
            };
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let right = self.parse_binary(prec + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                at: token.location(),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let token = self
            .peek()
            .ok_or_else(|| AsmError::syntax("expected expression", self.eol))?;
        let op = match token.text.as_str() {
            "-" if token.kind == TokenKind::Punct => Some(UnaryOp::Minus),
            "+" if token.kind == TokenKind::Punct => Some(UnaryOp::Plus),
            "!" if token.kind == TokenKind::Punct => Some(UnaryOp::Not),
            _ => None,
        };
        match op {
            Some(op) => {
                self.pos += 1;
                self.enter(token.location())?;
                let expr = self.parse_unary()?;
                self.depth -= 1;
                Ok(Expr::Unary {
                    op,
                    expr: Box::new(expr),
                    at: token.location(),
                })
            }
            None => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        let at = self.here();
        let token = self
            .peek()
            .ok_or_else(|| AsmError::syntax("expected expression", self.eol))?;
        self.pos += 1;
        match token.kind {
            TokenKind::Number => token
                .text
                .parse::<i64>()
                .map(|n| Expr::Number(n, at))
                .map_err(|_| AsmError::syntax(format!("number too large: {}", token.text), at)),
            TokenKind::Ident => Ok(Expr::Symbol(token.text.clone(), at)),
            TokenKind::Punct if token.text == "(" => {
                self.enter(at)?;
                let inner = self.parse_binary(0)?;
                self.depth -= 1;
                match self.peek() {
                    Some(t) if t.is_punct(")") => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(AsmError::syntax("expected ')'", self.here())),
                }
            }
            TokenKind::Punct => Err(AsmError::syntax(
                format!("unexpected '{}' in expression", token.text),
                at,
            )),
        }
    }
}

/// Parse a complete expression; every token must be consumed. `eol` is
/// reported when the tokens run out early.
pub fn parse(tokens: &[Token], eol: Location) -> Result<Expr> {
    if tokens.len() > MAX_TOKENS {
        return Err(AsmError::syntax("expression too long", tokens[0].location()));
    }
    let mut parser = ExprParser {
        tokens,
        pos: 0,
        eol,
        depth: 0,
    };
    let expr = parser.parse_binary(0)?;
    if let Some(extra) = parser.peek() {
        return Err(AsmError::syntax(
            format!("unexpected '{}' after expression", extra.text),
            extra.location(),
        ));
    }
    Ok(expr)
}

/// Evaluate an expression tree.
pub fn eval(expr: &Expr, ctx: &dyn EvalContext) -> Result<i64> {
    match expr {
        Expr::Number(n, _) => Ok(*n),
        Expr::Symbol(name, at) => ctx.lookup(name).ok_or_else(|| AsmError::UnresolvedSymbol {
            name: name.clone(),
            at: *at,
        }),
        Expr::Unary { op, expr, .. } => {
            let val = eval(expr, ctx)?;
            Ok(match op {
                UnaryOp::Plus => val,
                UnaryOp::Minus => val.wrapping_neg(),
                UnaryOp::Not => (val == 0) as i64,
            })
        }
        Expr::Binary {
            op,
            left,
            right,
            at,
        } => {
            let l = eval(left, ctx)?;
            let r = eval(right, ctx)?;
            apply_binary(*op, l, r, *at)
        }
    }
}

fn apply_binary(op: BinaryOp, l: i64, r: i64, at: Location) -> Result<i64> {
    Ok(match op {
        BinaryOp::Add => l.wrapping_add(r),
        BinaryOp::Sub => l.wrapping_sub(r),
        BinaryOp::Mul => l.wrapping_mul(r),
        BinaryOp::Div => {
            if r == 0 {
                return Err(AsmError::DivisionByZero { at });
            }
            l.wrapping_div(r)
        }
        BinaryOp::Mod => {
            if r == 0 {
                return Err(AsmError::DivisionByZero { at });
            }
            l.wrapping_rem(r)
        }
        BinaryOp::Eq => (l == r) as i64,
        BinaryOp::Ne => (l != r) as i64,
        BinaryOp::Lt => (l < r) as i64,
        BinaryOp::Gt => (l > r) as i64,
        BinaryOp::Le => (l <= r) as i64,
        BinaryOp::Ge => (l >= r) as i64,
        BinaryOp::And => (l != 0 && r != 0) as i64,
        BinaryOp::Or => (l != 0 || r != 0) as i64,
    })
}

/// Parse and evaluate in one go.
pub fn evaluate(tokens: &[Token], eol: Location, ctx: &dyn EvalContext) -> Result<i64> {
    eval(&parse(tokens, eol)?, ctx)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::lexer::tokenize;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn sum_matches_native(a in -10_000i64..10_000, b in -10_000i64..10_000) {
            let src = format!("({a})+({b})");
            let tokens = tokenize(&src, 1).unwrap();
            let got = evaluate(&tokens, Location::line(1), &HashMap::<String, i64>::new()).unwrap();
            prop_assert_eq!(got, a + b);
        }

        #[test]
        fn never_panics_on_arbitrary_operators(ops in prop::collection::vec(0usize..8, 1..20)) {
            const PIECES: [&str; 8] = ["1", "+", "-", "*", "/", "(", ")", "0"];
            let src: String = ops.iter().map(|&i| PIECES[i]).collect::<Vec<_>>().join(" ");
            let tokens = tokenize(&src, 1).unwrap();
            let _ = evaluate(&tokens, Location::line(1), &HashMap::<String, i64>::new());
        }
    }
}
