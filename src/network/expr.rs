//! Guard expression language for code conditions.
//!
//! A guard is a `;`-separated list of statements. `Name = expr` assigns (and
//! may narrow or extend the rule's binding); a bare expression sets the
//! reserved `condition` variable, which starts out true and decides the guard.
//!
//! ```text
//! D = N2 - N1; D > 0 and D < 10
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::lexicon::TermId;

pub const CONDITION: &str = "condition";

/// Runtime value of a guard expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Val {
    Num(f64),
    Bool(bool),
    Term(TermId),
}

impl Val {
    fn kind(&self) -> &'static str {
        match self {
            Val::Num(_) => "number",
            Val::Bool(_) => "boolean",
            Val::Term(_) => "term",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Num(f64),
    Bool(bool),
    Var(String),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Bin(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Assign(String, Expr),
    Test(Expr),
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Semi,
    Assign,
}

fn lex(src: &str) -> Result<Vec<(usize, Tok)>, RuleError> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        let start = i;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() || (c == '.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            let text = &src[start..i];
            let n = text.parse::<f64>().map_err(|_| RuleError::GuardSyntax {
                position: start,
                message: format!("bad number {text:?}"),
            })?;
            out.push((start, Tok::Num(n)));
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            out.push((start, Tok::Ident(src[start..i].to_string())));
            continue;
        }
        let two = src.get(i..i + 2).unwrap_or("");
        let tok = match two {
            "<=" => Some(Tok::Op("<=")),
            ">=" => Some(Tok::Op(">=")),
            "==" => Some(Tok::Op("==")),
            "!=" => Some(Tok::Op("!=")),
            "&&" => Some(Tok::Op("and")),
            "||" => Some(Tok::Op("or")),
            _ => None,
        };
        if let Some(tok) = tok {
            out.push((start, tok));
            i += 2;
            continue;
        }
        let tok = match c {
            '+' => Tok::Op("+"),
            '-' => Tok::Op("-"),
            '*' => Tok::Op("*"),
            '/' => Tok::Op("/"),
            '%' => Tok::Op("%"),
            '<' => Tok::Op("<"),
            '>' => Tok::Op(">"),
            '!' => Tok::Op("not"),
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            ';' => Tok::Semi,
            '=' => Tok::Assign,
            other => {
                return Err(RuleError::GuardSyntax {
                    position: start,
                    message: format!("unexpected character {other:?}"),
                });
            }
        };
        out.push((start, tok));
        i += 1;
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    toks: Vec<(usize, Tok)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.toks.get(self.pos).map(|(o, _)| *o).unwrap_or(self.end)
    }

    fn error(&self, message: impl Into<String>) -> RuleError {
        RuleError::GuardSyntax {
            position: self.offset(),
            message: message.into(),
        }
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        tok
    }

    /// Consume a binary operator if it is one of `ops`.
    fn op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        let found = match self.peek() {
            Some(Tok::Op(op)) => ops.iter().copied().find(|o| o == op),
            Some(Tok::Ident(word)) => ops.iter().copied().find(|o| *o == word.as_str()),
            _ => None,
        };
        if found.is_some() {
            self.pos += 1;
        }
        found
    }

    fn program(&mut self) -> Result<Vec<Stmt>, RuleError> {
        let mut stmts = Vec::new();
        loop {
            while self.peek() == Some(&Tok::Semi) {
                self.pos += 1;
            }
            if self.peek().is_none() {
                break;
            }
            stmts.push(self.stmt()?);
            match self.peek() {
                None | Some(Tok::Semi) => {}
                Some(_) => return Err(self.error("expected `;` between statements")),
            }
        }
        if stmts.is_empty() {
            return Err(self.error("empty guard"));
        }
        Ok(stmts)
    }

    fn stmt(&mut self) -> Result<Stmt, RuleError> {
        let assigns = matches!(self.toks.get(self.pos + 1), Some((_, Tok::Assign)));
        if let (true, Some(Tok::Ident(name))) = (assigns, self.peek().cloned()) {
            self.pos += 2;
            return Ok(Stmt::Assign(name, self.expr()?));
        }
        Ok(Stmt::Test(self.expr()?))
    }

    fn expr(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.and()?;
        while self.op(&["or"]).is_some() {
            lhs = Expr::Bin(BinOp::Or, Box::new(lhs), Box::new(self.and()?));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.not()?;
        while self.op(&["and"]).is_some() {
            lhs = Expr::Bin(BinOp::And, Box::new(lhs), Box::new(self.not()?));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr, RuleError> {
        if self.op(&["not"]).is_some() {
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.cmp()
    }

    fn cmp(&mut self) -> Result<Expr, RuleError> {
        let lhs = self.sum()?;
        let Some(op) = self.op(&["<", "<=", ">", ">=", "==", "!="]) else {
            return Ok(lhs);
        };
        let op = match op {
            "<" => BinOp::Lt,
            "<=" => BinOp::Le,
            ">" => BinOp::Gt,
            ">=" => BinOp::Ge,
            "==" => BinOp::Eq,
            _ => BinOp::Ne,
        };
        Ok(Expr::Bin(op, Box::new(lhs), Box::new(self.sum()?)))
    }

    fn sum(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.product()?;
        while let Some(op) = self.op(&["+", "-"]) {
            let op = if op == "+" { BinOp::Add } else { BinOp::Sub };
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(self.product()?));
        }
        Ok(lhs)
    }

    fn product(&mut self) -> Result<Expr, RuleError> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.op(&["*", "/", "%"]) {
            let op = match op {
                "*" => BinOp::Mul,
                "/" => BinOp::Div,
                _ => BinOp::Rem,
            };
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(self.unary()?));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, RuleError> {
        if self.op(&["-"]).is_some() {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, RuleError> {
        match self.bump() {
            Some(Tok::Num(n)) => Ok(Expr::Num(n)),
            Some(Tok::Ident(word)) => Ok(match word.as_str() {
                "true" | "True" => Expr::Bool(true),
                "false" | "False" => Expr::Bool(false),
                _ => Expr::Var(word),
            }),
            Some(Tok::LParen) => {
                let inner = self.expr()?;
                if self.bump() != Some(Tok::RParen) {
                    self.pos -= 1;
                    return Err(self.error("expected `)`"));
                }
                Ok(inner)
            }
            _ => {
                self.pos -= 1;
                Err(self.error("expected a value"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

/// A parsed code guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guard {
    pub source: String,
    stmts: Vec<Stmt>,
}

/// Result of running a guard against one binding.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardOutcome {
    pub passed: bool,
    /// Variables assigned by the guard, `condition` excluded.
    pub assigned: Vec<(String, Val)>,
}

impl Guard {
    pub fn parse(source: &str) -> Result<Self, RuleError> {
        let toks = lex(source)?;
        let mut parser = Parser {
            toks,
            pos: 0,
            end: source.len(),
        };
        let stmts = parser.program()?;
        Ok(Self {
            source: source.to_string(),
            stmts,
        })
    }

    /// Names the guard assigns to, `condition` excluded.
    pub fn assigned_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for stmt in &self.stmts {
            if let Stmt::Assign(name, _) = stmt {
                if name != CONDITION && !names.contains(&name.as_str()) {
                    names.push(name.as_str());
                }
            }
        }
        names
    }

    /// Run the guard with `env` as the initial variables.
    ///
    /// An evaluation error while `condition` is still true is a guard error;
    /// once the guard has set `condition` to false, an error just means the
    /// guard failed.
    pub fn run(&self, env: HashMap<String, Val>) -> Result<GuardOutcome, RuleError> {
        let mut env = env;
        env.insert(CONDITION.to_string(), Val::Bool(true));
        let mut assigned: Vec<String> = Vec::new();

        for stmt in &self.stmts {
            let result = match stmt {
                Stmt::Assign(name, expr) => eval(expr, &env).map(|v| {
                    env.insert(name.clone(), v);
                    if name != CONDITION && !assigned.contains(name) {
                        assigned.push(name.clone());
                    }
                }),
                Stmt::Test(expr) => eval(expr, &env).and_then(|v| match v {
                    Val::Bool(_) => {
                        env.insert(CONDITION.to_string(), v);
                        Ok(())
                    }
                    other => Err(format!("expected a boolean, got a {}", other.kind())),
                }),
            };
            if let Err(message) = result {
                return match env.get(CONDITION) {
                    Some(Val::Bool(false)) => Ok(GuardOutcome {
                        passed: false,
                        assigned: Vec::new(),
                    }),
                    _ => Err(RuleError::Guard { message }),
                };
            }
        }

        let passed = match env.get(CONDITION) {
            Some(Val::Bool(b)) => *b,
            Some(other) => {
                return Err(RuleError::Guard {
                    message: format!("`condition` must be a boolean, got a {}", other.kind()),
                });
            }
            None => true,
        };
        let assigned = assigned
            .into_iter()
            .filter_map(|name| env.get(&name).map(|v| (name, *v)))
            .collect();
        Ok(GuardOutcome { passed, assigned })
    }
}

fn eval(expr: &Expr, env: &HashMap<String, Val>) -> Result<Val, String> {
    Ok(match expr {
        Expr::Num(n) => Val::Num(*n),
        Expr::Bool(b) => Val::Bool(*b),
        Expr::Var(name) => *env
            .get(name)
            .ok_or_else(|| format!("unbound variable {name}"))?,
        Expr::Neg(inner) => Val::Num(-num(eval(inner, env)?)?),
        Expr::Not(inner) => Val::Bool(!boolean(eval(inner, env)?)?),
        Expr::Bin(BinOp::And, lhs, rhs) => {
            Val::Bool(boolean(eval(lhs, env)?)? && boolean(eval(rhs, env)?)?)
        }
        Expr::Bin(BinOp::Or, lhs, rhs) => {
            Val::Bool(boolean(eval(lhs, env)?)? || boolean(eval(rhs, env)?)?)
        }
        Expr::Bin(op, lhs, rhs) => {
            let (a, b) = (eval(lhs, env)?, eval(rhs, env)?);
            match op {
                BinOp::Eq => Val::Bool(a == b),
                BinOp::Ne => Val::Bool(a != b),
                _ => arith(*op, num(a)?, num(b)?)?,
            }
        }
    })
}

fn arith(op: BinOp, a: f64, b: f64) -> Result<Val, String> {
    Ok(match op {
        BinOp::Add => Val::Num(a + b),
        BinOp::Sub => Val::Num(a - b),
        BinOp::Mul => Val::Num(a * b),
        BinOp::Div | BinOp::Rem if b == 0.0 => return Err("division by zero".into()),
        BinOp::Div => Val::Num(a / b),
        BinOp::Rem => Val::Num(a % b),
        BinOp::Lt => Val::Bool(a < b),
        BinOp::Le => Val::Bool(a <= b),
        BinOp::Gt => Val::Bool(a > b),
        BinOp::Ge => Val::Bool(a >= b),
        BinOp::Eq | BinOp::Ne | BinOp::And | BinOp::Or => {
            return Err("not an arithmetic operator".into());
        }
    })
}

fn num(v: Val) -> Result<f64, String> {
    match v {
        Val::Num(n) => Ok(n),
        other => Err(format!("expected a number, got a {}", other.kind())),
    }
}

fn boolean(v: Val) -> Result<bool, String> {
    match v {
        Val::Bool(b) => Ok(b),
        other => Err(format!("expected a boolean, got a {}", other.kind())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, f64)]) -> HashMap<String, Val> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Val::Num(*v)))
            .collect()
    }

    #[test]
    fn precedence() {
        let g = Guard::parse("X = 1 + 2 * 3 - 4 / 2; X == 5").unwrap();
        let out = g.run(HashMap::new()).unwrap();
        assert!(out.passed);
        assert_eq!(out.assigned, vec![("X".to_string(), Val::Num(5.0))]);
    }

    #[test]
    fn comparisons_and_logic() {
        let g = Guard::parse("N1 < N2 and not (N2 > 10) || false").unwrap();
        assert!(g.run(env(&[("N1", 1.0), ("N2", 5.0)])).unwrap().passed);
        assert!(!g.run(env(&[("N1", 1.0), ("N2", 50.0)])).unwrap().passed);
    }

    #[test]
    fn condition_decides_without_trailing_test() {
        let g = Guard::parse("condition = N1 % 2 == 0").unwrap();
        assert!(g.run(env(&[("N1", 4.0)])).unwrap().passed);
        assert!(!g.run(env(&[("N1", 3.0)])).unwrap().passed);
        assert!(g.assigned_names().is_empty());
    }

    #[test]
    fn unexpected_failure_is_an_error() {
        let g = Guard::parse("N1 / 0 > 1").unwrap();
        assert!(matches!(
            g.run(env(&[("N1", 4.0)])),
            Err(RuleError::Guard { .. })
        ));
        let unbound = Guard::parse("Missing1 > 1").unwrap();
        assert!(unbound.run(HashMap::new()).is_err());
    }

    #[test]
    fn expected_failure_is_false() {
        let g = Guard::parse("condition = false; N1 / 0 > 1; condition = true").unwrap();
        let out = g.run(env(&[("N1", 4.0)])).unwrap();
        assert!(!out.passed);
    }

    #[test]
    fn syntax_errors_report_position() {
        let err = Guard::parse("N1 > ").unwrap_err();
        assert!(matches!(err, RuleError::GuardSyntax { position: 5, .. }));
        assert!(Guard::parse("N1 $ 2").is_err());
        assert!(Guard::parse("(N1 > 2").is_err());
        assert!(Guard::parse("").is_err());
        assert!(Guard::parse("N1 N2").is_err());
    }

    #[test]
    fn terms_compare_by_identity() {
        let g = Guard::parse("Person1 == Person2").unwrap();
        let mut e = HashMap::new();
        e.insert("Person1".to_string(), Val::Term(TermId::from_index(9)));
        e.insert("Person2".to_string(), Val::Term(TermId::from_index(9)));
        assert!(g.run(e.clone()).unwrap().passed);
        e.insert("Person2".to_string(), Val::Term(TermId::from_index(8)));
        assert!(!g.run(e).unwrap().passed);
    }
}
