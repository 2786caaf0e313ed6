//! 升级规则条件的沙箱求值器
//!
//! 不是通用脚本引擎：变量只允许 Stats 白名单字段，运算只有算术、
//! 比较与布尔组合。任何解析/类型/未知变量错误都归入 `PolicyError`，
//! 由调用方按"条件不成立"处理（fail closed），绝不让流水线崩溃。

use thiserror::Error;

use crate::types::RunStats;

#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),
    #[error("type error: {0}")]
    Type(String),
}

/// 预编译后的条件表达式
#[derive(Debug, Clone)]
pub struct Condition {
    root: Expr,
}

impl Condition {
    pub fn parse(input: &str) -> Result<Self, PolicyError> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.or_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(PolicyError::Parse(format!(
                "unexpected trailing token at {}",
                parser.pos
            )));
        }
        Ok(Self { root })
    }

    /// 在一组统计值上求布尔结果
    pub fn eval(&self, stats: &RunStats) -> Result<bool, PolicyError> {
        match eval_expr(&self.root, stats)? {
            Value::Bool(b) => Ok(b),
            Value::Num(_) => Err(PolicyError::Type("condition is not boolean".into())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    Num(f64),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone)]
enum Expr {
    Num(f64),
    Bool(bool),
    Ident(String),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(BinOp),
    Not,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, PolicyError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Op(BinOp::Add));
                i += 1;
            }
            '-' => {
                tokens.push(Token::Op(BinOp::Sub));
                i += 1;
            }
            '*' => {
                tokens.push(Token::Op(BinOp::Mul));
                i += 1;
            }
            '/' => {
                tokens.push(Token::Op(BinOp::Div));
                i += 1;
            }
            '&' | '|' => {
                // 只接受成对形式 && / ||
                if i + 1 < bytes.len() && bytes[i + 1] == bytes[i] {
                    tokens.push(Token::Op(if c == '&' { BinOp::And } else { BinOp::Or }));
                    i += 2;
                } else {
                    return Err(PolicyError::Parse(format!("stray `{c}`")));
                }
            }
            '<' | '>' | '=' | '!' => {
                let eq_follows = i + 1 < bytes.len() && bytes[i + 1] == b'=';
                let (tok, len) = match (c, eq_follows) {
                    ('<', true) => (Token::Op(BinOp::Le), 2),
                    ('<', false) => (Token::Op(BinOp::Lt), 1),
                    ('>', true) => (Token::Op(BinOp::Ge), 2),
                    ('>', false) => (Token::Op(BinOp::Gt), 1),
                    ('=', true) => (Token::Op(BinOp::Eq), 2),
                    ('!', true) => (Token::Op(BinOp::Ne), 2),
                    ('!', false) => (Token::Not, 1),
                    _ => return Err(PolicyError::Parse("bare `=` not allowed".into())),
                };
                tokens.push(tok);
                i += len;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < bytes.len() && matches!(bytes[i], b'0'..=b'9' | b'.') {
                    i += 1;
                }
                let text = &input[start..i];
                let num = text
                    .parse::<f64>()
                    .map_err(|_| PolicyError::Parse(format!("bad number `{text}`")))?;
                tokens.push(Token::Num(num));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < bytes.len()
                    && matches!(bytes[i], b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_')
                {
                    i += 1;
                }
                match &input[start..i] {
                    "and" => tokens.push(Token::Op(BinOp::And)),
                    "or" => tokens.push(Token::Op(BinOp::Or)),
                    "not" => tokens.push(Token::Not),
                    ident => tokens.push(Token::Ident(ident.to_string())),
                }
            }
            other => return Err(PolicyError::Parse(format!("unexpected `{other}`"))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn or_expr(&mut self) -> Result<Expr, PolicyError> {
        let mut lhs = self.and_expr()?;
        while matches!(self.peek(), Some(Token::Op(BinOp::Or))) {
            self.bump();
            let rhs = self.and_expr()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, PolicyError> {
        let mut lhs = self.not_expr()?;
        while matches!(self.peek(), Some(Token::Op(BinOp::And))) {
            self.bump();
            let rhs = self.not_expr()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, PolicyError> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.bump();
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, PolicyError> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(Token::Op(op @ (BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Eq | BinOp::Ne))) => *op,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.additive()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn additive(&mut self) -> Result<Expr, PolicyError> {
        let mut lhs = self.multiplicative()?;
        while let Some(Token::Op(op @ (BinOp::Add | BinOp::Sub))) = self.peek() {
            let op = *op;
            self.bump();
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr, PolicyError> {
        let mut lhs = self.unary()?;
        while let Some(Token::Op(op @ (BinOp::Mul | BinOp::Div))) = self.peek() {
            let op = *op;
            self.bump();
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, PolicyError> {
        if matches!(self.peek(), Some(Token::Op(BinOp::Sub))) {
            self.bump();
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, PolicyError> {
        match self.bump() {
            Some(Token::Num(n)) => Ok(Expr::Num(n)),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                _ => Ok(Expr::Ident(name)),
            },
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(PolicyError::Parse("missing `)`".into())),
                }
            }
            other => Err(PolicyError::Parse(format!("unexpected token {other:?}"))),
        }
    }
}

fn eval_expr(expr: &Expr, stats: &RunStats) -> Result<Value, PolicyError> {
    match expr {
        Expr::Num(n) => Ok(Value::Num(*n)),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Ident(name) => stats
            .lookup(name)
            .map(Value::Num)
            .ok_or_else(|| PolicyError::UnknownVariable(name.clone())),
        Expr::Not(inner) => match eval_expr(inner, stats)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            Value::Num(_) => Err(PolicyError::Type("`not` needs a boolean".into())),
        },
        Expr::Neg(inner) => match eval_expr(inner, stats)? {
            Value::Num(n) => Ok(Value::Num(-n)),
            Value::Bool(_) => Err(PolicyError::Type("`-` needs a number".into())),
        },
        Expr::Binary(op, lhs, rhs) => {
            let l = eval_expr(lhs, stats)?;
            let r = eval_expr(rhs, stats)?;
            match op {
                BinOp::And | BinOp::Or => match (l, r) {
                    (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(match op {
                        BinOp::And => a && b,
                        _ => a || b,
                    })),
                    _ => Err(PolicyError::Type("logical op needs booleans".into())),
                },
                BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => match (l, r) {
                    (Value::Num(a), Value::Num(b)) => Ok(Value::Num(match op {
                        BinOp::Add => a + b,
                        BinOp::Sub => a - b,
                        BinOp::Mul => a * b,
                        _ => a / b,
                    })),
                    _ => Err(PolicyError::Type("arithmetic needs numbers".into())),
                },
                BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Eq | BinOp::Ne => {
                    match (l, r) {
                        (Value::Num(a), Value::Num(b)) => Ok(Value::Bool(match op {
                            BinOp::Lt => a < b,
                            BinOp::Le => a <= b,
                            BinOp::Gt => a > b,
                            BinOp::Ge => a >= b,
                            BinOp::Eq => a == b,
                            _ => a != b,
                        })),
                        (Value::Bool(a), Value::Bool(b)) if matches!(op, BinOp::Eq | BinOp::Ne) => {
                            Ok(Value::Bool(if matches!(op, BinOp::Eq) { a == b } else { a != b }))
                        }
                        _ => Err(PolicyError::Type("comparison needs matching types".into())),
                    }
                }
            }
        }
    }
}
