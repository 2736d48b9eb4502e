use crate::compiler::common::{error::Location, types::BaseType};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Integer(i64),
    Double(f64),
    Char(String),
    Boolean(bool),
}
impl Literal {
    pub fn base(&self) -> BaseType {
        match self {
            Literal::Integer(_) => BaseType::Integer,
            Literal::Double(_) => BaseType::Double,
            Literal::Char(_) => BaseType::Char,
            Literal::Boolean(_) => BaseType::Boolean,
        }
    }

    /// Zero value of a base-type, what an unassigned variable reads as
    pub fn zero(base: BaseType) -> Option<Literal> {
        match base {
            BaseType::Integer => Some(Literal::Integer(0)),
            BaseType::Double => Some(Literal::Double(0.0)),
            BaseType::Char => Some(Literal::Char(String::new())),
            BaseType::Boolean => Some(Literal::Boolean(false)),
            BaseType::Label | BaseType::Void => None,
        }
    }
}
impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Double(n) => write!(f, "{:?}", n),
            Literal::Char(s) => write!(f, "{:?}", s),
            Literal::Boolean(true) => write!(f, "TRUE"),
            Literal::Boolean(false) => write!(f, "FALSE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Real division in Comal, truncating division of two integers in Fortran
    Div,
    IntDiv,
    Mod,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}
impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
    /// Type of the result when applied to operands of type `operand`
    pub fn result_base(&self, operand: BaseType) -> BaseType {
        if self.is_comparison() {
            BaseType::Boolean
        } else {
            operand
        }
    }
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::IntDiv => "DIV",
            BinaryOp::Mod => "MOD",
            BinaryOp::Pow => "^",
            BinaryOp::Concat => "//",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }
    pub fn mnemonic(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::IntDiv => "idiv",
            BinaryOp::Mod => "mod",
            BinaryOp::Pow => "pow",
            BinaryOp::Concat => "cat",
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            BinaryOp::Lt => "lt",
            BinaryOp::Le => "le",
            BinaryOp::Gt => "gt",
            BinaryOp::Ge => "ge",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}
impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "NOT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    #[serde(default = "no_line")]
    pub line: i32,
}

pub(crate) fn no_line() -> i32 {
    -1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Literal(Literal),
    Ident(String),
    /// Array element, subscripts are 1-based
    Index {
        name: String,
        indices: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Call {
        name: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn new(kind: ExprKind, line: i32) -> Self {
        Expr { kind, line }
    }
    pub fn literal(literal: Literal, line: i32) -> Self {
        Expr::new(ExprKind::Literal(literal), line)
    }
    pub fn ident(name: &str, line: i32) -> Self {
        Expr::new(ExprKind::Ident(name.to_string()), line)
    }
    pub fn index(name: &str, indices: Vec<Expr>, line: i32) -> Self {
        Expr::new(ExprKind::Index { name: name.to_string(), indices }, line)
    }
    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        let line = operand.line;
        Expr::new(ExprKind::Unary { op, operand: Box::new(operand) }, line)
    }
    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        let line = left.line;
        Expr::new(
            ExprKind::Binary { left: Box::new(left), op, right: Box::new(right) },
            line,
        )
    }
    pub fn call(name: &str, args: Vec<Expr>, line: i32) -> Self {
        Expr::new(ExprKind::Call { name: name.to_string(), args }, line)
    }

    pub fn as_integer_literal(&self) -> Option<i64> {
        match &self.kind {
            ExprKind::Literal(Literal::Integer(n)) => Some(*n),
            _ => None,
        }
    }
}
impl Location for Expr {
    fn line_index(&self) -> i32 {
        self.line
    }
}
