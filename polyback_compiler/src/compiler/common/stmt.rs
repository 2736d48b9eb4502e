use crate::compiler::common::{decl::Declaration, error::Location, expr::*};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    #[serde(default = "no_line")]
    pub line: i32,
}

/// Left-hand side of an assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LValue {
    pub name: String,
    #[serde(default)]
    pub indices: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Declare(Declaration),
    /// Makes names of the enclosing scope visible inside a CLOSED routine
    Import(Vec<String>),
    Assign {
        target: LValue,
        value: Expr,
    },
    Call {
        name: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        #[serde(default)]
        else_branch: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Repeat {
        body: Vec<Stmt>,
        until: Expr,
    },
    For {
        var: String,
        from: Expr,
        to: Expr,
        #[serde(default)]
        step: Option<Expr>,
        body: Vec<Stmt>,
    },
    Label(String),
    Goto(String),
    Return(Option<Expr>),
    Print(Vec<Expr>),
    Stop,
}

impl Stmt {
    pub fn new(kind: StmtKind, line: i32) -> Self {
        Stmt { kind, line }
    }
    pub fn assign(name: &str, value: Expr, line: i32) -> Self {
        Stmt::new(
            StmtKind::Assign {
                target: LValue { name: name.to_string(), indices: vec![] },
                value,
            },
            line,
        )
    }
    pub fn assign_element(name: &str, indices: Vec<Expr>, value: Expr, line: i32) -> Self {
        Stmt::new(
            StmtKind::Assign {
                target: LValue { name: name.to_string(), indices },
                value,
            },
            line,
        )
    }

    /// Statements directly nested inside this one
    pub fn children(&self) -> Box<dyn Iterator<Item = &Stmt> + '_> {
        match &self.kind {
            StmtKind::If { then_branch, else_branch, .. } => {
                Box::new(then_branch.iter().chain(else_branch.iter()))
            }
            StmtKind::While { body, .. }
            | StmtKind::Repeat { body, .. }
            | StmtKind::For { body, .. } => Box::new(body.iter()),
            _ => Box::new(std::iter::empty()),
        }
    }
}
impl Location for Stmt {
    fn line_index(&self) -> i32 {
        self.line
    }
}

/// Calls `f` on every statement in `stmts`, including nested ones, in source order
pub fn walk_stmts<'a>(stmts: &'a [Stmt], f: &mut impl FnMut(&'a Stmt)) {
    for stmt in stmts {
        walk_stmt(stmt, f);
    }
}
fn walk_stmt<'a>(stmt: &'a Stmt, f: &mut impl FnMut(&'a Stmt)) {
    f(stmt);
    for child in stmt.children() {
        walk_stmt(child, f);
    }
}
