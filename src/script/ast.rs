//! Abstract syntax for code islands

use crate::error::Span;
use crate::value::Value;

/// A node with its byte range in the compiled script
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    Eq,
    NotEq,
    Identical,
    NotIdentical,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
    Coalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Concat,
}

/// One entry of an array literal; `key` is absent for list-style entries
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayItem {
    pub key: Option<Expr>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Variable(String),
    Array(Vec<ArrayItem>),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    MethodCall {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Property {
        target: Box<Expr>,
        name: String,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `cond ? then : otherwise`; `then` is absent for `cond ?: otherwise`
    Ternary {
        cond: Box<Expr>,
        then: Option<Box<Expr>>,
        otherwise: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: String,
        value: Box<Expr>,
    },
    /// `$i++` / `$i--`, evaluating to the previous value
    Step {
        target: String,
        delta: i64,
    },
}

/// A single statement as written in a code island
///
/// Block statements appear here flat (`If`, `EndIf`, ...); the program builder
/// pairs them into nested blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Echo(Vec<Expr>),
    Expr(Expr),
    Unset(Vec<String>),
    If(Expr),
    ElseIf(Expr),
    Else,
    EndIf,
    Foreach {
        subject: Expr,
        key: Option<String>,
        value: String,
    },
    EndForeach,
    For {
        init: Vec<Expr>,
        cond: Option<Expr>,
        step: Vec<Expr>,
    },
    EndFor,
    While(Expr),
    EndWhile,
}

impl Instr {
    /// Keyword used in block-structure error messages
    pub fn keyword(&self) -> &'static str {
        match self {
            Instr::Echo(_) => "echo",
            Instr::Expr(_) => "expression",
            Instr::Unset(_) => "unset",
            Instr::If(_) => "if",
            Instr::ElseIf(_) => "elseif",
            Instr::Else => "else",
            Instr::EndIf => "endif",
            Instr::Foreach { .. } => "foreach",
            Instr::EndForeach => "endforeach",
            Instr::For { .. } => "for",
            Instr::EndFor => "endfor",
            Instr::While(_) => "while",
            Instr::EndWhile => "endwhile",
        }
    }
}
