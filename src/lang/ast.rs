use serde::Serialize;

/// Abstract syntax tree for the Habilis language.
///
/// The tree is produced by the parser and consumed by the bytecode
/// compiler. Nodes only carry the fields the compiler reads; there is no
/// source-position tracking past the parser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// A brace-delimited statement sequence (function body, if branch).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stmt {
    /// `let <name> = <value>;`
    Let { name: String, value: Expr },

    /// `return <value>;`
    Return(Expr),

    /// An expression in statement position; its value is discarded.
    Expression(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Integer(i64),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),

    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },

    /// `if (<condition>) { ... } else { ... }`. The else branch is
    /// optional; a missing branch evaluates to null.
    If {
        condition: Box<Expr>,
        consequence: Block,
        alternative: Option<Block>,
    },

    /// `fn(<params>) { ... }`. Always anonymous; named functions are
    /// `let` bindings.
    Function {
        parameters: Vec<String>,
        body: Block,
    },

    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
    },

    /// `[a, b, c]`
    Array(Vec<Expr>),

    /// `{k: v, ...}`, pairs kept in source order.
    Hash(Vec<(Expr, Expr)>),

    /// `<collection>[<index>]`
    Index {
        collection: Box<Expr>,
        index: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
    And,
    Or,
    /// Method-call syntax `a.b`; parsed but not compilable.
    Dot,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Dot => ".",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnOp {
    /// Arithmetic negation `-x`.
    Neg,
    /// Boolean negation `!x`.
    Not,
}
