//! Abstract Syntax Tree definitions for minic
//!
//! The tree is what the parser produced and nothing more. Later passes keep
//! what they learn in side tables keyed by [`NodeId`].

use crate::types::Type;
use crate::utils::Span;

/// Identity of a declaration or expression node, unique within a [`Program`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// A complete program (compilation unit)
#[derive(Debug, Clone)]
pub struct Program {
    pub structs: Vec<StructDecl>,
    pub globals: Vec<VarDecl>,
    pub funcs: Vec<FunDecl>,
    /// Next unused node id
    next_id: u32,
}

impl Program {
    pub fn new(next_id: u32) -> Self {
        Self {
            structs: Vec::new(),
            globals: Vec::new(),
            funcs: Vec::new(),
            next_id,
        }
    }

    /// Mint an id no node of this program uses yet
    pub fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn function(&self, id: NodeId) -> Option<&FunDecl> {
        self.funcs.iter().find(|f| f.id == id)
    }
}

/// Identifier with its location
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self { name: name.into(), span }
    }
}

/// `struct name { fields };`
///
/// An empty field list makes this a reference to a struct defined elsewhere.
#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: Ident,
    pub fields: Vec<VarDecl>,
    pub span: Span,
}

/// Variable, parameter or struct field declaration
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub id: NodeId,
    pub ty: Type,
    pub name: Ident,
    pub span: Span,
}

/// Function declaration. Runtime-library functions have no body.
#[derive(Debug, Clone)]
pub struct FunDecl {
    pub id: NodeId,
    pub ret: Type,
    pub name: Ident,
    pub params: Vec<VarDecl>,
    pub body: Option<Block>,
    pub span: Span,
}

/// `{ decls stmts }`
#[derive(Debug, Clone)]
pub struct Block {
    pub decls: Vec<VarDecl>,
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

/// Statement
#[derive(Debug, Clone)]
pub enum Stmt {
    Block(Block),
    While {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    Assign {
        lhs: Expr,
        rhs: Expr,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Expr(Expr),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Block(block) => block.span,
            Stmt::While { span, .. }
            | Stmt::If { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::Return { span, .. } => *span,
            Stmt::Expr(expr) => expr.span,
        }
    }
}

/// Expression node
#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

/// Expression kinds
#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLit(i64),
    CharLit(char),
    StrLit(String),
    /// Variable use
    Var(String),
    Call {
        name: Ident,
        args: Vec<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `base[index]`
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    /// `base.field`
    Field {
        base: Box<Expr>,
        field: Ident,
    },
    /// `*expr`
    Deref(Box<Expr>),
    SizeOf(Type),
    /// `(ty) expr`
    Cast {
        ty: Type,
        expr: Box<Expr>,
    },
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}
