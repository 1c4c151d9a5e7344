// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::lexer::*;
use crate::value::Value;
use crate::*;

use core::{cmp, fmt, ops::Deref};

pub struct NodeRef<T> {
    r: Rc<T>,
}

impl<T> Clone for NodeRef<T> {
    fn clone(&self) -> Self {
        Self { r: self.r.clone() }
    }
}

impl<T: fmt::Debug> fmt::Debug for NodeRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.r.as_ref().fmt(f)
    }
}

impl<T> cmp::PartialEq for NodeRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::as_ptr(&self.r).eq(&Rc::as_ptr(&other.r))
    }
}

impl<T> cmp::Eq for NodeRef<T> {}

impl<T> Deref for NodeRef<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.r
    }
}

impl<T> AsRef<T> for NodeRef<T> {
    fn as_ref(&self) -> &T {
        self.deref()
    }
}

impl<T> NodeRef<T> {
    pub fn new(t: T) -> Self {
        Self { r: Rc::new(t) }
    }
}

pub type Ref<T> = NodeRef<T>;

/// Named arguments in source order: `key=value`.
pub type HashArgs = Vec<(String, Expr)>;

/// A reference such as `a.b`, `../x`, `@index`, `this` or `meetingId:1`.
#[derive(Debug, Clone)]
pub struct PathExpr {
    pub span: Span,
    pub original: String,
    /// Segments after `this`, `../` and `@` prefixes have been removed.
    /// A trailing `:N` selector is still part of the last segment.
    pub parts: Vec<String>,
    /// Number of `../` prefixes.
    pub depth: usize,
    /// `@`-prefixed data variable.
    pub data: bool,
    /// Explicit `this`, `.` or `./` reference to the current context.
    pub this: bool,
}

impl PathExpr {
    /// Bare `this`/`.` with nothing after it.
    pub fn is_this(&self) -> bool {
        self.this && self.parts.is_empty() && self.depth == 0 && !self.data
    }

    /// Name usable as a helper: a single plain segment.
    pub fn simple_name(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [name] if !self.this && !self.data && self.depth == 0 => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Path(PathExpr),

    /// `"str"`, `42`, `true`, `null`, `undefined`.
    Literal { span: Span, value: Value },

    /// `(helper arg key=value)`
    SubExpr {
        span: Span,
        name: String,
        params: Vec<Expr>,
        hash: HashArgs,
    },
}

impl Expr {
    pub fn span(&self) -> &Span {
        match self {
            Expr::Path(p) => &p.span,
            Expr::Literal { span, .. } | Expr::SubExpr { span, .. } => span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContentStmt {
    pub span: Span,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ExpressionStmt {
    pub span: Span,
    pub head: Expr,
    pub params: Vec<Expr>,
    pub hash: HashArgs,
}

impl ExpressionStmt {
    /// A call with arguments, or a parenthesized sub-expression head.
    pub fn is_helper_call(&self) -> bool {
        !self.params.is_empty() || !self.hash.is_empty() || matches!(self.head, Expr::SubExpr { .. })
    }

    pub fn helper_name(&self) -> Option<&str> {
        match &self.head {
            Expr::Path(p) if self.is_helper_call() => p.simple_name(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    If,
    Unless,
    Each,
    With,
    Custom(String),
}

impl BlockKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "if" => BlockKind::If,
            "unless" => BlockKind::Unless,
            "each" => BlockKind::Each,
            "with" => BlockKind::With,
            other => BlockKind::Custom(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            BlockKind::If => "if",
            BlockKind::Unless => "unless",
            BlockKind::Each => "each",
            BlockKind::With => "with",
            BlockKind::Custom(name) => name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockStmt {
    pub span: Span,
    pub kind: BlockKind,
    pub params: Vec<Expr>,
    pub hash: HashArgs,
    pub program: Program,
    pub inverse: Option<Program>,
}

impl BlockStmt {
    /// Argument the built-in block kinds operate on.
    pub fn target(&self) -> Option<&Expr> {
        self.params.first()
    }
}

#[derive(Debug, Clone)]
pub enum Statement {
    Content(ContentStmt),
    Expression(ExpressionStmt),
    Block(BlockStmt),
}

impl Statement {
    pub fn span(&self) -> &Span {
        match self {
            Statement::Content(c) => &c.span,
            Statement::Expression(e) => &e.span,
            Statement::Block(b) => &b.span,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub body: Vec<Statement>,
}
