//! The engine's own statement/expression dialect.
//!
//! Python source is parsed with `ruff_python_parser` and immediately lowered
//! (see [`crate::parse`]) into the types here, the same way the teacher
//! crate's own front end lowers a borrowed concrete syntax tree into a
//! private IR before any compiler phase touches it. Every node carries the
//! two decoration bits the pipeline needs (`ignore`, `no_transform`) rather
//! than attaching them out of band, since Rust has no equivalent of setting
//! arbitrary attributes on a borrowed AST node.

use std::fmt;

pub type Ident = String;

/// Decoration attributes a pass may stamp onto a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Meta {
    /// Set by the tagger: `true` means no split point appears anywhere in
    /// this subtree, so later passes should leave it untouched.
    pub ignore: bool,
    /// Set on a handful of synthesised `Return` nodes (the splitter's own
    /// `while`-tail returns) to stop the splitter from wrapping their value
    /// in the ambient return-continuation call.
    pub no_transform: bool,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub meta: Meta,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Stmt { kind, meta: Meta::default() }
    }

    pub fn ignore(&self) -> bool {
        self.meta.ignore
    }

    /// Expression fields that sit directly on this statement (not inside a
    /// nested statement list). These are the fields the simplifier may hoist
    /// split-bearing subexpressions out of.
    pub fn direct_exprs(&self) -> Vec<&Expr> {
        match &self.kind {
            StmtKind::If(n) => vec![&n.test],
            StmtKind::While(n) => vec![&n.test],
            StmtKind::For(n) => vec![&n.iter],
            StmtKind::Assign(n) => vec![&n.value],
            StmtKind::Expr(e) => vec![e],
            StmtKind::Return(Some(e)) => vec![e],
            StmtKind::Raise(Some(e)) => vec![e],
            StmtKind::Try(n) => n.handlers.iter().filter_map(|h| h.exc_type.as_ref()).collect(),
            _ => vec![],
        }
    }

    pub fn direct_exprs_mut(&mut self) -> Vec<&mut Expr> {
        match &mut self.kind {
            StmtKind::If(n) => vec![&mut n.test],
            StmtKind::While(n) => vec![&mut n.test],
            StmtKind::For(n) => vec![&mut n.iter],
            StmtKind::Assign(n) => vec![&mut n.value],
            StmtKind::Expr(e) => vec![e],
            StmtKind::Return(Some(e)) => vec![e],
            StmtKind::Raise(Some(e)) => vec![e],
            StmtKind::Try(n) => n.handlers.iter_mut().filter_map(|h| h.exc_type.as_mut()).collect(),
            _ => vec![],
        }
    }

    /// Nested statement lists (`body`, `orelse`, `handlers[].body`, ...),
    /// recursed into without hoisting around them (§4.4).
    pub fn child_stmt_lists(&self) -> Vec<&Vec<Stmt>> {
        match &self.kind {
            StmtKind::FunctionDef(n) => vec![&n.body],
            StmtKind::If(n) => vec![&n.body, &n.orelse],
            StmtKind::While(n) => vec![&n.body, &n.orelse],
            StmtKind::For(n) => vec![&n.body, &n.orelse],
            StmtKind::With(n) => vec![&n.body],
            StmtKind::Try(n) => {
                let mut v = vec![&n.body];
                for h in &n.handlers {
                    v.push(&h.body);
                }
                v.push(&n.orelse);
                v.push(&n.finalbody);
                v
            }
            _ => vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    FunctionDef(FunctionDef),
    If(If),
    While(While),
    For(For),
    Try(TryStmt),
    With(With),
    Return(Option<Expr>),
    Break,
    Continue,
    Assign(Assign),
    Expr(Expr),
    Raise(Option<Expr>),
    Global(Vec<Ident>),
    Nonlocal(Vec<Ident>),
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: Ident,
    pub args: Arguments,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Default)]
pub struct Arguments {
    pub args: Vec<Ident>,
    pub kwonly: Vec<KwOnlyArg>,
    pub vararg: Option<Ident>,
    pub kwarg: Option<Ident>,
}

#[derive(Debug, Clone)]
pub struct KwOnlyArg {
    pub name: Ident,
    pub default: Option<Expr>,
}

impl Arguments {
    /// Every parameter name, in the order `§4.2` registers them as `arg_def`s.
    pub fn all_names(&self) -> Vec<&Ident> {
        let mut names: Vec<&Ident> = self.args.iter().collect();
        names.extend(self.kwonly.iter().map(|k| &k.name));
        names.extend(self.vararg.iter());
        names.extend(self.kwarg.iter());
        names
    }
}

#[derive(Debug, Clone)]
pub struct If {
    pub test: Expr,
    pub body: Vec<Stmt>,
    pub orelse: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct While {
    pub test: Expr,
    pub body: Vec<Stmt>,
    pub orelse: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct For {
    pub target: Ident,
    pub iter: Expr,
    pub body: Vec<Stmt>,
    pub orelse: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct TryStmt {
    pub body: Vec<Stmt>,
    pub handlers: Vec<ExceptHandler>,
    pub orelse: Vec<Stmt>,
    pub finalbody: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct ExceptHandler {
    pub exc_type: Option<Expr>,
    pub name: Option<Ident>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct With {
    pub context_expr: Expr,
    pub optional_var: Option<Ident>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Assign {
    /// Restricted to a single simple name target. Tuple/attribute/subscript
    /// assignment targets are rejected at the `parse` boundary (§4.8
    /// Non-goals): the splitter's `create_continuation` needs `targets[0].id`
    /// to name the continuation parameter, same as the reference
    /// implementation.
    pub target: Ident,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub meta: Meta,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr { kind, meta: Meta::default() }
    }

    pub fn ignore(&self) -> bool {
        self.meta.ignore
    }

    pub fn name(id: impl Into<String>) -> Self {
        Expr::new(ExprKind::Name(id.into()))
    }

    pub fn constant(c: Constant) -> Self {
        Expr::new(ExprKind::Constant(c))
    }

    /// Direct child expressions, in left-to-right evaluation order. Used by
    /// both the visitor framework (§4.1) and the simplifier's hoisting rule
    /// (§4.4).
    pub fn child_exprs(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Name(_) | ExprKind::Constant(_) => vec![],
            ExprKind::Call(c) => {
                let mut v = vec![c.func.as_ref()];
                v.extend(c.args.iter());
                v.extend(c.keywords.iter().map(|(_, e)| e));
                v
            }
            ExprKind::Compare(c) => {
                let mut v = vec![c.left.as_ref()];
                v.extend(c.comparators.iter());
                v
            }
            ExprKind::BoolOp { values, .. } => values.iter().collect(),
            ExprKind::BinOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            ExprKind::UnaryOp { operand, .. } => vec![operand.as_ref()],
            ExprKind::Tuple(items) | ExprKind::List(items) => items.iter().collect(),
            ExprKind::Attribute { value, .. } => vec![value.as_ref()],
            ExprKind::Subscript { value, index } => vec![value.as_ref(), index.as_ref()],
            ExprKind::IfExp { test, body, orelse } => vec![test.as_ref(), body.as_ref(), orelse.as_ref()],
            ExprKind::Yield(v) => v.iter().map(|b| b.as_ref()).collect(),
            ExprKind::NamedExpr { value, .. } => vec![value.as_ref()],
        }
    }

    pub fn child_exprs_mut(&mut self) -> Vec<&mut Expr> {
        match &mut self.kind {
            ExprKind::Name(_) | ExprKind::Constant(_) => vec![],
            ExprKind::Call(c) => {
                let mut v = vec![c.func.as_mut()];
                v.extend(c.args.iter_mut());
                v.extend(c.keywords.iter_mut().map(|(_, e)| e));
                v
            }
            ExprKind::Compare(c) => {
                let mut v = vec![c.left.as_mut()];
                v.extend(c.comparators.iter_mut());
                v
            }
            ExprKind::BoolOp { values, .. } => values.iter_mut().collect(),
            ExprKind::BinOp { left, right, .. } => vec![left.as_mut(), right.as_mut()],
            ExprKind::UnaryOp { operand, .. } => vec![operand.as_mut()],
            ExprKind::Tuple(items) | ExprKind::List(items) => items.iter_mut().collect(),
            ExprKind::Attribute { value, .. } => vec![value.as_mut()],
            ExprKind::Subscript { value, index } => vec![value.as_mut(), index.as_mut()],
            ExprKind::IfExp { test, body, orelse } => vec![test.as_mut(), body.as_mut(), orelse.as_mut()],
            ExprKind::Yield(v) => v.iter_mut().map(|b| b.as_mut()).collect(),
            ExprKind::NamedExpr { value, .. } => vec![value.as_mut()],
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Name(Ident),
    Constant(Constant),
    Call(Call),
    Compare(Compare),
    BoolOp { op: BoolOp, values: Vec<Expr> },
    BinOp { left: Box<Expr>, op: Operator, right: Box<Expr> },
    UnaryOp { op: UnaryOp, operand: Box<Expr> },
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
    Attribute { value: Box<Expr>, attr: Ident },
    Subscript { value: Box<Expr>, index: Box<Expr> },
    IfExp { test: Box<Expr>, body: Box<Expr>, orelse: Box<Expr> },
    Yield(Option<Box<Expr>>),
    NamedExpr { target: Ident, value: Box<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::None => write!(f, "None"),
            Constant::Bool(b) => write!(f, "{b}"),
            Constant::Int(i) => write!(f, "{i}"),
            Constant::Float(x) => write!(f, "{x}"),
            Constant::Str(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub func: Box<Expr>,
    pub args: Vec<Expr>,
    /// `None` name would represent a `**kwargs` spread; the supported
    /// dialect never spreads keyword arguments, so this is always `Some`.
    pub keywords: Vec<(Ident, Expr)>,
}

#[derive(Debug, Clone)]
pub struct Compare {
    pub left: Box<Expr>,
    pub ops: Vec<CmpOp>,
    pub comparators: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Operator {
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
}

/// Helpers used throughout the pipeline to build synthesised nodes tersely.
pub fn load(name: impl Into<String>) -> Expr {
    Expr::name(name)
}

pub fn assign(target: impl Into<String>, value: Expr) -> Stmt {
    Stmt::new(StmtKind::Assign(Assign { target: target.into(), value }))
}

pub fn expr_stmt(value: Expr) -> Stmt {
    Stmt::new(StmtKind::Expr(value))
}

pub fn return_stmt(value: Option<Expr>) -> Stmt {
    Stmt::new(StmtKind::Return(value))
}

pub fn call(func: Expr, args: Vec<Expr>, keywords: Vec<(Ident, Expr)>) -> Expr {
    Expr::new(ExprKind::Call(Call { func: Box::new(func), args, keywords }))
}

/// Fresh-name counter shared by the simplifier (hoisted subexpressions,
/// lowered `for`/`with` temporaries) and the splitter (synthetic
/// continuation parameters with no pending assignment target). Mirrors the
/// reference implementation's single per-compilation counter (§3
/// `SplitState`), kept as its own type here since the simplifier runs
/// before a `SplitState` exists.
#[derive(Debug, Default, Clone)]
pub struct Gensym {
    count: u32,
}

impl Gensym {
    pub fn next(&mut self, prefix: &str) -> Ident {
        let n = self.count;
        self.count += 1;
        format!("__{prefix}{n}")
    }
}
