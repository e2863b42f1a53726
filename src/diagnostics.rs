//! Structured compile-time errors, warnings, and an execution tracer
//! (§7, §10 "Diagnostics").
//!
//! Grounded on the teacher crate's `tracer.rs`: a trait with inlined no-op
//! default methods so a [`NoopTracer`] compiles away entirely, plus a
//! [`CollectingTracer`] used by tests that need to assert on what the
//! pipeline reported. The error enums follow the teacher's `repl_error.rs`
//! convention (`enum` + hand-written `Display` + `From` impls at module
//! boundaries), not `thiserror`/`anyhow`.

use std::fmt;

/// Compile-time structural errors (§7.1). Fatal: the caller gets no
/// `CompiledFunction` back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Two `try` blocks nested inside one another were encountered while
    /// splitting. The splitter only tracks a single active try-model.
    NestedTry,
    /// Variable analysis hit a `Name` whose load/store context could not be
    /// determined (always an internal bug: the lowering step should never
    /// produce one).
    UnknownNameContext,
    /// The encapsulator's precondition check (§5) caught two continuations
    /// registered under the same name within one `SplitState`.
    DuplicateContinuation(String),
    /// A source construct outside the supported dialect was encountered
    /// while lowering the concrete syntax tree (§4.8 Non-goals).
    Lower(LowerError),
    /// `break`/`continue` encountered outside any enclosing `while`/`for`.
    InvalidControlFlow(&'static str),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NestedTry => write!(f, "not allowed to nest try/except"),
            Self::UnknownNameContext => write!(f, "unknown name context during variable analysis"),
            Self::DuplicateContinuation(name) => write!(f, "duplicate continuation name: {name}"),
            Self::Lower(e) => write!(f, "{e}"),
            Self::InvalidControlFlow(kind) => write!(f, "`{kind}` outside a loop"),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<LowerError> for CompileError {
    fn from(e: LowerError) -> Self {
        Self::Lower(e)
    }
}

/// Unsupported-construct errors raised while lowering a concrete syntax
/// tree into the engine's AST (§4.8). Kept distinct from [`CompileError`]'s
/// other variants because they originate in a different pipeline stage and
/// a caller may want to report them differently (a rejected input vs. an
/// internal invariant violation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LowerError {
    UnsupportedStatement(&'static str),
    UnsupportedExpression(&'static str),
    UnsupportedOperator(&'static str),
    ComplexAssignTarget,
    SyntaxError(String),
}

impl fmt::Display for LowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedStatement(kind) => write!(f, "unsupported statement: {kind}"),
            Self::UnsupportedExpression(kind) => write!(f, "unsupported expression: {kind}"),
            Self::UnsupportedOperator(kind) => write!(f, "unsupported operator: {kind}"),
            Self::ComplexAssignTarget => write!(f, "assignment targets must be a single simple name"),
            Self::SyntaxError(msg) => write!(f, "syntax error: {msg}"),
        }
    }
}

impl std::error::Error for LowerError {}

/// Compile-time soft warnings (§7.2). Non-fatal: the caller still gets a
/// usable `CompiledFunction` back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileWarning {
    /// The function body contained no split markers at all; the splitter
    /// returned the function as its own single continuation, unchanged.
    NoSplitPoints { function: String },
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSplitPoints { function } => {
                write!(f, "`{function}` contains no split points; returning it unchanged")
            }
        }
    }
}

/// Trace hook points exercised during compilation. Mirrors the teacher's
/// `VmTracer`: every method has an inlined empty default so [`NoopTracer`]
/// costs nothing, and a caller who wants visibility implements only the
/// hooks they care about.
pub trait Tracer: fmt::Debug {
    #[inline(always)]
    fn on_warning(&mut self, _warning: &CompileWarning) {}

    #[inline(always)]
    fn on_split_point(&mut self, _continuation_name: &str) {}

    #[inline(always)]
    fn on_continuation_emitted(&mut self, _name: &str, _live_in: &[String]) {}

    #[inline(always)]
    fn on_step(&mut self, _continuation_name: &str) {}
}

/// Production default: every hook compiles away via monomorphization.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Collects every event it is sent, for tests and CLI `--trace` output.
#[derive(Debug, Default, Clone)]
pub struct CollectingTracer {
    pub warnings: Vec<CompileWarning>,
    pub split_points: Vec<String>,
    pub continuations: Vec<(String, Vec<String>)>,
    pub steps: Vec<String>,
}

impl Tracer for CollectingTracer {
    fn on_warning(&mut self, warning: &CompileWarning) {
        self.warnings.push(warning.clone());
    }

    fn on_split_point(&mut self, continuation_name: &str) {
        self.split_points.push(continuation_name.to_owned());
    }

    fn on_continuation_emitted(&mut self, name: &str, live_in: &[String]) {
        self.continuations.push((name.to_owned(), live_in.to_vec()));
    }

    fn on_step(&mut self, continuation_name: &str) {
        self.steps.push(continuation_name.to_owned());
    }
}
