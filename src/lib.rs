//! Rewrites an imperative function body into continuation-passing style so
//! that any designated call or `yield` inside it becomes a point the whole
//! computation can be paused at, persisted, and resumed from later —
//! possibly in a different process, possibly after the bound external it
//! paused on finally answers.
//!
//! The pipeline mirrors a small compiler: [`parse`] turns source text into
//! this crate's own restricted [`ast`], [`tagger`] marks which subtrees a
//! split can legally occur inside, [`simplifier`] hoists split-relevant
//! subexpressions out to their own statements (a restricted A-normal form),
//! and [`splitter`] walks the result right-to-left, cutting a fresh
//! continuation function at every genuine split point. [`strategy`]
//! supplies the pluggable "what counts as a split" policy; everything
//! downstream of compilation — [`eval`], [`trampoline`], [`generator`],
//! [`checkpoint`] — runs the resulting table of continuations without ever
//! looking back at source syntax.
//!
//! Grounded on the teacher crate's own split between a front end that never
//! touches runtime state and a runtime ([`eval::Program`], [`trampoline::Trampoline`])
//! that never looks back at syntax.

pub mod ast;
pub mod checkpoint;
pub mod diagnostics;
pub mod eval;
pub mod generator;
pub mod parse;
pub mod simplifier;
pub mod splitter;
pub mod strategy;
pub mod suspension;
pub mod tagger;
pub mod trampoline;
pub mod value;
pub mod variables;
pub mod visitor;

pub use crate::diagnostics::{CompileError, CompileWarning, CollectingTracer, LowerError, NoopTracer, Tracer};
pub use crate::eval::{EvalError, ExternalEffect, ExternalFunction, Outcome, Program, SideEffect};
pub use crate::generator::Generator;
pub use crate::splitter::{CompiledFunction, compile};
pub use crate::strategy::{DefaultStrategy, NameResolver, StaticResolver, Strategy};
pub use crate::suspension::Suspension;
pub use crate::trampoline::{StepResult, Trampoline};
pub use crate::value::{Continuation, ExcClass, PyException, Value};

/// Parses and compiles a function body in one call — the common case where
/// the caller has no independent use for the intermediate [`ast::FunctionDef`].
/// Grounded on the teacher crate's `Runner::new`, which likewise wraps
/// "parse, then prepare for execution" behind a single entry point.
///
/// # Errors
/// Returns [`CompileError::Lower`] if `source` falls outside the supported
/// dialect (§4.8 Non-goals), or any other [`CompileError`] variant the
/// splitter itself can raise (an illegal nested `try`, a `break`/`continue`
/// outside a loop, ...).
pub fn compile_source(
    source: &str,
    strategy: &dyn Strategy,
    resolver: &dyn NameResolver,
    tracer: &mut dyn Tracer,
) -> Result<CompiledFunction, CompileError> {
    let def = parse::parse_function(source)?;
    splitter::compile(def, strategy, resolver, tracer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_source_parses_and_splits_in_one_call() {
        let strategy = DefaultStrategy;
        let resolver = StaticResolver::new(["checkpoint"]);
        let mut tracer = NoopTracer;
        let compiled = compile_source("def f(n):\n    checkpoint(n)\n    return n\n", &strategy, &resolver, &mut tracer).unwrap();
        assert!(compiled.definitions.len() > 1);
    }
}
