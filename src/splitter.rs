//! The body splitter (§4.5): the core CPS transform. Walks a simplified,
//! tagged statement list right-to-left, cutting a fresh continuation
//! function at every genuine split point and reassembling everything else
//! (`if`/`while`/`try`, `break`/`continue`, a bare `return`) into the
//! control-flow glue that calls those continuations.
//!
//! Grounded on the reference implementation's `BodySplitter`. The biggest
//! departure is mechanical rather than semantic: Python's `BodySplitter`
//! threads a single mutable `self` through recursive calls; here the same
//! bookkeeping is split between [`SplitState`] (owned, mutated: the
//! definitions table and the gensym counter) and [`Ctl`] (borrowed,
//! structurally scoped: the active strategy/resolver, loop tails, try model,
//! and the prefix-scoped `known` names), since Rust's borrow checker won't
//! let one `&mut` straddle the recursive branches the way Python's `self`
//! does.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::ast::{self, Constant, Expr, FunctionDef, Ident, If, Stmt, StmtKind, TryStmt, While};
use crate::diagnostics::{CompileError, CompileWarning, Tracer};
use crate::simplifier;
use crate::strategy::{self, NameResolver, Strategy};
use crate::variables::{self, Variables};

/// A fully compiled entry point: every continuation the splitter produced,
/// keyed by name, plus the name of the one to call first.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub entry: Ident,
    pub definitions: IndexMap<Ident, FunctionDef>,
}

/// Bookkeeping that lives for the whole compilation of one entry function:
/// the fresh-name counter and the growing definitions table.
#[derive(Debug)]
pub struct SplitState {
    pub function_name: Ident,
    pub definitions: IndexMap<Ident, FunctionDef>,
    pub gensym: ast::Gensym,
    /// The ambient external continuation a bare `return` honours — always
    /// `Name("continuation")`, the kwonly parameter appended to the entry
    /// signature (§4.5(2c)).
    pub return_tail: Expr,
}

/// The active `try` model (§4.5 "Continuation construction"): every
/// continuation cut out of the protected region is wrapped in a fresh copy
/// of the original `try`'s (already-split) handlers and `finally` body.
///
/// A fragment that completes without raising still passes back through its
/// wrapping `finally` once per fragment rather than once per whole `try` —
/// a known, deliberate simplification (see `DESIGN.md`): under a
/// trampoline each continuation is its own independent call, so there is no
/// single stack frame left to hang one true `finally` off of. A `finally`
/// body is expected to be idempotent (the common case: releasing a
/// resource, flipping a flag) rather than relied on to run exactly once.
#[derive(Debug, Clone)]
struct TryModel {
    handlers: Vec<ast::ExceptHandler>,
    finalbody: Vec<Stmt>,
}

/// The two tail expressions a `break`/`continue` inside a loop body resolve
/// to (§4.5 "loop context").
#[derive(Debug, Clone)]
struct LoopTails {
    brk: Expr,
    cont: Expr,
}

/// Everything that threads through the recursive descent without being
/// mutated: the pluggable policy, the structurally-scoped loop/try context,
/// and `known` — the [`Variables`] partition (arguments vs. locals) of every
/// name genuinely bound by the time control reaches the block currently
/// being split. `known` only ever grows as the descent goes deeper into
/// nested bodies (§4.5 "Continuation construction"); see [`known_with_queue`]
/// for how a block folds its own remaining statements into it. Cheap to
/// clone (an `Option<Expr>`/`Option<TryModel>` each, both small trees, plus
/// a handful of string sets) — recursion depth here is the user's own
/// nesting depth, not a hot runtime loop.
#[derive(Clone)]
struct Ctl<'a> {
    strategy: &'a dyn Strategy,
    resolver: &'a dyn NameResolver,
    loop_tails: Option<LoopTails>,
    try_model: Option<TryModel>,
    known: Variables,
}

impl<'a> Ctl<'a> {
    fn with_loop(&self, tails: LoopTails) -> Ctl<'a> {
        Ctl { loop_tails: Some(tails), ..self.clone() }
    }

    fn with_try(&self, model: TryModel) -> Ctl<'a> {
        Ctl { try_model: Some(model), ..self.clone() }
    }

    fn without_try(&self) -> Ctl<'a> {
        Ctl { try_model: None, ..self.clone() }
    }

    fn with_known(&self, known: Variables) -> Ctl<'a> {
        Ctl { known, ..self.clone() }
    }
}

/// Compiles one top-level function body into a table of continuations
/// (§4.5, final paragraph): tag, simplify, tag again; append the `continuation`
/// kwonly parameter and a trailing `return None`; split; register the
/// (possibly untouched) entry function itself last.
pub fn compile(
    mut def: FunctionDef,
    strategy: &dyn Strategy,
    resolver: &dyn NameResolver,
    tracer: &mut dyn Tracer,
) -> Result<CompiledFunction, CompileError> {
    crate::tagger::tag_stmts(&mut def.body, strategy, resolver);
    let mut gensym = ast::Gensym::default();
    let mut body = simplifier::simplify(def.body, &mut gensym);
    crate::tagger::tag_stmts(&mut body, strategy, resolver);

    def.args.kwonly.push(ast::KwOnlyArg { name: "continuation".to_owned(), default: Some(Expr::constant(Constant::None)) });
    body.push(ast::return_stmt(None));

    // Seeded after the `continuation` kwonly push, so every continuation
    // that reads it via `rewrite_return`'s `__CallContinuation(continuation,
    // v)` sees it as already bound, not free.
    let mut known = Variables::default();
    for name in def.args.all_names() {
        known.define_argument(name);
    }

    let mut ctx = SplitState { function_name: def.name.clone(), definitions: IndexMap::new(), gensym, return_tail: Expr::name("continuation") };
    let ctl = Ctl { strategy, resolver, loop_tails: None, try_model: None, known };

    let entry_body = split_block(body, None, &ctl, &mut ctx, tracer)?;
    let entry_name = def.name.clone();
    tracer.on_continuation_emitted(&entry_name, &[]);
    ctx.definitions.insert(entry_name.clone(), FunctionDef { name: entry_name.clone(), args: def.args, body: entry_body });

    if ctx.definitions.len() == 1 {
        tracer.on_warning(&CompileWarning::NoSplitPoints { function: entry_name.clone() });
    }

    Ok(CompiledFunction { entry: entry_name, definitions: ctx.definitions })
}

/// The central right-to-left pass (§4.5 "Algorithm"). `tail`, if present, is
/// appended as a synthetic trailing `return` before processing begins — the
/// ambient "what happens if control simply falls off the end of this
/// block" continuation. Entry-level callers pass `None` because they have
/// already appended a literal `Return(None)` to the body themselves.
fn split_block(
    stmts: Vec<Stmt>,
    tail: Option<Expr>,
    ctl: &Ctl<'_>,
    ctx: &mut SplitState,
    tracer: &mut dyn Tracer,
) -> Result<Vec<Stmt>, CompileError> {
    let mut queue = stmts;
    if let Some(t) = tail {
        // `no_transform`: this `return` is the algorithm's own synthesised
        // "fall off the end of this block" marker, already a proper tail
        // expression (a suspension-producing call, or an eager
        // `__CallContinuation`) — not a user source `return` that still
        // needs the ambient return-continuation wrap (§4.5(2c)).
        let mut synthetic = ast::return_stmt(Some(t));
        synthetic.meta.no_transform = true;
        queue.push(synthetic);
    }

    let mut acc: Vec<Stmt> = Vec::new();
    while let Some(x) = queue.pop() {
        if let Some(focus) = focus_of(&x) {
            if ctl.strategy.is_split(focus, ctl.resolver) {
                let mut fragment = std::mem::take(&mut acc);
                fragment.reverse();
                let target = assign_target(&x);
                let known = known_with_queue(ctl, &queue);
                let (cont_expr, name) = make_continuation(fragment, target, &known, ctl, ctx, tracer)?;
                tracer.on_split_point(&name);
                let suspension = ctl.strategy.transform(focus, cont_expr);
                acc = vec![ast::return_stmt(Some(suspension))];
                continue;
            }
        }

        // A bare, non-split `return` always gets the ambient-continuation
        // rewrite (§4.5(2c)), independent of its `ignore` flag — this also
        // covers the synthetic trailing `Return(None)` the entry point
        // appends after the tagger has already run (§4.5, final paragraph),
        // which therefore carries an unset (default `false`) `ignore` bit.
        //
        // `break`/`continue` get the same treatment: both are leaves with no
        // children, so the tagger always marks them `ignore = true`, yet
        // they only ever reach this per-statement dispatch as independent
        // queue items when they sit in the body of a loop that is itself
        // being split (an all-ignored loop is never flattened into this
        // queue at all — see the plain `x.ignore()` passthrough below) — and
        // in that position they must resolve through `ctl.loop_tails`
        // exactly like any other control-flow exit from the loop body.
        match &x.kind {
            StmtKind::Return(_) => {
                acc.push(rewrite_return(x, ctl, ctx));
                continue;
            }
            StmtKind::Break => {
                let tails = ctl.loop_tails.clone().ok_or(CompileError::InvalidControlFlow("break"))?;
                acc.push(ast::return_stmt(Some(tails.brk)));
                continue;
            }
            StmtKind::Continue => {
                let tails = ctl.loop_tails.clone().ok_or(CompileError::InvalidControlFlow("continue"))?;
                acc.push(ast::return_stmt(Some(tails.cont)));
                continue;
            }
            _ => {}
        }

        if x.ignore() {
            acc.push(x);
            continue;
        }

        match x.kind {
            StmtKind::If(n) => {
                let mut fragment = std::mem::take(&mut acc);
                fragment.reverse();
                let outer_known = known_with_queue(ctl, &queue);
                // A name assigned in *both* arms of the if is bound on every
                // path reaching `after`, even though neither arm alone is
                // part of the genuine prefix for the other — so `after`
                // folds in both bodies, while `body`/`orelse` themselves
                // only ever see `outer_known`.
                let mut after_known = outer_known.with_uses_local_cleared();
                variables::analyze_stmts(&n.body, &mut after_known);
                variables::analyze_stmts(&n.orelse, &mut after_known);
                let after_known = after_known.with_uses_local_cleared();

                let after = continuation_after(fragment, &after_known, ctl, ctx, tracer)?;
                let inner_ctl = ctl.with_known(outer_known);
                let body = split_block(n.body, Some(after.clone()), &inner_ctl, ctx, tracer)?;
                let orelse = split_block(n.orelse, Some(after), &inner_ctl, ctx, tracer)?;
                acc = vec![Stmt::new(StmtKind::If(If { test: n.test, body, orelse }))];
            }
            StmtKind::While(n) => {
                let mut fragment = std::mem::take(&mut acc);
                fragment.reverse();
                let known = known_with_queue(ctl, &queue);
                acc = vec![split_while(n, fragment, &known, ctl, ctx, tracer)?];
            }
            StmtKind::Try(n) => {
                let mut fragment = std::mem::take(&mut acc);
                fragment.reverse();
                let known = known_with_queue(ctl, &queue);
                acc = vec![split_try(n, fragment, &known, ctl, ctx, tracer)?];
            }
            StmtKind::Break | StmtKind::Continue => unreachable!("handled above"),
            StmtKind::For(_) | StmtKind::With(_) => {
                unreachable!("lowered away by the simplifier before the splitter ever runs (§4.4)")
            }
            other => acc.push(Stmt { kind: other, meta: x.meta }),
        }
    }

    acc.reverse();
    Ok(acc)
}

/// Builds the "after" tail used for an `If`/`While`/`try`'s fallthrough: a
/// fresh continuation wrapping whatever statements follow, called eagerly
/// (§4.5 "splits synthesised by the algorithm itself" — never deferred as a
/// `Suspension`, since nothing about this boundary is a user split point).
fn continuation_after(fragment: Vec<Stmt>, known: &Variables, ctl: &Ctl<'_>, ctx: &mut SplitState, tracer: &mut dyn Tracer) -> Result<Expr, CompileError> {
    let (cont, _name) = make_continuation(fragment, None, known, ctl, ctx, tracer)?;
    Ok(ctl.strategy.default_tail(cont))
}

/// Folds the as-yet-unprocessed `queue` (genuinely everything that runs
/// *before* the statement currently being cut, since it is exactly what's
/// left after the right-to-left walk has popped everything after it) into
/// `ctl.known`, producing the seed [`live_in_for`] needs for a fragment cut
/// at this point. Recomputed fresh at every cut rather than threaded
/// incrementally, since the walk consumes `queue` back-to-front — the
/// opposite order a running prefix would need to grow in.
fn known_with_queue(ctl: &Ctl<'_>, queue: &[Stmt]) -> Variables {
    let mut scope = ctl.known.with_uses_local_cleared();
    variables::analyze_stmts(queue, &mut scope);
    scope.with_uses_local_cleared()
}

/// Lowers a `while`/`else` into a self-referential continuation (§4.5
/// "cyclic tails"): the loop re-enters itself by *name* through
/// `ctx.definitions`, not through a Rust-level recursive closure, which
/// would need an unbounded call stack to model an unbounded loop. Looked up
/// by name every iteration the same way `crate::trampoline::Loop` resolves
/// any other continuation.
fn split_while(n: While, after_fragment: Vec<Stmt>, known: &Variables, ctl: &Ctl<'_>, ctx: &mut SplitState, tracer: &mut dyn Tracer) -> Result<Stmt, CompileError> {
    let after = continuation_after(after_fragment, known, ctl, ctx, tracer)?;

    // Name/live-in are computed from the loop's own raw body and test
    // rather than its eventual (already-split) form: splitting only
    // restructures control flow, it never changes which names a fragment
    // reads, so this is exact, not an approximation, and lets the name be
    // computed before the self-referential body that names it exists. The
    // loop's body may run zero times, so its own assignments are never
    // folded into `known` here — only what's genuinely bound before the
    // loop is.
    let mut probe = n.body.clone();
    probe.push(ast::expr_stmt(n.test.clone()));
    let w_param = ctx.gensym.next("w");
    let live_in = live_in_for(&probe, known);
    let name = ctl.strategy.identify(&w_param, &probe, ctx);
    let wcont_expr = strategy::make_continuation_expr(&name, &live_in);
    let wret = ctl.strategy.default_tail(wcont_expr.clone());

    let ctl = ctl.with_known(known.clone());
    let body_ctl = ctl.with_loop(LoopTails { brk: after.clone(), cont: wret.clone() });
    let split_body = split_block(n.body, Some(wret), &body_ctl, ctx, tracer)?;
    // `while`/`else`: the `else` clause is lexically outside the loop body,
    // so a `break`/`continue` inside it (illegal in Python unless there is
    // an enclosing loop of its own) is split under `ctl`, not `body_ctl`.
    let exhausted = split_block(n.orelse, Some(after), &ctl, ctx, tracer)?;

    let mut params = live_in.clone();
    params.push(w_param);
    let while_fn_body = vec![Stmt::new(StmtKind::If(If { test: n.test, body: split_body, orelse: exhausted }))];
    register_def(name, params, &live_in, while_fn_body, ctl, ctx, tracer)?;

    Ok(ast::return_stmt(Some(ctl.strategy.default_tail(wcont_expr))))
}

/// Lowers a `try`/`except`/`finally` (§4.5 "try model"). Handler bodies are
/// split once, up front, under no active try model (an exception that
/// reaches a handler has already left the protected region — a `break`
/// inside a handler still refers to whatever loop lexically encloses the
/// whole `try`, hence `ctl` rather than the `try`'s own body context). The
/// `try`'s body (with its `else` clause folded onto the end — a documented
/// simplification, see `DESIGN.md`) is then split with the try model
/// active, so every continuation [`make_continuation`] cuts out of it comes
/// back already wrapped in a fresh copy of the (split) handlers and the
/// original `finally`.
fn split_try(n: TryStmt, after_fragment: Vec<Stmt>, known: &Variables, ctl: &Ctl<'_>, ctx: &mut SplitState, tracer: &mut dyn Tracer) -> Result<Stmt, CompileError> {
    if ctl.try_model.is_some() {
        return Err(CompileError::NestedTry);
    }

    let after = continuation_after(after_fragment, known, ctl, ctx, tracer)?;

    let handler_ctl = ctl.without_try().with_known(known.clone());
    let mut split_handlers = Vec::with_capacity(n.handlers.len());
    for h in n.handlers {
        let body = split_block(h.body, Some(after.clone()), &handler_ctl, ctx, tracer)?;
        split_handlers.push(ast::ExceptHandler { exc_type: h.exc_type, name: h.name, body });
    }

    let model = TryModel { handlers: split_handlers, finalbody: n.finalbody };
    let body_ctl = ctl.with_known(known.clone()).with_try(model.clone());
    let mut effective_body = n.body;
    effective_body.extend(n.orelse);
    let split_body = split_block(effective_body, Some(after), &body_ctl, ctx, tracer)?;

    Ok(wrap_try(split_body, &model))
}

fn wrap_try(body: Vec<Stmt>, model: &TryModel) -> Stmt {
    Stmt::new(StmtKind::Try(TryStmt { body, handlers: model.handlers.clone(), orelse: vec![], finalbody: model.finalbody.clone() }))
}

/// Builds a fresh continuation out of `fragment`, registers it, and returns
/// the lazy "make continuation" expression plus the name it was registered
/// under (§4.5 "Continuation construction"). `target` is the pending
/// assignment target the fragment's value should be bound to, if this cut
/// happened at an `Assign`; otherwise a fresh name is gensym'd, matching the
/// reference implementation's "name the parameter after the assignment
/// target, or make one up".
fn make_continuation(
    fragment: Vec<Stmt>,
    target: Option<Ident>,
    known: &Variables,
    ctl: &Ctl<'_>,
    ctx: &mut SplitState,
    tracer: &mut dyn Tracer,
) -> Result<(Expr, Ident), CompileError> {
    let param_name = target.unwrap_or_else(|| ctx.gensym.next("k"));
    let live_in = live_in_for(&fragment, known);
    let name = ctl.strategy.identify(&param_name, &fragment, ctx);

    let mut params = live_in.clone();
    params.push(param_name);
    register_def(name.clone(), params, &live_in, fragment, ctl, ctx, tracer)?;

    Ok((strategy::make_continuation_expr(&name, &live_in), name))
}

fn register_def(
    name: Ident,
    params: Vec<Ident>,
    live_in: &[Ident],
    body: Vec<Stmt>,
    ctl: &Ctl<'_>,
    ctx: &mut SplitState,
    tracer: &mut dyn Tracer,
) -> Result<(), CompileError> {
    if ctx.definitions.contains_key(&name) {
        return Err(CompileError::DuplicateContinuation(name));
    }
    let body = match &ctl.try_model {
        Some(model) => vec![wrap_try(body, model)],
        None => body,
    };
    tracer.on_continuation_emitted(&name, live_in);
    ctx.definitions.insert(name.clone(), FunctionDef { name, args: simplifier::positional_args(params), body });
    Ok(())
}

/// The live-in set for a continuation cut at `fragment` (§4.5 "live_in"):
/// every name `fragment` reads that is already bound by the time control
/// reaches it — from `known`, the caller's prefix-scoped [`Variables`] (see
/// [`known_with_queue`]) — and that `fragment` does not freshly (re)bind
/// itself. `known`'s `arg_defs`/`local_defs` partition is reused verbatim
/// (`with_uses_local_cleared`) so a name the fragment rebinds is
/// distinguished from one it merely reads: `new_defs` is exactly what
/// `fragment`'s own analysis adds to `local_defs` beyond what `known`
/// already had, and those are excluded, leaving `uses_local - new_defs` —
/// the reference's `uses_local(fragment) - local_defs(fragment)` formula,
/// evaluated against the fragment's *actual* enclosing scope rather than
/// the whole function.
fn live_in_for(fragment: &[Stmt], known: &Variables) -> Vec<Ident> {
    let mut scope = known.with_uses_local_cleared();
    let known_local_defs = scope.local_defs.clone();
    variables::analyze_stmts(fragment, &mut scope);
    let new_defs: HashSet<String> = scope.local_defs.difference(&known_local_defs).cloned().collect();
    let mut live: Vec<Ident> = scope.uses_local.difference(&new_defs).cloned().collect();
    live.sort();
    live
}

/// The statement's "focus" (§4.5): the one expression position whose
/// split-ness decides whether the whole statement is a split point. `Raise`
/// is included alongside the literal `Expr`/`Assign`/`Return` list: a split
/// buried in a `raise`'s value is just as real a split point, and omitting
/// it would be an arbitrary gap rather than a deliberate restriction.
fn focus_of(x: &Stmt) -> Option<&Expr> {
    match &x.kind {
        StmtKind::Expr(e) => Some(e),
        StmtKind::Assign(a) => Some(&a.value),
        StmtKind::Return(Some(e)) => Some(e),
        StmtKind::Raise(Some(e)) => Some(e),
        _ => None,
    }
}

fn assign_target(x: &Stmt) -> Option<Ident> {
    match &x.kind {
        StmtKind::Assign(a) => Some(a.target.clone()),
        _ => None,
    }
}

/// Rewrites a bare, non-split `return` so it honours the ambient return
/// continuation (§4.5(2c)): `return v` becomes `return
/// __CallContinuation(continuation, v)`, invoked eagerly since nothing
/// about returning defers anything. Left untouched if `no_transform` is
/// set — the splitter's own synthesised `while`-tail returns carry that
/// flag so they are not double-wrapped.
fn rewrite_return(x: Stmt, ctl: &Ctl<'_>, ctx: &SplitState) -> Stmt {
    let meta = x.meta;
    if meta.no_transform {
        return Stmt { kind: x.kind, meta };
    }
    match x.kind {
        StmtKind::Return(v) => {
            let value = v.unwrap_or_else(|| Expr::constant(Constant::None));
            ast::return_stmt(Some(ctl.strategy.return_continuation(value, &ctx.return_tail)))
        }
        other => Stmt { kind: other, meta },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Arguments, Compare, CmpOp, Operator};
    use crate::diagnostics::NoopTracer;
    use crate::strategy::{DefaultStrategy, StaticResolver};

    fn compile_ok(def: FunctionDef) -> CompiledFunction {
        let strategy = DefaultStrategy;
        let resolver = StaticResolver::new(["checkpoint"]);
        let mut tracer = NoopTracer;
        compile(def, &strategy, &resolver, &mut tracer).expect("compiles")
    }

    #[test]
    fn straight_line_function_with_no_split_is_a_single_continuation() {
        let def = FunctionDef {
            name: "f".into(),
            args: Arguments { args: vec!["x".into()], ..Default::default() },
            body: vec![ast::return_stmt(Some(Expr::name("x")))],
        };
        let compiled = compile_ok(def);
        assert_eq!(compiled.definitions.len(), 1);
        assert_eq!(compiled.entry, "f");
    }

    #[test]
    fn a_checkpoint_call_cuts_two_continuations() {
        let def = FunctionDef {
            name: "f".into(),
            args: Arguments { args: vec!["x".into()], ..Default::default() },
            body: vec![
                ast::assign("y", ast::call(Expr::name("checkpoint"), vec![Expr::name("x")], vec![])),
                ast::return_stmt(Some(Expr::name("y"))),
            ],
        };
        let compiled = compile_ok(def);
        assert_eq!(compiled.definitions.len(), 2);
        let entry = &compiled.definitions["f"];
        assert_eq!(entry.args.all_names().len(), 2); // x, continuation
    }

    #[test]
    fn the_continuation_after_a_split_in_an_if_branch_takes_the_live_variable() {
        let def = FunctionDef {
            name: "f".into(),
            args: Arguments { args: vec!["x".into()], ..Default::default() },
            body: vec![
                Stmt::new(StmtKind::If(If {
                    test: Expr::new(crate::ast::ExprKind::Compare(Compare {
                        left: Box::new(Expr::name("x")),
                        ops: vec![CmpOp::Gt],
                        comparators: vec![Expr::constant(Constant::Int(0))],
                    })),
                    body: vec![ast::assign("y", ast::call(Expr::name("checkpoint"), vec![Expr::name("x")], vec![]))],
                    orelse: vec![ast::assign("y", Expr::constant(Constant::Int(0)))],
                })),
                ast::return_stmt(Some(Expr::name("y"))),
            ],
        };
        let compiled = compile_ok(def);
        // one continuation for the checkpoint cut, one for "after the if",
        // plus the entry function itself.
        assert_eq!(compiled.definitions.len(), 3);
    }

    #[test]
    fn break_outside_a_loop_is_rejected() {
        let strategy = DefaultStrategy;
        let resolver = StaticResolver::new(["checkpoint"]);
        let mut tracer = NoopTracer;
        let def = FunctionDef { name: "f".into(), args: Arguments::default(), body: vec![Stmt::new(StmtKind::Break)] };
        let err = compile(def, &strategy, &resolver, &mut tracer).unwrap_err();
        assert_eq!(err, CompileError::InvalidControlFlow("break"));
    }

    #[test]
    fn a_while_loop_with_a_split_in_its_body_compiles() {
        let def = FunctionDef {
            name: "f".into(),
            args: Arguments { args: vec!["n".into()], ..Default::default() },
            body: vec![
                Stmt::new(StmtKind::While(While {
                    test: Expr::new(crate::ast::ExprKind::Compare(Compare {
                        left: Box::new(Expr::name("n")),
                        ops: vec![CmpOp::Gt],
                        comparators: vec![Expr::constant(Constant::Int(0))],
                    })),
                    body: vec![
                        ast::expr_stmt(ast::call(Expr::name("checkpoint"), vec![Expr::name("n")], vec![])),
                        ast::assign(
                            "n",
                            Expr::new(crate::ast::ExprKind::BinOp {
                                left: Box::new(Expr::name("n")),
                                op: Operator::Sub,
                                right: Box::new(Expr::constant(Constant::Int(1))),
                            }),
                        ),
                    ],
                    orelse: vec![],
                })),
                ast::return_stmt(Some(Expr::name("n"))),
            ],
        };
        let compiled = compile_ok(def);
        // entry, the while-loop continuation itself, the checkpoint's
        // continuation, and the after-loop continuation.
        assert!(compiled.definitions.len() >= 4);
    }
}

