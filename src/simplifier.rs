//! The simplifier (§4.4): lowers the tree into A-normal form restricted to
//! split-relevant subtrees, so every split point ends up as the top-level
//! value of an `Assign` or `Expr` statement.
//!
//! Grounded on the reference implementation's `Simplify` pass. One
//! simplification versus the source: our [`crate::ast::Expr::child_exprs`]
//! already enumerates a `Compare`'s `left` and `comparators` uniformly, so
//! the general hoisting rule subsumes the reference's separate "hoist only
//! `comparators`" special case — there is nothing left to special-case.

use crate::ast::{self, Arguments, Assign, Constant, Expr, ExprKind, Gensym, If, Stmt, StmtKind, TryStmt, While};

/// Runs the simplifier over a function body, consuming it and returning the
/// lowered body. `gensym` is shared with the caller so hoisted-temporary
/// and lowered-`for`/`with` names stay unique across a whole compilation.
pub fn simplify(body: Vec<Stmt>, gensym: &mut Gensym) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(body.len());
    for stmt in body {
        simplify_stmt(stmt, gensym, &mut out);
    }
    out
}

fn simplify_stmt(stmt: Stmt, gensym: &mut Gensym, out: &mut Vec<Stmt>) {
    if stmt.ignore() {
        out.push(stmt);
        return;
    }
    match stmt.kind {
        StmtKind::Assign(a) => {
            let mut hoisted = Vec::new();
            let value = hoist_expr(a.value, gensym, &mut hoisted);
            out.extend(hoisted);
            out.push(Stmt::new(StmtKind::Assign(Assign { target: a.target, value })));
        }
        StmtKind::Expr(e) => {
            let mut hoisted = Vec::new();
            let value = hoist_expr(e, gensym, &mut hoisted);
            out.extend(hoisted);
            out.push(ast::expr_stmt(value));
        }
        StmtKind::Return(Some(e)) => {
            let mut hoisted = Vec::new();
            let value = hoist_expr(e, gensym, &mut hoisted);
            out.extend(hoisted);
            out.push(ast::return_stmt(Some(value)));
        }
        StmtKind::Return(None) => out.push(ast::return_stmt(None)),
        StmtKind::Raise(Some(e)) => {
            let mut hoisted = Vec::new();
            let value = hoist_expr(e, gensym, &mut hoisted);
            out.extend(hoisted);
            out.push(Stmt::new(StmtKind::Raise(Some(value))));
        }
        StmtKind::Raise(None) => out.push(Stmt::new(StmtKind::Raise(None))),
        StmtKind::If(n) => {
            // Unlike `Assign`/`Expr`/`Return`, the splitter's focus
            // determination never looks inside an `If`'s test (§4.5: focus
            // is "the value of an Expr, Assign, or Return, else x itself").
            // A split anywhere in the test must therefore be fully
            // extracted into its own preceding assignment — the same
            // "force" hoist used for a split-bearing sibling subexpression
            // — or it would never be recognised as a split statement.
            let mut hoisted = Vec::new();
            let test = hoist_child(n.test, gensym, &mut hoisted);
            out.extend(hoisted);
            out.push(Stmt::new(StmtKind::If(If {
                test,
                body: simplify(n.body, gensym),
                orelse: simplify(n.orelse, gensym),
            })));
        }
        StmtKind::While(n) => {
            // Rule: "recurse into their body lists ... without hoisting
            // around them" — the test is left untouched (re-evaluated each
            // iteration; hoisting it once before the loop would be wrong).
            out.push(Stmt::new(StmtKind::While(While {
                test: n.test,
                body: simplify(n.body, gensym),
                orelse: simplify(n.orelse, gensym),
            })));
        }
        StmtKind::For(n) => {
            let lowered = lower_for(n, gensym);
            for s in lowered {
                simplify_stmt(s, gensym, out);
            }
        }
        StmtKind::With(n) => {
            let lowered = lower_with(n, gensym);
            for s in lowered {
                simplify_stmt(s, gensym, out);
            }
        }
        StmtKind::Try(n) => {
            out.push(Stmt::new(StmtKind::Try(TryStmt {
                body: simplify(n.body, gensym),
                handlers: n
                    .handlers
                    .into_iter()
                    .map(|h| ast::ExceptHandler { exc_type: h.exc_type, name: h.name, body: simplify(h.body, gensym) })
                    .collect(),
                orelse: simplify(n.orelse, gensym),
                finalbody: simplify(n.finalbody, gensym),
            })));
        }
        StmtKind::FunctionDef(_) | StmtKind::Break | StmtKind::Continue | StmtKind::Global(_) | StmtKind::Nonlocal(_) => {
            out.push(Stmt { kind: stmt.kind, meta: stmt.meta });
        }
    }
}

/// Hoists every split-bearing child of `e` into its own fresh assignment,
/// recursing bottom-up so nested splits surface in left-to-right evaluation
/// order (§4.4). Leaves `e` itself as a shallow wrapper whose remaining
/// split-bearing children are `Name` loads of the hoisted temporaries, or
/// returns `e` untouched if it (and everything under it) is `ignore`d.
fn hoist_expr(e: Expr, gensym: &mut Gensym, out: &mut Vec<Stmt>) -> Expr {
    if e.ignore() {
        return e;
    }
    rebuild_with_hoisted_children(e, gensym, out)
}

fn rebuild_with_hoisted_children(e: Expr, gensym: &mut Gensym, out: &mut Vec<Stmt>) -> Expr {
    let meta = e.meta;
    let kind = match e.kind {
        ExprKind::Name(_) | ExprKind::Constant(_) => return Expr { kind: e.kind, meta },
        ExprKind::Call(mut c) => {
            *c.func = hoist_child(*c.func, gensym, out);
            c.args = c.args.into_iter().map(|a| hoist_child(a, gensym, out)).collect();
            c.keywords = c.keywords.into_iter().map(|(k, v)| (k, hoist_child(v, gensym, out))).collect();
            ExprKind::Call(c)
        }
        ExprKind::Compare(mut c) => {
            *c.left = hoist_child(*c.left, gensym, out);
            c.comparators = c.comparators.into_iter().map(|x| hoist_child(x, gensym, out)).collect();
            ExprKind::Compare(c)
        }
        ExprKind::BoolOp { op, values } => {
            ExprKind::BoolOp { op, values: values.into_iter().map(|v| hoist_child(v, gensym, out)).collect() }
        }
        ExprKind::BinOp { left, op, right } => ExprKind::BinOp {
            left: Box::new(hoist_child(*left, gensym, out)),
            op,
            right: Box::new(hoist_child(*right, gensym, out)),
        },
        ExprKind::UnaryOp { op, operand } => {
            ExprKind::UnaryOp { op, operand: Box::new(hoist_child(*operand, gensym, out)) }
        }
        ExprKind::Tuple(items) => ExprKind::Tuple(items.into_iter().map(|x| hoist_child(x, gensym, out)).collect()),
        ExprKind::List(items) => ExprKind::List(items.into_iter().map(|x| hoist_child(x, gensym, out)).collect()),
        ExprKind::Attribute { value, attr } => {
            ExprKind::Attribute { value: Box::new(hoist_child(*value, gensym, out)), attr }
        }
        ExprKind::Subscript { value, index } => ExprKind::Subscript {
            value: Box::new(hoist_child(*value, gensym, out)),
            index: Box::new(hoist_child(*index, gensym, out)),
        },
        ExprKind::IfExp { test, body, orelse } => ExprKind::IfExp {
            test: Box::new(hoist_child(*test, gensym, out)),
            body: Box::new(hoist_child(*body, gensym, out)),
            orelse: Box::new(hoist_child(*orelse, gensym, out)),
        },
        ExprKind::Yield(v) => ExprKind::Yield(v.map(|b| Box::new(hoist_child(*b, gensym, out)))),
        ExprKind::NamedExpr { target, value } => {
            ExprKind::NamedExpr { target, value: Box::new(hoist_child(*value, gensym, out)) }
        }
    };
    Expr { kind, meta }
}

/// A direct child of a split-bearing expression: if it itself contains a
/// split, recursively simplify it, then hoist the *whole child* into its
/// own fresh assignment and replace it with a `Name` load; otherwise leave
/// it untouched (it is `ignore`d — no split anywhere under it).
fn hoist_child(child: Expr, gensym: &mut Gensym, out: &mut Vec<Stmt>) -> Expr {
    if child.ignore() {
        return child;
    }
    let simplified = rebuild_with_hoisted_children(child, gensym, out);
    let name = gensym.next("hoist");
    out.push(ast::assign(name.clone(), simplified));
    Expr::name(name)
}

/// Lowers `for target in iter: BODY else: ORELSE` (§4.4) into the
/// equivalent `iter`/`next(..., StopIteration)`/`while True` pattern,
/// inlining `ORELSE` at the point the sentinel is observed (iterator
/// exhaustion) rather than relying on a `while`'s own `orelse`, so that a
/// user `break` inside `BODY` still skips it exactly like Python's
/// `for`/`else`.
fn lower_for(n: ast::For, gensym: &mut Gensym) -> Vec<Stmt> {
    let it_name = gensym.next("iter");
    let mut pre = Vec::new();
    // Same reasoning as the `If` test above: the splitter's focus
    // determination never looks inside a `For`'s `iter`, so a split there
    // must be force-hoisted into its own assignment before it is wrapped in
    // the non-split `iter(...)` call.
    let iter_expr = hoist_child(n.iter, gensym, &mut pre);
    pre.push(ast::assign(it_name.clone(), ast::call(Expr::name("iter"), vec![iter_expr], vec![])));

    let mut exhausted_body = n.orelse;
    exhausted_body.push(Stmt::new(StmtKind::Break));

    let while_body = vec![
        ast::assign(
            n.target.clone(),
            ast::call(Expr::name("next"), vec![Expr::name(&it_name), Expr::name("StopIteration")], vec![]),
        ),
        Stmt::new(StmtKind::If(If {
            test: Expr::new(ExprKind::Compare(ast::Compare {
                left: Box::new(Expr::name(&n.target)),
                ops: vec![ast::CmpOp::Is],
                comparators: vec![Expr::name("StopIteration")],
            })),
            body: exhausted_body,
            orelse: vec![],
        })),
    ]
    .into_iter()
    .chain(n.body)
    .collect();

    pre.push(Stmt::new(StmtKind::While(While {
        test: Expr::constant(Constant::Bool(true)),
        body: while_body,
        orelse: vec![],
    })));
    pre
}

/// Lowers `with CTX as VAR: BODY` (§4.4) into an explicit `__enter__` call
/// plus a `try`/`except BaseException`/`else` that drives `__exit__` on
/// both the failure and success paths, re-raising unless `__exit__`
/// signals suppression.
fn lower_with(n: ast::With, gensym: &mut Gensym) -> Vec<Stmt> {
    let var_name = n.optional_var.clone().unwrap_or_else(|| gensym.next("ctx"));
    let exc_name = gensym.next("exc");
    let suppress_name = gensym.next("suppress");

    let mut pre = Vec::new();
    let ctx_expr = hoist_expr(n.context_expr, gensym, &mut pre);
    pre.push(ast::assign(var_name.clone(), ast::call(Expr::name("__enter__"), vec![ctx_expr], vec![])));

    let handler_body = vec![
        ast::assign(
            suppress_name.clone(),
            ast::call(
                Expr::name("__exit__"),
                vec![
                    Expr::name(&var_name),
                    ast::call(Expr::name("type"), vec![Expr::name(&exc_name)], vec![]),
                    Expr::name(&exc_name),
                    Expr::constant(Constant::None),
                ],
                vec![],
            ),
        ),
        Stmt::new(StmtKind::If(If {
            test: Expr::new(ExprKind::UnaryOp { op: ast::UnaryOp::Not, operand: Box::new(Expr::name(&suppress_name)) }),
            body: vec![Stmt::new(StmtKind::Raise(None))],
            orelse: vec![],
        })),
    ];

    let orelse = vec![ast::expr_stmt(ast::call(
        Expr::name("__exit__"),
        vec![Expr::name(&var_name), Expr::constant(Constant::None), Expr::constant(Constant::None), Expr::constant(Constant::None)],
        vec![],
    ))];

    pre.push(Stmt::new(StmtKind::Try(TryStmt {
        body: n.body,
        handlers: vec![ast::ExceptHandler {
            exc_type: Some(Expr::name("BaseException")),
            name: Some(exc_name),
            body: handler_body,
        }],
        orelse,
        finalbody: vec![],
    })));
    pre
}

/// An `Arguments` literal with positional-only parameters, used by the
/// splitter when it needs to build a continuation signature; kept here
/// purely so callers don't need to import both `ast::Arguments` and this
/// module just to build one.
pub fn positional_args(names: Vec<String>) -> Arguments {
    Arguments { args: names, kwonly: vec![], vararg: None, kwarg: None }
}
