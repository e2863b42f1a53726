//! `TagIgnores` (§4.3): marks every node's `ignore` attribute so later
//! passes can skip subtrees that contain no split point.
//!
//! A node is *not* ignored iff it contains, or itself is, a split-marker
//! node according to the [`crate::strategy::Strategy`] in use. The walk is
//! a plain bottom-up `&mut` recursion (see [`crate::visitor`]'s module doc
//! for why this pass is written directly against the AST rather than
//! through the generic reducer helpers). It is idempotent and is re-run
//! after the simplifier emits new nodes (§4.4 post-condition).

use crate::ast::{Expr, ExprKind, Stmt, StmtKind};
use crate::strategy::{NameResolver, Strategy};

/// Tags every statement in `body` (and everything reachable from it) with
/// its `ignore` attribute. Returns whether `body` as a whole contains a
/// split point, so a caller embedding `body` inside a larger statement can
/// propagate the result without re-walking.
pub fn tag_stmts(body: &mut [Stmt], strategy: &dyn Strategy, resolver: &dyn NameResolver) -> bool {
    let mut any = false;
    for stmt in body {
        any |= tag_stmt(stmt, strategy, resolver);
    }
    any
}

fn tag_stmt(stmt: &mut Stmt, strategy: &dyn Strategy, resolver: &dyn NameResolver) -> bool {
    // A nested `def` is opaque: splitting never crosses into an inner
    // function's own scope (out of scope per §1 Non-goals — this engine
    // compiles one entry `FunctionDef` at a time).
    if matches!(stmt.kind, StmtKind::FunctionDef(_)) {
        stmt.meta.ignore = true;
        return false;
    }

    let mut contains_split = false;
    for expr in stmt.direct_exprs_mut() {
        contains_split |= tag_expr(expr, strategy, resolver);
    }
    match &mut stmt.kind {
        StmtKind::If(n) => {
            contains_split |= tag_stmts(&mut n.body, strategy, resolver);
            contains_split |= tag_stmts(&mut n.orelse, strategy, resolver);
        }
        StmtKind::While(n) => {
            contains_split |= tag_stmts(&mut n.body, strategy, resolver);
            contains_split |= tag_stmts(&mut n.orelse, strategy, resolver);
        }
        StmtKind::For(n) => {
            contains_split |= tag_stmts(&mut n.body, strategy, resolver);
            contains_split |= tag_stmts(&mut n.orelse, strategy, resolver);
        }
        StmtKind::With(n) => {
            contains_split |= tag_stmts(&mut n.body, strategy, resolver);
        }
        StmtKind::Try(n) => {
            contains_split |= tag_stmts(&mut n.body, strategy, resolver);
            for h in &mut n.handlers {
                contains_split |= tag_stmts(&mut h.body, strategy, resolver);
            }
            contains_split |= tag_stmts(&mut n.orelse, strategy, resolver);
            contains_split |= tag_stmts(&mut n.finalbody, strategy, resolver);
        }
        _ => {}
    }

    // `Expr(value)` forwards to its value (§4.3): the statement itself is a
    // split exactly when its value is.
    let is_split_here = match &stmt.kind {
        StmtKind::Expr(e) => strategy.is_split(e, resolver),
        StmtKind::Assign(a) => strategy.is_split(&a.value, resolver),
        StmtKind::Return(Some(e)) => strategy.is_split(e, resolver),
        _ => false,
    };
    contains_split |= is_split_here;

    stmt.meta.ignore = !contains_split;
    contains_split
}

fn tag_expr(expr: &mut Expr, strategy: &dyn Strategy, resolver: &dyn NameResolver) -> bool {
    let mut contains_split = strategy.is_split(expr, resolver) || matches!(expr.kind, ExprKind::Yield(_));
    for child in expr.child_exprs_mut() {
        contains_split |= tag_expr(child, strategy, resolver);
    }
    expr.meta.ignore = !contains_split;
    contains_split
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{self, Constant};
    use crate::strategy::{DefaultStrategy, StaticResolver};

    #[test]
    fn plain_assignment_is_ignored() {
        let strategy = DefaultStrategy;
        let resolver = StaticResolver::new(["checkpoint"]);
        let mut body = vec![ast::assign("a", Expr::constant(Constant::Int(1)))];
        assert!(!tag_stmts(&mut body, &strategy, &resolver));
        assert!(body[0].ignore());
    }

    #[test]
    fn call_to_marker_is_not_ignored() {
        let strategy = DefaultStrategy;
        let resolver = StaticResolver::new(["checkpoint"]);
        let mut body = vec![ast::expr_stmt(ast::call(Expr::name("checkpoint"), vec![], vec![]))];
        assert!(tag_stmts(&mut body, &strategy, &resolver));
        assert!(!body[0].ignore());
    }

    #[test]
    fn split_buried_in_if_test_marks_the_if_not_ignored() {
        let strategy = DefaultStrategy;
        let resolver = StaticResolver::new(["checkpoint"]);
        let mut body = vec![Stmt::new(StmtKind::If(ast::If {
            test: ast::call(Expr::name("checkpoint"), vec![], vec![]),
            body: vec![],
            orelse: vec![],
        }))];
        assert!(tag_stmts(&mut body, &strategy, &resolver));
        assert!(!body[0].ignore());
    }

    #[test]
    fn nested_function_def_is_opaque() {
        let strategy = DefaultStrategy;
        let resolver = StaticResolver::new(["checkpoint"]);
        let inner = ast::FunctionDef {
            name: "inner".into(),
            args: ast::Arguments::default(),
            body: vec![ast::expr_stmt(ast::call(Expr::name("checkpoint"), vec![], vec![]))],
        };
        let mut body = vec![Stmt::new(StmtKind::FunctionDef(inner))];
        assert!(!tag_stmts(&mut body, &strategy, &resolver));
        assert!(body[0].ignore());
    }
}
