//! Generic recursive AST walk with pluggable reducers (§4.1).
//!
//! The reference implementation dispatches on `ast.AST` via `ovld`'s
//! multiple-dispatch and combines child results through a `reduce` override
//! point (`NodeDisjunction`, `NodeConjunction`, `NodeSummation`,
//! `NodeUnion`). Rust has no runtime multiple dispatch, so the walk is a
//! plain recursion over [`crate::ast::Stmt::child_stmt_lists`] /
//! [`crate::ast::Stmt::direct_exprs`] / [`crate::ast::Expr::child_exprs`],
//! and the four specialisations are closures plugged into that recursion
//! rather than subclasses overriding `reduce`.
//!
//! The tagger (§4.3) mutates a node's `ignore` flag as it unwinds the
//! recursion, which is a different shape (a fold that also writes back into
//! the tree) and is implemented directly in [`crate::tagger`] rather than
//! through this module.

use std::collections::HashSet;

use crate::ast::{Expr, Stmt};

fn fold_stmt<T: Clone>(
    s: &Stmt,
    leaf: &T,
    combine: &dyn Fn(&[T]) -> T,
    probe_stmt: &dyn Fn(&Stmt) -> Option<T>,
    probe_expr: &dyn Fn(&Expr) -> Option<T>,
) -> T {
    let mut parts = Vec::new();
    for e in s.direct_exprs() {
        parts.push(fold_expr(e, leaf, combine, probe_expr));
    }
    for list in s.child_stmt_lists() {
        for st in list {
            parts.push(fold_stmt(st, leaf, combine, probe_stmt, probe_expr));
        }
    }
    parts.push(probe_stmt(s).unwrap_or_else(|| leaf.clone()));
    combine(&parts)
}

fn fold_expr<T: Clone>(
    e: &Expr,
    leaf: &T,
    combine: &dyn Fn(&[T]) -> T,
    probe_expr: &dyn Fn(&Expr) -> Option<T>,
) -> T {
    let mut parts: Vec<T> = e.child_exprs().into_iter().map(|c| fold_expr(c, leaf, combine, probe_expr)).collect();
    parts.push(probe_expr(e).unwrap_or_else(|| leaf.clone()));
    combine(&parts)
}

/// Disjunction: does this subtree contain a node matching either predicate?
pub fn contains_any(
    body: &[Stmt],
    stmt_pred: impl Fn(&Stmt) -> bool,
    expr_pred: impl Fn(&Expr) -> bool,
) -> bool {
    let combine = |parts: &[bool]| parts.iter().any(|x| *x);
    body.iter().any(|s| {
        fold_stmt(s, &false, &combine, &|s| Some(stmt_pred(s)), &|e| Some(expr_pred(e)))
    })
}

/// Conjunction: does every node in this subtree satisfy both predicates?
pub fn all_match(
    body: &[Stmt],
    stmt_pred: impl Fn(&Stmt) -> bool,
    expr_pred: impl Fn(&Expr) -> bool,
) -> bool {
    let combine = |parts: &[bool]| parts.iter().all(|x| *x);
    body.iter().all(|s| {
        fold_stmt(s, &true, &combine, &|s| Some(stmt_pred(s)), &|e| Some(expr_pred(e)))
    })
}

/// Summation: count nodes matching either predicate.
pub fn count_matches(
    body: &[Stmt],
    stmt_pred: impl Fn(&Stmt) -> bool,
    expr_pred: impl Fn(&Expr) -> bool,
) -> usize {
    let combine = |parts: &[usize]| parts.iter().sum();
    body.iter()
        .map(|s| {
            fold_stmt(
                s,
                &0usize,
                &combine,
                &|s| Some(if stmt_pred(s) { 1 } else { 0 }),
                &|e| Some(if expr_pred(e) { 1 } else { 0 }),
            )
        })
        .sum()
}

/// Union: collect every name produced by `extract` across the subtree.
pub fn collect_names(body: &[Stmt], extract_stmt: impl Fn(&Stmt) -> HashSet<String>, extract_expr: impl Fn(&Expr) -> HashSet<String>) -> HashSet<String> {
    fn merge(parts: &[HashSet<String>]) -> HashSet<String> {
        let mut out = HashSet::new();
        for p in parts {
            out.extend(p.iter().cloned());
        }
        out
    }
    let leaf = HashSet::new();
    let mut out = HashSet::new();
    for s in body {
        let r = fold_stmt(s, &leaf, &merge, &|s| Some(extract_stmt(s)), &|e| Some(extract_expr(e)));
        out.extend(r);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{self, Constant, ExprKind, StmtKind};

    fn sample() -> Vec<Stmt> {
        vec![
            ast::assign("a", Expr::constant(Constant::Int(1))),
            Stmt::new(StmtKind::If(ast::If {
                test: Expr::name("a"),
                body: vec![ast::expr_stmt(Expr::new(ExprKind::Yield(None)))],
                orelse: vec![],
            })),
        ]
    }

    fn is_yield(e: &Expr) -> bool {
        matches!(e.kind, ExprKind::Yield(_))
    }

    #[test]
    fn disjunction_finds_yield() {
        assert!(contains_any(&sample(), |_| false, is_yield));
    }

    #[test]
    fn conjunction_is_false_when_not_all_match() {
        assert!(!all_match(&sample(), |_| false, is_yield));
    }

    #[test]
    fn summation_counts_one_yield() {
        assert_eq!(count_matches(&sample(), |_| false, is_yield), 1);
    }

    #[test]
    fn union_collects_names() {
        let names = collect_names(
            &sample(),
            |s| match &s.kind {
                StmtKind::Assign(a) => [a.target.clone()].into_iter().collect(),
                _ => Default::default(),
            },
            |e| match &e.kind {
                ExprKind::Name(n) => [n.clone()].into_iter().collect(),
                _ => Default::default(),
            },
        );
        assert!(names.contains("a"));
    }
}
