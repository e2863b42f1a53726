//! Per-scope variable analysis (§4.2), grounded on the reference
//! implementation's `vars.py` and on the teacher crate's own scope
//! bookkeeping in `namespace.rs` (which partitions a function's bindings
//! into parameters / cells / locals the same way `Variables` partitions
//! names into the six sets below).

use std::collections::HashSet;

use crate::ast::{Arguments, Expr, ExprKind, FunctionDef, Stmt, StmtKind};

/// Scope descriptor: six name sets plus the transitions `vars.py` defines on
/// them. See SPEC_FULL §3 for the invariants these transitions maintain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables {
    pub arg_defs: HashSet<String>,
    pub local_defs: HashSet<String>,
    pub uses_free: HashSet<String>,
    pub uses_local: HashSet<String>,
    pub nonlocals: HashSet<String>,
    pub globals: HashSet<String>,
}

impl Variables {
    pub fn defs(&self) -> HashSet<String> {
        self.arg_defs.union(&self.local_defs).cloned().collect()
    }

    pub fn use_name(&mut self, name: &str) {
        if self.defs().contains(name) {
            self.uses_local.insert(name.to_owned());
        } else {
            self.uses_free.insert(name.to_owned());
        }
    }

    pub fn define(&mut self, name: &str) {
        if self.nonlocals.contains(name) || self.globals.contains(name) || self.arg_defs.contains(name) {
            return;
        }
        self.local_defs.insert(name.to_owned());
        if self.uses_free.remove(name) {
            self.uses_local.insert(name.to_owned());
        }
    }

    pub fn define_argument(&mut self, name: &str) {
        if self.nonlocals.contains(name) || self.globals.contains(name) {
            return;
        }
        self.arg_defs.insert(name.to_owned());
        if self.uses_free.remove(name) {
            self.uses_local.insert(name.to_owned());
        }
    }

    pub fn declare_nonlocal(&mut self, name: &str) {
        self.local_defs.remove(name);
        self.nonlocals.insert(name.to_owned());
        if self.uses_local.remove(name) {
            self.uses_free.insert(name.to_owned());
        }
    }

    pub fn declare_global(&mut self, name: &str) {
        self.local_defs.remove(name);
        self.globals.insert(name.to_owned());
        if self.uses_local.remove(name) {
            self.uses_free.insert(name.to_owned());
        }
    }

    /// `dataclasses.replace(self, uses_local=set())`-style partial update,
    /// used by the splitter to reuse the argument/nonlocal/global partition
    /// of an enclosing scope while resetting the local-use bookkeeping for a
    /// sub-fragment (§4.5 `create_continuation`).
    pub fn with_uses_local_cleared(&self) -> Variables {
        Variables { uses_local: HashSet::new(), ..self.clone() }
    }
}

/// Runs the analysis described in §4.2 over a function's parameter list and
/// body, starting from a caller-supplied initial scope (used by the
/// splitter to seed `arg_defs` without re-declaring locals, mirroring
/// `VariableAnalysis().inner(node, Variables())`).
pub fn analyze_function(def: &FunctionDef, mut scope: Variables) -> Variables {
    for name in def.args.all_names() {
        scope.define_argument(name);
    }
    analyze_stmts(&def.body, &mut scope);
    scope
}

pub fn analyze_args_defaults(args: &Arguments, outer: &mut Variables) {
    for kw in &args.kwonly {
        if let Some(default) = &kw.default {
            analyze_expr(default, outer);
        }
    }
}

pub fn analyze_stmts(body: &[Stmt], scope: &mut Variables) {
    for stmt in body {
        analyze_stmt(stmt, scope);
    }
}

fn analyze_stmt(stmt: &Stmt, scope: &mut Variables) {
    match &stmt.kind {
        StmtKind::FunctionDef(inner) => {
            scope.define(&inner.name);
            let mut inner_scope = Variables::default();
            for name in inner.args.all_names() {
                inner_scope.define_argument(name);
            }
            analyze_stmts(&inner.body, &mut inner_scope);
            analyze_args_defaults(&inner.args, scope);
            for var in inner_scope.uses_free.clone() {
                if inner_scope.globals.contains(&var) {
                    scope.uses_free.insert(var);
                } else {
                    scope.use_name(&var);
                }
            }
        }
        StmtKind::If(n) => {
            analyze_expr(&n.test, scope);
            analyze_stmts(&n.body, scope);
            analyze_stmts(&n.orelse, scope);
        }
        StmtKind::While(n) => {
            analyze_expr(&n.test, scope);
            analyze_stmts(&n.body, scope);
            analyze_stmts(&n.orelse, scope);
        }
        StmtKind::For(n) => {
            analyze_expr(&n.iter, scope);
            scope.define(&n.target);
            scope.use_name(&n.target);
            analyze_stmts(&n.body, scope);
            analyze_stmts(&n.orelse, scope);
        }
        StmtKind::Try(n) => {
            analyze_stmts(&n.body, scope);
            for h in &n.handlers {
                if let Some(t) = &h.exc_type {
                    analyze_expr(t, scope);
                }
                if let Some(name) = &h.name {
                    scope.define(name);
                    scope.use_name(name);
                }
                analyze_stmts(&h.body, scope);
            }
            analyze_stmts(&n.orelse, scope);
            analyze_stmts(&n.finalbody, scope);
        }
        StmtKind::With(n) => {
            analyze_expr(&n.context_expr, scope);
            if let Some(v) = &n.optional_var {
                scope.define(v);
                scope.use_name(v);
            }
            analyze_stmts(&n.body, scope);
        }
        StmtKind::Return(v) => {
            if let Some(e) = v {
                analyze_expr(e, scope);
            }
        }
        StmtKind::Break | StmtKind::Continue => {}
        StmtKind::Assign(a) => {
            analyze_expr(&a.value, scope);
            scope.define(&a.target);
            scope.use_name(&a.target);
        }
        StmtKind::Expr(e) => analyze_expr(e, scope),
        StmtKind::Raise(v) => {
            if let Some(e) = v {
                analyze_expr(e, scope);
            }
        }
        StmtKind::Global(names) => {
            for n in names {
                scope.declare_global(n);
            }
        }
        StmtKind::Nonlocal(names) => {
            for n in names {
                scope.declare_nonlocal(n);
            }
        }
    }
}

fn analyze_expr(expr: &Expr, scope: &mut Variables) {
    match &expr.kind {
        ExprKind::Name(id) => scope.use_name(id),
        ExprKind::NamedExpr { target, value } => {
            analyze_expr(value, scope);
            scope.define(target);
            scope.use_name(target);
        }
        _ => {
            for child in expr.child_exprs() {
                analyze_expr(child, scope);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{self, Arguments, Constant, Expr, FunctionDef};

    #[test]
    fn argument_is_local_not_free() {
        let def = FunctionDef {
            name: "f".into(),
            args: Arguments { args: vec!["x".into()], ..Default::default() },
            body: vec![ast::return_stmt(Some(Expr::name("x")))],
        };
        let vars = analyze_function(&def, Variables::default());
        assert!(vars.arg_defs.contains("x"));
        assert!(vars.uses_local.contains("x"));
        assert!(!vars.uses_free.contains("x"));
    }

    #[test]
    fn loop_variable_is_live_in_own_body() {
        let def = FunctionDef {
            name: "f".into(),
            args: Arguments::default(),
            body: vec![Stmt::new(crate::ast::StmtKind::For(ast::For {
                target: "i".into(),
                iter: Expr::name("xs"),
                body: vec![ast::expr_stmt(Expr::name("i"))],
                orelse: vec![],
            }))],
        };
        let vars = analyze_function(&def, Variables::default());
        assert!(vars.uses_local.contains("i"));
        assert!(vars.uses_free.contains("xs"));
    }

    #[test]
    fn nonlocal_evicts_local_def() {
        let mut scope = Variables::default();
        scope.define("x");
        scope.use_name("x");
        scope.declare_nonlocal("x");
        assert!(!scope.local_defs.contains("x"));
        assert!(scope.nonlocals.contains("x"));
        assert!(scope.uses_free.contains("x"));
        assert!(!scope.uses_local.contains("x"));
    }

    #[test]
    fn unused_constant_does_not_pollute_scope() {
        let mut scope = Variables::default();
        analyze_expr(&Expr::constant(Constant::Int(1)), &mut scope);
        assert!(scope.uses_free.is_empty());
        assert!(scope.uses_local.is_empty());
    }
}
