//! Front end: lowers real Python source into the engine's own AST (§3).
//!
//! Grounded on the teacher crate's `parse.rs`, which lowers a borrowed
//! `ruff_python_ast` concrete syntax tree into a private `RawFunctionDef`/
//! `Node<T>` IR before any compiler phase touches it — the same two-step
//! shape this module follows, just against the much smaller dialect this
//! engine's splitter actually needs (§1 Non-goals): no classes, no
//! comprehensions, no `async`, no chained/starred calls, no augmented or
//! multi-target assignment.

use ruff_python_ast::{self as rpy, CmpOp as RpyCmpOp, Number, Operator as RpyOperator, Stmt as RpyStmt, UnaryOp as RpyUnaryOp};
use ruff_python_parser::parse_module;

use crate::ast::{
    self, Arguments, Assign, BoolOp, Call, CmpOp, Compare, Constant, ExceptHandler, Expr, ExprKind, For, FunctionDef,
    If, KwOnlyArg, Operator, Stmt, StmtKind, TryStmt, UnaryOp, While, With,
};
use crate::diagnostics::LowerError;

/// Parses `source` and lowers its single top-level `def` (the only shape
/// this engine compiles — §1 "one entry `FunctionDef` at a time") into the
/// engine's AST.
///
/// # Errors
/// Returns [`LowerError::SyntaxError`] if `source` does not parse as Python,
/// or any other [`LowerError`] variant if the function uses a construct
/// outside the supported dialect.
pub fn parse_function(source: &str) -> Result<FunctionDef, LowerError> {
    let parsed = parse_module(source).map_err(|e| LowerError::SyntaxError(e.to_string()))?;
    let module = parsed.into_syntax();
    let mut top_level_def = None;
    for stmt in module.body {
        if let RpyStmt::FunctionDef(f) = stmt {
            top_level_def = Some(f);
            break;
        }
    }
    let def = top_level_def.ok_or(LowerError::UnsupportedStatement("expected a single top-level `def`"))?;
    lower_function_def(def)
}

fn lower_function_def(def: rpy::StmtFunctionDef) -> Result<FunctionDef, LowerError> {
    if def.is_async {
        return Err(LowerError::UnsupportedStatement("async def"));
    }
    let params = &def.parameters;
    let mut args = Vec::new();
    for p in params.posonlyargs.iter().chain(params.args.iter()) {
        args.push(p.parameter.name.id.to_string());
    }
    let mut kwonly = Vec::new();
    for p in &params.kwonlyargs {
        let default = p.default.as_ref().map(|d| lower_expr(d)).transpose()?;
        kwonly.push(KwOnlyArg { name: p.parameter.name.id.to_string(), default });
    }
    let vararg = params.vararg.as_ref().map(|p| p.name.id.to_string());
    let kwarg = params.kwarg.as_ref().map(|p| p.name.id.to_string());

    Ok(FunctionDef {
        name: def.name.id.to_string(),
        args: Arguments { args, kwonly, vararg, kwarg },
        body: lower_stmts(def.body)?,
    })
}

fn lower_stmts(body: Vec<RpyStmt>) -> Result<Vec<Stmt>, LowerError> {
    body.into_iter().map(lower_stmt).collect()
}

fn lower_stmt(stmt: RpyStmt) -> Result<Stmt, LowerError> {
    match stmt {
        RpyStmt::Pass(_) => Ok(Stmt::new(StmtKind::Expr(Expr::constant(Constant::None)))),
        RpyStmt::Expr(rpy::StmtExpr { value, .. }) => Ok(ast::expr_stmt(lower_expr(&value)?)),
        RpyStmt::Return(rpy::StmtReturn { value, .. }) => {
            Ok(ast::return_stmt(value.as_deref().map(lower_expr).transpose()?))
        }
        RpyStmt::Assign(rpy::StmtAssign { targets, value, .. }) => {
            if targets.len() != 1 {
                return Err(LowerError::ComplexAssignTarget);
            }
            let target = lower_simple_name(&targets[0])?;
            Ok(Stmt::new(StmtKind::Assign(Assign { target, value: lower_expr(&value)? })))
        }
        RpyStmt::Break(_) => Ok(Stmt::new(StmtKind::Break)),
        RpyStmt::Continue(_) => Ok(Stmt::new(StmtKind::Continue)),
        RpyStmt::Raise(rpy::StmtRaise { exc, .. }) => Ok(Stmt::new(StmtKind::Raise(exc.as_deref().map(lower_expr).transpose()?))),
        RpyStmt::Global(rpy::StmtGlobal { names, .. }) => {
            Ok(Stmt::new(StmtKind::Global(names.iter().map(|n| n.id.to_string()).collect())))
        }
        RpyStmt::Nonlocal(rpy::StmtNonlocal { names, .. }) => {
            Ok(Stmt::new(StmtKind::Nonlocal(names.iter().map(|n| n.id.to_string()).collect())))
        }
        RpyStmt::If(rpy::StmtIf { test, body, elif_else_clauses, .. }) => Ok(Stmt::new(StmtKind::If(If {
            test: lower_expr(&test)?,
            body: lower_stmts(body)?,
            orelse: lower_elif_else(elif_else_clauses)?,
        }))),
        RpyStmt::While(rpy::StmtWhile { test, body, orelse, .. }) => Ok(Stmt::new(StmtKind::While(While {
            test: lower_expr(&test)?,
            body: lower_stmts(body)?,
            orelse: lower_stmts(orelse)?,
        }))),
        RpyStmt::For(rpy::StmtFor { is_async, target, iter, body, orelse, .. }) => {
            if is_async {
                return Err(LowerError::UnsupportedStatement("async for"));
            }
            Ok(Stmt::new(StmtKind::For(For {
                target: lower_simple_name(&target)?,
                iter: lower_expr(&iter)?,
                body: lower_stmts(body)?,
                orelse: lower_stmts(orelse)?,
            })))
        }
        RpyStmt::With(rpy::StmtWith { is_async, items, body, .. }) => {
            if is_async {
                return Err(LowerError::UnsupportedStatement("async with"));
            }
            if items.len() != 1 {
                return Err(LowerError::UnsupportedStatement("multi-item with"));
            }
            let item = items.into_iter().next().expect("checked len == 1");
            let optional_var = item.optional_vars.as_deref().map(lower_simple_name).transpose()?;
            Ok(Stmt::new(StmtKind::With(With {
                context_expr: lower_expr(&item.context_expr)?,
                optional_var,
                body: lower_stmts(body)?,
            })))
        }
        RpyStmt::Try(rpy::StmtTry { body, handlers, orelse, finalbody, is_star, .. }) => {
            if is_star {
                return Err(LowerError::UnsupportedStatement("try*"));
            }
            Ok(Stmt::new(StmtKind::Try(TryStmt {
                body: lower_stmts(body)?,
                handlers: handlers.into_iter().map(lower_except_handler).collect::<Result<_, _>>()?,
                orelse: lower_stmts(orelse)?,
                finalbody: lower_stmts(finalbody)?,
            })))
        }
        RpyStmt::FunctionDef(_) => Err(LowerError::UnsupportedStatement("nested def")),
        RpyStmt::ClassDef(_) => Err(LowerError::UnsupportedStatement("class")),
        RpyStmt::AugAssign(_) => Err(LowerError::UnsupportedStatement("augmented assignment")),
        RpyStmt::AnnAssign(_) => Err(LowerError::UnsupportedStatement("annotated assignment")),
        RpyStmt::Match(_) => Err(LowerError::UnsupportedStatement("match")),
        RpyStmt::Assert(_) => Err(LowerError::UnsupportedStatement("assert")),
        RpyStmt::Delete(_) => Err(LowerError::UnsupportedStatement("del")),
        RpyStmt::Import(_) | RpyStmt::ImportFrom(_) => Err(LowerError::UnsupportedStatement("import")),
        RpyStmt::TypeAlias(_) => Err(LowerError::UnsupportedStatement("type alias")),
        RpyStmt::IpyEscapeCommand(_) => Err(LowerError::UnsupportedStatement("ipython escape command")),
    }
}

fn lower_elif_else(clauses: Vec<rpy::ElifElseClause>) -> Result<Vec<Stmt>, LowerError> {
    let mut tail = Vec::new();
    for clause in clauses.into_iter().rev() {
        match clause.test {
            Some(test) => {
                let nested = Stmt::new(StmtKind::If(If { test: lower_expr(&test)?, body: lower_stmts(clause.body)?, orelse: tail }));
                tail = vec![nested];
            }
            None => tail = lower_stmts(clause.body)?,
        }
    }
    Ok(tail)
}

fn lower_except_handler(handler: rpy::ExceptHandler) -> Result<ExceptHandler, LowerError> {
    let rpy::ExceptHandler::ExceptHandler(h) = handler;
    Ok(ExceptHandler {
        exc_type: h.type_.as_deref().map(lower_expr).transpose()?,
        name: h.name.map(|n| n.id.to_string()),
        body: lower_stmts(h.body)?,
    })
}

fn lower_simple_name(expr: &rpy::Expr) -> Result<String, LowerError> {
    match expr {
        rpy::Expr::Name(rpy::ExprName { id, .. }) => Ok(id.to_string()),
        _ => Err(LowerError::ComplexAssignTarget),
    }
}

fn lower_expr(expr: &rpy::Expr) -> Result<Expr, LowerError> {
    match expr {
        rpy::Expr::Name(rpy::ExprName { id, .. }) => Ok(Expr::name(id.to_string())),
        rpy::Expr::NoneLiteral(_) => Ok(Expr::constant(Constant::None)),
        rpy::Expr::BooleanLiteral(rpy::ExprBooleanLiteral { value, .. }) => Ok(Expr::constant(Constant::Bool(*value))),
        rpy::Expr::NumberLiteral(rpy::ExprNumberLiteral { value, .. }) => match value {
            Number::Int(i) => i
                .as_i64()
                .map(|i| Expr::constant(Constant::Int(i)))
                .ok_or(LowerError::UnsupportedExpression("integer literal too large")),
            Number::Float(f) => Ok(Expr::constant(Constant::Float(*f))),
            Number::Complex { .. } => Err(LowerError::UnsupportedExpression("complex literal")),
        },
        rpy::Expr::StringLiteral(rpy::ExprStringLiteral { value, .. }) => Ok(Expr::constant(Constant::Str(value.to_str().to_owned()))),
        rpy::Expr::Tuple(rpy::ExprTuple { elts, .. }) => {
            Ok(Expr::new(ExprKind::Tuple(elts.iter().map(lower_expr).collect::<Result<_, _>>()?)))
        }
        rpy::Expr::List(rpy::ExprList { elts, .. }) => {
            Ok(Expr::new(ExprKind::List(elts.iter().map(lower_expr).collect::<Result<_, _>>()?)))
        }
        rpy::Expr::Attribute(rpy::ExprAttribute { value, attr, .. }) => {
            Ok(Expr::new(ExprKind::Attribute { value: Box::new(lower_expr(value)?), attr: attr.id.to_string() }))
        }
        rpy::Expr::Subscript(rpy::ExprSubscript { value, slice, .. }) => Ok(Expr::new(ExprKind::Subscript {
            value: Box::new(lower_expr(value)?),
            index: Box::new(lower_expr(slice)?),
        })),
        rpy::Expr::If(rpy::ExprIf { test, body, orelse, .. }) => Ok(Expr::new(ExprKind::IfExp {
            test: Box::new(lower_expr(test)?),
            body: Box::new(lower_expr(body)?),
            orelse: Box::new(lower_expr(orelse)?),
        })),
        rpy::Expr::Named(rpy::ExprNamed { target, value, .. }) => Ok(Expr::new(ExprKind::NamedExpr {
            target: lower_simple_name(target)?,
            value: Box::new(lower_expr(value)?),
        })),
        rpy::Expr::Yield(rpy::ExprYield { value, .. }) => {
            Ok(Expr::new(ExprKind::Yield(value.as_deref().map(lower_expr).transpose()?.map(Box::new))))
        }
        rpy::Expr::BoolOp(rpy::ExprBoolOp { op, values, .. }) => Ok(Expr::new(ExprKind::BoolOp {
            op: match op {
                rpy::BoolOp::And => BoolOp::And,
                rpy::BoolOp::Or => BoolOp::Or,
            },
            values: values.iter().map(lower_expr).collect::<Result<_, _>>()?,
        })),
        rpy::Expr::UnaryOp(rpy::ExprUnaryOp { op, operand, .. }) => {
            let op = match op {
                RpyUnaryOp::Not => UnaryOp::Not,
                RpyUnaryOp::USub => UnaryOp::Neg,
                RpyUnaryOp::UAdd => UnaryOp::Pos,
                RpyUnaryOp::Invert => return Err(LowerError::UnsupportedOperator("~")),
            };
            Ok(Expr::new(ExprKind::UnaryOp { op, operand: Box::new(lower_expr(operand)?) }))
        }
        rpy::Expr::BinOp(rpy::ExprBinOp { left, op, right, .. }) => Ok(Expr::new(ExprKind::BinOp {
            left: Box::new(lower_expr(left)?),
            op: lower_operator(*op)?,
            right: Box::new(lower_expr(right)?),
        })),
        rpy::Expr::Compare(rpy::ExprCompare { left, ops, comparators, .. }) => Ok(Expr::new(ExprKind::Compare(Compare {
            left: Box::new(lower_expr(left)?),
            ops: ops.iter().copied().map(lower_cmp_op).collect::<Result<_, _>>()?,
            comparators: comparators.iter().map(lower_expr).collect::<Result<_, _>>()?,
        }))),
        rpy::Expr::Call(rpy::ExprCall { func, arguments, .. }) => {
            let mut args = Vec::new();
            for a in &arguments.args {
                if matches!(a, rpy::Expr::Starred(_)) {
                    return Err(LowerError::UnsupportedExpression("*args unpacking at a call site"));
                }
                args.push(lower_expr(a)?);
            }
            let mut keywords = Vec::new();
            for kw in &arguments.keywords {
                let Some(name) = &kw.arg else {
                    return Err(LowerError::UnsupportedExpression("**kwargs unpacking at a call site"));
                };
                keywords.push((name.id.to_string(), lower_expr(&kw.value)?));
            }
            Ok(Expr::new(ExprKind::Call(Call { func: Box::new(lower_expr(func)?), args, keywords })))
        }
        rpy::Expr::FString(_) => Err(LowerError::UnsupportedExpression("f-string")),
        rpy::Expr::ListComp(_) | rpy::Expr::SetComp(_) | rpy::Expr::DictComp(_) | rpy::Expr::Generator(_) => {
            Err(LowerError::UnsupportedExpression("comprehension"))
        }
        rpy::Expr::Lambda(_) => Err(LowerError::UnsupportedExpression("lambda")),
        rpy::Expr::Await(_) => Err(LowerError::UnsupportedExpression("await")),
        rpy::Expr::Starred(_) => Err(LowerError::UnsupportedExpression("starred expression")),
        rpy::Expr::Slice(_) => Err(LowerError::UnsupportedExpression("slice")),
        rpy::Expr::Set(_) | rpy::Expr::Dict(_) => Err(LowerError::UnsupportedExpression("set/dict literal")),
        rpy::Expr::BytesLiteral(_) => Err(LowerError::UnsupportedExpression("bytes literal")),
        rpy::Expr::TString(_) => Err(LowerError::UnsupportedExpression("t-string")),
        rpy::Expr::IpyEscapeCommand(_) => Err(LowerError::UnsupportedExpression("ipython escape command")),
        rpy::Expr::EllipsisLiteral(_) => Err(LowerError::UnsupportedExpression("ellipsis")),
        rpy::Expr::YieldFrom(_) => Err(LowerError::UnsupportedExpression("yield from")),
    }
}

fn lower_operator(op: RpyOperator) -> Result<Operator, LowerError> {
    match op {
        RpyOperator::Add => Ok(Operator::Add),
        RpyOperator::Sub => Ok(Operator::Sub),
        RpyOperator::Mult => Ok(Operator::Mult),
        RpyOperator::Div => Ok(Operator::Div),
        RpyOperator::FloorDiv => Ok(Operator::FloorDiv),
        RpyOperator::Mod => Ok(Operator::Mod),
        RpyOperator::Pow => Ok(Operator::Pow),
        RpyOperator::MatMult => Err(LowerError::UnsupportedOperator("@")),
        RpyOperator::LShift => Err(LowerError::UnsupportedOperator("<<")),
        RpyOperator::RShift => Err(LowerError::UnsupportedOperator(">>")),
        RpyOperator::BitOr => Err(LowerError::UnsupportedOperator("|")),
        RpyOperator::BitXor => Err(LowerError::UnsupportedOperator("^")),
        RpyOperator::BitAnd => Err(LowerError::UnsupportedOperator("&")),
    }
}

fn lower_cmp_op(op: RpyCmpOp) -> Result<CmpOp, LowerError> {
    match op {
        RpyCmpOp::Eq => Ok(CmpOp::Eq),
        RpyCmpOp::NotEq => Ok(CmpOp::NotEq),
        RpyCmpOp::Lt => Ok(CmpOp::Lt),
        RpyCmpOp::LtE => Ok(CmpOp::LtE),
        RpyCmpOp::Gt => Ok(CmpOp::Gt),
        RpyCmpOp::GtE => Ok(CmpOp::GtE),
        RpyCmpOp::Is => Ok(CmpOp::Is),
        RpyCmpOp::IsNot => Ok(CmpOp::IsNot),
        RpyCmpOp::In => Ok(CmpOp::In),
        RpyCmpOp::NotIn => Ok(CmpOp::NotIn),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowers_a_straight_line_function() {
        let def = parse_function("def f(x):\n    return x + 1\n").expect("parses");
        assert_eq!(def.name, "f");
        assert_eq!(def.args.args, vec!["x".to_owned()]);
        assert_eq!(def.body.len(), 1);
    }

    #[test]
    fn rejects_class_bodies() {
        let err = parse_function("class C:\n    pass\n").unwrap_err();
        assert_eq!(err, LowerError::UnsupportedStatement("expected a single top-level `def`"));
    }

    #[test]
    fn rejects_nested_def() {
        let err = parse_function("def f():\n    def g():\n        pass\n    return g\n").unwrap_err();
        assert_eq!(err, LowerError::UnsupportedStatement("nested def"));
    }

    #[test]
    fn lowers_checkpoint_while_and_try() {
        let src = "def f(n, d):\n    try:\n        if n > 0:\n            checkpoint()\n        n = n / d\n        return n\n    except ZeroDivisionError:\n        return -1\n    finally:\n        mark('fin')\n";
        let def = parse_function(src).expect("parses");
        assert_eq!(def.name, "f");
    }
}
