//! A small tree-walking evaluator for the restricted dialect a compiled
//! function's continuations are expressed in (§3 "Value / Program /
//! Evaluator").
//!
//! The reference implementation hands the rewritten AST straight back to
//! the host Python interpreter and never needs its own evaluator. This port
//! has no host to borrow semantics from, so [`Program`] plays the role the
//! teacher crate's `VM` plays for bytecode: it owns the table of generated
//! continuations (§4.5's `definitions`) and drives them to either a genuine
//! [`Suspension`] or a plain [`Value`] result — grounded on `bytecode/vm`'s
//! split between "the code that's fixed at compile time" and "the state
//! that's threaded through evaluation".
//!
//! Two invariants from the splitter keep this evaluator simple and let it
//! avoid needing its own suspension-aware expression type:
//! - A genuine split point is always the *entire* value of a `Return`
//!   (§4.5 step 2a "cut"): `__Suspend`/`__SuspendYield` therefore never
//!   appear nested inside a larger expression, only as a `Return`'s direct
//!   value, so only [`eval_return_value`] needs to recognise them.
//! - Every other expression position (an `Assign`'s value, an `If`'s test,
//!   an ordinary `Expr` statement) is split-free after the splitter has run,
//!   so [`eval_expr`] never has to produce anything but a [`Value`].

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::ast::{self, Arguments, Constant, Expr, ExprKind, FunctionDef, Ident, Stmt, StmtKind};
use crate::value::{Continuation, ExcClass, PyException, Value};

pub type Env = HashMap<Ident, Value>;
pub type Kwargs = IndexMap<String, Value>;

/// Runtime error surfaced to the caller of [`Program::call_entry`] or
/// [`crate::trampoline::Trampoline::run`]: either a dialect-level Python
/// exception that escaped every handler, or an internal evaluator bug (an
/// unbound name, an unknown builtin) that should never occur against
/// output the splitter produced.
#[derive(Debug, Clone)]
pub enum EvalError {
    Raised(PyException),
    Internal(String),
}

impl From<PyException> for EvalError {
    fn from(e: PyException) -> Self {
        EvalError::Raised(e)
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::Raised(e) => write!(f, "{e}"),
            EvalError::Internal(msg) => write!(f, "internal evaluator error: {msg}"),
        }
    }
}

impl std::error::Error for EvalError {}

/// What executing a continuation body resolves to: either it ran clean
/// through to a plain value (the no-split case, or the tail end of a chain
/// of eager `__CallContinuation` hops), or it bottomed out at a genuine
/// split point and produced a [`Suspension`] for the trampoline to drive
/// (§4.7).
#[derive(Debug, Clone)]
pub enum Outcome {
    Value(Value),
    Suspend(crate::suspension::Suspension),
}

impl Outcome {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Outcome::Value(v) => Some(v),
            Outcome::Suspend(_) => None,
        }
    }
}

/// What a split-marker external function decides to do with its captured
/// continuation once called (§9 "Dynamic name resolution" — this is this
/// port's substitute for the host-defined checkpoint behaviour).
pub enum ExternalEffect {
    /// Resume the bound `continuation` kwarg with this value — the
    /// ordinary case for a transparent checkpoint.
    Resume(Value),
    /// Short-circuit the whole computation with this value, bypassing the
    /// bound continuation entirely (§8 scenario 2, `ImmediateReturn`).
    Immediate(Value),
}

/// Host-pluggable split-marker / side-effecting builtin. Registered by name
/// in a [`Program`]; invoked by [`Program::call_external`] (ordinary
/// side-effecting calls like `mark("fin")`) or by the trampoline (split
/// markers wrapped in `__Suspend`).
pub trait ExternalFunction {
    fn call(&self, args: &[Value], kwargs: &Kwargs) -> Result<ExternalEffect, PyException>;
}

/// An external registered purely for its side effect (never a split
/// point): always resumes with its own return value immediately, i.e.
/// there is no continuation to bounce through. Matches a plain function
/// call like `mark("fin")` in §8 scenario 5.
pub struct SideEffect<F: Fn(&[Value]) -> Result<Value, PyException>>(pub F);

impl<F: Fn(&[Value]) -> Result<Value, PyException>> ExternalFunction for SideEffect<F> {
    fn call(&self, args: &[Value], _kwargs: &Kwargs) -> Result<ExternalEffect, PyException> {
        Ok(ExternalEffect::Resume((self.0)(args)?))
    }
}

/// The compiled program: the continuation table a [`crate::splitter::compile`]
/// run produced, plus the externals it may call into. Analogous to the
/// teacher crate's `VM`'s borrowed `Code`/`Interns` — fixed for the
/// lifetime of one evaluation.
pub struct Program {
    pub definitions: IndexMap<Ident, FunctionDef>,
    pub externals: HashMap<String, Box<dyn ExternalFunction>>,
}

impl Program {
    pub fn new(definitions: IndexMap<Ident, FunctionDef>) -> Self {
        Program { definitions, externals: HashMap::new() }
    }

    pub fn register(&mut self, name: impl Into<String>, external: impl ExternalFunction + 'static) {
        self.externals.insert(name.into(), Box::new(external));
    }

    /// Calls the named continuation (or the entry function itself) with its
    /// live-in arguments already bound plus the value produced at the
    /// preceding split point, exactly as [`crate::splitter::make_continuation`]
    /// shaped its parameter list: live-in set, then the pending value.
    pub fn call_continuation(&self, cont: &Continuation, value: Value) -> Result<Outcome, EvalError> {
        let mut args = cont.bound.clone();
        args.push(value);
        self.call_by_name(&cont.name, args)
    }

    /// Calls the entry function (or any generated continuation) by name
    /// with fully-assembled positional arguments, matching them
    /// left-to-right against the function's parameter list (§4.5's
    /// generated continuations never use keyword arguments themselves,
    /// only the entry point's own `continuation` kwonly parameter, which
    /// callers pass positionally here as the final bound value like any
    /// other live-in variable once the entry point has been invoked once).
    pub fn call_by_name(&self, name: &str, args: Vec<Value>) -> Result<Outcome, EvalError> {
        let def = self
            .definitions
            .get(name)
            .ok_or_else(|| EvalError::Internal(format!("no continuation named {name:?}")))?;
        let env = bind_args(&def.args, args)?;
        exec_stmts(self, &def.body, env, None)
    }

    /// Calls a registered external by name for its side effect (never a
    /// split point — no `continuation` kwarg is threaded through).
    fn call_external(&self, name: &str, args: &[Value], kwargs: &Kwargs) -> Result<Value, EvalError> {
        match self.call_external_effect(name, args, kwargs)? {
            ExternalEffect::Resume(v) => Ok(v),
            ExternalEffect::Immediate(v) => Ok(v),
        }
    }

    /// Calls a registered external by name and hands back its raw
    /// [`ExternalEffect`] verdict, unresolved — the distinction between
    /// "resume the bound continuation" and "short-circuit" only matters to
    /// [`crate::trampoline::Trampoline`], which is the other caller of this
    /// method (the split-marker case); [`Self::call_external`] collapses
    /// both for ordinary side-effecting calls, where there is no bound
    /// continuation to resume in the first place.
    pub fn call_external_effect(&self, name: &str, args: &[Value], kwargs: &Kwargs) -> Result<ExternalEffect, EvalError> {
        let external = self
            .externals
            .get(name)
            .ok_or_else(|| EvalError::Internal(format!("unknown external function {name:?}")))?;
        Ok(external.call(args, kwargs)?)
    }
}

/// Pulls the bound `continuation` kwarg out of a pending [`Suspension::Call`]
/// (§3 "Suspension value": every split marker's kwargs always carry one).
/// Shared by the evaluator's own `__Suspend` handling and by
/// [`crate::trampoline::Trampoline`], which needs the same continuation to
/// resume once the external function decides to.
pub fn continuation_from_kwargs(kwargs: &Kwargs) -> Result<Continuation, EvalError> {
    match kwargs.get("continuation") {
        Some(Value::Continuation(c)) => Ok(c.clone()),
        Some(other) => Err(EvalError::Internal(format!("continuation kwarg was a {}, not a continuation", other.type_name()))),
        None => Err(EvalError::Internal("suspension is missing its continuation kwarg".into())),
    }
}

fn bind_args(params: &Arguments, args: Vec<Value>) -> Result<Env, EvalError> {
    let names = params.all_names();
    if names.len() != args.len() {
        return Err(EvalError::Internal(format!("expected {} arguments, got {}", names.len(), args.len())));
    }
    Ok(names.into_iter().cloned().zip(args).collect())
}

/// Executes a fragment — a continuation body, an `if`/`while` branch, or a
/// `try`/`except` handler body — to its terminal [`Outcome`] (§4.5
/// "Continuation construction": every fragment the splitter emits ends in
/// exactly one `Return`, possibly nested inside `If`/`Try` control flow it
/// reconstructed). `active_exception` is `Some` while executing inside a
/// matched `except` clause, so a bare `raise` (the with-statement
/// lowering's re-raise, §4.4) can recover it.
pub fn exec_stmts(
    program: &Program,
    stmts: &[Stmt],
    mut env: Env,
    active_exception: Option<&PyException>,
) -> Result<Outcome, EvalError> {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Assign(a) => {
                let v = eval_expr(program, &a.value, &env)?;
                env.insert(a.target.clone(), v);
            }
            StmtKind::Expr(e) => {
                eval_expr(program, e, &env)?;
            }
            StmtKind::Return(value) => {
                let value = value.as_ref().map_or(Expr::constant(Constant::None), Clone::clone);
                return eval_return_value(program, &value, &env);
            }
            StmtKind::Raise(value) => {
                return Err(raise(program, value.as_ref(), &env, active_exception)?.into());
            }
            StmtKind::If(n) => {
                if eval_expr(program, &n.test, &env)?.truthy() {
                    return exec_stmts(program, &n.body, env, active_exception);
                }
                return exec_stmts(program, &n.orelse, env, active_exception);
            }
            StmtKind::Try(n) => return exec_try(program, n, env, active_exception),
            StmtKind::Global(_) | StmtKind::Nonlocal(_) => {}
            StmtKind::Break | StmtKind::Continue => {
                return Err(EvalError::Internal("break/continue reached the evaluator (splitter bug)".into()));
            }
            StmtKind::While(_) | StmtKind::For(_) | StmtKind::With(_) | StmtKind::FunctionDef(_) => {
                return Err(EvalError::Internal("unsplit control-flow construct reached the evaluator".into()));
            }
        }
    }
    Err(EvalError::Internal("fragment fell off the end without a terminal return".into()))
}

fn raise(
    program: &Program,
    value: Option<&Expr>,
    env: &Env,
    active_exception: Option<&PyException>,
) -> Result<PyException, EvalError> {
    match value {
        None => active_exception.cloned().ok_or_else(|| EvalError::Internal("bare raise outside an except clause".into())),
        Some(e) => match eval_expr(program, e, env)? {
            Value::Exception(exc) => Ok(exc),
            Value::ExcClassRef(class) => Ok(PyException::new(class, String::new())),
            other => Err(EvalError::Internal(format!("cannot raise a {}", other.type_name()))),
        },
    }
}

/// Runs a `try`/`except`/`finally` (§4.4, §7.3). `finalbody` is guaranteed
/// split-free (the splitter never runs it through [`crate::splitter`] —
/// see `TryModel` in `splitter.rs`), so it is executed with the plain
/// side-effect runner rather than [`exec_stmts`], matching the reference
/// implementation's guarantee that `finally` runs on every path.
fn exec_try(program: &Program, n: &ast::TryStmt, env: Env, active_exception: Option<&PyException>) -> Result<Outcome, EvalError> {
    let result = exec_stmts(program, &n.body, env.clone(), active_exception);
    let (result, env_after) = match result {
        Ok(outcome) => (Ok(outcome), env),
        Err(EvalError::Raised(exc)) => {
            let mut handled = None;
            for h in &n.handlers {
                let class = match &h.exc_type {
                    Some(e) => match eval_expr(program, e, &env)? {
                        Value::ExcClassRef(c) => c,
                        _ => continue,
                    },
                    None => ExcClass::BaseException,
                };
                if exc.0.class.matches(class) {
                    let mut handler_env = env.clone();
                    if let Some(name) = &h.name {
                        handler_env.insert(name.clone(), Value::Exception(exc.clone()));
                    }
                    handled = Some(exec_stmts(program, &h.body, handler_env.clone(), Some(&exc)).map(|o| (o, handler_env)));
                    break;
                }
            }
            match handled {
                Some(Ok((outcome, handler_env))) => (Ok(outcome), handler_env),
                Some(Err(e)) => (Err(e), env),
                None => (Err(EvalError::Raised(exc)), env),
            }
        }
        Err(other) => return Err(other),
    };

    match run_side_effects(program, &n.finalbody, env_after)? {
        Some(override_value) => Ok(Outcome::Value(override_value)),
        None => result,
    }
}

/// Runs a split-free statement list purely for side effects, as the
/// reference implementation's `finally` clause does (§4.4, §7.3). Returns
/// `Some(value)` only if a bare `return` inside `finally` overrides
/// whatever the protected region produced — matching Python's own
/// (surprising, but well-known) `finally`-wins-on-return semantics.
fn run_side_effects(program: &Program, stmts: &[Stmt], mut env: Env) -> Result<Option<Value>, EvalError> {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Assign(a) => {
                let v = eval_expr(program, &a.value, &env)?;
                env.insert(a.target.clone(), v);
            }
            StmtKind::Expr(e) => {
                eval_expr(program, e, &env)?;
            }
            StmtKind::Return(value) => {
                let v = match value {
                    Some(e) => eval_expr(program, e, &env)?,
                    None => Value::None,
                };
                return Ok(Some(v));
            }
            StmtKind::If(n) => {
                let branch = if eval_expr(program, &n.test, &env)?.truthy() { &n.body } else { &n.orelse };
                if let Some(v) = run_side_effects(program, branch, env.clone())? {
                    return Ok(Some(v));
                }
            }
            StmtKind::Raise(value) => return Err(raise(program, value.as_ref(), &env, None)?.into()),
            _ => return Err(EvalError::Internal("unsupported statement inside finally".into())),
        }
    }
    Ok(None)
}

/// Evaluates the direct value of a terminal `Return` (§4.5 "Continuation
/// construction"). This is the one place `__Suspend`/`__SuspendYield`
/// (genuine splits, reified as data) and `__CallContinuation` (an eager,
/// in-process hop to another continuation — §4.5 "splits synthesised by
/// the algorithm itself") are recognised; everywhere else these names
/// would just be unresolved externals.
fn eval_return_value(program: &Program, value: &Expr, env: &Env) -> Result<Outcome, EvalError> {
    if let ExprKind::Call(c) = &value.kind {
        if let ExprKind::Name(name) = &c.func.kind {
            match name.as_str() {
                "__Suspend" => return Ok(Outcome::Suspend(eval_suspend_call(program, c, env)?)),
                "__SuspendYield" => return Ok(Outcome::Suspend(eval_suspend_yield(program, c, env)?)),
                "__CallContinuation" => {
                    let cont = expect_continuation(eval_expr(program, &c.args[0], env)?)?;
                    let v = eval_expr(program, &c.args[1], env)?;
                    return program.call_continuation(&cont, v);
                }
                _ => {}
            }
        }
    }
    Ok(Outcome::Value(eval_expr(program, value, env)?))
}

fn eval_suspend_call(program: &Program, c: &ast::Call, env: &Env) -> Result<crate::suspension::Suspension, EvalError> {
    let callee = match &c.args[0].kind {
        ExprKind::Name(n) => n.clone(),
        _ => return Err(EvalError::Internal("__Suspend callee must be a Name".into())),
    };
    let args = c.args[1..].iter().map(|a| eval_expr(program, a, env)).collect::<Result<Vec<_>, _>>()?;
    let mut kwargs = Kwargs::new();
    for (k, v) in &c.keywords {
        kwargs.insert(k.clone(), eval_expr(program, v, env)?);
    }
    Ok(crate::suspension::Suspension::call(callee, args, kwargs))
}

fn eval_suspend_yield(program: &Program, c: &ast::Call, env: &Env) -> Result<crate::suspension::Suspension, EvalError> {
    let value = eval_expr(program, &c.args[0], env)?;
    let cont = expect_continuation(eval_expr(program, &c.args[1], env)?)?;
    Ok(crate::suspension::Suspension::yield_(value, cont))
}

fn expect_continuation(v: Value) -> Result<Continuation, EvalError> {
    match v {
        Value::Continuation(c) => Ok(c),
        other => Err(EvalError::Internal(format!("expected a continuation, found {}", other.type_name()))),
    }
}

/// Evaluates an ordinary (split-free) expression to a plain [`Value`].
pub fn eval_expr(program: &Program, expr: &Expr, env: &Env) -> Result<Value, EvalError> {
    match &expr.kind {
        ExprKind::Constant(c) => Ok(eval_constant(c)),
        ExprKind::Name(id) => lookup(id, env),
        ExprKind::Tuple(items) | ExprKind::List(items) => {
            let values = items.iter().map(|i| eval_expr(program, i, env)).collect::<Result<_, _>>()?;
            Ok(Value::list(values))
        }
        ExprKind::NamedExpr { .. } => Err(EvalError::Internal("NamedExpr must be lowered to Assign before evaluation".into())),
        ExprKind::IfExp { test, body, orelse } => {
            if eval_expr(program, test, env)?.truthy() { eval_expr(program, body, env) } else { eval_expr(program, orelse, env) }
        }
        ExprKind::BoolOp { op, values } => eval_bool_op(program, *op, values, env),
        ExprKind::UnaryOp { op, operand } => eval_unary(*op, eval_expr(program, operand, env)?),
        ExprKind::BinOp { left, op, right } => {
            eval_binop(*op, eval_expr(program, left, env)?, eval_expr(program, right, env)?)
        }
        ExprKind::Compare(c) => eval_compare(program, c, env),
        ExprKind::Attribute { value, attr } => Err(EvalError::Internal(format!("bare attribute access `.{attr}` on {value:?} is not supported"))),
        ExprKind::Subscript { value, index } => {
            let v = eval_expr(program, value, env)?;
            let i = eval_expr(program, index, env)?;
            eval_subscript(v, i)
        }
        ExprKind::Yield(_) => Err(EvalError::Internal("Yield must appear only as a Return's value after splitting".into())),
        ExprKind::Call(c) => eval_call(program, c, env),
    }
}

fn eval_constant(c: &Constant) -> Value {
    match c {
        Constant::None => Value::None,
        Constant::Bool(b) => Value::Bool(*b),
        Constant::Int(i) => Value::Int(*i),
        Constant::Float(f) => Value::Float(*f),
        Constant::Str(s) => Value::Str(s.clone()),
    }
}

fn lookup(id: &str, env: &Env) -> Result<Value, EvalError> {
    if let Some(v) = env.get(id) {
        return Ok(v.clone());
    }
    exc_class_by_name(id).map(Value::ExcClassRef).ok_or_else(|| EvalError::Internal(format!("unbound name {id:?}")))
}

fn exc_class_by_name(name: &str) -> Option<ExcClass> {
    Some(match name {
        "BaseException" => ExcClass::BaseException,
        "Exception" => ExcClass::Exception,
        "StopIteration" => ExcClass::StopIteration,
        "ZeroDivisionError" => ExcClass::ZeroDivisionError,
        "TypeError" => ExcClass::TypeError,
        "ValueError" => ExcClass::ValueError,
        _ => return None,
    })
}

fn eval_bool_op(program: &Program, op: ast::BoolOp, values: &[Expr], env: &Env) -> Result<Value, EvalError> {
    let mut last = Value::None;
    for v in values {
        last = eval_expr(program, v, env)?;
        match op {
            ast::BoolOp::And if !last.truthy() => return Ok(last),
            ast::BoolOp::Or if last.truthy() => return Ok(last),
            _ => {}
        }
    }
    Ok(last)
}

fn eval_unary(op: ast::UnaryOp, v: Value) -> Result<Value, EvalError> {
    match (op, v) {
        (ast::UnaryOp::Not, v) => Ok(Value::Bool(!v.truthy())),
        (ast::UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(-i)),
        (ast::UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (ast::UnaryOp::Pos, Value::Int(i)) => Ok(Value::Int(i)),
        (ast::UnaryOp::Pos, Value::Float(f)) => Ok(Value::Float(f)),
        (_, v) => Err(type_error(format!("bad operand type for unary op: {}", v.type_name())).into()),
    }
}

fn type_error(message: String) -> PyException {
    PyException::new(ExcClass::TypeError, message)
}

fn eval_binop(op: ast::Operator, l: Value, r: Value) -> Result<Value, EvalError> {
    use ast::Operator as Op;
    match (&l, &r) {
        (Value::Int(a), Value::Int(b)) => match op {
            Op::Add => Ok(Value::Int(a + b)),
            Op::Sub => Ok(Value::Int(a - b)),
            Op::Mult => Ok(Value::Int(a * b)),
            Op::Div => checked_div(*a as f64, *b as f64).map(Value::Float),
            Op::FloorDiv => checked_div_i(*a, *b).map(Value::Int),
            Op::Mod => checked_mod(*a, *b).map(Value::Int),
            Op::Pow => Ok(Value::Int(a.pow(u32::try_from(*b).unwrap_or(0)))),
        },
        (Value::Str(a), Value::Str(b)) if matches!(op, Op::Add) => Ok(Value::Str(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) if matches!(op, Op::Add) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        _ => {
            let (a, b) = (as_f64(&l), as_f64(&r));
            match (a, b) {
                (Some(a), Some(b)) => match op {
                    Op::Add => Ok(Value::Float(a + b)),
                    Op::Sub => Ok(Value::Float(a - b)),
                    Op::Mult => Ok(Value::Float(a * b)),
                    Op::Div => checked_div(a, b).map(Value::Float),
                    Op::FloorDiv => checked_div(a, b).map(|x| Value::Float(x.floor())),
                    Op::Mod => checked_div(a, b).map(|_| Value::Float(a.rem_euclid(b))),
                    Op::Pow => Ok(Value::Float(a.powf(b))),
                },
                _ => Err(type_error(format!(
                    "unsupported operand type(s) for {op}: '{}' and '{}'",
                    l.type_name(),
                    r.type_name()
                ))
                .into()),
            }
        }
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn checked_div(a: f64, b: f64) -> Result<f64, EvalError> {
    if b == 0.0 {
        return Err(PyException::new(ExcClass::ZeroDivisionError, "division by zero".into()).into());
    }
    Ok(a / b)
}

fn checked_div_i(a: i64, b: i64) -> Result<i64, EvalError> {
    if b == 0 {
        return Err(PyException::new(ExcClass::ZeroDivisionError, "integer division or modulo by zero".into()).into());
    }
    Ok(a.div_euclid(b))
}

fn checked_mod(a: i64, b: i64) -> Result<i64, EvalError> {
    if b == 0 {
        return Err(PyException::new(ExcClass::ZeroDivisionError, "integer division or modulo by zero".into()).into());
    }
    Ok(a.rem_euclid(b))
}

fn eval_compare(program: &Program, c: &ast::Compare, env: &Env) -> Result<Value, EvalError> {
    let mut left = eval_expr(program, &c.left, env)?;
    for (op, rhs) in c.ops.iter().zip(c.comparators.iter()) {
        let right = eval_expr(program, rhs, env)?;
        if !compare_one(*op, &left, &right)? {
            return Ok(Value::Bool(false));
        }
        left = right;
    }
    Ok(Value::Bool(true))
}

fn compare_one(op: ast::CmpOp, l: &Value, r: &Value) -> Result<bool, EvalError> {
    use ast::CmpOp as C;
    Ok(match op {
        C::Eq => l == r,
        C::NotEq => l != r,
        C::Is => is_same(l, r),
        C::IsNot => !is_same(l, r),
        C::In => contains(r, l)?,
        C::NotIn => !contains(r, l)?,
        C::Lt | C::LtE | C::Gt | C::GtE => {
            let ord = numeric_cmp(l, r)?;
            match op {
                C::Lt => ord == std::cmp::Ordering::Less,
                C::LtE => ord != std::cmp::Ordering::Greater,
                C::Gt => ord == std::cmp::Ordering::Greater,
                C::GtE => ord != std::cmp::Ordering::Less,
                _ => unreachable!(),
            }
        }
    })
}

fn is_same(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::None, Value::None) => true,
        (Value::ExcClassRef(a), Value::ExcClassRef(b)) => a == b,
        _ => l == r,
    }
}

fn contains(container: &Value, needle: &Value) -> Result<bool, EvalError> {
    match container {
        Value::List(items) => Ok(items.borrow().iter().any(|i| i == needle)),
        Value::Str(s) => match needle {
            Value::Str(n) => Ok(s.contains(n.as_str())),
            _ => Err(type_error("'in <str>' requires string as left operand".into()).into()),
        },
        other => Err(type_error(format!("argument of type '{}' is not iterable", other.type_name())).into()),
    }
}

fn numeric_cmp(l: &Value, r: &Value) -> Result<std::cmp::Ordering, EvalError> {
    match (as_f64(l), as_f64(r)) {
        (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| type_error("NaN comparison".into()).into()),
        _ => match (l, r) {
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            _ => Err(type_error(format!("'<' not supported between instances of '{}' and '{}'", l.type_name(), r.type_name())).into()),
        },
    }
}

fn eval_subscript(container: Value, index: Value) -> Result<Value, EvalError> {
    match (&container, &index) {
        (Value::List(items), Value::Int(i)) => {
            let items = items.borrow();
            let idx = normalize_index(*i, items.len())?;
            items.get(idx).cloned().ok_or_else(|| PyException::new(ExcClass::ValueError, "list index out of range".into()).into())
        }
        _ => Err(type_error(format!("'{}' is not subscriptable", container.type_name())).into()),
    }
}

fn normalize_index(i: i64, len: usize) -> Result<usize, EvalError> {
    if i >= 0 {
        Ok(i as usize)
    } else {
        (len as i64 + i).try_into().map_err(|_| PyException::new(ExcClass::ValueError, "list index out of range".into()).into())
    }
}

fn eval_call(program: &Program, c: &ast::Call, env: &Env) -> Result<Value, EvalError> {
    if let ExprKind::Attribute { value, attr } = &c.func.kind {
        let receiver = eval_expr(program, value, env)?;
        let args = c.args.iter().map(|a| eval_expr(program, a, env)).collect::<Result<Vec<_>, _>>()?;
        return eval_method_call(receiver, attr, args);
    }

    let ExprKind::Name(name) = &c.func.kind else {
        return Err(EvalError::Internal("indirect calls are not supported".into()));
    };
    let args = c.args.iter().map(|a| eval_expr(program, a, env)).collect::<Result<Vec<_>, _>>()?;
    let mut kwargs = Kwargs::new();
    for (k, v) in &c.keywords {
        kwargs.insert(k.clone(), eval_expr(program, v, env)?);
    }

    match name.as_str() {
        "__MakeContinuation" => eval_make_continuation(&args),
        "iter" => eval_iter(&args),
        "next" => eval_next(&args),
        "type" => eval_type_of(&args),
        "__enter__" => eval_enter(&args),
        "__exit__" => eval_exit(&args),
        _ => program.call_external(name, &args, &kwargs).map_err(|e| match e {
            EvalError::Internal(msg) if msg.starts_with("unknown external") => {
                EvalError::Internal(format!("{msg} (not a recognised builtin either)"))
            }
            other => other,
        }),
    }
}

fn eval_method_call(receiver: Value, attr: &str, args: Vec<Value>) -> Result<Value, EvalError> {
    match (receiver, attr) {
        (Value::List(items), "pop") => {
            let mut items = items.borrow_mut();
            items.pop().ok_or_else(|| PyException::new(ExcClass::ValueError, "pop from empty list".into()).into())
        }
        (Value::List(items), "append") => {
            items.borrow_mut().extend(args);
            Ok(Value::None)
        }
        (other, attr) => Err(EvalError::Internal(format!("{} has no method {attr:?}", other.type_name()))),
    }
}

fn eval_make_continuation(args: &[Value]) -> Result<Value, EvalError> {
    let (name, bound) = args.split_first().ok_or_else(|| EvalError::Internal("__MakeContinuation needs a name".into()))?;
    let Value::Str(name) = name else {
        return Err(EvalError::Internal("__MakeContinuation's first argument must be a name".into()));
    };
    Ok(Value::Continuation(Continuation { name: name.clone(), bound: bound.to_vec() }))
}

fn eval_iter(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [Value::List(items)] => Ok(Value::Iter(std::rc::Rc::new(std::cell::RefCell::new(items.borrow().iter().cloned().collect())))),
        [Value::Iter(it)] => Ok(Value::Iter(it.clone())),
        [other] => Err(EvalError::Internal(format!("{} is not iterable", other.type_name()))),
        _ => Err(EvalError::Internal("iter() takes exactly one argument".into())),
    }
}

fn eval_next(args: &[Value]) -> Result<Value, EvalError> {
    let [Value::Iter(it), default] = args else {
        return Err(EvalError::Internal("next() expects (iterator, default)".into()));
    };
    Ok(it.borrow_mut().pop_front().unwrap_or_else(|| default.clone()))
}

fn eval_type_of(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [Value::Exception(e)] => Ok(Value::ExcClassRef(e.0.class)),
        [Value::None] => Ok(Value::None),
        [other] => Err(EvalError::Internal(format!("type() of {} is not modelled", other.type_name()))),
        _ => Err(EvalError::Internal("type() takes exactly one argument".into())),
    }
}

fn eval_enter(args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [Value::ContextManager(state)] => {
            state.borrow_mut().entered = true;
            Ok(Value::ContextManager(state.clone()))
        }
        [other] => Err(EvalError::Internal(format!("{} is not a context manager", other.type_name()))),
        _ => Err(EvalError::Internal("__enter__() takes exactly one argument".into())),
    }
}

fn eval_exit(args: &[Value]) -> Result<Value, EvalError> {
    let [ctx, ..] = args else {
        return Err(EvalError::Internal("__exit__() needs a context manager".into()));
    };
    let Value::ContextManager(state) = ctx else {
        return Err(EvalError::Internal("__exit__() needs a context manager".into()));
    };
    let mut state = state.borrow_mut();
    state.exited = true;
    Ok(Value::Bool(state.suppress))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NoopTracer;
    use crate::strategy::{DefaultStrategy, StaticResolver};

    fn compile_and_run(src: &str, externals: Vec<(&str, Box<dyn ExternalFunction>)>, args: Vec<Value>) -> Result<Value, EvalError> {
        // None of the fixtures below call a genuine split marker, so the
        // resolver stays empty: every external here (e.g. `mark(...)`) is an
        // ordinary side-effecting call, not wrapped in `__Suspend`.
        let def = crate::parse::parse_function(src).expect("parses");
        let strategy = DefaultStrategy;
        let resolver = StaticResolver::default();
        let mut tracer = NoopTracer;
        let compiled = crate::splitter::compile(def, &strategy, &resolver, &mut tracer).expect("compiles");
        let mut program = Program::new(compiled.definitions);
        for (name, external) in externals {
            program.externals.insert(name.to_owned(), external);
        }
        let mut call_args = args;
        call_args.push(Value::None); // the ambient `continuation` kwonly, unset
        program.call_by_name(&compiled.entry, call_args)?.into_value().ok_or_else(|| EvalError::Internal("expected a value, got a suspension".into()))
    }

    #[test]
    fn straight_line_addition_runs_without_any_external() {
        let v = compile_and_run("def f(x, y):\n    return x + y\n", vec![], vec![Value::Int(3), Value::Int(4)]).unwrap();
        assert_eq!(v, Value::Int(7));
    }

    #[test]
    fn division_by_zero_raises() {
        let err = compile_and_run("def f(n, d):\n    return n / d\n", vec![], vec![Value::Int(1), Value::Int(0)]).unwrap_err();
        assert!(matches!(err, EvalError::Raised(e) if e.0.class == ExcClass::ZeroDivisionError));
    }

    #[test]
    fn try_except_finally_sets_the_flag_on_every_path() {
        let src = "def f(n, d):\n    try:\n        n = n / d\n        return n\n    except ZeroDivisionError:\n        return -1\n    finally:\n        mark('fin')\n";
        let marked = std::rc::Rc::new(std::cell::RefCell::new(false));
        let marked2 = marked.clone();
        let mark = SideEffect(move |_args: &[Value]| {
            *marked2.borrow_mut() = true;
            Ok(Value::None)
        });
        let v = compile_and_run(src, vec![("mark", Box::new(mark))], vec![Value::Int(14), Value::Int(7)]).unwrap();
        assert_eq!(v, Value::Float(2.0));
        assert!(*marked.borrow());
    }

    #[test]
    fn try_except_catches_zero_division() {
        let src = "def f(n, d):\n    try:\n        n = n / d\n        return n\n    except ZeroDivisionError:\n        return -1\n    finally:\n        mark('fin')\n";
        let mark = SideEffect(|_args: &[Value]| Ok(Value::None));
        let v = compile_and_run(src, vec![("mark", Box::new(mark))], vec![Value::Int(3), Value::Int(0)]).unwrap();
        assert_eq!(v, Value::Int(-1));
    }
}
