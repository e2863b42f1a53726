//! The evaluator's dynamic value type (§3 "Value / Program / Evaluator").
//!
//! The reference implementation hands the rewritten AST straight back to
//! the host Python interpreter, so it never needs its own value
//! representation. A Rust port has no host to borrow semantics from and
//! must carry a small value type of its own — scoped tightly to what the
//! supported dialect (§1 Non-goals) actually needs: numbers, strings,
//! booleans, `None`, mutable lists (for the `for`-loop and `list.pop()`
//! scenarios), a handful of builtin exception classes, and an opaque
//! context-manager stand-in for `with`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The small, closed set of exception classes the evaluator understands.
/// `StopIteration` doubles as the sentinel default value the lowered `for`
/// loop passes to `next(iterator, StopIteration)` (§4.4), matching the
/// reference implementation's use of the class object itself as a sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum ExcClass {
    BaseException,
    Exception,
    StopIteration,
    ZeroDivisionError,
    TypeError,
    ValueError,
}

impl ExcClass {
    /// `except` clauses match on class identity or on `BaseException`/
    /// `Exception` catching anything (the dialect does not model full MRO).
    pub fn matches(self, caught: ExcClass) -> bool {
        caught == ExcClass::BaseException || caught == ExcClass::Exception || self == caught
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PyExceptionValue {
    pub class: ExcClass,
    pub message: String,
}

impl fmt::Display for PyExceptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class, self.message)
    }
}

/// A raised-and-propagating exception. Distinct from [`Value::Exception`]
/// (an exception instance bound to a `except ... as e` name) the same way
/// Python distinguishes an in-flight exception from the object an `except`
/// clause binds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PyException(pub Rc<PyExceptionValue>);

impl PyException {
    pub fn new(class: ExcClass, message: impl Into<String>) -> Self {
        PyException(Rc::new(PyExceptionValue { class, message: message.into() }))
    }
}

impl fmt::Display for PyException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque context-manager stand-in for `with` (§4.4). Real classes are a
/// Non-goal; this is just enough state to prove the `__enter__`/`__exit__`
/// lowering round-trips, including the finally-on-exception path.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ContextManagerState {
    pub entered: bool,
    pub exited: bool,
    pub suppress: bool,
}

/// A partially applied continuation: the name of a generated continuation
/// function plus its already-bound live-in arguments, awaiting exactly one
/// more argument (the value produced at the preceding split point). This is
/// the Rust stand-in for a Python closure over the live-in set (§9 "Closures
/// over live variables become explicit structs").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Continuation {
    pub name: String,
    pub bound: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Rc<RefCell<Vec<Value>>>),
    #[serde(skip)]
    Iter(Rc<RefCell<VecDeque<Value>>>),
    ExcClassRef(ExcClass),
    Exception(PyException),
    #[serde(skip)]
    ContextManager(Rc<RefCell<ContextManagerState>>),
    /// A bound continuation value, produced by evaluating the synthesised
    /// "make continuation" expression and passed as the `continuation`
    /// keyword argument of a split call (§3 "Suspension value").
    Continuation(Continuation),
}

impl Default for Value {
    fn default() -> Self {
        Value::None
    }
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn context_manager() -> Value {
        Value::ContextManager(Rc::new(RefCell::new(ContextManagerState::default())))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(xs) => !xs.borrow().is_empty(),
            Value::Iter(_)
            | Value::ExcClassRef(_)
            | Value::Exception(_)
            | Value::ContextManager(_)
            | Value::Continuation(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Iter(_) => "iterator",
            Value::ExcClassRef(_) => "type",
            Value::Exception(_) => "Exception",
            Value::ContextManager(_) => "contextmanager",
            Value::Continuation(_) => "continuation",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => *a.borrow() == *b.borrow(),
            (Value::ExcClassRef(a), Value::ExcClassRef(b)) => a == b,
            _ => false,
        }
    }
}

/// Arguments bound to a suspension or a continuation call: positional then
/// keyword, matching `FunBite(func, *args, **kwargs)` (§3).
pub type Kwargs = IndexMap<String, Value>;
