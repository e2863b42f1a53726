//! Suspension values (§3, §6) — the reified "pending tail call" the
//! trampoline consumes.
//!
//! Grounded on the reference implementation's `FunBite`/`FunBiteYield`
//! tagged records. Both variants derive `serde::Serialize`/`Deserialize` so
//! that, when every `Value` reachable from them is itself serialisable, a
//! mid-flight `Suspension` round-trips through [`crate::checkpoint`] the
//! same way the teacher crate's `Runner::dump`/`load` round-trips a VM
//! snapshot through `postcard`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::{Continuation, Value};

/// Arguments bound to a pending call to a split-marker builtin: positional
/// then keyword (the `continuation` keyword is always present among
/// `kwargs` for a split produced by `Strategy::transform`).
pub type Kwargs = IndexMap<String, Value>;

/// A reified tail call, produced whenever evaluation reaches the `Return`
/// statement at the end of a generated continuation (§4.5 "Continuation
/// construction").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Suspension {
    /// A pending call to a split-marker builtin (`is_split` matched a
    /// `Call`). `callee` names the builtin the strategy resolved through
    /// the `NameResolver`; `kwargs` always carries `"continuation"` bound
    /// to a [`Value::Continuation`].
    Call { callee: String, args: Vec<Value>, kwargs: Kwargs },
    /// A pending `yield`: `value` is what the generator produced, and
    /// `continuation` is what must be resumed with whatever is sent back
    /// in (or `Value::None` for a plain `next()`).
    Yield { value: Value, continuation: Continuation },
}

impl Suspension {
    pub fn call(callee: impl Into<String>, args: Vec<Value>, kwargs: Kwargs) -> Self {
        Suspension::Call { callee: callee.into(), args, kwargs }
    }

    pub fn yield_(value: Value, continuation: Continuation) -> Self {
        Suspension::Yield { value, continuation }
    }
}
