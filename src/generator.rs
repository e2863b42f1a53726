//! The generator adapter (§4.6 "wrap", §8 "Generator form"): drives a
//! [`Trampoline`] as a Rust [`Iterator`] rather than all the way to a final
//! value.
//!
//! A compiled body that contains a `yield` is generator-shaped: every
//! `Trampoline::step` either reifies an ordinary split in-process or
//! surfaces a [`StepResult::Yielded`] value, and the caller decides whether
//! and what to send back before resuming. [`Generator`] is the thin
//! wrapper that turns that shape into the iteration protocol callers
//! already know — grounded on the teacher crate's pattern of a dedicated
//! adapter type sitting on top of its general resumption loop (`Runner`'s
//! own `start`/`run` pair) rather than exposing the raw step machinery
//! directly.

use crate::diagnostics::{NoopTracer, Tracer};
use crate::eval::{EvalError, Outcome, Program};
use crate::suspension::Suspension;
use crate::trampoline::{StepResult, Trampoline};
use crate::value::Value;

/// Iterates a generator-shaped computation (§8 "Generator form"). `T` is
/// the tracer driven alongside it; defaults to [`NoopTracer`] for the
/// common case, same as [`crate::splitter::compile`]'s own default usage.
pub struct Generator<'p, T: Tracer = NoopTracer> {
    trampoline: Trampoline<'p>,
    tracer: T,
    finished: bool,
    last_error: Option<EvalError>,
}

impl<'p> Generator<'p, NoopTracer> {
    /// Wraps a freshly-started [`Outcome`] — typically
    /// `program.call_by_name(entry, args)` on a compiled generator body —
    /// for plain iteration with no diagnostics.
    pub fn new(program: &'p Program, start: Outcome) -> Self {
        Generator { trampoline: Trampoline::new(program, start), tracer: NoopTracer, finished: false, last_error: None }
    }
}

impl<'p, T: Tracer> Generator<'p, T> {
    /// Same as [`Self::new`] but with a caller-supplied tracer, for
    /// observing which continuation produced each yielded value.
    pub fn with_tracer(program: &'p Program, start: Outcome, tracer: T) -> Self {
        Generator { trampoline: Trampoline::new(program, start), tracer, finished: false, last_error: None }
    }

    /// Resumes a generator from a [`Suspension`] recovered through
    /// [`crate::checkpoint::load`] (§8 "serialise after three pulls and
    /// resume" round-trip law).
    pub fn resume_from(program: &'p Program, suspension: Suspension, tracer: T) -> Self {
        Generator { trampoline: Trampoline::from_suspension(program, suspension), tracer, finished: false, last_error: None }
    }

    /// The currently pending [`Suspension`], suitable for
    /// [`crate::checkpoint::dump`]. `None` once the generator is finished.
    pub fn pending(&self) -> Option<Suspension> {
        self.trampoline.pending()
    }

    /// Resumes the generator, feeding `sent` back in as the value of the
    /// preceding `yield` expression — the Rust stand-in for Python's
    /// `Generator.send`. `None`'s its way out once the computation reaches
    /// its final value or raises; call [`Self::take_error`] afterwards to
    /// distinguish the two.
    pub fn send(&mut self, sent: Value) -> Option<Value> {
        if self.finished {
            return None;
        }
        loop {
            match self.trampoline.step(sent.clone(), &mut self.tracer) {
                Ok(StepResult::Yielded(v)) => return Some(v),
                Ok(StepResult::Done(_)) => {
                    self.finished = true;
                    return None;
                }
                Ok(StepResult::Suspended) => continue,
                Err(e) => {
                    self.finished = true;
                    self.last_error = Some(e);
                    return None;
                }
            }
        }
    }

    /// Whether the generator has produced its last value (either by
    /// completing normally or by raising — see [`Self::take_error`]).
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Takes the error that ended iteration early, if any. Returns `None`
    /// both before the generator is finished and after a clean exhaustion.
    pub fn take_error(&mut self) -> Option<EvalError> {
        self.last_error.take()
    }
}

impl<'p, T: Tracer> Iterator for Generator<'p, T> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.send(Value::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{Program, SideEffect};
    use crate::strategy::{DefaultStrategy, StaticResolver};

    #[test]
    fn iterating_a_generator_collects_every_yielded_value() {
        let src = "def counter(n):\n    i = 0\n    while i < n:\n        yield i\n        i = i + 1\n    return i\n";
        let def = crate::parse::parse_function(src).expect("parses");
        let strategy = DefaultStrategy;
        let resolver = StaticResolver::default();
        let mut tracer = NoopTracer;
        let compiled = crate::splitter::compile(def, &strategy, &resolver, &mut tracer).expect("compiles");
        let program = Program::new(compiled.definitions);

        let start = program.call_by_name(&compiled.entry, vec![Value::Int(3), Value::None]).unwrap();
        let gen = Generator::new(&program, start);
        let values: Vec<Value> = gen.collect();
        assert_eq!(values, vec![Value::Int(0), Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn a_generator_mixed_with_an_ordinary_split_still_yields_in_order() {
        let src = "def g(n):\n    checkpoint(n)\n    yield n\n    return n\n";
        let def = crate::parse::parse_function(src).expect("parses");
        let strategy = DefaultStrategy;
        let resolver = StaticResolver::new(["checkpoint"]);
        let mut tracer = NoopTracer;
        let compiled = crate::splitter::compile(def, &strategy, &resolver, &mut tracer).expect("compiles");
        let mut program = Program::new(compiled.definitions);
        program.register("checkpoint", SideEffect(|_args: &[Value]| Ok(Value::None)));

        let start = program.call_by_name(&compiled.entry, vec![Value::Int(7), Value::None]).unwrap();
        let mut gen = Generator::new(&program, start);
        assert_eq!(gen.next(), Some(Value::Int(7)));
        assert_eq!(gen.next(), None);
        assert!(gen.is_finished());
        assert!(gen.take_error().is_none());
    }
}
