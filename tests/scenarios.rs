//! End-to-end coverage of the concrete scenarios this engine is built
//! against: a handful of small functions, each compiled, run on a
//! trampoline against a real `checkpoint()` split, and checked against the
//! value the untransformed body would have produced.
//!
//! `checkpoint(...)` below is always registered as a genuine split marker
//! (via `StaticResolver`), never a plain side-effecting call, so every test
//! here actually exercises the splitter's cut-and-resume machinery rather
//! than just the evaluator's straight-line semantics.

use continuator::{
    CompiledFunction, DefaultStrategy, EvalError, ExternalEffect, ExternalFunction, NoopTracer, Program,
    StaticResolver, Trampoline, Value,
};

fn compile(src: &str, markers: &[&str]) -> CompiledFunction {
    let def = continuator::parse::parse_function(src).expect("parses");
    let strategy = DefaultStrategy;
    let resolver = StaticResolver::new(markers.iter().copied());
    let mut tracer = NoopTracer;
    continuator::splitter::compile(def, &strategy, &resolver, &mut tracer).expect("compiles")
}

/// Runs `compiled` to completion with `args` as the entry point's leading
/// positional arguments (the trailing `continuation=None` kwonly is
/// appended automatically).
fn run(program: &Program, entry: &str, mut args: Vec<Value>) -> Result<Value, EvalError> {
    args.push(Value::None);
    let start = program.call_by_name(entry, args)?;
    Trampoline::new(program, start).run(&mut NoopTracer)
}

/// A checkpoint that passes through transparently: resumes the bound
/// continuation with whatever its own first argument was (or `None` if it
/// took none), never short-circuiting.
fn identity_checkpoint() -> continuator::SideEffect<impl Fn(&[Value]) -> Result<Value, continuator::PyException>> {
    continuator::SideEffect(|args: &[Value]| Ok(args.first().cloned().unwrap_or(Value::None)))
}

// 1. Three bare checkpoints in a row, none of them carrying a meaningful
// return value back into the computation.
#[test]
fn scenario_1_three_checkpoints_in_a_row() {
    let src = "def f(x, y):\n    \
               checkpoint()\n    \
               a = x * x\n    \
               checkpoint(a)\n    \
               b = y * y\n    \
               checkpoint(b)\n    \
               return a + b\n";
    let compiled = compile(src, &["checkpoint"]);
    let mut program = Program::new(compiled.definitions);
    program.register("checkpoint", identity_checkpoint());

    let result = run(&program, &compiled.entry, vec![Value::Int(3), Value::Int(4)]).unwrap();
    assert_eq!(result, Value::Int(25));
}

// 2. A checkpoint nested inside an arithmetic expression, whose own return
// value feeds the rest of the expression — and a variant where the
// checkpoint short-circuits the whole call instead.
#[test]
fn scenario_2_checkpoint_inside_an_expression_resumes_with_a_value() {
    let src = "def f(x):\n    \
               w = 1 + checkpoint(x) + 2\n    \
               return w * w\n";
    let compiled = compile(src, &["checkpoint"]);
    let mut program = Program::new(compiled.definitions);
    program.register("checkpoint", identity_checkpoint());

    let result = run(&program, &compiled.entry, vec![Value::Int(4)]).unwrap();
    assert_eq!(result, Value::Int(49));
}

#[test]
fn scenario_2_a_split_marker_may_short_circuit_the_whole_computation() {
    struct ImmediateReturn(i64);
    impl ExternalFunction for ImmediateReturn {
        fn call(&self, _args: &[Value], _kwargs: &continuator::eval::Kwargs) -> Result<ExternalEffect, continuator::PyException> {
            Ok(ExternalEffect::Immediate(Value::Int(self.0)))
        }
    }

    let src = "def f(x):\n    \
               w = 1 + checkpoint(x) + 2\n    \
               return w * w\n";
    let compiled = compile(src, &["checkpoint"]);
    let mut program = Program::new(compiled.definitions);
    program.register("checkpoint", ImmediateReturn(666));

    let result = run(&program, &compiled.entry, vec![Value::Int(4)]).unwrap();
    assert_eq!(result, Value::Int(666));
}

// 3. A checkpoint inside a `while` loop driven by list truthiness, with a
// method call (`list.pop()`) accumulating the result.
#[test]
fn scenario_3_checkpoint_inside_a_while_loop_over_a_list() {
    let src = "def f(xs):\n    \
               v = 0\n    \
               while xs:\n        \
               checkpoint()\n        \
               v = v + xs.pop()\n    \
               return v\n";
    let compiled = compile(src, &["checkpoint"]);
    let mut program = Program::new(compiled.definitions);
    program.register("checkpoint", identity_checkpoint());

    let xs = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]);
    let result = run(&program, &compiled.entry, vec![xs]).unwrap();
    assert_eq!(result, Value::Int(10));
}

// 4. A checkpoint inside a `for` loop, with `continue`/`break` driven by an
// `if`/`else` after the split.
#[test]
fn scenario_4_checkpoint_inside_a_for_loop_with_continue_and_break() {
    struct Range;
    impl ExternalFunction for Range {
        fn call(&self, args: &[Value], _kwargs: &continuator::eval::Kwargs) -> Result<ExternalEffect, continuator::PyException> {
            let Some(Value::Int(n)) = args.first() else {
                return Err(continuator::PyException::new(continuator::ExcClass::TypeError, "range() expects an int".into()));
            };
            let items = (0..*n).map(Value::Int).collect();
            Ok(ExternalEffect::Resume(Value::list(items)))
        }
    }

    let src = "def f(n):\n    \
               r = 0\n    \
               for i in range(n):\n        \
               r = r + i\n        \
               checkpoint()\n        \
               if i < 5:\n            \
               continue\n        \
               else:\n            \
               break\n    \
               return r\n";
    let compiled = compile(src, &["checkpoint"]);
    let mut program = Program::new(compiled.definitions);
    program.register("checkpoint", identity_checkpoint());
    program.register("range", Range);

    let result = run(&program, &compiled.entry, vec![Value::Int(10)]).unwrap();
    assert_eq!(result, Value::Int(15));
}

// 5. A checkpoint inside a `try`, with `except`/`finally` observing exactly
// the same semantics as the untransformed body across four distinct paths.
#[test]
fn scenario_5_exception_handling_around_a_split() {
    let src = "def f(n, d):\n    \
               try:\n        \
               if n > 0:\n            \
               checkpoint()\n            \
               n = n / d\n        \
               return n\n    \
               except ZeroDivisionError:\n        \
               return -1\n    \
               finally:\n        \
               mark('fin')\n";
    let compiled = compile(src, &["checkpoint"]);

    let run_case = |n: i64, d: Value| -> (Result<Value, EvalError>, std::rc::Rc<std::cell::RefCell<bool>>) {
        let mut program = Program::new(compiled.definitions.clone());
        program.register("checkpoint", identity_checkpoint());
        let marked = std::rc::Rc::new(std::cell::RefCell::new(false));
        let marked2 = marked.clone();
        program.register(
            "mark",
            continuator::SideEffect(move |_args: &[Value]| {
                *marked2.borrow_mut() = true;
                Ok(Value::None)
            }),
        );
        let result = run(&program, &compiled.entry, vec![Value::Int(n), d]);
        (result, marked)
    };

    let (result, marked) = run_case(14, Value::Int(7));
    assert_eq!(result.unwrap(), Value::Int(2));
    assert!(*marked.borrow(), "finally must run on the clean path");

    let (result, marked) = run_case(3, Value::Int(0));
    assert_eq!(result.unwrap(), Value::Int(-1));
    assert!(*marked.borrow(), "finally must run when the except clause fires");

    let (result, marked) = run_case(-9, Value::Int(0));
    assert_eq!(result.unwrap(), Value::Int(-9));
    assert!(*marked.borrow(), "finally must run when the if-guarded division never executes");

    let (result, marked) = run_case(3, Value::Str("wow".to_owned()));
    let err = result.unwrap_err();
    assert!(matches!(err, EvalError::Raised(e) if e.0.class == continuator::ExcClass::TypeError));
    assert!(*marked.borrow(), "finally must run even when the exception escapes uncaught");
}

// 6. A generator-shaped body, iterated lazily, and resumed mid-flight
// through a checkpoint-dump/load round trip (§8 round-trip law).
#[test]
fn scenario_6_generator_yields_squares_and_resumes_after_checkpointing() {
    let src = "def g():\n    \
               i = 0\n    \
               while True:\n        \
               yield i * i\n        \
               i = i + 1\n";
    let compiled = compile(src, &[]);
    let program = Program::new(compiled.definitions);

    let start = program.call_by_name(&compiled.entry, vec![Value::None]).unwrap();
    let mut gen = continuator::Generator::new(&program, start);

    let first_three: Vec<Value> = (0..3).map(|_| gen.next().unwrap()).collect();
    assert_eq!(first_three, vec![Value::Int(0), Value::Int(1), Value::Int(4)]);

    let pending = gen.pending().expect("generator still has a pending suspension");
    let bytes = continuator::checkpoint::dump(&pending).expect("encodes");
    let restored = continuator::checkpoint::load(&bytes).expect("decodes");

    let mut resumed = continuator::Generator::new(&program, continuator::Outcome::Suspend(restored));
    let next_seven: Vec<Value> = (0..7).map(|_| resumed.next().unwrap()).collect();
    assert_eq!(
        next_seven,
        vec![9, 16, 25, 36, 49, 64, 81].into_iter().map(Value::Int).collect::<Vec<_>>()
    );

    // Running the whole ten-value prefix without ever checkpointing produces
    // the identical sequence (the round-trip law from §8).
    let start2 = program.call_by_name(&compiled.entry, vec![Value::None]).unwrap();
    let straight: Vec<Value> = continuator::Generator::new(&program, start2).take(10).collect();
    let expected: Vec<Value> = vec![0, 1, 4, 9, 16, 25, 36, 49, 64, 81].into_iter().map(Value::Int).collect();
    assert_eq!(straight, expected);
}
