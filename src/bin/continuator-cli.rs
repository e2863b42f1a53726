//! Command-line driver: compiles one Python function into its continuation
//! table and runs it to completion, prompting on stdin for the return value
//! of every call to a designated split marker.
//!
//! Grounded on the teacher crate's `ouros-repl` binary: file-execution mode
//! reads a whole source file up front (no interactive-input mode here,
//! since a single function body has no REPL-style incremental-snippet
//! concept to offer), and the split-marker resume loop mirrors
//! `execute_snippet`'s own loop over `ReplProgress::FunctionCall`, just
//! collapsed into a single synchronous [`ExternalFunction`] since this
//! engine's externals are plain function calls rather than a session
//! protocol.

use std::io::{self, Write};
use std::process::ExitCode;

use continuator::{CompileError, DefaultStrategy, EvalError, NoopTracer, Program, StaticResolver, Trampoline, Value};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: continuator-cli <path.py> [--marker NAME]... [-- ARG]...");
        return ExitCode::FAILURE;
    };

    let (markers, call_args) = parse_cli_args(&args[2..]);

    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error reading {path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&source, &markers, call_args) {
        Ok(value) => {
            println!("{value:?}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn parse_cli_args(rest: &[String]) -> (Vec<String>, Vec<String>) {
    let mut markers = Vec::new();
    let mut call_args = Vec::new();
    let mut i = 0;
    while i < rest.len() {
        if rest[i] == "--marker" {
            if let Some(name) = rest.get(i + 1) {
                markers.push(name.clone());
            }
            i += 2;
        } else if rest[i] == "--" {
            call_args.extend(rest[i + 1..].iter().cloned());
            break;
        } else {
            call_args.push(rest[i].clone());
            i += 1;
        }
    }
    (markers, call_args)
}

#[derive(Debug)]
enum CliError {
    Compile(CompileError),
    Eval(EvalError),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compile(e) => write!(f, "compile error: {e}"),
            Self::Eval(e) => write!(f, "runtime error: {e}"),
        }
    }
}

impl From<CompileError> for CliError {
    fn from(e: CompileError) -> Self {
        CliError::Compile(e)
    }
}

impl From<EvalError> for CliError {
    fn from(e: EvalError) -> Self {
        CliError::Eval(e)
    }
}

fn run(source: &str, markers: &[String], call_args: Vec<String>) -> Result<Value, CliError> {
    let strategy = DefaultStrategy;
    let resolver = StaticResolver::new(markers.iter().cloned());
    let mut tracer = NoopTracer;
    let compiled = continuator::compile_source(source, &strategy, &resolver, &mut tracer)?;

    let mut program = Program::new(compiled.definitions);
    for marker in markers {
        program.register(marker.clone(), InteractiveExternal { name: marker.clone() });
    }

    let mut args: Vec<Value> = call_args.iter().map(|raw| parse_value(raw)).collect();
    args.push(Value::None); // the ambient `continuation` kwonly, unset at the entry call

    let start = program.call_by_name(&compiled.entry, args)?;
    let mut trampoline = Trampoline::new(&program, start);
    Ok(trampoline.run(&mut tracer)?)
}

/// Resumes every split it is asked to drive with a value read from stdin,
/// mirroring `ouros-repl`'s `prompt_return_value` loop.
struct InteractiveExternal {
    name: String,
}

impl continuator::ExternalFunction for InteractiveExternal {
    fn call(&self, args: &[Value], kwargs: &continuator::eval::Kwargs) -> Result<continuator::ExternalEffect, continuator::PyException> {
        println!("split at `{}`: args={args:?} kwargs={kwargs:?}", self.name);
        let raw = read_line("resume with> ").unwrap_or_default();
        Ok(continuator::ExternalEffect::Resume(parse_value(&raw)))
    }
}

/// Parses a user-entered resume value. Supported forms mirror the teacher
/// binary's `parse_return_value`: `None`/`True`/`False`, quoted strings,
/// integer and float literals, falling back to a bare string.
fn parse_value(raw: &str) -> Value {
    let value = raw.trim();
    match value {
        "" | "None" => Value::None,
        "True" => Value::Bool(true),
        "False" => Value::Bool(false),
        _ => {
            if (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
                || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
            {
                return Value::Str(value[1..value.len() - 1].to_owned());
            }
            if let Ok(i) = value.parse::<i64>() {
                return Value::Int(i);
            }
            if let Ok(f) = value.parse::<f64>() {
                return Value::Float(f);
            }
            if let Ok(v) = serde_json::from_str::<Value>(value) {
                return v;
            }
            Value::Str(value.to_owned())
        }
    }
}

fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    if io::stdout().flush().is_err() {
        return None;
    }
    let mut input = String::new();
    let read = io::stdin().read_line(&mut input).ok()?;
    if read == 0 {
        return None;
    }
    Some(input.trim_end_matches(['\r', '\n']).to_owned())
}
