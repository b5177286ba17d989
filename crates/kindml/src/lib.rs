//! A small statically typed functional language: Hindley-Milner inference with
//! record kinds, algebraic variants, references, and a tree-walking evaluator.

use std::{panic, thread};

use log::debug;

pub mod config;
pub mod diagnostics;
pub mod elaborated;
pub mod lexer;
pub mod runtime;
pub mod surface;
pub mod typecheck;

pub use crate::config::{Config, ConfigError, Exhaustiveness};
pub use crate::diagnostics::{
    render_diagnostics, Diagnostic, DiagnosticLabel, DiagnosticSeverity, Position, Range, Span,
};
pub use crate::lexer::{lex, LexError};
pub use crate::runtime::{
    evaluate, evaluate_with_fuel, evaluate_with_limits, format_value,
    initial_runtime_environment, EvalError, EvalLimits, Value, DEFAULT_MAX_DEPTH,
};
pub use crate::surface::{parse_program, ParseError};
pub use crate::typecheck::{
    check, check_program, check_with_options, initial_environments, CheckOptions, Checked,
    TypecheckError, TypecheckWarning,
};

use crate::typecheck::BaseType;

/// The evaluated program did not produce a string.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("illegal output: {found}")]
pub struct DisplayError {
    pub found: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Typecheck(#[from] TypecheckError),
    #[error("the output is not string: it has type {found}")]
    OutputNotString { found: String },
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Display(#[from] DisplayError),
}

impl Error {
    /// The pipeline stage that failed, as shown by the command line.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Lex(_) => "LEXING",
            Error::Parse(_) => "PARSING",
            Error::Typecheck(_) | Error::OutputNotString { .. } => "TYPECHECK",
            Error::Eval(_) => "EVALUATION",
            Error::Display(_) => "DISPLAY",
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let (code, range) = match self {
            Error::Typecheck(err) => return err.to_diagnostic(),
            Error::Lex(err) => ("E1001", err.range),
            Error::Parse(err) => ("E1002", err.range),
            Error::OutputNotString { .. } => ("E2100", Range::dummy("program")),
            Error::Eval(_) => ("E3001", Range::dummy("evaluation")),
            Error::Display(_) => ("E3002", Range::dummy("evaluation")),
        };
        Diagnostic {
            code: code.to_string(),
            severity: DiagnosticSeverity::Error,
            message: self.to_string(),
            range,
            labels: Vec::new(),
        }
    }
}

/// Stack reserved for the pipeline thread. Parser nesting and
/// [`DEFAULT_MAX_DEPTH`] evaluation levels both fit well inside it.
const PIPELINE_STACK_SIZE: usize = 512 * 1024 * 1024;

/// Runs `task` on a thread with a [`PIPELINE_STACK_SIZE`] stack, or on the
/// calling thread when no such thread can be spawned.
fn on_pipeline_stack<T: Send>(task: impl Fn() -> T + Sync) -> T {
    thread::scope(|scope| {
        let spawned = thread::Builder::new()
            .name("kindml-pipeline".to_string())
            .stack_size(PIPELINE_STACK_SIZE)
            .spawn_scoped(scope, || task());
        match spawned {
            Ok(handle) => handle
                .join()
                .unwrap_or_else(|payload| panic::resume_unwind(payload)),
            Err(err) => {
                debug!("running on the calling thread: {err}");
                task()
            }
        }
    })
}

/// Lexes, parses and typechecks `source` against the initial environments.
pub fn check_source(source: &str, config: &Config) -> Result<Checked, Error> {
    on_pipeline_stack(|| check_on_current_stack(source, config))
}

fn check_on_current_stack(source: &str, config: &Config) -> Result<Checked, Error> {
    let tokens = lex(source)?;
    debug!("lexed {} tokens", tokens.len());
    let program = parse_program(tokens)?;
    debug!(
        "parsed program with {} type declaration group(s)",
        program.type_groups.len()
    );
    let envs = initial_environments();
    let checked = check_program(
        &envs.variants,
        &envs.kinds,
        &envs.types,
        &program,
        CheckOptions::from(config),
    )?;
    debug!("program has type {}", checked.ty);
    Ok(checked)
}

/// Runs a program whose value must be a string, returning that string.
pub fn run(source: &str) -> Result<String, Error> {
    run_with_config(source, &Config::default())
}

pub fn run_with_config(source: &str, config: &Config) -> Result<String, Error> {
    on_pipeline_stack(|| run_on_current_stack(source, config))
}

fn run_on_current_stack(source: &str, config: &Config) -> Result<String, Error> {
    let checked = check_on_current_stack(source, config)?;
    if !checked.ty.expand_synonyms().is_base(BaseType::String) {
        return Err(Error::OutputNotString {
            found: checked.ty.to_string(),
        });
    }
    let env = initial_runtime_environment();
    let limits = EvalLimits {
        fuel: config.fuel,
        max_depth: config.max_depth.unwrap_or(DEFAULT_MAX_DEPTH),
    };
    let value = evaluate_with_limits(&env, &checked.expr, limits)?;
    debug!("evaluated to {}", format_value(&value));
    match value {
        Value::String(text) => Ok(text),
        other => Err(DisplayError {
            found: format_value(&other),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_string_programs() {
        assert_eq!(run("\"a\" ^ \"b\"").unwrap(), "ab");
    }

    #[test]
    fn rejects_non_string_output_before_evaluation() {
        let err = run("1 + 2").unwrap_err();
        assert_eq!(err.stage(), "TYPECHECK");
        assert!(err.to_string().contains("the output is not string"));
    }

    #[test]
    fn string_synonyms_are_accepted_as_output() {
        assert_eq!(run("type name = string in (\"bob\" : name)").unwrap(), "bob");
    }

    #[test]
    fn stages_are_reported() {
        assert_eq!(run("\"unterminated").unwrap_err().stage(), "LEXING");
        assert_eq!(run("let in").unwrap_err().stage(), "PARSING");
        assert_eq!(run("string_of_int (1 / 0)").unwrap_err().stage(), "EVALUATION");
    }

    #[test]
    fn fuel_bounds_evaluation() {
        let config = Config {
            fuel: Some(1_000),
            ..Config::default()
        };
        let source = "let rec loop x = loop x in (loop 0 : string)";
        let err = run_with_config(source, &config).unwrap_err();
        assert_eq!(err, Error::Eval(EvalError::FuelExhausted));
    }

    #[test]
    fn deep_recursion_is_an_evaluation_error() {
        let count = |n: u32| {
            format!(
                "let rec count n = if n == 0 then 0 else 1 + count (n - 1) in \
                 string_of_int (count {n})"
            )
        };
        assert_eq!(run(&count(3000)).unwrap(), "3000");

        let err = run(&count(1_000_000)).unwrap_err();
        assert_eq!(err, Error::Eval(EvalError::StackDepthExceeded(DEFAULT_MAX_DEPTH)));
        assert_eq!(err.stage(), "EVALUATION");

        let config = Config {
            max_depth: Some(100),
            ..Config::default()
        };
        let err = run_with_config(&count(50), &config).unwrap_err();
        assert_eq!(err, Error::Eval(EvalError::StackDepthExceeded(100)));
    }

    #[test]
    fn diagnostics_carry_codes() {
        let diagnostic = run("1 + 2").unwrap_err().to_diagnostic();
        assert_eq!(diagnostic.code, "E2100");
        let diagnostic = run("x").unwrap_err().to_diagnostic();
        assert_eq!(diagnostic.code, "E2001");
    }
}
