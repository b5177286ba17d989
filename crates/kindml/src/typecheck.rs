use crate::config::{Config, Exhaustiveness};
use crate::diagnostics::{Diagnostic, DiagnosticLabel, DiagnosticSeverity, Range};
use crate::elaborated::CoreExpr;
use crate::surface::{Expr, Program};

mod builtins;
mod checker;
mod exhaustive;
pub mod kind_env;
#[cfg(test)]
mod prop_tests;
pub mod subst;
pub mod types;
pub mod variant_env;

pub use self::builtins::{
    initial_environments, initial_type_environment, initial_variant_environment,
    InitialEnvironments, PRIMITIVES,
};
pub use self::kind_env::{KindEnv, KindEnvError};
pub use self::subst::{ContradictionError, Reason, Substitution};
pub use self::types::{BaseType, Kind, Type, TypeMain, TypePrinter, TypeVarGen, TypeVarId};
pub use self::variant_env::{ConstructorInfo, TypeDefinition, VariantEnv, VariantEnvError};

use self::checker::TypeChecker;

/// Variable bindings visible to the checker. Extending returns a new map.
pub type TypeEnv = im::HashMap<String, Type>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypecheckError {
    #[error("at {range}: unbound variable '{name}'")]
    UnboundVariable { name: String, range: Range },
    #[error("at {range}: {source}")]
    Contradiction {
        range: Range,
        source: ContradictionError,
    },
    #[error(transparent)]
    VariantEnv(#[from] VariantEnvError),
    #[error("internal error: {0}")]
    KindEnv(#[from] KindEnvError),
    #[error("at {range}: constructor '{name}' expects {expected} argument(s) but is given {found}")]
    ConstructorArity {
        name: String,
        expected: usize,
        found: usize,
        range: Range,
    },
    #[error("at {range}: '{name}' is bound more than once")]
    DuplicateBinding { name: String, range: Range },
    #[error("at {range}: field '{name}' is given more than once")]
    DuplicateField { name: String, range: Range },
    #[error("at {range}: this pattern-matching is not exhaustive; for example, {missing} is not matched")]
    NonExhaustive { missing: String, range: Range },
    #[error("at {range}: the right-hand side of 'let rec {name}' must be a function")]
    RecNotFunction { name: String, range: Range },
    #[error("at {range}: the type variable '{name} is not a parameter of this declaration")]
    UnboundTypeParameter { name: String, range: Range },
}

impl TypecheckError {
    pub fn range(&self) -> Range {
        match self {
            TypecheckError::VariantEnv(err) => err.range(),
            TypecheckError::KindEnv(_) => Range::dummy("kind environment"),
            TypecheckError::UnboundVariable { range, .. }
            | TypecheckError::Contradiction { range, .. }
            | TypecheckError::ConstructorArity { range, .. }
            | TypecheckError::DuplicateBinding { range, .. }
            | TypecheckError::DuplicateField { range, .. }
            | TypecheckError::NonExhaustive { range, .. }
            | TypecheckError::RecNotFunction { range, .. }
            | TypecheckError::UnboundTypeParameter { range, .. } => *range,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            TypecheckError::UnboundVariable { .. } => "E2001",
            TypecheckError::Contradiction { .. } => "E2002",
            TypecheckError::VariantEnv(_) => "E2003",
            TypecheckError::KindEnv(_) => "E2004",
            TypecheckError::ConstructorArity { .. } => "E2005",
            TypecheckError::DuplicateBinding { .. } => "E2006",
            TypecheckError::DuplicateField { .. } => "E2007",
            TypecheckError::NonExhaustive { .. } => "E2008",
            TypecheckError::RecNotFunction { .. } => "E2009",
            TypecheckError::UnboundTypeParameter { .. } => "E2010",
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let labels = match self {
            TypecheckError::Contradiction { source, .. } => [
                ("expected type written here", source.expected.range),
                ("found type written here", source.found.range),
            ]
            .into_iter()
            .filter(|(_, range)| !range.is_invalid())
            .map(|(message, range)| DiagnosticLabel {
                message: message.to_string(),
                range,
            })
            .collect(),
            _ => Vec::new(),
        };
        Diagnostic {
            code: self.code().to_string(),
            severity: DiagnosticSeverity::Error,
            message: self.to_string(),
            range: self.range(),
            labels,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypecheckWarning {
    NonExhaustive { missing: String, range: Range },
    UnusedArm { range: Range },
}

impl std::fmt::Display for TypecheckWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypecheckWarning::NonExhaustive { missing, range } => write!(
                f,
                "at {range}: this pattern-matching is not exhaustive; for example, {missing} is not matched"
            ),
            TypecheckWarning::UnusedArm { range } => {
                write!(f, "at {range}: this match case is unused")
            }
        }
    }
}

impl TypecheckWarning {
    pub fn range(&self) -> Range {
        match self {
            TypecheckWarning::NonExhaustive { range, .. } | TypecheckWarning::UnusedArm { range } => {
                *range
            }
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let code = match self {
            TypecheckWarning::NonExhaustive { .. } => "W2008",
            TypecheckWarning::UnusedArm { .. } => "W2011",
        };
        Diagnostic {
            code: code.to_string(),
            severity: DiagnosticSeverity::Warning,
            message: self.to_string(),
            range: self.range(),
            labels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckOptions {
    pub exhaustiveness: Exhaustiveness,
    pub trace_unification: bool,
}

impl From<&Config> for CheckOptions {
    fn from(config: &Config) -> Self {
        Self {
            exhaustiveness: config.exhaustiveness,
            trace_unification: config.trace_unification,
        }
    }
}

/// Result of a successful check. Types are fully substituted and range-erased.
#[derive(Debug, Clone)]
pub struct Checked {
    pub expr: CoreExpr,
    pub ty: Type,
    pub kind: Kind,
    pub warnings: Vec<TypecheckWarning>,
}

pub fn check(
    variants: &VariantEnv,
    kinds: &KindEnv,
    env: &TypeEnv,
    expr: &Expr,
) -> Result<Checked, TypecheckError> {
    check_with_options(variants, kinds, env, expr, CheckOptions::default())
}

pub fn check_with_options(
    variants: &VariantEnv,
    kinds: &KindEnv,
    env: &TypeEnv,
    expr: &Expr,
    options: CheckOptions,
) -> Result<Checked, TypecheckError> {
    let mut checker = TypeChecker::new(variants.clone(), kinds.clone(), env, options);
    let (core, ty) = checker.infer_expr(expr, env)?;
    Ok(checker.finish(core, ty))
}

/// Registers the program's type declarations, then checks its body.
pub fn check_program(
    variants: &VariantEnv,
    kinds: &KindEnv,
    env: &TypeEnv,
    program: &Program,
    options: CheckOptions,
) -> Result<Checked, TypecheckError> {
    let mut checker = TypeChecker::new(variants.clone(), kinds.clone(), env, options);
    for group in &program.type_groups {
        checker.register_type_group(group)?;
    }
    let (core, ty) = checker.infer_expr(&program.body, env)?;
    Ok(checker.finish(core, ty))
}

#[cfg(test)]
mod tests;
