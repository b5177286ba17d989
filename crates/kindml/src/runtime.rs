//! Strict, environment-based evaluation of elaborated expressions.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use im::Vector as ImVector;
use log::trace;

use crate::elaborated::{CoreArm, CoreExpr, CorePattern, CoreRecBinding};
use crate::surface::Literal;

mod builtins;
mod environment;
mod values;

use self::builtins::register_builtins;
pub use self::environment::Env;
pub use self::values::{format_value, values_equal, BuiltinValue, ClosureValue, Value};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("unbound variable '{0}'")]
    UnboundVariable(String),
    #[error("no matching pattern for {0}")]
    NoMatchingPattern(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in '{0}'")]
    Overflow(String),
    #[error("evaluation step budget exhausted")]
    FuelExhausted,
    #[error("evaluation nested deeper than {0} levels")]
    StackDepthExceeded(usize),
    #[error("attempted to call a non-function: {0}")]
    NotAFunction(String),
    #[error("functional values cannot be compared")]
    CompareFunctions,
    #[error("{0}")]
    Message(String),
}

/// A fresh environment holding a value for every primitive.
pub fn initial_runtime_environment() -> Env {
    let env = Env::new(None);
    register_builtins(&env);
    env
}

/// Default bound on nested evaluation steps. Every level costs native stack,
/// so callers on small stacks should pass a lower limit.
pub const DEFAULT_MAX_DEPTH: usize = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalLimits {
    /// Total evaluation steps; unlimited when absent.
    pub fuel: Option<u64>,
    pub max_depth: usize,
}

impl Default for EvalLimits {
    fn default() -> Self {
        Self {
            fuel: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

pub fn evaluate(env: &Env, expr: &CoreExpr) -> Result<Value, EvalError> {
    evaluate_with_limits(env, expr, EvalLimits::default())
}

/// Evaluates `expr`, failing with [`EvalError::FuelExhausted`] once `fuel`
/// steps have been taken.
pub fn evaluate_with_fuel(
    env: &Env,
    expr: &CoreExpr,
    fuel: Option<u64>,
) -> Result<Value, EvalError> {
    evaluate_with_limits(
        env,
        expr,
        EvalLimits {
            fuel,
            ..EvalLimits::default()
        },
    )
}

/// Evaluates `expr` under both a step budget and a nesting bound; running
/// past the bound is [`EvalError::StackDepthExceeded`].
pub fn evaluate_with_limits(
    env: &Env,
    expr: &CoreExpr,
    limits: EvalLimits,
) -> Result<Value, EvalError> {
    let mut runtime = Runtime {
        fuel: limits.fuel,
        depth: 0,
        max_depth: limits.max_depth,
    };
    runtime.eval_expr(expr, env)
}

struct Runtime {
    fuel: Option<u64>,
    depth: usize,
    max_depth: usize,
}

impl Runtime {
    fn check_fuel(&mut self) -> Result<(), EvalError> {
        if let Some(fuel) = self.fuel.as_mut() {
            if *fuel == 0 {
                return Err(EvalError::FuelExhausted);
            }
            *fuel -= 1;
        }
        Ok(())
    }

    fn eval_expr(&mut self, expr: &CoreExpr, env: &Env) -> Result<Value, EvalError> {
        self.check_fuel()?;
        if self.depth >= self.max_depth {
            return Err(EvalError::StackDepthExceeded(self.max_depth));
        }
        self.depth += 1;
        let result = self.eval_node(expr, env);
        self.depth -= 1;
        result
    }

    fn eval_node(&mut self, expr: &CoreExpr, env: &Env) -> Result<Value, EvalError> {
        match expr {
            CoreExpr::Literal(literal) => Ok(literal_value(literal)),
            CoreExpr::Var(name) => env
                .get(name)
                .ok_or_else(|| EvalError::UnboundVariable(name.clone())),
            CoreExpr::Lambda { param, body, .. } => Ok(Value::Closure(Rc::new(ClosureValue {
                param: param.clone(),
                body: body.clone(),
                env: env.clone(),
            }))),
            CoreExpr::Apply { func, arg } => {
                let func = self.eval_expr(func, env)?;
                let arg = self.eval_expr(arg, env)?;
                self.apply(func, arg)
            }
            CoreExpr::Let {
                name, value, body, ..
            } => {
                let value = self.eval_expr(value, env)?;
                let inner = env.child();
                inner.set(name.clone(), value);
                self.eval_expr(body, &inner)
            }
            CoreExpr::LetRec { bindings, body } => {
                let inner = self.bind_recursive(bindings, env)?;
                self.eval_expr(body, &inner)
            }
            CoreExpr::If {
                cond,
                then_branch,
                else_branch,
            } => match self.eval_expr(cond, env)? {
                Value::Bool(true) => self.eval_expr(then_branch, env),
                Value::Bool(false) => self.eval_expr(else_branch, env),
                other => Err(EvalError::Message(format!(
                    "condition evaluated to {}, expected a bool",
                    format_value(&other)
                ))),
            },
            CoreExpr::List(items) => {
                let mut values = ImVector::new();
                for item in items {
                    values.push_back(self.eval_expr(item, env)?);
                }
                Ok(Value::List(values))
            }
            CoreExpr::Tuple(items) => {
                let values = self.eval_all(items, env)?;
                Ok(Value::Tuple(Rc::new(values)))
            }
            CoreExpr::Record(fields) => {
                let mut map = BTreeMap::new();
                for (name, value) in fields {
                    map.insert(name.clone(), self.eval_expr(value, env)?);
                }
                Ok(Value::Record(Rc::new(map)))
            }
            CoreExpr::Field { base, field } => match self.eval_expr(base, env)? {
                Value::Record(fields) => fields
                    .get(field)
                    .cloned()
                    .ok_or_else(|| EvalError::Message(format!("record has no field '{field}'"))),
                other => Err(EvalError::Message(format!(
                    "field access .{field} on non-record {}",
                    format_value(&other)
                ))),
            },
            CoreExpr::Update { base, fields } => {
                let existing = match self.eval_expr(base, env)? {
                    Value::Record(existing) => existing,
                    other => {
                        return Err(EvalError::Message(format!(
                            "record update on non-record {}",
                            format_value(&other)
                        )))
                    }
                };
                let mut map = (*existing).clone();
                for (name, value) in fields {
                    map.insert(name.clone(), self.eval_expr(value, env)?);
                }
                Ok(Value::Record(Rc::new(map)))
            }
            CoreExpr::Construct { ctor, args } => Ok(Value::Constructor {
                name: ctor.clone(),
                args: self.eval_all(args, env)?,
            }),
            CoreExpr::Match {
                scrutinee, arms, ..
            } => {
                let value = self.eval_expr(scrutinee, env)?;
                self.eval_match(&value, arms, env)
            }
            CoreExpr::Ref(value) => {
                let value = self.eval_expr(value, env)?;
                Ok(Value::Ref(Rc::new(RefCell::new(value))))
            }
            CoreExpr::Deref(target) => match self.eval_expr(target, env)? {
                Value::Ref(cell) => Ok(cell.borrow().clone()),
                other => Err(EvalError::Message(format!(
                    "dereferenced non-reference {}",
                    format_value(&other)
                ))),
            },
            CoreExpr::Assign { target, value } => {
                let target = self.eval_expr(target, env)?;
                let value = self.eval_expr(value, env)?;
                match target {
                    Value::Ref(cell) => {
                        *cell.borrow_mut() = value;
                        Ok(Value::Unit)
                    }
                    other => Err(EvalError::Message(format!(
                        "assigned to non-reference {}",
                        format_value(&other)
                    ))),
                }
            }
            CoreExpr::Sequence { first, second } => {
                self.eval_expr(first, env)?;
                self.eval_expr(second, env)
            }
            CoreExpr::Annot { expr, .. } => self.eval_expr(expr, env),
        }
    }

    fn eval_all(&mut self, exprs: &[CoreExpr], env: &Env) -> Result<Vec<Value>, EvalError> {
        exprs.iter().map(|expr| self.eval_expr(expr, env)).collect()
    }

    /// Every closure of the group captures the same frame, which is filled in
    /// once all of them exist.
    fn bind_recursive(
        &mut self,
        bindings: &[CoreRecBinding],
        env: &Env,
    ) -> Result<Env, EvalError> {
        let frame = env.child();
        let mut values = Vec::with_capacity(bindings.len());
        for binding in bindings {
            values.push((binding.name.clone(), self.eval_expr(&binding.value, &frame)?));
        }
        for (name, value) in values {
            frame.set(name, value);
        }
        Ok(frame)
    }

    fn eval_match(&mut self, value: &Value, arms: &[CoreArm], env: &Env) -> Result<Value, EvalError> {
        for (index, arm) in arms.iter().enumerate() {
            let mut bindings = HashMap::new();
            if match_pattern(&arm.pattern, value, &mut bindings) {
                trace!("match arm {index} selected for {}", format_value(value));
                let inner = env.child();
                for (name, bound) in bindings {
                    inner.set(name, bound);
                }
                return self.eval_expr(&arm.body, &inner);
            }
        }
        Err(EvalError::NoMatchingPattern(format_value(value)))
    }

    fn apply(&mut self, func: Value, arg: Value) -> Result<Value, EvalError> {
        match func {
            Value::Closure(closure) => {
                let inner = closure.env.child();
                inner.set(closure.param.clone(), arg);
                self.eval_expr(&closure.body, &inner)
            }
            Value::Builtin(builtin) => builtin.apply(arg),
            other => Err(EvalError::NotAFunction(format_value(&other))),
        }
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Unit => Value::Unit,
        Literal::Bool(value) => Value::Bool(*value),
        Literal::Int(value) => Value::Int(*value),
        Literal::String(value) => Value::String(value.clone()),
    }
}

fn match_pattern(
    pattern: &CorePattern,
    value: &Value,
    bindings: &mut HashMap<String, Value>,
) -> bool {
    match pattern {
        CorePattern::Wildcard => true,
        CorePattern::Var(name) => {
            bindings.insert(name.clone(), value.clone());
            true
        }
        CorePattern::Literal(literal) => match (literal, value) {
            (Literal::Unit, Value::Unit) => true,
            (Literal::Bool(expected), Value::Bool(found)) => expected == found,
            (Literal::Int(expected), Value::Int(found)) => expected == found,
            (Literal::String(expected), Value::String(found)) => expected == found,
            _ => false,
        },
        CorePattern::Tuple(items) => match value {
            Value::Tuple(values) if values.len() == items.len() => items
                .iter()
                .zip(values.iter())
                .all(|(item, value)| match_pattern(item, value, bindings)),
            _ => false,
        },
        CorePattern::Nil => matches!(value, Value::List(items) if items.is_empty()),
        CorePattern::Cons { head, tail } => match value {
            Value::List(items) if !items.is_empty() => {
                let mut rest = items.clone();
                let Some(first) = rest.pop_front() else {
                    return false;
                };
                match_pattern(head, &first, bindings)
                    && match_pattern(tail, &Value::List(rest), bindings)
            }
            _ => false,
        },
        CorePattern::Constructor { ctor, args } => match value {
            Value::Constructor {
                name,
                args: values,
            } => {
                name == ctor
                    && args.len() == values.len()
                    && args
                        .iter()
                        .zip(values)
                        .all(|(arg, value)| match_pattern(arg, value, bindings))
            }
            _ => false,
        },
        CorePattern::As { pattern, name } => {
            if !match_pattern(pattern, value, bindings) {
                return false;
            }
            bindings.insert(name.clone(), value.clone());
            true
        }
    }
}
