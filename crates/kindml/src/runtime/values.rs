use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use im::Vector as ImVector;

use crate::elaborated::CoreExpr;

use super::environment::Env;
use super::EvalError;

pub(super) type BuiltinFunc = dyn Fn(Vec<Value>) -> Result<Value, EvalError>;

/// Runtime values. Cloning is cheap: aggregates share their storage and a
/// cloned `Ref` aliases the same cell.
#[derive(Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    String(String),
    List(ImVector<Value>),
    Tuple(Rc<Vec<Value>>),
    Record(Rc<BTreeMap<String, Value>>),
    Constructor { name: String, args: Vec<Value> },
    Closure(Rc<ClosureValue>),
    Builtin(BuiltinValue),
    Ref(Rc<RefCell<Value>>),
}

#[derive(Clone)]
pub struct BuiltinValue {
    pub(super) imp: Rc<BuiltinImpl>,
    pub(super) args: Vec<Value>,
}

pub(super) struct BuiltinImpl {
    pub(super) name: String,
    pub(super) arity: usize,
    pub(super) func: Rc<BuiltinFunc>,
}

pub struct ClosureValue {
    pub(super) param: String,
    pub(super) body: Arc<CoreExpr>,
    pub(super) env: Env,
}

impl BuiltinValue {
    /// Adds one argument, running the primitive once it is saturated.
    pub(super) fn apply(&self, arg: Value) -> Result<Value, EvalError> {
        let mut args = self.args.clone();
        args.push(arg);
        if args.len() == self.imp.arity {
            (self.imp.func)(args)
        } else {
            Ok(Value::Builtin(BuiltinValue {
                imp: self.imp.clone(),
                args,
            }))
        }
    }

    pub fn name(&self) -> &str {
        &self.imp.name
    }
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    pub(super) fn is_function(&self) -> bool {
        matches!(self, Value::Closure(_) | Value::Builtin(_))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_value(self))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_value(self))
    }
}

/// Renders a value in source-like syntax.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Unit => "()".to_string(),
        Value::Bool(value) => value.to_string(),
        Value::Int(value) => value.to_string(),
        Value::String(value) => format!("\"{}\"", value.escape_debug()),
        Value::List(items) => format!("[{}]", join(items.iter())),
        Value::Tuple(items) => format!("({})", join(items.iter())),
        Value::Record(fields) => format!(
            "{{{}}}",
            fields
                .iter()
                .map(|(name, value)| format!("{name} = {}", format_value(value)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Constructor { name, args } => match args.as_slice() {
            [] => name.clone(),
            [arg] => format!("{name} {}", format_atom(arg)),
            args => format!("{name} ({})", join(args.iter())),
        },
        Value::Closure(_) => "<fun>".to_string(),
        Value::Builtin(builtin) => format!("<builtin:{}>", builtin.name()),
        Value::Ref(cell) => format!("ref {}", format_atom(&cell.borrow())),
    }
}

fn format_atom(value: &Value) -> String {
    let needs_parens = match value {
        Value::Constructor { args, .. } => !args.is_empty(),
        Value::Ref(_) => true,
        Value::Int(value) => *value < 0,
        _ => false,
    };
    if needs_parens {
        format!("({})", format_value(value))
    } else {
        format_value(value)
    }
}

fn join<'a>(values: impl Iterator<Item = &'a Value>) -> String {
    values.map(format_value).collect::<Vec<_>>().join(", ")
}

/// Structural equality. References compare by identity; functions cannot be
/// compared at all.
pub fn values_equal(left: &Value, right: &Value) -> Result<bool, EvalError> {
    if left.is_function() || right.is_function() {
        return Err(EvalError::CompareFunctions);
    }
    Ok(match (left, right) {
        (Value::Unit, Value::Unit) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::List(a), Value::List(b)) => a.len() == b.len() && all_equal(a.iter(), b.iter())?,
        (Value::Tuple(a), Value::Tuple(b)) => a.len() == b.len() && all_equal(a.iter(), b.iter())?,
        (Value::Record(a), Value::Record(b)) => {
            a.len() == b.len()
                && a.keys().eq(b.keys())
                && all_equal(a.values(), b.values())?
        }
        (
            Value::Constructor { name: a, args: a_args },
            Value::Constructor { name: b, args: b_args },
        ) => a == b && a_args.len() == b_args.len() && all_equal(a_args.iter(), b_args.iter())?,
        (Value::Ref(a), Value::Ref(b)) => Rc::ptr_eq(a, b),
        _ => false,
    })
}

fn all_equal<'a>(
    left: impl Iterator<Item = &'a Value>,
    right: impl Iterator<Item = &'a Value>,
) -> Result<bool, EvalError> {
    for (left, right) in left.zip(right) {
        if !values_equal(left, right)? {
            return Ok(false);
        }
    }
    Ok(true)
}
