use std::rc::Rc;

use unicode_segmentation::UnicodeSegmentation;

use super::environment::Env;
use super::values::{format_value, values_equal, BuiltinImpl, BuiltinValue, Value};
use super::EvalError;

/// Binds a value for every primitive the initial type environment declares.
pub(super) fn register_builtins(env: &Env) {
    env.set("+".to_string(), int_op("+", i64::checked_add));
    env.set("-".to_string(), int_op("-", i64::checked_sub));
    env.set("*".to_string(), int_op("*", i64::checked_mul));
    env.set("/".to_string(), division("/", i64::checked_div));
    env.set("mod".to_string(), division("mod", i64::checked_rem));

    env.set("<".to_string(), comparison("<", |a, b| a < b));
    env.set(">".to_string(), comparison(">", |a, b| a > b));
    env.set("<=".to_string(), comparison("<=", |a, b| a <= b));
    env.set(">=".to_string(), comparison(">=", |a, b| a >= b));

    env.set(
        "==".to_string(),
        builtin("==", 2, |args| {
            Ok(Value::Bool(values_equal(&args[0], &args[1])?))
        }),
    );
    env.set(
        "<>".to_string(),
        builtin("<>", 2, |args| {
            Ok(Value::Bool(!values_equal(&args[0], &args[1])?))
        }),
    );

    env.set(
        "^".to_string(),
        builtin("^", 2, |args| {
            let left = expect_string("^", &args[0])?;
            let right = expect_string("^", &args[1])?;
            Ok(Value::String(format!("{left}{right}")))
        }),
    );
    env.set(
        "not".to_string(),
        builtin("not", 1, |args| Ok(Value::Bool(!expect_bool("not", &args[0])?))),
    );
    env.set(
        "::".to_string(),
        builtin("::", 2, |mut args| {
            let tail = args.pop();
            let head = args.pop();
            match (head, tail) {
                (Some(head), Some(Value::List(mut items))) => {
                    items.push_front(head);
                    Ok(Value::List(items))
                }
                (_, tail) => Err(type_error("::", "a list", tail.as_ref())),
            }
        }),
    );

    env.set(
        "string_of_int".to_string(),
        builtin("string_of_int", 1, |args| {
            Ok(Value::String(expect_int("string_of_int", &args[0])?.to_string()))
        }),
    );
    env.set(
        "string_of_bool".to_string(),
        builtin("string_of_bool", 1, |args| {
            Ok(Value::String(expect_bool("string_of_bool", &args[0])?.to_string()))
        }),
    );
    env.set(
        "string_length".to_string(),
        builtin("string_length", 1, |args| {
            let text = expect_string("string_length", &args[0])?;
            Ok(Value::Int(text.graphemes(true).count() as i64))
        }),
    );
    env.set(
        "string_sub".to_string(),
        builtin("string_sub", 3, |args| {
            let text = expect_string("string_sub", &args[0])?;
            let start = expect_int("string_sub", &args[1])?;
            let len = expect_int("string_sub", &args[2])?;
            let graphemes: Vec<&str> = text.graphemes(true).collect();
            let (Ok(start), Ok(len)) = (usize::try_from(start), usize::try_from(len)) else {
                return Err(EvalError::Message(format!(
                    "string_sub: invalid range {start} {len}"
                )));
            };
            match start.checked_add(len) {
                Some(end) if end <= graphemes.len() => {
                    Ok(Value::String(graphemes[start..end].concat()))
                }
                _ => Err(EvalError::Message(format!(
                    "string_sub: range {start}+{len} is outside a string of length {}",
                    graphemes.len()
                ))),
            }
        }),
    );
    env.set(
        "list_length".to_string(),
        builtin("list_length", 1, |args| match &args[0] {
            Value::List(items) => Ok(Value::Int(items.len() as i64)),
            other => Err(type_error("list_length", "a list", Some(other))),
        }),
    );
}

fn builtin(
    name: &str,
    arity: usize,
    func: impl Fn(Vec<Value>) -> Result<Value, EvalError> + 'static,
) -> Value {
    Value::Builtin(BuiltinValue {
        imp: Rc::new(BuiltinImpl {
            name: name.to_string(),
            arity,
            func: Rc::new(func),
        }),
        args: Vec::new(),
    })
}

fn int_op(name: &'static str, op: fn(i64, i64) -> Option<i64>) -> Value {
    builtin(name, 2, move |args| {
        let left = expect_int(name, &args[0])?;
        let right = expect_int(name, &args[1])?;
        op(left, right)
            .map(Value::Int)
            .ok_or_else(|| EvalError::Overflow(name.to_string()))
    })
}

fn division(name: &'static str, op: fn(i64, i64) -> Option<i64>) -> Value {
    builtin(name, 2, move |args| {
        let left = expect_int(name, &args[0])?;
        let right = expect_int(name, &args[1])?;
        if right == 0 {
            return Err(EvalError::DivisionByZero);
        }
        op(left, right)
            .map(Value::Int)
            .ok_or_else(|| EvalError::Overflow(name.to_string()))
    })
}

fn comparison(name: &'static str, op: fn(i64, i64) -> bool) -> Value {
    builtin(name, 2, move |args| {
        let left = expect_int(name, &args[0])?;
        let right = expect_int(name, &args[1])?;
        Ok(Value::Bool(op(left, right)))
    })
}

fn expect_int(name: &str, value: &Value) -> Result<i64, EvalError> {
    match value {
        Value::Int(value) => Ok(*value),
        other => Err(type_error(name, "an int", Some(other))),
    }
}

fn expect_bool(name: &str, value: &Value) -> Result<bool, EvalError> {
    match value {
        Value::Bool(value) => Ok(*value),
        other => Err(type_error(name, "a bool", Some(other))),
    }
}

fn expect_string<'a>(name: &str, value: &'a Value) -> Result<&'a str, EvalError> {
    value
        .as_str()
        .ok_or_else(|| type_error(name, "a string", Some(value)))
}

fn type_error(name: &str, expected: &str, found: Option<&Value>) -> EvalError {
    let found = found.map(format_value).unwrap_or_else(|| "nothing".to_string());
    EvalError::Message(format!("{name} expects {expected}, got {found}"))
}
