use crate::diagnostics::Range;

use super::kind_env::KindEnv;
use super::types::{Kind, Type, TypeVarGen};
use super::variant_env::VariantEnv;
use super::TypeEnv;

/// Names bound by the initial environments. The evaluator provides a value
/// for each of them.
pub const PRIMITIVES: &[&str] = &[
    "+",
    "-",
    "*",
    "/",
    "mod",
    "<",
    ">",
    "<=",
    ">=",
    "==",
    "<>",
    "^",
    "not",
    "::",
    "string_of_int",
    "string_of_bool",
    "string_length",
    "string_sub",
    "list_length",
];

/// The environments every program starts from.
#[derive(Debug, Clone)]
pub struct InitialEnvironments {
    pub variants: VariantEnv,
    pub kinds: KindEnv,
    pub types: TypeEnv,
}

pub fn initial_environments() -> InitialEnvironments {
    let range = Range::dummy("primitive");
    let mut gen = TypeVarGen::new();
    let int = || Type::int(range);
    let bool = || Type::bool(range);
    let string = || Type::string(range);
    let arrow = |param: Type, result: Type| Type::func(range, param, result);
    let binary = |left: Type, right: Type, result: Type| arrow(left, arrow(right, result));

    let mut types = TypeEnv::new();
    for op in ["+", "-", "*", "/", "mod"] {
        types.insert(op.to_string(), binary(int(), int(), int()));
    }
    for op in ["<", ">", "<=", ">="] {
        types.insert(op.to_string(), binary(int(), int(), bool()));
    }
    for op in ["==", "<>"] {
        let a = gen.fresh();
        let var = Type::var(range, a);
        let body = binary(var.clone(), var, bool());
        types.insert(op.to_string(), Type::forall(range, a, Kind::Universal, body));
    }
    types.insert("^".to_string(), binary(string(), string(), string()));
    types.insert("not".to_string(), arrow(bool(), bool()));
    {
        let a = gen.fresh();
        let var = Type::var(range, a);
        let list = Type::list(range, var.clone());
        let body = binary(var, list.clone(), list);
        types.insert("::".to_string(), Type::forall(range, a, Kind::Universal, body));
    }
    types.insert("string_of_int".to_string(), arrow(int(), string()));
    types.insert("string_of_bool".to_string(), arrow(bool(), string()));
    types.insert("string_length".to_string(), arrow(string(), int()));
    types.insert(
        "string_sub".to_string(),
        arrow(string(), binary(int(), int(), string())),
    );
    {
        let a = gen.fresh();
        let body = arrow(Type::list(range, Type::var(range, a)), int());
        types.insert(
            "list_length".to_string(),
            Type::forall(range, a, Kind::Universal, body),
        );
    }

    let mut variants = VariantEnv::empty();
    let a = gen.fresh();
    variants.insert_builtin_variant(
        "option",
        vec![a],
        vec![("None", Vec::new()), ("Some", vec![Type::var(range, a)])],
    );

    InitialEnvironments {
        variants,
        kinds: KindEnv::empty(),
        types,
    }
}

pub fn initial_type_environment() -> TypeEnv {
    initial_environments().types
}

pub fn initial_variant_environment() -> VariantEnv {
    initial_environments().variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_primitive_has_a_type() {
        let envs = initial_environments();
        for name in PRIMITIVES {
            assert!(envs.types.contains_key(*name), "missing type for {name}");
        }
        assert_eq!(envs.types.len(), PRIMITIVES.len());
        assert_eq!(initial_type_environment().len(), PRIMITIVES.len());
    }

    #[test]
    fn polymorphic_primitives_are_quantified() {
        let envs = initial_environments();
        assert_eq!(envs.types["=="].to_string(), "forall 'a. 'a -> 'a -> bool");
        assert_eq!(envs.types["::"].to_string(), "forall 'a. 'a -> 'a list -> 'a list");
        assert_eq!(envs.types["string_sub"].to_string(), "string -> int -> int -> string");
    }

    #[test]
    fn option_is_predefined() {
        let variants = initial_variant_environment();
        let info = variants
            .lookup_constructor("Some", Range::dummy("test"))
            .expect("Some");
        assert_eq!(info.variant, "option");
    }
}
