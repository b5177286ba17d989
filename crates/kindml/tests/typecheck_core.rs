use kindml::typecheck::{Kind, Reason, TypeMain};
use kindml::{check_source, Checked, Config, Error, Exhaustiveness, TypecheckError};

fn check_ok(source: &str) -> Checked {
    match check_source(source, &Config::default()) {
        Ok(checked) => checked,
        Err(err) => panic!("unexpected error for {source:?}: {err}"),
    }
}

fn check_err(source: &str) -> TypecheckError {
    match check_source(source, &Config::default()) {
        Err(Error::Typecheck(err)) => err,
        Err(other) => panic!("expected a type error for {source:?}, got {other}"),
        Ok(checked) => panic!("expected a type error for {source:?}, got {}", checked.ty),
    }
}

#[test]
fn each_instantiation_gets_fresh_variables() {
    let checked = check_ok("let id x = x in (id, id)");
    assert_eq!(checked.ty.to_string(), "('a -> 'a) * ('b -> 'b)");
}

#[test]
fn generalized_record_accessors_keep_their_kind() {
    let source = "let get_a r = r.a in
        (get_a {a = 1}, get_a {a = \"s\", b = true})";
    assert_eq!(check_ok(source).ty.to_string(), "int * string");
}

#[test]
fn record_kinds_merge_across_uses() {
    let source = "fun r -> (r.a + 1, r.b ^ \"\")";
    let checked = check_ok(source);
    assert_eq!(checked.ty.to_string(), "'a -> int * string");
    let TypeMain::Func(param, _) = &checked.ty.main else {
        panic!("expected a function");
    };
    assert!(matches!(param.main, TypeMain::Var(_)));

    let err = check_err("let f r = (r.a + 1, r.b ^ \"\") in f {a = 1}");
    let TypecheckError::Contradiction { source, .. } = err else {
        panic!("expected a contradiction");
    };
    assert_eq!(source.reason, Reason::MissingField("b".to_string()));
}

#[test]
fn conflicting_field_types_are_rejected() {
    let err = check_err("fun r -> (r.a + 1, r.a ^ \"\")");
    assert!(matches!(err, TypecheckError::Contradiction { .. }), "{err}");
}

#[test]
fn a_variable_cannot_contain_itself() {
    let err = check_err("fun x -> x :: x");
    let TypecheckError::Contradiction { source, .. } = err else {
        panic!("expected a contradiction");
    };
    assert!(matches!(source.reason, Reason::Occurs { .. }));
}

#[test]
fn covering_every_constructor_is_exhaustive() {
    let source = "type color = | Red | Green | Blue in
        fun c -> match c with | Red -> 0 | Green -> 1 | Blue -> 2";
    let checked = check_ok(source);
    assert!(checked.warnings.is_empty());
    assert_eq!(checked.ty.to_string(), "color -> int");
}

#[test]
fn missing_constructors_are_named() {
    let source = "type color = | Red | Green | Blue in
        fun c -> match c with | Red -> 0 | Green -> 1";
    let TypecheckError::NonExhaustive { missing, .. } = check_err(source) else {
        panic!("expected a non-exhaustive match");
    };
    assert_eq!(missing, "Blue");
}

#[test]
fn nested_patterns_report_nested_witnesses() {
    let source = "fun p -> match p with
        | (true, _) -> 0
        | (false, true) -> 1";
    let TypecheckError::NonExhaustive { missing, .. } = check_err(source) else {
        panic!("expected a non-exhaustive match");
    };
    assert_eq!(missing, "(false, false)");
}

#[test]
fn integer_matches_need_a_catch_all() {
    let err = check_err("fun n -> match n with | 0 -> true | 1 -> false");
    assert!(matches!(err, TypecheckError::NonExhaustive { .. }));
}

#[test]
fn warn_mode_downgrades_exhaustiveness() {
    let config = Config {
        exhaustiveness: Exhaustiveness::Warn,
        ..Config::default()
    };
    let checked = check_source("fun n -> match n with | 0 -> true", &config).expect("check");
    assert_eq!(checked.warnings.len(), 1);
}

#[test]
fn parameterized_variants_and_synonyms() {
    let source = "type ('k, 'v) pair = | Pair of 'k * 'v
        and 'a pairs = ('a, 'a) pair list in
        let swap p = match p with | Pair (k, v) -> Pair (v, k) in
        ([swap (Pair (1, \"x\"))] : (string, int) pair list)";
    assert_eq!(check_ok(source).ty.to_string(), "(string, int) pair list");

    let source = "type 'a pairs = ('a * 'a) list in ([(1, 2)] : int pairs)";
    assert_eq!(check_ok(source).ty.to_string(), "int pairs");
}

#[test]
fn type_constructor_arity_is_checked() {
    let err = check_err("type 'a box = | Box of 'a in (Box 1 : box)");
    assert!(matches!(err, TypecheckError::VariantEnv(_)), "{err}");
}

#[test]
fn duplicate_constructors_are_rejected() {
    let err = check_err("type a = | X and b = | X in 0");
    assert!(matches!(err, TypecheckError::VariantEnv(_)), "{err}");
}

#[test]
fn refs_are_not_generalized() {
    let err = check_err("let r = ref (fun x -> x) in r := (fun x -> x + 1); (!r) true");
    assert!(matches!(err, TypecheckError::Contradiction { .. }), "{err}");
}

#[test]
fn the_result_kind_is_reported() {
    let checked = check_ok("1");
    assert_eq!(checked.kind, Kind::Universal);
}
