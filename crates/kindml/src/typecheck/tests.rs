use super::*;
use crate::lexer::lex;
use crate::surface::parse_program;

fn check_source_with(source: &str, options: CheckOptions) -> Result<Checked, TypecheckError> {
    let program = parse_program(lex(source).expect("lex")).expect("parse");
    let envs = initial_environments();
    check_program(&envs.variants, &envs.kinds, &envs.types, &program, options)
}

fn check_source(source: &str) -> Result<Checked, TypecheckError> {
    check_source_with(source, CheckOptions::default())
}

fn type_of(source: &str) -> String {
    match check_source(source) {
        Ok(checked) => checked.ty.to_string(),
        Err(err) => panic!("{source}: {err}"),
    }
}

#[test]
fn infers_basic_types() {
    assert_eq!(type_of("1 + 2"), "int");
    assert_eq!(type_of("\"a\" ^ \"b\""), "string");
    assert_eq!(type_of("fun x -> x"), "'a -> 'a");
    assert_eq!(type_of("fun f x -> f (f x)"), "('a -> 'a) -> 'a -> 'a");
    assert_eq!(type_of("[1, 2] "), "int list");
    assert_eq!(type_of("(1, true, \"s\")"), "int * bool * string");
}

#[test]
fn let_bound_functions_are_polymorphic() {
    assert_eq!(
        type_of("let id x = x in (id 1, id true)"),
        "int * bool"
    );
}

#[test]
fn lambda_bound_variables_are_monomorphic() {
    let err = check_source("fun id -> (id 1, id true)").unwrap_err();
    assert!(matches!(err, TypecheckError::Contradiction { .. }), "{err}");
}

#[test]
fn value_restriction_keeps_refs_monomorphic() {
    let err = check_source("let r = ref [] in r := [1]; r := [true]; 0").unwrap_err();
    assert!(matches!(err, TypecheckError::Contradiction { .. }), "{err}");
}

#[test]
fn unbound_variable_names_the_identifier() {
    let err = check_source("let x = 1 in y").unwrap_err();
    let TypecheckError::UnboundVariable { name, range } = &err else {
        panic!("unexpected error {err}");
    };
    assert_eq!(name, "y");
    assert!(!range.is_invalid());
    assert!(err.to_string().contains("unbound variable 'y'"));
}

#[test]
fn occurs_check_is_reported() {
    let err = check_source("fun x -> x x").unwrap_err();
    let TypecheckError::Contradiction { source, .. } = &err else {
        panic!("unexpected error {err}");
    };
    assert!(matches!(source.reason, Reason::Occurs { .. }));
}

#[test]
fn records_accept_extra_fields() {
    assert_eq!(
        type_of("let get_a r = r.a + 0 in get_a {a = 1, b = \"x\"}"),
        "int"
    );
}

#[test]
fn records_missing_a_field_are_rejected() {
    let err = check_source("let get_a r = r.a + 0 in get_a {b = \"x\"}").unwrap_err();
    let TypecheckError::Contradiction { source, .. } = &err else {
        panic!("unexpected error {err}");
    };
    assert_eq!(source.reason, Reason::MissingField("a".to_string()));
}

#[test]
fn field_access_generalizes_with_a_record_kind() {
    let checked = check_source("let get_a r = r.a in get_a").expect("check");
    assert_eq!(checked.ty.to_string(), "'a -> 'b");
    let TypeMain::Func(param, _) = &checked.ty.main else {
        panic!("expected a function type");
    };
    assert!(matches!(param.main, TypeMain::Var(_)));
}

#[test]
fn record_kind_is_returned_for_kinded_results() {
    let checked = check_source("fun r -> r.a + r.b.c").expect("check");
    assert_eq!(checked.kind, Kind::Universal);

    let checked =
        check_source("let rec loop x = loop x in let v = loop 0 in (v.a; v)").expect("check");
    assert_eq!(checked.ty.to_string(), "'a");
    let Kind::Record(fields) = &checked.kind else {
        panic!("expected a record kind, got {}", checked.kind);
    };
    assert_eq!(fields["a"], Type::unit(Range::erased()));
}

#[test]
fn record_update_keeps_the_record_type() {
    assert_eq!(
        type_of("let r = {a = 1, b = true} in {r with a = 2}"),
        "{a : int, b : bool}"
    );
    let err = check_source("let r = {a = 1} in {r with a = true}").unwrap_err();
    assert!(matches!(err, TypecheckError::Contradiction { .. }));
}

#[test]
fn variants_and_matches() {
    let source = "type 'a tree = | Leaf | Node of 'a tree * 'a * 'a tree in
        let rec size t = match t with
          | Leaf -> 0
          | Node (l, _, r) -> size l + 1 + size r
        in size (Node (Leaf, 3, Leaf))";
    assert_eq!(type_of(source), "int");
}

#[test]
fn constructor_arity_is_checked() {
    let err = check_source("type t = | A of int * int in A 1").unwrap_err();
    assert!(matches!(
        err,
        TypecheckError::ConstructorArity {
            expected: 2,
            found: 1,
            ..
        }
    ));
}

#[test]
fn unknown_constructor_is_a_variant_env_error() {
    let err = check_source("Nope 1").unwrap_err();
    assert!(matches!(
        err,
        TypecheckError::VariantEnv(VariantEnvError::ConstructorNotFound { .. })
    ));
}

#[test]
fn non_exhaustive_match_is_an_error_by_default() {
    let source = "match Some 1 with | Some x -> x";
    let err = check_source(source).unwrap_err();
    let TypecheckError::NonExhaustive { missing, .. } = &err else {
        panic!("unexpected error {err}");
    };
    assert_eq!(missing, "None");

    let options = CheckOptions {
        exhaustiveness: Exhaustiveness::Warn,
        ..CheckOptions::default()
    };
    let checked = check_source_with(source, options).expect("check");
    assert!(matches!(
        checked.warnings.as_slice(),
        [TypecheckWarning::NonExhaustive { .. }]
    ));
}

#[test]
fn unused_arms_are_warnings() {
    let checked = check_source("match 1 with | _ -> 0 | 1 -> 1").expect("check");
    assert!(matches!(
        checked.warnings.as_slice(),
        [TypecheckWarning::UnusedArm { .. }]
    ));
}

#[test]
fn synonyms_are_transparent() {
    let source = "type point = {x : int, y : int} in
        let origin = ({x = 0, y = 0} : point) in origin.x";
    assert_eq!(type_of(source), "int");
    let source = "type name = string in (\"bob\" : name)";
    assert_eq!(type_of(source), "name");
}

#[test]
fn annotations_constrain_inference() {
    assert_eq!(type_of("(fun x -> x : int -> int)"), "int -> int");
    assert_eq!(type_of("(fun x -> x : 'a -> 'a)"), "'a -> 'a");
    let err = check_source("(1 : string)").unwrap_err();
    assert!(matches!(err, TypecheckError::Contradiction { .. }));
}

#[test]
fn references_have_ref_types() {
    assert_eq!(type_of("let r = ref 1 in r := !r + 1; !r"), "int");
    let err = check_source("let r = ref 1 in r := true").unwrap_err();
    assert!(matches!(err, TypecheckError::Contradiction { .. }));
}

#[test]
fn let_rec_requires_functions() {
    let err = check_source("let rec x = 1 in x").unwrap_err();
    assert!(matches!(err, TypecheckError::RecNotFunction { .. }));
}

#[test]
fn mutual_recursion_generalizes_after_the_group() {
    let source = "let rec even n = if n == 0 then true else odd (n - 1)
        and odd n = if n == 0 then false else even (n - 1)
        in (even 4, odd 3)";
    assert_eq!(type_of(source), "bool * bool");
}

#[test]
fn duplicate_pattern_variables_are_rejected() {
    let err = check_source("match (1, 2) with | (x, x) -> x").unwrap_err();
    assert!(matches!(err, TypecheckError::DuplicateBinding { .. }));
}

#[test]
fn declarations_reject_unknown_type_parameters() {
    let err = check_source("type t = | A of 'a in 0").unwrap_err();
    assert!(matches!(err, TypecheckError::UnboundTypeParameter { .. }));
}

#[test]
fn elaborated_types_are_range_erased() {
    let checked = check_source("let x = 1 in x").expect("check");
    assert_eq!(checked.ty.range, Range::erased());
    let crate::elaborated::CoreExpr::Let { ty, .. } = &checked.expr else {
        panic!("expected let");
    };
    assert_eq!(ty.range, Range::erased());
}

#[test]
fn contradiction_diagnostic_carries_code_and_range() {
    let err = check_source("if 1 then 2 else 3").unwrap_err();
    let diagnostic = err.to_diagnostic();
    assert_eq!(diagnostic.code, "E2002");
    assert!(!diagnostic.range.is_invalid());
    assert!(diagnostic.message.contains("expected of type bool"));
}
