use kindml::typecheck::Reason;
use kindml::{check_source, run, Config, Error, TypecheckError};

#[test]
fn integer_programs_fail_the_output_check() {
    let err = run("1 + 2").unwrap_err();
    assert!(matches!(err, Error::OutputNotString { .. }));
    assert!(err.to_string().contains("the output is not string"));
}

#[test]
fn conditionals_produce_strings() {
    assert_eq!(run("if true then \"yes\" else \"no\"").unwrap(), "yes");
}

#[test]
fn unbound_identifiers_name_the_identifier_and_its_range() {
    let err = run("let x = \"a\" in x ^ missing").unwrap_err();
    let Error::Typecheck(TypecheckError::UnboundVariable { name, range }) = &err else {
        panic!("unexpected error {err}");
    };
    assert_eq!(name, "missing");
    let span = range.span().expect("source range");
    assert_eq!(span.start.line, 1);
    assert_eq!(span.start.column, 20);
    assert_eq!(err.stage(), "TYPECHECK");
}

#[test]
fn self_referential_lists_fail_the_occurs_check() {
    let err = check_source("fun v -> [v] == v", &Config::default()).unwrap_err();
    let Error::Typecheck(TypecheckError::Contradiction { source, .. }) = err else {
        panic!("expected a contradiction");
    };
    assert!(matches!(source.reason, Reason::Occurs { .. }));
}

#[test]
fn reference_aliasing_is_observable() {
    let source = "let a = ref \"before\" in let b = a in b := \"after\"; !a";
    assert_eq!(run(source).unwrap(), "after");
}

#[test]
fn exhaustive_matches_run_and_partial_ones_are_rejected() {
    let source = "type t = | A | B | C in
        let name x = match x with | A -> \"a\" | B -> \"b\" | C -> \"c\" in
        name A ^ name B ^ name C";
    assert_eq!(run(source).unwrap(), "abc");

    let source = "type t = | A | B | C in
        let name x = match x with | A -> \"a\" | B -> \"b\" in
        name C";
    assert!(matches!(
        run(source).unwrap_err(),
        Error::Typecheck(TypecheckError::NonExhaustive { .. })
    ));
}

#[test]
fn syntax_errors_stop_before_checking() {
    let err = run("let x = in x").unwrap_err();
    assert_eq!(err.stage(), "PARSING");
}

#[test]
fn very_long_sums_are_parse_errors() {
    let sum = vec!["1"; 5000].join(" + ");
    let err = check_source(&format!("string_of_int ({sum})"), &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Parse(_)), "unexpected error {err}");
    assert_eq!(err.stage(), "PARSING");

    let sum = vec!["1"; 300].join(" + ");
    assert_eq!(run(&format!("string_of_int ({sum})")).unwrap(), "300");
}

#[test]
fn deeply_nested_parentheses_are_parse_errors() {
    let source = format!("{}\"a\"{}", "(".repeat(100_000), ")".repeat(100_000));
    let err = check_source(&source, &Config::default()).unwrap_err();
    assert!(matches!(err, Error::Parse(_)), "unexpected error {err}");
}

#[test]
fn the_smallest_integer_literal_round_trips() {
    assert_eq!(
        run("string_of_int (-9223372036854775808)").unwrap(),
        "-9223372036854775808"
    );
    let err = run("string_of_int 9223372036854775808").unwrap_err();
    assert!(matches!(err, Error::Parse(_)), "unexpected error {err}");
}
