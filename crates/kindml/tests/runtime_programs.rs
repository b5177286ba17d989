use kindml::{run, run_with_config, Config, Error, EvalError};

fn run_ok(source: &str) -> String {
    match run(source) {
        Ok(output) => output,
        Err(err) => panic!("! [ERROR AT {}] {}.", err.stage(), err),
    }
}

#[test]
fn map_and_fold_over_lists() {
    let source = r#"
        let rec map f xs = match xs with
          | [] -> []
          | x :: rest -> f x :: map f rest
        in
        let rec fold f acc xs = match xs with
          | [] -> acc
          | x :: rest -> fold f (f acc x) rest
        in
        let strings = map string_of_int [1, 2, 3] in
        fold (fun acc s -> acc ^ s ^ ";") "" strings
    "#;
    assert_eq!(run_ok(source), "1;2;3;");
}

#[test]
fn option_values_flow_through_matches() {
    let source = r#"
        let rec find p xs = match xs with
          | [] -> None
          | x :: rest -> if p x then Some x else find p rest
        in
        let show o = match o with
          | Some n -> "found " ^ string_of_int n
          | None -> "nothing"
        in
        show (find (fun n -> n > 2) [1, 2, 3, 4]) ^ ", " ^ show (find (fun n -> n > 9) [1])
    "#;
    assert_eq!(run_ok(source), "found 3, nothing");
}

#[test]
fn binary_trees() {
    let source = r#"
        type 'a tree = | Leaf | Node of 'a tree * 'a * 'a tree in
        let rec insert x t = match t with
          | Leaf -> Node (Leaf, x, Leaf)
          | Node (l, y, r) ->
              if x < y then Node (insert x l, y, r)
              else Node (l, y, insert x r)
        in
        let rec to_string t = match t with
          | Leaf -> ""
          | Node (l, x, r) -> to_string l ^ string_of_int x ^ " " ^ to_string r
        in
        let rec build xs t = match xs with
          | [] -> t
          | x :: rest -> build rest (insert x t)
        in
        to_string (build [5, 2, 8, 1, 9] Leaf)
    "#;
    assert_eq!(run_ok(source), "1 2 5 8 9 ");
}

#[test]
fn counters_share_their_cell() {
    let source = r#"
        let make_counter u =
          let count = ref 0 in
          { incr = fun u -> count := !count + 1, read = fun u -> !count }
        in
        let c = make_counter () in
        let alias = c in
        c.incr (); alias.incr (); c.incr ();
        string_of_int (alias.read ())
    "#;
    assert_eq!(run_ok(source), "3");
}

#[test]
fn records_are_updated_functionally() {
    let source = r#"
        let p = {name = "ada", age = 36} in
        let q = {p with age = 37} in
        p.name ^ " " ^ string_of_int p.age ^ " " ^ string_of_int q.age
    "#;
    assert_eq!(run_ok(source), "ada 36 37");
}

#[test]
fn tuple_patterns_in_let() {
    let source = r#"
        let (a, b) = ("left", "right") in
        let swap (x, y) = (y, x) in
        let (c, d) = swap (a, b) in
        c ^ d
    "#;
    assert_eq!(run_ok(source), "rightleft");
}

#[test]
fn string_primitives_count_graphemes() {
    let source = r#"
        let s = "naïve" in
        string_of_int (string_length s) ^ string_sub s 2 3
    "#;
    assert_eq!(run_ok(source), "5ïve");
}

#[test]
fn runtime_failures_are_eval_errors() {
    let err = run("string_of_int (10 / (5 - 5))").unwrap_err();
    assert_eq!(err, Error::Eval(EvalError::DivisionByZero));
    assert_eq!(err.stage(), "EVALUATION");
}

#[test]
fn divergence_is_bounded_by_fuel() {
    let config = Config::from_toml_str("fuel = 10000").expect("config");
    let source = "let rec spin n = spin (n + 1) in (spin 0 : string)";
    let err = run_with_config(source, &config).unwrap_err();
    assert_eq!(err, Error::Eval(EvalError::FuelExhausted));
}

#[test]
fn deep_non_tail_recursion_completes() {
    let source = "let rec range n = if n == 0 then [] else n :: range (n - 1) in
        let rec sum xs = match xs with
          | [] -> 0
          | x :: rest -> x + sum rest
        in string_of_int (sum (range 2000))";
    assert_eq!(run_ok(source), "2001000");
}

#[test]
fn recursion_past_max_depth_is_an_eval_error() {
    let config = Config::from_toml_str("max_depth = 500").expect("config");
    let source = "let rec down n = if n == 0 then 0 else 1 + down (n - 1) in
        string_of_int (down 10000)";
    let err = run_with_config(source, &config).unwrap_err();
    assert_eq!(err, Error::Eval(EvalError::StackDepthExceeded(500)));
}
