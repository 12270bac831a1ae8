use packrat::{Expr, Grammar, OnLeftRecursion, ParseError, Rule, Value};

fn direct() -> Grammar {
    let mut g = Grammar::new();
    g.add_rule(
        "num",
        Rule::new(Expr::plus(Expr::range('0', '9')))
            .transform(|v, _, _| Value::Int(v.text().parse().unwrap())),
    )
    .unwrap();
    g.add_rule(
        "expr",
        Rule::new(Expr::choice([
            Expr::sequence([Expr::rule("expr"), "+".into(), Expr::rule("num")]),
            Expr::rule("num"),
        ])),
    )
    .unwrap();
    g
}

#[test]
fn direct_left_recursion_builds_left_leaning_trees() {
    let g = direct();
    let v = g.parse_rule("expr", "1+2+3").unwrap();
    let expected = Value::list([
        Value::list([Value::Int(1), Value::str("+"), Value::Int(2)]),
        Value::str("+"),
        Value::Int(3),
    ]);
    assert_eq!(v, expected);
}

#[test]
fn direct_left_recursion_handles_the_base_case() {
    let g = direct();
    assert_eq!(g.parse_rule("expr", "7").unwrap(), Value::Int(7));
}

fn indirect() -> Grammar {
    let mut g = Grammar::new();
    g.add_rule(
        "a",
        Rule::new(Expr::choice([
            Expr::sequence([Expr::rule("b"), "x".into()]),
            "a".into(),
        ])),
    )
    .unwrap();
    g.add_rule(
        "b",
        Rule::new(Expr::choice([
            Expr::sequence([Expr::rule("a"), "y".into()]),
            "b".into(),
        ])),
    )
    .unwrap();
    g
}

#[test]
fn indirect_left_recursion_terminates_and_matches() {
    let g = indirect();
    let v = g.parse_rule("a", "ayx").unwrap();
    let expected = Value::list([
        Value::list([Value::str("a"), Value::str("y")]),
        Value::str("x"),
    ]);
    assert_eq!(v, expected);

    assert_eq!(g.parse_rule("a", "a").unwrap(), Value::str("a"));
}

#[test]
fn indirect_left_recursion_still_rejects_mismatches() {
    let g = indirect();
    assert!(g.parse_rule("a", "byx").is_err());
}

#[test]
fn longer_indirect_chains_grow_fully() {
    let g = indirect();
    // a -> b x, b -> a y, alternating all the way down
    let v = g.parse_rule("a", "ayxyx").unwrap();
    let expected = Value::list([
        Value::list([
            Value::list([
                Value::list([Value::str("a"), Value::str("y")]),
                Value::str("x"),
            ]),
            Value::str("y"),
        ]),
        Value::str("x"),
    ]);
    assert_eq!(v, expected);
}

#[test]
fn error_policy_reports_the_recursion_path() {
    let mut g = direct();
    g.set_on_left_recursion(OnLeftRecursion::Error);
    match g.parse_rule("expr", "1+2").unwrap_err() {
        ParseError::LeftRecursion { rule, path } => {
            assert_eq!(&*rule, "expr");
            let path: Vec<&str> = path.iter().map(|s| &**s).collect();
            assert_eq!(path, ["expr", "expr"]);
        }
        other => panic!("expected left recursion error, got {:?}", other),
    }
}

#[test]
fn error_policy_includes_intermediate_rules() {
    let mut g = indirect();
    g.set_on_left_recursion(OnLeftRecursion::Error);
    match g.parse_rule("a", "ayx").unwrap_err() {
        ParseError::LeftRecursion { rule, path } => {
            assert_eq!(&*rule, "a");
            let path: Vec<&str> = path.iter().map(|s| &**s).collect();
            assert_eq!(path, ["a", "b", "a"]);
        }
        other => panic!("expected left recursion error, got {:?}", other),
    }
}

#[test]
fn grow_policy_is_the_default() {
    let g = Grammar::new();
    assert_eq!(g.on_left_recursion(), OnLeftRecursion::Grow);
}
