use packrat::{Expr, Grammar, Rule, Value};

fn arithmetic() -> Grammar {
    let mut g = Grammar::new();
    g.add_rule(
        "number",
        Rule::new(Expr::plus(Expr::range('0', '9')))
            .transform(|v, _, _| Value::Int(v.text().parse().unwrap())),
    )
    .unwrap();
    g.add_rule(
        "sum",
        Rule::new(Expr::choice([
            Expr::sequence([Expr::rule("sum"), "+".into(), Expr::rule("number")]),
            Expr::rule("number"),
        ]))
        .function(|v| match v {
            Value::List(terms) => {
                let l = terms[0].as_int().unwrap();
                let r = terms[2].as_int().unwrap();
                Value::Int(l + r)
            }
            other => other,
        }),
    )
    .unwrap();
    g
}

#[test]
fn sums_evaluate_left_associatively() {
    let g = arithmetic();
    assert_eq!(g.parse_rule("sum", "1").unwrap(), Value::Int(1));
    assert_eq!(g.parse_rule("sum", "1+1").unwrap(), Value::Int(2));
    assert_eq!(g.parse_rule("sum", "1+1+1").unwrap(), Value::Int(3));
    assert_eq!(g.parse_rule("sum", "1+2+3").unwrap(), Value::Int(6));
    assert_eq!(g.parse_rule("sum", "10+200").unwrap(), Value::Int(210));
}

#[test]
fn text_transform_concatenates_the_match() {
    let mut g = Grammar::new();
    g.add_rule(
        "word",
        Rule::new(Expr::plus(Expr::range('a', 'z'))).text(),
    )
    .unwrap();
    assert_eq!(g.parse_rule("word", "hello").unwrap(), Value::str("hello"));
}

#[test]
fn constant_transform_discards_the_production() {
    let mut g = Grammar::new();
    g.add_rule("yes", Rule::new(Expr::literal("true")).constant(true))
        .unwrap();
    assert_eq!(g.parse_rule("yes", "true").unwrap(), Value::Bool(true));
}

#[test]
fn transforms_compose_in_declaration_order() {
    let mut g = Grammar::new();
    g.add_rule(
        "n",
        Rule::new(Expr::range('0', '9'))
            .function(|v| Value::Int(v.text().parse().unwrap()))
            .function(|v| Value::Int(v.as_int().unwrap() + 1))
            .function(|v| Value::Int(v.as_int().unwrap() * 2)),
    )
    .unwrap();
    // (4 + 1) * 2, not 4 * 2 + 1
    assert_eq!(g.parse_rule("n", "4").unwrap(), Value::Int(10));
}

#[test]
fn around_wrapper_runs_around_the_transform() {
    let mut g = Grammar::new();
    g.add_rule(
        "num",
        Rule::new(Expr::plus(Expr::range('0', '9')))
            .transform(|v, _, _| Value::Int(v.text().parse().unwrap()))
            .around(|start, end, call| {
                Value::list([
                    Value::Int(start as i64),
                    call(),
                    Value::Int(end as i64),
                ])
            }),
    )
    .unwrap();
    assert_eq!(
        g.parse_rule("num", "42").unwrap(),
        Value::list([Value::Int(0), Value::Int(42), Value::Int(2)])
    );
}

#[test]
fn around_wrapper_may_skip_the_transform() {
    let mut g = Grammar::new();
    g.add_rule(
        "num",
        Rule::new(Expr::plus(Expr::range('0', '9')))
            .transform(|_, _, _| panic!("transform must not run"))
            .around(|_, _, _| Value::Nil),
    )
    .unwrap();
    assert_eq!(g.parse_rule("num", "7").unwrap(), Value::Nil);
}

#[test]
fn identity_transform_keeps_the_raw_production() {
    let mut g = Grammar::new();
    g.add_rule("c", Rule::new(Expr::range('a', 'z')).identity())
        .unwrap();
    assert_eq!(g.parse_rule("c", "q").unwrap(), Value::Char('q'));
}

#[test]
fn case_insensitive_literals_match_either_case() {
    let mut g = Grammar::new();
    g.add_rule("kw", Rule::new(Expr::literal_ci("select"))).unwrap();
    assert_eq!(g.parse_rule("kw", "SELECT").unwrap(), Value::str("select"));
    assert_eq!(g.parse_rule("kw", "Select").unwrap(), Value::str("select"));
    assert!(g.parse_rule("kw", "selec").is_err());
}
