use std::cell::Cell;
use std::rc::Rc;

use packrat::{Expr, Grammar, ParseError, ParseOptions, Rule, Value};

#[test]
fn incomplete_parse_reports_the_stop_position() {
    let mut g = Grammar::new();
    g.add_rule("r", Rule::new(Expr::literal("ab"))).unwrap();
    match g.parse_rule("r", "abc").unwrap_err() {
        ParseError::Incomplete { position } => assert_eq!(position, 2),
        other => panic!("expected incomplete parse, got {:?}", other),
    }
}

#[test]
fn junk_allowed_returns_the_partial_match() {
    let mut g = Grammar::new();
    g.add_rule("r", Rule::new(Expr::literal("ab"))).unwrap();
    let out = g
        .parse_with(
            &Expr::rule("r"),
            "abc",
            ParseOptions {
                junk_allowed: true,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(out.production, Some(Value::str("ab")));
    assert_eq!(out.rest, Some(2));
    assert!(out.matched);
}

#[test]
fn junk_allowed_turns_failure_into_an_unmatched_output() {
    let mut g = Grammar::new();
    g.add_rule("r", Rule::new(Expr::literal("ab"))).unwrap();
    let out = g
        .parse_with(
            &Expr::rule("r"),
            "xy",
            ParseOptions {
                junk_allowed: true,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(out.production, None);
    assert_eq!(out.rest, Some(0));
    assert!(!out.matched);
}

#[test]
fn mismatch_reports_the_deepest_subexpression() {
    let mut g = Grammar::new();
    g.add_rule(
        "name",
        Rule::new(Expr::choice(["world".into(), "moon".into()])),
    )
    .unwrap();
    g.add_rule(
        "greeting",
        Rule::new(Expr::sequence([
            "hello".into(),
            " ".into(),
            Expr::rule("name"),
        ])),
    )
    .unwrap();
    match g.parse_rule("greeting", "hello x").unwrap_err() {
        ParseError::Mismatch {
            position,
            expression,
            expected,
            chain,
        } => {
            assert_eq!(position, 6);
            assert_eq!(expression, "\"world\" / \"moon\"");
            assert_eq!(expected, "one of \"moon\", \"world\"");
            assert!(chain.iter().any(|c| c == "name"));
            assert!(chain.iter().any(|c| c == "\"hello\" \" \" name"));
        }
        other => panic!("expected mismatch, got {:?}", other),
    }
}

#[test]
fn mismatch_failures_prefer_the_furthest_position() {
    let mut g = Grammar::new();
    g.add_rule(
        "r",
        Rule::new(Expr::choice([
            Expr::sequence(["ab".into(), "c".into()]),
            "q".into(),
        ])),
    )
    .unwrap();
    // The first alternative reaches position 2 before failing; the error
    // points there rather than at the alternative that failed at 0.
    match g.parse_rule("r", "abX").unwrap_err() {
        ParseError::Mismatch {
            position,
            expression,
            ..
        } => {
            assert_eq!(position, 2);
            assert_eq!(expression, "\"c\"");
        }
        other => panic!("expected mismatch, got {:?}", other),
    }
}

#[test]
fn expected_set_lists_start_terminals() {
    let mut g = Grammar::new();
    g.add_rule(
        "r",
        Rule::new(Expr::choice([Expr::rule("word"), Expr::range('0', '9')])),
    )
    .unwrap();
    g.add_rule("word", Rule::new(Expr::literal("foo"))).unwrap();
    match g.parse_rule("r", "zzz").unwrap_err() {
        ParseError::Mismatch {
            expression,
            expected,
            ..
        } => {
            assert_eq!(expression, "word / [0-9]");
            assert_eq!(expected, "one of \"foo\", [0-9]");
        }
        other => panic!("expected mismatch, got {:?}", other),
    }
}

#[test]
fn never_guard_reports_rule_not_active() {
    let mut g = Grammar::new();
    g.add_rule("off", Rule::new(Expr::literal("x")).never()).unwrap();
    match g.parse_rule("off", "x").unwrap_err() {
        ParseError::InactiveRule { rule } => assert_eq!(&*rule, "off"),
        other => panic!("expected inactive rule, got {:?}", other),
    }

    let out = g
        .parse_with(
            &Expr::rule("off"),
            "x",
            ParseOptions {
                junk_allowed: true,
                ..Default::default()
            },
        )
        .unwrap();
    assert!(!out.matched);
}

#[test]
fn when_guard_is_consulted_per_invocation() {
    let enabled = Rc::new(Cell::new(true));
    let flag = enabled.clone();
    let mut g = Grammar::new();
    g.add_rule(
        "r",
        Rule::new(Expr::literal("x")).when(move || flag.get()),
    )
    .unwrap();
    assert_eq!(g.parse_rule("r", "x").unwrap(), Value::str("x"));
    enabled.set(false);
    assert!(matches!(
        g.parse_rule("r", "x").unwrap_err(),
        ParseError::InactiveRule { .. }
    ));
}

#[test]
fn choice_recovers_from_inactive_alternatives() {
    let mut g = Grammar::new();
    g.add_rule("off", Rule::new(Expr::literal("x")).never()).unwrap();
    g.add_rule(
        "r",
        Rule::new(Expr::choice([Expr::rule("off"), "y".into()])),
    )
    .unwrap();
    assert_eq!(g.parse_rule("r", "y").unwrap(), Value::str("y"));

    // With only inactive alternatives, the inactive report surfaces.
    let only = Expr::choice([Expr::rule("off")]);
    assert!(matches!(
        g.parse(&only, "x").unwrap_err(),
        ParseError::InactiveRule { .. }
    ));
}

#[test]
fn undefined_rule_invocation_is_an_error() {
    let mut g = Grammar::new();
    g.add_rule("r", Rule::new(Expr::rule("missing"))).unwrap();
    match g.parse_rule("r", "x").unwrap_err() {
        ParseError::UndefinedRule { rule } => assert_eq!(&*rule, "missing"),
        other => panic!("expected undefined rule, got {:?}", other),
    }
}

#[test]
fn undefined_predicate_is_an_error() {
    let mut g = Grammar::new();
    g.add_rule("r", Rule::new(Expr::predicate("even", Expr::range('0', '9'))))
        .unwrap();
    match g.parse_rule("r", "4").unwrap_err() {
        ParseError::UndefinedFunction { name } => assert_eq!(&*name, "even"),
        other => panic!("expected undefined function, got {:?}", other),
    }
}

#[test]
fn invalid_expressions_are_rejected_by_parse() {
    let g = Grammar::new();
    assert!(matches!(
        g.parse(&Expr::Choice(vec![]), "x").unwrap_err(),
        ParseError::InvalidExpression(_)
    ));
}

#[test]
fn invalid_expressions_are_rejected_by_add_rule() {
    let mut g = Grammar::new();
    assert!(g.add_rule("r", Rule::new(Expr::range('z', 'a'))).is_err());
    assert!(g.find_rule("r").is_none());
}

#[test]
fn out_of_range_bounds_are_rejected() {
    let g = Grammar::new();
    let err = g
        .parse_with(
            &Expr::AnyChar,
            "ab",
            ParseOptions {
                start: Some(5),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, ParseError::Bounds { .. }));
}

#[test]
fn bounds_must_fall_on_character_boundaries() {
    let g = Grammar::new();
    let err = g
        .parse_with(
            &Expr::AnyChar,
            "æx",
            ParseOptions {
                start: Some(1),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, ParseError::Bounds { .. }));
}

#[test]
fn subrange_parsing_respects_start_and_end() {
    let mut g = Grammar::new();
    g.add_rule("r", Rule::new(Expr::plus(Expr::range('a', 'z'))).text())
        .unwrap();
    let out = g
        .parse_with(
            &Expr::rule("r"),
            "12abc45",
            ParseOptions {
                start: Some(2),
                end: Some(5),
                junk_allowed: false,
            },
        )
        .unwrap();
    assert_eq!(out.production, Some(Value::str("abc")));
    assert_eq!(out.rest, None);
}
