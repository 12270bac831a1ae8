//! Static walks over expression trees: nonterminal dependencies and the
//! start-terminal sets used for "expected ..." error reporting.

use std::collections::HashSet;

use crate::expr::{BoundedRepeat, Expr, Symbol};
use crate::grammar::Grammar;

/// Nonterminals referenced by an expression, in first-reference order.
pub(crate) fn dependencies(expr: &Expr) -> Vec<Symbol> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    collect_dependencies(expr, &mut seen, &mut out);
    out
}

fn collect_dependencies(expr: &Expr, seen: &mut HashSet<Symbol>, out: &mut Vec<Symbol>) {
    match expr {
        Expr::Rule(sym) => {
            if seen.insert(sym.clone()) {
                out.push(sym.clone());
            }
        }
        Expr::Sequence(subs) | Expr::Choice(subs) => {
            for sub in subs {
                collect_dependencies(sub, seen, out);
            }
        }
        Expr::Optional(sub)
        | Expr::Repeat(sub, _)
        | Expr::PosAssert(sub)
        | Expr::NegAssert(sub)
        | Expr::Not(sub)
        | Expr::Predicate(_, sub) => collect_dependencies(sub, seen, out),
        Expr::AnyChar
        | Expr::Literal { .. }
        | Expr::AnyString(_)
        | Expr::CharRanges(_)
        | Expr::Terminal(_) => {}
    }
}

/// Descriptions of the terminals that could begin a match of `expr`,
/// following nullable prefixes through sequences and rule references.
pub(crate) fn start_terminals(grammar: &Grammar, expr: &Expr) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    walk_start(grammar, expr, &mut seen, &mut out);
    out.sort();
    out.dedup();
    out
}

/// Returns whether `expr` can match without consuming input, pushing the
/// terminal descriptions it may start with.
fn walk_start(
    grammar: &Grammar,
    expr: &Expr,
    seen: &mut HashSet<Symbol>,
    out: &mut Vec<String>,
) -> bool {
    match expr {
        Expr::AnyChar => {
            out.push("any character".to_string());
            false
        }
        Expr::Literal {
            string,
            case_sensitive,
        } => {
            if *case_sensitive {
                out.push(format!("{:?}", string));
            } else {
                out.push(format!("{:?} (case insensitive)", string));
            }
            string.is_empty()
        }
        Expr::AnyString(n) => {
            if *n == 1 {
                out.push("any character".to_string());
            } else {
                out.push(format!("any {} characters", n));
            }
            *n == 0
        }
        Expr::CharRanges(_) => {
            out.push(expr.to_string());
            false
        }
        Expr::Terminal(name) => {
            out.push(format!("<{}>", name));
            false
        }
        Expr::Rule(sym) => {
            if !seen.insert(sym.clone()) {
                return false;
            }
            match grammar.find_rule(sym) {
                Some(rule) => walk_start(grammar, rule.expression(), seen, out),
                None => {
                    out.push(format!("rule `{}`", sym));
                    false
                }
            }
        }
        Expr::Sequence(subs) => {
            for sub in subs {
                if !walk_start(grammar, sub, seen, out) {
                    return false;
                }
            }
            true
        }
        Expr::Choice(subs) => {
            let mut nullable = false;
            for sub in subs {
                nullable |= walk_start(grammar, sub, seen, out);
            }
            nullable
        }
        Expr::Optional(sub) | Expr::Repeat(sub, BoundedRepeat::None) => {
            walk_start(grammar, sub, seen, out);
            true
        }
        Expr::Repeat(sub, BoundedRepeat::Plus) => walk_start(grammar, sub, seen, out),
        Expr::PosAssert(sub) => {
            walk_start(grammar, sub, seen, out);
            true
        }
        Expr::NegAssert(_) => {
            out.push(expr.to_string());
            true
        }
        Expr::Not(_) => {
            out.push(expr.to_string());
            false
        }
        Expr::Predicate(_, sub) => walk_start(grammar, sub, seen, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Rule;

    #[test]
    fn dependencies_are_unique_and_ordered() {
        let expr = Expr::sequence([
            Expr::rule("a"),
            Expr::choice([Expr::rule("b"), Expr::rule("a")]),
            Expr::star(Expr::rule("c")),
        ]);
        let deps = dependencies(&expr);
        let names: Vec<&str> = deps.iter().map(|s| &**s).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn start_terminals_follow_nullable_prefixes() {
        let mut g = Grammar::new();
        g.add_rule("ws", Rule::new(Expr::star(Expr::any_of(" \t"))))
            .unwrap();
        g.add_rule(
            "item",
            Rule::new(Expr::sequence([Expr::rule("ws"), Expr::range('0', '9')])),
        )
        .unwrap();
        let terms = start_terminals(&g, &Expr::rule("item"));
        assert_eq!(terms, ["[ \t]", "[0-9]"]);
    }

    #[test]
    fn start_terminals_handle_recursive_rules() {
        let mut g = Grammar::new();
        g.add_rule(
            "expr",
            Rule::new(Expr::choice([
                Expr::sequence([Expr::rule("expr"), "+".into()]),
                "x".into(),
            ])),
        )
        .unwrap();
        let terms = start_terminals(&g, &Expr::rule("expr"));
        assert_eq!(terms, ["\"x\""]);
    }
}
