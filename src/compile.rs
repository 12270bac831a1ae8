//! Specializes expressions into parsing closures. Compilation mirrors the
//! evaluator but resolves subexpressions, string lengths, and structural
//! constants once, when a rule is added, instead of on every invocation.

use std::rc::Rc;

use crate::eval::{
    advance_chars, apply_terminal, char_at, match_literal, ranges_match, ChoiceFailures,
};
use crate::expr::{rule_ref, BoundedRepeat, Expr, Symbol};
use crate::memo::{apply_rule, ParseFn};
use crate::result::{Abort, Failure, FailureDetail, Production, RuleResult};
use crate::rule::{Guard, Rule, Transform, TransformFn};
use crate::value::Value;

pub(crate) fn compile_expression(expr: &Expr) -> ParseFn {
    let node = Rc::new(expr.clone());
    match expr {
        Expr::AnyChar => Rc::new(move |st, pos| {
            Ok(match char_at(st.text, pos, st.end) {
                Some(c) => RuleResult::Matched(pos + c.len_utf8(), Production::of(Value::Char(c))),
                None => RuleResult::Failed(Failure::mismatch(node.clone(), pos)),
            })
        }),

        Expr::Literal {
            string,
            case_sensitive,
        } => {
            let lit = string.clone();
            let cs = *case_sensitive;
            Rc::new(move |st, pos| {
                Ok(match match_literal(st.text, pos, st.end, &lit, cs) {
                    Some(stop) => RuleResult::Matched(stop, Production::of(Value::str(&lit))),
                    None => RuleResult::Failed(Failure::mismatch(node.clone(), pos)),
                })
            })
        }

        Expr::AnyString(n) => {
            let n = *n;
            Rc::new(move |st, pos| {
                Ok(match advance_chars(st.text, pos, st.end, n) {
                    Some(stop) => {
                        RuleResult::Matched(stop, Production::of(Value::str(&st.text[pos..stop])))
                    }
                    None => RuleResult::Failed(Failure::mismatch(node.clone(), pos)),
                })
            })
        }

        Expr::CharRanges(items) => {
            let items = items.clone();
            Rc::new(move |st, pos| {
                Ok(match char_at(st.text, pos, st.end) {
                    Some(c) if ranges_match(&items, c) => {
                        RuleResult::Matched(pos + c.len_utf8(), Production::of(Value::Char(c)))
                    }
                    _ => RuleResult::Failed(Failure::mismatch(node.clone(), pos)),
                })
            })
        }

        Expr::Rule(sym) => {
            let sym = sym.clone();
            Rc::new(move |st, pos| apply_rule(st, &sym, pos))
        }

        Expr::Sequence(subs) => {
            let parts: Vec<ParseFn> = subs.iter().map(compile_expression).collect();
            Rc::new(move |st, pos| {
                let mut at = pos;
                let mut prods = Vec::with_capacity(parts.len());
                for part in &parts {
                    match part(st, at)? {
                        RuleResult::Matched(next, prod) => {
                            at = next;
                            prods.push(prod);
                        }
                        RuleResult::Failed(inner) => {
                            return Ok(RuleResult::Failed(Failure::mismatch_in(
                                node.clone(),
                                pos,
                                inner,
                            )));
                        }
                    }
                }
                Ok(RuleResult::Matched(at, Production::list(prods)))
            })
        }

        Expr::Choice(subs) => compile_choice(node, subs),

        Expr::Optional(sub) => {
            let inner = compile_expression(sub);
            Rc::new(move |st, pos| {
                Ok(match inner(st, pos)? {
                    matched @ RuleResult::Matched(..) => matched,
                    RuleResult::Failed(_) => RuleResult::Matched(pos, Production::of(Value::Nil)),
                })
            })
        }

        Expr::Repeat(sub, bounds) => {
            let inner = compile_expression(sub);
            let min_one = *bounds == BoundedRepeat::Plus;
            Rc::new(move |st, pos| {
                let mut at = pos;
                let mut parts = Vec::new();
                loop {
                    match inner(st, at)? {
                        RuleResult::Matched(next, prod) => {
                            parts.push(prod);
                            if next == at {
                                break;
                            }
                            at = next;
                        }
                        RuleResult::Failed(inner) => {
                            if parts.is_empty() && min_one {
                                return Ok(RuleResult::Failed(Failure::mismatch_in(
                                    node.clone(),
                                    pos,
                                    inner,
                                )));
                            }
                            break;
                        }
                    }
                }
                Ok(RuleResult::Matched(at, Production::list(parts)))
            })
        }

        Expr::PosAssert(sub) => {
            let inner = compile_expression(sub);
            Rc::new(move |st, pos| {
                Ok(match inner(st, pos)? {
                    RuleResult::Matched(_, prod) => RuleResult::Matched(pos, prod),
                    RuleResult::Failed(f) => {
                        RuleResult::Failed(Failure::mismatch_in(node.clone(), pos, f))
                    }
                })
            })
        }

        Expr::NegAssert(sub) => {
            let inner = compile_expression(sub);
            Rc::new(move |st, pos| {
                Ok(match inner(st, pos)? {
                    RuleResult::Failed(_) => RuleResult::Matched(pos, Production::of(Value::Nil)),
                    RuleResult::Matched(..) => {
                        RuleResult::Failed(Failure::mismatch(node.clone(), pos))
                    }
                })
            })
        }

        Expr::Not(sub) => {
            let inner = compile_expression(sub);
            Rc::new(move |st, pos| {
                let c = match char_at(st.text, pos, st.end) {
                    Some(c) => c,
                    None => return Ok(RuleResult::Failed(Failure::mismatch(node.clone(), pos))),
                };
                Ok(match inner(st, pos)? {
                    RuleResult::Failed(_) => {
                        RuleResult::Matched(pos + c.len_utf8(), Production::of(Value::Char(c)))
                    }
                    RuleResult::Matched(..) => {
                        RuleResult::Failed(Failure::mismatch(node.clone(), pos))
                    }
                })
            })
        }

        Expr::Predicate(name, sub) => {
            let inner = compile_expression(sub);
            let name = name.clone();
            Rc::new(move |st, pos| {
                let pred = st
                    .grammar
                    .predicate(&name)
                    .ok_or_else(|| Abort::UndefinedFunction { name: name.clone() })?;
                match inner(st, pos)? {
                    RuleResult::Matched(next, prod) => {
                        if pred(&prod.value()) {
                            Ok(RuleResult::Matched(next, prod))
                        } else {
                            Ok(RuleResult::Failed(Failure::mismatch(node.clone(), pos)))
                        }
                    }
                    RuleResult::Failed(f) => Ok(RuleResult::Failed(Failure::mismatch_in(
                        node.clone(),
                        pos,
                        f,
                    ))),
                }
            })
        }

        Expr::Terminal(name) => {
            let name = name.clone();
            Rc::new(move |st, pos| {
                let f = st
                    .grammar
                    .terminal(&name)
                    .ok_or_else(|| Abort::UndefinedFunction { name: name.clone() })?;
                Ok(apply_terminal(&f, node.clone(), st.text, pos, st.end))
            })
        }
    }
}

/// Compiles an ordered choice. When every alternative is a literal the
/// choice collapses into either a character-set membership test (all
/// alternatives one character long) or an ordered literal scan; otherwise
/// each alternative is compiled and tried in turn.
fn compile_choice(node: Rc<Expr>, alts: &[Expr]) -> ParseFn {
    let literals: Option<Vec<(String, bool)>> = alts
        .iter()
        .map(|alt| match alt {
            Expr::Literal {
                string,
                case_sensitive,
            } => Some((string.clone(), *case_sensitive)),
            _ => None,
        })
        .collect();

    if let Some(lits) = literals {
        warn_shadowed_alternatives(&lits);

        let single_chars: Option<Vec<char>> = lits
            .iter()
            .map(|(s, cs)| {
                let mut chars = s.chars();
                match (chars.next(), chars.next(), *cs) {
                    (Some(c), None, true) => Some(c),
                    _ => None,
                }
            })
            .collect();

        if let Some(set) = single_chars {
            return Rc::new(move |st, pos| {
                Ok(match char_at(st.text, pos, st.end) {
                    Some(c) if set.contains(&c) => {
                        RuleResult::Matched(pos + c.len_utf8(), Production::of(Value::Char(c)))
                    }
                    _ => RuleResult::Failed(Failure::mismatch(node.clone(), pos)),
                })
            });
        }

        return Rc::new(move |st, pos| {
            for (lit, cs) in &lits {
                if let Some(stop) = match_literal(st.text, pos, st.end, lit, *cs) {
                    return Ok(RuleResult::Matched(stop, Production::of(Value::str(lit))));
                }
            }
            Ok(RuleResult::Failed(Failure::mismatch(node.clone(), pos)))
        });
    }

    let compiled: Vec<ParseFn> = alts.iter().map(compile_expression).collect();
    Rc::new(move |st, pos| {
        let mut failures = ChoiceFailures::new();
        for alt in &compiled {
            match alt(st, pos)? {
                matched @ RuleResult::Matched(..) => return Ok(matched),
                RuleResult::Failed(f) => failures.note(f),
            }
        }
        Ok(RuleResult::Failed(failures.into_failure(node.clone(), pos)))
    })
}

/// PEG choice commits to the first match, so a literal preceding one it
/// prefixes makes the longer alternative unreachable. Worth a diagnostic,
/// not an error.
fn warn_shadowed_alternatives(lits: &[(String, bool)]) {
    for (i, (earlier, earlier_cs)) in lits.iter().enumerate() {
        for (later, later_cs) in &lits[i + 1..] {
            let shadows = if *earlier_cs && *later_cs {
                later.len() > earlier.len() && later.starts_with(earlier.as_str())
            } else {
                let earlier = earlier.to_lowercase();
                let later = later.to_lowercase();
                later.chars().count() > earlier.chars().count() && later.starts_with(&earlier)
            };
            if shadows {
                log::warn!(
                    "in choice, alternative {:?} can never match: {:?} precedes it and matches every input it would",
                    later,
                    earlier
                );
            }
        }
    }
}

/// Builds the closure installed in a rule's cell: the compiled expression
/// wrapped with the guard check, the transform pipeline, the around
/// wrapper, and failure attribution to the rule's symbol. Memoization is
/// applied by the caller side, in [`apply_rule`].
pub(crate) fn compile_rule(sym: &Symbol, rule: &Rule) -> ParseFn {
    let body = compile_expression(&rule.expression);
    let guard = rule.guard.clone();
    let transform = combined_transform(&rule.transforms);
    let around = rule.around.clone();
    let node = rule_ref(sym);
    let sym = sym.clone();
    Rc::new(move |st, pos| {
        match &guard {
            Guard::Never => {
                return Ok(RuleResult::Failed(Failure::Inactive { rule: sym.clone() }))
            }
            Guard::When(active) if !active() => {
                return Ok(RuleResult::Failed(Failure::Inactive { rule: sym.clone() }))
            }
            _ => {}
        }
        match body(st, pos)? {
            RuleResult::Matched(end, raw) => {
                let production = match (&transform, &around) {
                    (None, None) => raw,
                    (transform, around) => {
                        let transform = transform.clone();
                        let around = around.clone();
                        Production::thunk(move || {
                            let transform = transform.clone();
                            let raw = raw.clone();
                            let mut run = move || match &transform {
                                Some(t) => t(raw.value(), pos, end),
                                None => raw.value(),
                            };
                            match &around {
                                Some(wrap) => wrap(pos, end, &mut run),
                                None => run(),
                            }
                        })
                    }
                };
                Ok(RuleResult::Matched(end, production))
            }
            RuleResult::Failed(inner) => {
                let position = inner.position().unwrap_or(pos);
                Ok(RuleResult::Failed(Failure::Mismatch {
                    expression: node.clone(),
                    position,
                    detail: Some(FailureDetail::Nested(Box::new(inner))),
                }))
            }
        }
    })
}

fn combined_transform(steps: &[Transform]) -> Option<TransformFn> {
    if steps.is_empty() {
        return None;
    }
    let steps = steps.to_vec();
    Some(Rc::new(move |value, start, end| {
        let mut v = value;
        for step in &steps {
            v = match step {
                Transform::Constant(c) => c.clone(),
                Transform::Identity => v,
                Transform::Text => Value::str(&v.text()),
                Transform::Call(f) => f(v, start, end),
            };
        }
        v
    }))
}
