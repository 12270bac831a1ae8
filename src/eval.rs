//! Direct interpretation of parsing expressions, one evaluation arm per
//! variant, plus the terminal-matching primitives shared with the rule
//! compiler.

use std::rc::Rc;

use crate::expr::{BoundedRepeat, CharRange, Expr};
use crate::memo::{apply_rule, ParseState};
use crate::result::{Abort, EvalResult, Failure, FailureDetail, Production, RuleResult};
use crate::rule::{TerminalFn, TerminalMatch};
use crate::value::Value;

pub(crate) fn eval(st: &mut ParseState, expr: &Expr, pos: usize) -> EvalResult {
    match expr {
        Expr::AnyChar => Ok(match char_at(st.text, pos, st.end) {
            Some(c) => RuleResult::Matched(pos + c.len_utf8(), Production::of(Value::Char(c))),
            None => fail(expr, pos),
        }),

        Expr::Literal {
            string,
            case_sensitive,
        } => Ok(match match_literal(st.text, pos, st.end, string, *case_sensitive) {
            Some(stop) => RuleResult::Matched(stop, Production::of(Value::str(string))),
            None => fail(expr, pos),
        }),

        Expr::AnyString(n) => Ok(match advance_chars(st.text, pos, st.end, *n) {
            Some(stop) => {
                RuleResult::Matched(stop, Production::of(Value::str(&st.text[pos..stop])))
            }
            None => fail(expr, pos),
        }),

        Expr::CharRanges(items) => Ok(match char_at(st.text, pos, st.end) {
            Some(c) if ranges_match(items, c) => {
                RuleResult::Matched(pos + c.len_utf8(), Production::of(Value::Char(c)))
            }
            _ => fail(expr, pos),
        }),

        Expr::Rule(sym) => apply_rule(st, sym, pos),

        Expr::Sequence(subs) => {
            let mut at = pos;
            let mut parts = Vec::with_capacity(subs.len());
            for sub in subs {
                match eval(st, sub, at)? {
                    RuleResult::Matched(next, prod) => {
                        at = next;
                        parts.push(prod);
                    }
                    RuleResult::Failed(inner) => {
                        return Ok(RuleResult::Failed(Failure::mismatch_in(
                            Rc::new(expr.clone()),
                            pos,
                            inner,
                        )));
                    }
                }
            }
            Ok(RuleResult::Matched(at, Production::list(parts)))
        }

        Expr::Choice(subs) => {
            let mut failures = ChoiceFailures::new();
            for sub in subs {
                match eval(st, sub, pos)? {
                    matched @ RuleResult::Matched(..) => return Ok(matched),
                    RuleResult::Failed(f) => failures.note(f),
                }
            }
            Ok(RuleResult::Failed(
                failures.into_failure(Rc::new(expr.clone()), pos),
            ))
        }

        Expr::Optional(sub) => Ok(match eval(st, sub, pos)? {
            matched @ RuleResult::Matched(..) => matched,
            RuleResult::Failed(_) => RuleResult::Matched(pos, Production::of(Value::Nil)),
        }),

        Expr::Repeat(sub, bounds) => {
            let mut at = pos;
            let mut parts = Vec::new();
            loop {
                match eval(st, sub, at)? {
                    RuleResult::Matched(next, prod) => {
                        parts.push(prod);
                        if next == at {
                            break;
                        }
                        at = next;
                    }
                    RuleResult::Failed(inner) => {
                        if parts.is_empty() && *bounds == BoundedRepeat::Plus {
                            return Ok(RuleResult::Failed(Failure::mismatch_in(
                                Rc::new(expr.clone()),
                                pos,
                                inner,
                            )));
                        }
                        break;
                    }
                }
            }
            Ok(RuleResult::Matched(at, Production::list(parts)))
        }

        Expr::PosAssert(sub) => Ok(match eval(st, sub, pos)? {
            RuleResult::Matched(_, prod) => RuleResult::Matched(pos, prod),
            RuleResult::Failed(inner) => {
                RuleResult::Failed(Failure::mismatch_in(Rc::new(expr.clone()), pos, inner))
            }
        }),

        Expr::NegAssert(sub) => Ok(match eval(st, sub, pos)? {
            RuleResult::Failed(_) => RuleResult::Matched(pos, Production::of(Value::Nil)),
            RuleResult::Matched(..) => fail(expr, pos),
        }),

        Expr::Not(sub) => {
            let c = match char_at(st.text, pos, st.end) {
                Some(c) => c,
                None => return Ok(fail(expr, pos)),
            };
            Ok(match eval(st, sub, pos)? {
                RuleResult::Failed(_) => {
                    RuleResult::Matched(pos + c.len_utf8(), Production::of(Value::Char(c)))
                }
                RuleResult::Matched(..) => fail(expr, pos),
            })
        }

        Expr::Predicate(name, sub) => {
            let pred = st
                .grammar
                .predicate(name)
                .ok_or_else(|| Abort::UndefinedFunction { name: name.clone() })?;
            match eval(st, sub, pos)? {
                RuleResult::Matched(next, prod) => {
                    if pred(&prod.value()) {
                        Ok(RuleResult::Matched(next, prod))
                    } else {
                        Ok(fail(expr, pos))
                    }
                }
                RuleResult::Failed(inner) => Ok(RuleResult::Failed(Failure::mismatch_in(
                    Rc::new(expr.clone()),
                    pos,
                    inner,
                ))),
            }
        }

        Expr::Terminal(name) => {
            let f = st
                .grammar
                .terminal(name)
                .ok_or_else(|| Abort::UndefinedFunction { name: name.clone() })?;
            Ok(apply_terminal(&f, Rc::new(expr.clone()), st.text, pos, st.end))
        }
    }
}

fn fail(expr: &Expr, pos: usize) -> RuleResult {
    RuleResult::Failed(Failure::mismatch(Rc::new(expr.clone()), pos))
}

/// Tracks the most informative failure among choice alternatives: the one
/// failing furthest into the input wins, earlier alternatives win ties,
/// and an inactive-rule report is kept only when nothing better appears.
pub(crate) struct ChoiceFailures {
    best: Option<Failure>,
    max_pos: Option<usize>,
}

impl ChoiceFailures {
    pub(crate) fn new() -> ChoiceFailures {
        ChoiceFailures {
            best: None,
            max_pos: None,
        }
    }

    pub(crate) fn note(&mut self, f: Failure) {
        if let Some(p) = f.position() {
            self.max_pos = Some(self.max_pos.map_or(p, |m| m.max(p)));
        }
        let replace = match (&self.best, &f) {
            (None, _) => true,
            (Some(Failure::Inactive { .. }), Failure::Mismatch { .. }) => true,
            (
                Some(Failure::Mismatch { position: best, .. }),
                Failure::Mismatch { position: new, .. },
            ) => new > best,
            _ => false,
        };
        if replace {
            self.best = Some(f);
        }
    }

    pub(crate) fn into_failure(self, expression: Rc<Expr>, start: usize) -> Failure {
        match self.best {
            Some(inactive @ Failure::Inactive { .. }) => inactive,
            best => {
                let position = self.max_pos.unwrap_or(start);
                // The choice node aggregates its alternatives: the kept
                // alternative's chain is attached only when it reached
                // strictly further than the choice itself, so error
                // reporting stops at the choice for alternatives that
                // all failed where it started.
                let detail = best
                    .filter(|b| b.deep_position().is_some_and(|p| p > position))
                    .map(|b| FailureDetail::Nested(Box::new(b)));
                Failure::Mismatch {
                    expression,
                    position,
                    detail,
                }
            }
        }
    }
}

/// Runs a terminal function and adapts its report to an engine result.
pub(crate) fn apply_terminal(
    f: &TerminalFn,
    expression: Rc<Expr>,
    text: &str,
    pos: usize,
    end: usize,
) -> RuleResult {
    match f(text, pos, end) {
        TerminalMatch::Success { production, end: e } => {
            RuleResult::Matched(e.unwrap_or(end), Production::of(production))
        }
        TerminalMatch::Advance { production, end: e } => match e {
            None => RuleResult::Matched(end, Production::of(production)),
            Some(stop) if stop > pos => RuleResult::Matched(stop, Production::of(production)),
            Some(stop) => RuleResult::Failed(Failure::mismatch(expression, stop)),
        },
        TerminalMatch::Failure { end: e, detail } => RuleResult::Failed(Failure::Mismatch {
            expression,
            position: e.unwrap_or(pos),
            detail: detail.map(FailureDetail::Message),
        }),
    }
}

pub(crate) fn char_at(text: &str, pos: usize, end: usize) -> Option<char> {
    text[pos..end].chars().next()
}

/// Matches `lit` at `pos`, returning the position past the match. The
/// case-insensitive path compares character by character under simple
/// case folding and advances by the input's length, which may differ from
/// the literal's.
pub(crate) fn match_literal(
    text: &str,
    pos: usize,
    end: usize,
    lit: &str,
    case_sensitive: bool,
) -> Option<usize> {
    if case_sensitive {
        let stop = pos + lit.len();
        if stop <= end && text.as_bytes()[pos..stop] == *lit.as_bytes() {
            Some(stop)
        } else {
            None
        }
    } else {
        let mut at = pos;
        let mut input = text[pos..end].chars();
        for want in lit.chars() {
            let got = input.next()?;
            if !fold_eq(got, want) {
                return None;
            }
            at += got.len_utf8();
        }
        Some(at)
    }
}

fn fold_eq(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

pub(crate) fn advance_chars(text: &str, pos: usize, end: usize, n: usize) -> Option<usize> {
    let mut at = pos;
    let mut chars = text[pos..end].chars();
    for _ in 0..n {
        at += chars.next()?.len_utf8();
    }
    Some(at)
}

pub(crate) fn ranges_match(items: &[CharRange], c: char) -> bool {
    items.iter().any(|item| match item {
        CharRange::Single(s) => *s == c,
        CharRange::Closed(lo, hi) => *lo <= c && c <= *hi,
    })
}
