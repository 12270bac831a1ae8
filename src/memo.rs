//! Per-parse state and the memoization protocol, including the seed-grow
//! algorithm that lets left-recursive rules terminate (Warth et al.,
//! "Packrat Parsers Can Support Left Recursion").
//!
//! The cache maps `(rule, position)` to either a final result or a
//! transient left-recursion marker. A marker is placed while a rule's body
//! is being evaluated at a position; an inner invocation of the same rule
//! at the same position finds it and reports left recursion instead of
//! looping. The marker then collects a `Head` describing the cycle, and
//! the outer invocation grows the seed match until it stops extending.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::expr::{rule_ref, Symbol};
use crate::grammar::{Grammar, OnLeftRecursion};
use crate::result::{Abort, EvalResult, Failure, Production, RuleResult};

/// A compiled parsing function: `(state, position) -> result`.
pub(crate) type ParseFn = Rc<dyn Fn(&mut ParseState, usize) -> EvalResult>;

/// State owned by a single top-level parse invocation. Nested parses
/// started from user transforms build their own.
pub(crate) struct ParseState<'a> {
    pub(crate) grammar: &'a Grammar,
    pub(crate) text: &'a str,
    pub(crate) end: usize,
    cache: HashMap<(Symbol, usize), CacheEntry>,
    heads: HashMap<usize, Rc<RefCell<Head>>>,
    stack: Vec<Rc<RefCell<Marker>>>,
    depth: usize,
}

#[derive(Clone)]
enum CacheEntry {
    /// A final result: re-invoking the rule at this position returns it
    /// verbatim (except while a grow iteration re-evaluates involved
    /// rules).
    Answer(RuleResult),
    /// The rule is currently being evaluated at this position. Always
    /// overwritten with an `Answer` before the invocation that placed it
    /// returns.
    Pending(Rc<RefCell<Marker>>),
}

/// Left-recursion bookkeeping for one position: the rule the recursion
/// started at, the rules that participated, and the subset still allowed
/// to re-evaluate in the current grow iteration.
struct Head {
    rule: Symbol,
    involved: HashSet<Symbol>,
    eval: HashSet<Symbol>,
}

/// One pending rule invocation, shared between the cache and the
/// invocation stack.
struct Marker {
    rule: Symbol,
    head: Option<Rc<RefCell<Head>>>,
}

impl<'a> ParseState<'a> {
    pub(crate) fn new(grammar: &'a Grammar, text: &'a str, end: usize) -> ParseState<'a> {
        ParseState {
            grammar,
            text,
            end,
            cache: HashMap::new(),
            heads: HashMap::new(),
            stack: Vec::new(),
            depth: 0,
        }
    }
}

/// Invokes the rule bound to `sym` at `pos` through the memoization
/// protocol.
pub(crate) fn apply_rule(st: &mut ParseState, sym: &Symbol, pos: usize) -> EvalResult {
    match recall(st, sym, pos)? {
        Some(CacheEntry::Answer(result)) => Ok(result),
        Some(CacheEntry::Pending(marker)) => {
            if st.grammar.on_left_recursion() == OnLeftRecursion::Error {
                let mut path: Vec<Symbol> = st.stack.iter().map(|m| m.borrow().rule.clone()).collect();
                path.push(sym.clone());
                return Err(Abort::LeftRecursion {
                    rule: sym.clone(),
                    path,
                });
            }
            let head = {
                let mut pending = marker.borrow_mut();
                match &pending.head {
                    Some(h) => h.clone(),
                    None => {
                        let h = Rc::new(RefCell::new(Head {
                            rule: sym.clone(),
                            involved: HashSet::new(),
                            eval: HashSet::new(),
                        }));
                        pending.head = Some(h.clone());
                        h
                    }
                }
            };
            // Tag every invocation between the recursion point and the
            // head rule as involved in the cycle. The walk stops at the
            // first marker already carrying this head, which includes the
            // pending invocation tagged above.
            for m in st.stack.iter().rev() {
                let mut active = m.borrow_mut();
                if active.head.as_ref().is_some_and(|h| Rc::ptr_eq(h, &head)) {
                    break;
                }
                active.head = Some(head.clone());
                head.borrow_mut().involved.insert(active.rule.clone());
            }
            Ok(RuleResult::Failed(Failure::mismatch(rule_ref(sym), pos)))
        }
        None => {
            let marker = Rc::new(RefCell::new(Marker {
                rule: sym.clone(),
                head: None,
            }));
            st.cache
                .insert((sym.clone(), pos), CacheEntry::Pending(marker.clone()));
            st.stack.push(marker.clone());
            let evaluated = eval_rule_body(st, sym, pos);
            st.stack.pop();
            let result = evaluated?;
            st.cache
                .insert((sym.clone(), pos), CacheEntry::Answer(result.clone()));
            let head = marker.borrow().head.clone();
            match (result, head) {
                // Some descendant reported left recursion through this
                // invocation: grow the seed match.
                (RuleResult::Matched(seed_pos, seed_prod), Some(head)) => {
                    grow_seed(st, sym, pos, head, seed_pos, seed_prod)
                }
                (result, _) => Ok(result),
            }
        }
    }
}

/// Cache lookup honoring an active grow iteration at `pos`.
fn recall(st: &mut ParseState, sym: &Symbol, pos: usize) -> Result<Option<CacheEntry>, Abort> {
    let cached = st.cache.get(&(sym.clone(), pos)).cloned();
    let head = match st.heads.get(&pos) {
        Some(h) => h.clone(),
        None => return Ok(cached),
    };
    let related = {
        let h = head.borrow();
        *sym == h.rule || h.involved.contains(sym)
    };
    // Rules unrelated to the cycle must not run while the seed grows.
    if cached.is_none() && !related {
        return Ok(Some(CacheEntry::Answer(RuleResult::Failed(
            Failure::mismatch(rule_ref(sym), pos),
        ))));
    }
    // Each involved rule re-evaluates once per grow iteration.
    let re_evaluate = head.borrow_mut().eval.remove(sym);
    if re_evaluate {
        let result = eval_rule_body(st, sym, pos)?;
        let entry = CacheEntry::Answer(result);
        st.cache.insert((sym.clone(), pos), entry.clone());
        return Ok(Some(entry));
    }
    Ok(cached)
}

/// Re-evaluates the rule until the match stops extending, keeping the
/// cache updated with the best result so far.
fn grow_seed(
    st: &mut ParseState,
    sym: &Symbol,
    pos: usize,
    head: Rc<RefCell<Head>>,
    mut best_pos: usize,
    mut best_prod: Production,
) -> EvalResult {
    st.heads.insert(pos, head.clone());
    loop {
        {
            let mut h = head.borrow_mut();
            h.eval = h.involved.clone();
        }
        let next = match eval_rule_body(st, sym, pos) {
            Ok(r) => r,
            Err(abort) => {
                st.heads.remove(&pos);
                return Err(abort);
            }
        };
        match next {
            RuleResult::Matched(p, prod) if p > best_pos => {
                best_pos = p;
                best_prod = prod.clone();
                st.cache.insert(
                    (sym.clone(), pos),
                    CacheEntry::Answer(RuleResult::Matched(p, prod)),
                );
            }
            _ => break,
        }
    }
    st.heads.remove(&pos);
    Ok(RuleResult::Matched(best_pos, best_prod))
}

/// Runs the compiled closure currently installed in the rule's cell,
/// emitting trace events when the rule is traced.
fn eval_rule_body(st: &mut ParseState, sym: &Symbol, pos: usize) -> EvalResult {
    let grammar = st.grammar;
    let (func, traced) = match grammar.cell(sym) {
        Some(cell) => match cell.parse_fn() {
            Some(f) => (f, cell.is_traced()),
            None => return Err(Abort::UndefinedRule { rule: sym.clone() }),
        },
        None => return Err(Abort::UndefinedRule { rule: sym.clone() }),
    };
    if !traced {
        return func(st, pos);
    }
    log::trace!(
        "{:indent$}Attempting to match rule `{}` at {}",
        "",
        sym,
        pos,
        indent = st.depth * 2
    );
    st.depth += 1;
    let result = func(st, pos);
    st.depth -= 1;
    match &result {
        Ok(RuleResult::Matched(end, _)) => log::trace!(
            "{:indent$}Matched rule `{}` at {} to {}",
            "",
            sym,
            pos,
            end,
            indent = st.depth * 2
        ),
        Ok(RuleResult::Failed(_)) => log::trace!(
            "{:indent$}Failed to match rule `{}` at {}",
            "",
            sym,
            pos,
            indent = st.depth * 2
        ),
        Err(_) => {}
    }
    result
}
