//! The rule registry and the parse driver.
//!
//! Rules refer to each other by symbol through per-symbol cells rather
//! than by pointer: the registry owns the cells, cells own the compiled
//! closures and the attached rules, and rules name other rules only
//! symbolically. Cells are created on first reference, so rules may be
//! added in any order.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{self, GrammarError, ParseError};
use crate::expr::{self, Expr, Symbol};
use crate::memo::{self, ParseFn, ParseState};
use crate::result::{Abort, Failure, FailureDetail, RuleResult};
use crate::rule::{Guard, PredicateFn, Rule, TerminalFn, TerminalMatch};
use crate::value::Value;
use crate::{analysis, compile, eval};

/// What to do when a rule invokes itself (directly or through other
/// rules) at the position it is already being evaluated at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OnLeftRecursion {
    /// Run the seed-grow algorithm; left-recursive grammars parse in the
    /// expected left-associative shape.
    #[default]
    Grow,
    /// Abort the parse with [`ParseError::LeftRecursion`].
    Error,
}

#[derive(Default)]
pub(crate) struct RuleCell {
    function: Option<ParseFn>,
    rule: Option<Rule>,
    referents: HashSet<Symbol>,
    traced: bool,
}

impl RuleCell {
    pub(crate) fn parse_fn(&self) -> Option<ParseFn> {
        self.function.clone()
    }

    pub(crate) fn is_traced(&self) -> bool {
        self.traced
    }
}

/// A set of named rules, the named user functions they may call, and the
/// parse entry points.
///
/// Parsing borrows the grammar shared; every mutation requires exclusive
/// access, so a grammar can never change under an in-flight parse.
#[derive(Default)]
pub struct Grammar {
    cells: IndexMap<Symbol, RuleCell>,
    predicates: HashMap<Symbol, PredicateFn>,
    terminals: HashMap<Symbol, TerminalFn>,
    on_left_recursion: OnLeftRecursion,
}

impl Grammar {
    pub fn new() -> Grammar {
        Grammar::default()
    }

    pub fn on_left_recursion(&self) -> OnLeftRecursion {
        self.on_left_recursion
    }

    pub fn set_on_left_recursion(&mut self, policy: OnLeftRecursion) {
        self.on_left_recursion = policy;
    }

    /// Attaches `rule` to `name`, compiling its expression into the
    /// closure invoked by nonterminal references. Replaces any rule
    /// previously attached to the same name.
    pub fn add_rule(&mut self, name: &str, rule: Rule) -> Result<Symbol, GrammarError> {
        expr::validate(&rule.expression)?;
        let sym: Symbol = Rc::from(name);
        self.attach(sym.clone(), rule);
        Ok(sym)
    }

    fn attach(&mut self, sym: Symbol, mut rule: Rule) {
        let old_deps = self
            .cells
            .get(&sym)
            .and_then(|c| c.rule.as_ref())
            .map(|old| analysis::dependencies(old.expression()));
        if let Some(old_deps) = old_deps {
            self.prune_edges(&sym, &old_deps);
        }
        let func = compile::compile_rule(&sym, &rule);
        for dep in analysis::dependencies(&rule.expression) {
            if dep != sym {
                self.cells
                    .entry(dep)
                    .or_insert_with(Default::default)
                    .referents
                    .insert(sym.clone());
            }
        }
        rule.symbol = Some(sym.clone());
        let cell = self.cells.entry(sym).or_insert_with(Default::default);
        cell.function = Some(func);
        cell.rule = Some(rule);
    }

    pub fn find_rule(&self, name: &str) -> Option<&Rule> {
        self.cells.get(name).and_then(|c| c.rule.as_ref())
    }

    /// Detaches and returns the rule bound to `name`. Refuses while other
    /// rules still reference it, unless `force` is set. Returns `None`
    /// when no rule is attached.
    pub fn remove_rule(&mut self, name: &str, force: bool) -> Result<Option<Rule>, GrammarError> {
        let (sym, referents) = match self.cells.get_full(name) {
            Some((_, key, cell)) if cell.rule.is_some() => (
                key.clone(),
                cell.referents.iter().cloned().collect::<Vec<_>>(),
            ),
            _ => return Ok(None),
        };
        if !referents.is_empty() && !force {
            let mut referents = referents;
            referents.sort();
            return Err(GrammarError::HasReferents {
                rule: sym,
                referents,
            });
        }
        let Some(cell) = self.cells.get_mut(&sym) else {
            return Ok(None);
        };
        cell.function = None;
        let Some(mut rule) = cell.rule.take() else {
            return Ok(None);
        };
        let keep_cell = !cell.referents.is_empty() || cell.traced;
        rule.symbol = None;
        let deps = analysis::dependencies(rule.expression());
        self.prune_edges(&sym, &deps);
        if !keep_cell {
            self.cells.shift_remove(&sym);
        }
        Ok(Some(rule))
    }

    /// Swaps the expression of an attached rule, preserving the rule
    /// object, its options, its referents, and its trace state.
    pub fn change_rule(&mut self, name: &str, expression: Expr) -> Result<(), GrammarError> {
        expr::validate(&expression)?;
        let Some(cell) = self.cells.get_mut(name) else {
            return Err(GrammarError::NoSuchRule {
                rule: Rc::from(name),
            });
        };
        let Some(mut rule) = cell.rule.take() else {
            return Err(GrammarError::NoSuchRule {
                rule: Rc::from(name),
            });
        };
        cell.function = None;
        let sym: Symbol = Rc::from(name);
        let old_deps = analysis::dependencies(rule.expression());
        self.prune_edges(&sym, &old_deps);
        rule.expression = expression;
        rule.symbol = None;
        self.attach(sym, rule);
        Ok(())
    }

    /// The nonterminals a rule's expression references, split into those
    /// with a rule attached and those without.
    pub fn rule_dependencies(&self, rule: &Rule) -> (Vec<Symbol>, Vec<Symbol>) {
        let mut defined = Vec::new();
        let mut undefined = Vec::new();
        for dep in analysis::dependencies(rule.expression()) {
            if self.find_rule(&dep).is_some() {
                defined.push(dep);
            } else {
                undefined.push(dep);
            }
        }
        (defined, undefined)
    }

    /// Registers the function behind [`Expr::Predicate`] references.
    pub fn define_predicate(&mut self, name: &str, f: impl Fn(&Value) -> bool + 'static) {
        self.predicates.insert(Rc::from(name), Rc::new(f));
    }

    /// Registers the function behind [`Expr::Terminal`] references.
    pub fn define_terminal(
        &mut self,
        name: &str,
        f: impl Fn(&str, usize, usize) -> TerminalMatch + 'static,
    ) {
        self.terminals.insert(Rc::from(name), Rc::new(f));
    }

    pub(crate) fn predicate(&self, name: &str) -> Option<PredicateFn> {
        self.predicates.get(name).cloned()
    }

    pub(crate) fn terminal(&self, name: &str) -> Option<TerminalFn> {
        self.terminals.get(name).cloned()
    }

    pub(crate) fn cell(&self, name: &str) -> Option<&RuleCell> {
        self.cells.get(name)
    }

    /// Toggles tracing for a rule and returns the previous state. Trace
    /// state may be set before the rule is defined and survives removal
    /// and re-addition.
    pub fn trace_rule(&mut self, name: &str, on: bool) -> bool {
        if !on {
            let mut prev = false;
            let mut drop_cell = false;
            if let Some(cell) = self.cells.get_mut(name) {
                prev = std::mem::replace(&mut cell.traced, false);
                drop_cell = cell.rule.is_none() && cell.referents.is_empty();
            }
            if drop_cell {
                self.cells.shift_remove(name);
            }
            return prev;
        }
        let cell = self
            .cells
            .entry(Rc::from(name))
            .or_insert_with(Default::default);
        std::mem::replace(&mut cell.traced, true)
    }

    pub fn is_traced(&self, name: &str) -> bool {
        self.cells.get(name).map_or(false, |c| c.traced)
    }

    /// A human-readable description of the grammar, one rule per line in
    /// definition order.
    pub fn describe(&self) -> GrammarDescription<'_> {
        GrammarDescription { grammar: self }
    }

    fn prune_edges(&mut self, of: &Symbol, deps: &[Symbol]) {
        for dep in deps {
            if dep == of {
                continue;
            }
            let mut drop_cell = false;
            if let Some(cell) = self.cells.get_mut(dep) {
                cell.referents.remove(of);
                drop_cell = cell.rule.is_none() && cell.referents.is_empty() && !cell.traced;
            }
            if drop_cell {
                self.cells.shift_remove(dep);
            }
        }
    }
}

/// Options for [`Grammar::parse_with`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ParseOptions {
    /// Byte offset to start at; defaults to the beginning.
    pub start: Option<usize>,
    /// Byte offset to stop at; defaults to the end of the input.
    pub end: Option<usize>,
    /// Accept a match that does not reach `end`, and report a failed
    /// match as an output instead of an error.
    pub junk_allowed: bool,
}

/// The `(production, rest, ok)` triple produced by a junk-tolerant parse.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseOutput {
    pub production: Option<Value>,
    /// Position of the first unconsumed character, when input remains.
    pub rest: Option<usize>,
    pub matched: bool,
}

impl Grammar {
    /// Parses `text` with `expression`, requiring the whole input to be
    /// consumed.
    pub fn parse(&self, expression: &Expr, text: &str) -> Result<Value, ParseError> {
        let out = self.parse_with(expression, text, ParseOptions::default())?;
        Ok(out.production.unwrap_or(Value::Nil))
    }

    /// Parses `text` starting from the named rule.
    pub fn parse_rule(&self, name: &str, text: &str) -> Result<Value, ParseError> {
        self.parse(&Expr::rule(name), text)
    }

    pub fn parse_with(
        &self,
        expression: &Expr,
        text: &str,
        options: ParseOptions,
    ) -> Result<ParseOutput, ParseError> {
        expr::validate(expression)?;
        let len = text.len();
        let start = options.start.unwrap_or(0);
        let end = options.end.unwrap_or(len);
        if start > end || end > len || !text.is_char_boundary(start) || !text.is_char_boundary(end)
        {
            return Err(ParseError::Bounds { start, end, len });
        }
        let mut st = ParseState::new(self, text, end);
        let outcome = match expression {
            Expr::Rule(sym) => memo::apply_rule(&mut st, sym, start),
            _ => eval::eval(&mut st, expression, start),
        };
        let result = outcome.map_err(Abort::into_parse_error)?;
        self.finish_parse(result, start, end, options.junk_allowed)
    }

    fn finish_parse(
        &self,
        result: RuleResult,
        start: usize,
        end: usize,
        junk_allowed: bool,
    ) -> Result<ParseOutput, ParseError> {
        match result {
            RuleResult::Matched(position, production) => {
                if position == end {
                    Ok(ParseOutput {
                        production: Some(production.value()),
                        rest: None,
                        matched: true,
                    })
                } else if junk_allowed {
                    Ok(ParseOutput {
                        production: Some(production.value()),
                        rest: Some(position),
                        matched: true,
                    })
                } else {
                    Err(ParseError::Incomplete { position })
                }
            }
            RuleResult::Failed(failure) => {
                if junk_allowed {
                    return Ok(ParseOutput {
                        production: None,
                        rest: Some(start),
                        matched: false,
                    });
                }
                Err(match failure {
                    Failure::Inactive { rule } => ParseError::InactiveRule { rule },
                    failure @ Failure::Mismatch { .. } => self.mismatch_error(failure),
                })
            }
        }
    }

    /// Renders a failure chain: the deepest mismatch names the
    /// subexpression that could not be parsed, and its start terminals
    /// become the expected set.
    fn mismatch_error(&self, failure: Failure) -> ParseError {
        let mut chain = Vec::new();
        let mut deepest_expr = None;
        let mut deepest_pos = 0;
        let mut cur = &failure;
        loop {
            match cur {
                Failure::Mismatch {
                    expression,
                    position,
                    detail,
                } => {
                    chain.push(expression.to_string());
                    deepest_expr = Some(expression);
                    deepest_pos = *position;
                    match detail {
                        Some(FailureDetail::Nested(inner)) => cur = inner,
                        Some(FailureDetail::Message(msg)) => {
                            chain.push(msg.clone());
                            break;
                        }
                        None => break,
                    }
                }
                Failure::Inactive { rule } => {
                    chain.push(format!("rule `{}` (inactive)", rule));
                    break;
                }
            }
        }
        let (expression, expected) = match deepest_expr {
            Some(e) => {
                let terms = analysis::start_terminals(self, e);
                (e.to_string(), error::describe_expected(&terms))
            }
            None => ("<unknown>".to_string(), "<nothing>".to_string()),
        };
        ParseError::Mismatch {
            position: deepest_pos,
            expression,
            expected,
            chain,
        }
    }
}

pub struct GrammarDescription<'a> {
    grammar: &'a Grammar,
}

impl fmt::Display for GrammarDescription<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut undefined = Vec::new();
        for (sym, cell) in &self.grammar.cells {
            match &cell.rule {
                Some(rule) => {
                    write!(f, "{} <- {}", sym, rule.expression())?;
                    if matches!(rule.guard, Guard::Never) {
                        write!(f, " ; inactive")?;
                    }
                    writeln!(f)?;
                }
                None => {
                    if !cell.referents.is_empty() {
                        undefined.push(sym.to_string());
                    }
                }
            }
        }
        if !undefined.is_empty() {
            writeln!(f, "; undefined: {}", undefined.join(", "))?;
        }
        Ok(())
    }
}
