use std::fmt;
use std::rc::Rc;

use crate::expr::{Expr, Symbol};
use crate::value::Value;

pub type GuardFn = Rc<dyn Fn() -> bool>;
pub type TransformFn = Rc<dyn Fn(Value, usize, usize) -> Value>;
pub type AroundFn = Rc<dyn Fn(usize, usize, &mut dyn FnMut() -> Value) -> Value>;
pub type PredicateFn = Rc<dyn Fn(&Value) -> bool>;
pub type TerminalFn = Rc<dyn Fn(&str, usize, usize) -> TerminalMatch>;

/// Controls whether a rule participates in parsing.
///
/// `Never` makes every invocation report the rule as inactive; `When` is
/// consulted on each invocation.
#[derive(Clone)]
pub enum Guard {
    Always,
    Never,
    When(GuardFn),
}

#[derive(Clone)]
pub(crate) enum Transform {
    Constant(Value),
    Identity,
    Text,
    Call(TransformFn),
}

/// The result of a terminal function.
///
/// A terminal function is handed `(text, position, end)` and reports the
/// outcome in one of three forms: `Advance` succeeds only if it moved past
/// `position` (or consumed the rest by leaving `end` unset), `Success`
/// forces a match, and `Failure` rejects with an optional message carried
/// into the failure detail.
pub enum TerminalMatch {
    Advance {
        production: Value,
        end: Option<usize>,
    },
    Success {
        production: Value,
        end: Option<usize>,
    },
    Failure {
        end: Option<usize>,
        detail: Option<String>,
    },
}

/// A named parsing rule.
///
/// A rule pairs an expression with the options that shape its production:
/// an activity guard, a transform pipeline, and an optional around
/// wrapper. Rules are created detached and attached to a symbol with
/// [`Grammar::add_rule`](crate::Grammar::add_rule); attachment consumes
/// the rule, so a rule can never be attached to two symbols at once.
pub struct Rule {
    pub(crate) expression: Expr,
    pub(crate) guard: Guard,
    pub(crate) transforms: Vec<Transform>,
    pub(crate) around: Option<AroundFn>,
    pub(crate) symbol: Option<Symbol>,
}

impl Rule {
    pub fn new(expression: Expr) -> Rule {
        Rule {
            expression,
            guard: Guard::Always,
            transforms: Vec::new(),
            around: None,
            symbol: None,
        }
    }

    /// Guards the rule behind a condition checked on every invocation.
    /// Replaces any previously set guard.
    pub fn when(mut self, f: impl Fn() -> bool + 'static) -> Rule {
        self.guard = Guard::When(Rc::new(f));
        self
    }

    /// Marks the rule inactive: every invocation fails with a
    /// rule-not-active error.
    pub fn never(mut self) -> Rule {
        self.guard = Guard::Never;
        self
    }

    /// Appends a transform that discards the production and returns `v`.
    pub fn constant(mut self, v: impl Into<Value>) -> Rule {
        self.transforms.push(Transform::Constant(v.into()));
        self
    }

    /// Appends the identity transform.
    pub fn identity(mut self) -> Rule {
        self.transforms.push(Transform::Identity);
        self
    }

    /// Appends the text transform: flattens the production tree and
    /// concatenates its characters and strings.
    pub fn text(mut self) -> Rule {
        self.transforms.push(Transform::Text);
        self
    }

    /// Appends a transform applied to the production alone.
    pub fn function(mut self, f: impl Fn(Value) -> Value + 'static) -> Rule {
        self.transforms
            .push(Transform::Call(Rc::new(move |v, _, _| f(v))));
        self
    }

    /// Appends a transform that also receives the match bounds.
    pub fn transform(mut self, f: impl Fn(Value, usize, usize) -> Value + 'static) -> Rule {
        self.transforms.push(Transform::Call(Rc::new(f)));
        self
    }

    /// Wraps the transform pipeline. The wrapper receives the match bounds
    /// and a callback that runs the transforms; it may run code around the
    /// callback or not call it at all. Replaces any previous wrapper.
    pub fn around(
        mut self,
        f: impl Fn(usize, usize, &mut dyn FnMut() -> Value) -> Value + 'static,
    ) -> Rule {
        self.around = Some(Rc::new(f));
        self
    }

    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    /// The symbol this rule is attached to, if any.
    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("expression", &self.expression)
            .field("symbol", &self.symbol)
            .field("transforms", &self.transforms.len())
            .finish()
    }
}
