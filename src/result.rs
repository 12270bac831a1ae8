use std::fmt;
use std::rc::Rc;

use once_cell::unsync::OnceCell;

use crate::expr::{Expr, Symbol};
use crate::value::Value;

/// The result type used internally by the parsing engine.
///
/// `Matched` carries the position one past the last consumed character and
/// the (possibly still unevaluated) production. The public API of a
/// [`Grammar`](crate::Grammar) adapts failures to `std::result::Result`.
#[derive(Clone, Debug)]
pub enum RuleResult {
    Matched(usize, Production),
    Failed(Failure),
}

/// A lazily computed production.
///
/// Productions behind lookahead and discarded choice alternatives are never
/// requested, so transforms are deferred into a thunk that is forced at
/// most once; clones share the memoized value.
#[derive(Clone)]
pub struct Production(Rc<ProdInner>);

enum ProdInner {
    Const(Value),
    Lazy(Box<dyn Fn() -> Value>, OnceCell<Value>),
}

impl Production {
    pub fn of(value: Value) -> Production {
        Production(Rc::new(ProdInner::Const(value)))
    }

    pub(crate) fn thunk(f: impl Fn() -> Value + 'static) -> Production {
        Production(Rc::new(ProdInner::Lazy(Box::new(f), OnceCell::new())))
    }

    /// Builds the list production of a sequence or repetition without
    /// forcing the element productions.
    pub(crate) fn list(parts: Vec<Production>) -> Production {
        Production::thunk(move || {
            Value::List(parts.iter().map(|p| p.value()).collect::<Vec<_>>().into())
        })
    }

    /// Forces and returns the production value.
    pub fn value(&self) -> Value {
        match &*self.0 {
            ProdInner::Const(v) => v.clone(),
            ProdInner::Lazy(f, cell) => cell.get_or_init(|| f()).clone(),
        }
    }
}

impl fmt::Debug for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            ProdInner::Const(v) => f.debug_tuple("Production").field(v).finish(),
            ProdInner::Lazy(_, cell) => match cell.get() {
                Some(v) => f.debug_tuple("Production").field(v).finish(),
                None => write!(f, "Production(<unforced>)"),
            },
        }
    }
}

/// A recoverable parse failure.
#[derive(Clone, Debug)]
pub enum Failure {
    /// The rule's guard declared it inactive.
    Inactive { rule: Symbol },
    /// The expression did not match at `position`. `detail` carries the
    /// failure of the subexpression that caused this one, forming a chain
    /// down to the deepest mismatch.
    Mismatch {
        expression: Rc<Expr>,
        position: usize,
        detail: Option<FailureDetail>,
    },
}

#[derive(Clone, Debug)]
pub enum FailureDetail {
    Nested(Box<Failure>),
    Message(String),
}

impl Failure {
    pub(crate) fn mismatch(expression: Rc<Expr>, position: usize) -> Failure {
        Failure::Mismatch {
            expression,
            position,
            detail: None,
        }
    }

    pub(crate) fn mismatch_in(expression: Rc<Expr>, position: usize, inner: Failure) -> Failure {
        Failure::Mismatch {
            expression,
            position,
            detail: Some(FailureDetail::Nested(Box::new(inner))),
        }
    }

    pub fn position(&self) -> Option<usize> {
        match self {
            Failure::Inactive { .. } => None,
            Failure::Mismatch { position, .. } => Some(*position),
        }
    }

    /// The furthest position reached anywhere along the detail chain.
    pub(crate) fn deep_position(&self) -> Option<usize> {
        match self {
            Failure::Inactive { .. } => None,
            Failure::Mismatch {
                position, detail, ..
            } => {
                let mut deepest = *position;
                if let Some(FailureDetail::Nested(inner)) = detail {
                    if let Some(p) = inner.deep_position() {
                        deepest = deepest.max(p);
                    }
                }
                Some(deepest)
            }
        }
    }
}

/// A hard fault that aborts the whole parse, as opposed to a [`Failure`],
/// which the enclosing expression may recover from.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Abort {
    UndefinedRule { rule: Symbol },
    UndefinedFunction { name: Symbol },
    LeftRecursion { rule: Symbol, path: Vec<Symbol> },
}

pub(crate) type EvalResult = Result<RuleResult, Abort>;
