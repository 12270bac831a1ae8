use thiserror::Error;

use crate::expr::Symbol;
use crate::result::Abort;

/// An error surfaced by the parse driver.
///
/// Engine-internal failures are recovered locally during parsing; only the
/// driver converts the final outcome into one of these.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The input did not match. `expression` is the deepest subexpression
    /// that could not be parsed, `chain` the failing expressions from the
    /// outermost down to it.
    #[error("could not parse {expression} at position {position} (expected {expected})")]
    Mismatch {
        position: usize,
        expression: String,
        expected: String,
        chain: Vec<String>,
    },
    /// The expression matched a proper prefix of the input and junk was
    /// not allowed.
    #[error("incomplete parse: input remains at position {position}")]
    Incomplete { position: usize },
    #[error("rule `{rule}` is not active")]
    InactiveRule { rule: Symbol },
    #[error("undefined rule `{rule}`")]
    UndefinedRule { rule: Symbol },
    #[error("undefined function `{name}` referenced from grammar")]
    UndefinedFunction { name: Symbol },
    #[error("left recursive rules create an infinite loop: {}", .path.join(" -> "))]
    LeftRecursion { rule: Symbol, path: Vec<Symbol> },
    #[error(transparent)]
    InvalidExpression(#[from] InvalidExpressionError),
    #[error("parse bounds {start}..{end} invalid for input of length {len}")]
    Bounds { start: usize, end: usize, len: usize },
}

/// An error from a grammar mutation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GrammarError {
    #[error(transparent)]
    InvalidExpression(#[from] InvalidExpressionError),
    #[error("no rule named `{rule}`")]
    NoSuchRule { rule: Symbol },
    #[error("rule `{rule}` is referenced by {}; pass force to remove it anyway", .referents.join(", "))]
    HasReferents {
        rule: Symbol,
        referents: Vec<Symbol>,
    },
}

/// A malformed parsing expression, reported by expression validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid parsing expression {expression}: {reason}")]
pub struct InvalidExpressionError {
    pub expression: String,
    pub reason: String,
}

impl Abort {
    pub(crate) fn into_parse_error(self) -> ParseError {
        match self {
            Abort::UndefinedRule { rule } => ParseError::UndefinedRule { rule },
            Abort::UndefinedFunction { name } => ParseError::UndefinedFunction { name },
            Abort::LeftRecursion { rule, path } => ParseError::LeftRecursion { rule, path },
        }
    }
}

/// Renders an expected-terminal set for an error message.
pub(crate) fn describe_expected(terms: &[String]) -> String {
    match terms {
        [] => "<nothing>".to_string(),
        [one] => one.clone(),
        many => format!("one of {}", many.join(", ")),
    }
}
