//! A packrat parser for Parsing Expression Grammars over strings.
//!
//! A [`Grammar`] maps names to [`Rule`]s, each pairing a parsing
//! [`Expr`]ession with options that shape its production. Parsing starts
//! from any expression, memoizes every rule invocation per position, and
//! supports direct and indirect left-recursive rules by growing a seed
//! match (Warth et al., "Packrat Parsers Can Support Left Recursion").
//!
//! ```
//! use packrat::{Expr, Grammar, Rule, Value};
//!
//! let mut grammar = Grammar::new();
//! grammar
//!     .add_rule(
//!         "number",
//!         Rule::new(Expr::plus(Expr::range('0', '9')))
//!             .transform(|v, _, _| Value::Int(v.text().parse().unwrap())),
//!     )
//!     .unwrap();
//! grammar
//!     .add_rule(
//!         "sum",
//!         Rule::new(Expr::choice([
//!             Expr::sequence([Expr::rule("sum"), "+".into(), Expr::rule("number")]),
//!             Expr::rule("number"),
//!         ]))
//!         .function(|v| match v {
//!             Value::List(terms) => {
//!                 let l = terms[0].as_int().unwrap();
//!                 let r = terms[2].as_int().unwrap();
//!                 Value::Int(l + r)
//!             }
//!             other => other,
//!         }),
//!     )
//!     .unwrap();
//!
//! assert_eq!(grammar.parse_rule("sum", "1+2+3").unwrap(), Value::Int(6));
//! ```
//!
//! Ordered choice commits to the first matching alternative and greedy
//! repetition never backtracks; grammars are deterministic by
//! construction. Failed parses carry the chain of failing subexpressions
//! down to the deepest mismatch, which [`ParseError`] reports together
//! with the terminals that could have matched there.
//!
//! Input is borrowed for the duration of a parse and positions are byte
//! offsets into it. Each top-level parse owns its memo table, so parses
//! against a shared grammar are independent, including nested parses
//! started from inside transforms.

mod analysis;
mod compile;
mod eval;
mod expr;
mod grammar;
mod memo;
mod result;
mod rule;
mod value;

pub mod error;

pub use crate::error::{GrammarError, InvalidExpressionError, ParseError};
pub use crate::expr::{validate, BoundedRepeat, CharRange, Expr, Symbol, RESERVED_NAMES};
pub use crate::grammar::{
    Grammar, GrammarDescription, OnLeftRecursion, ParseOptions, ParseOutput,
};
pub use crate::result::{Failure, FailureDetail, Production, RuleResult};
pub use crate::rule::{
    AroundFn, Guard, GuardFn, PredicateFn, Rule, TerminalFn, TerminalMatch, TransformFn,
};
pub use crate::value::Value;
