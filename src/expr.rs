use std::fmt;
use std::rc::Rc;

use crate::error::InvalidExpressionError;

/// Interned name of a rule or user function.
pub type Symbol = Rc<str>;

/// A parsing expression.
///
/// Expressions are immutable trees built from terminals and combinators.
/// They are interpreted directly by the evaluator or specialized into
/// closures when a rule is added to a [`Grammar`](crate::Grammar).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Matches any single character.
    AnyChar,
    /// Matches a fixed string, optionally ignoring case.
    Literal { string: String, case_sensitive: bool },
    /// Matches any `n` characters.
    AnyString(usize),
    /// Matches one character covered by any of the ranges.
    CharRanges(Vec<CharRange>),
    /// Reference to a named rule.
    Rule(Symbol),
    /// Matches each subexpression in order; produces the list of
    /// subproductions.
    Sequence(Vec<Expr>),
    /// Ordered choice; the first matching alternative wins.
    Choice(Vec<Expr>),
    /// Zero-width success when the subexpression fails.
    Optional(Box<Expr>),
    /// Greedy repetition.
    Repeat(Box<Expr>, BoundedRepeat),
    /// `&e`: zero-width positive lookahead.
    PosAssert(Box<Expr>),
    /// `!e`: zero-width negative lookahead.
    NegAssert(Box<Expr>),
    /// `~e`: consumes one character if the subexpression fails there.
    Not(Box<Expr>),
    /// Matches the subexpression, then keeps the match only if the named
    /// predicate accepts its production.
    Predicate(Symbol, Box<Expr>),
    /// Delegates matching to a named terminal function.
    Terminal(Symbol),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharRange {
    Single(char),
    Closed(char, char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundedRepeat {
    None,
    Plus,
}

/// Combinator names that cannot be used as rule, predicate, or terminal
/// function names.
pub const RESERVED_NAMES: &[&str] = &[
    "character", "string", "char-ranges", "and", "or", "not", "!", "&", "*", "+", "?", "function",
];

impl Expr {
    pub fn literal(s: impl Into<String>) -> Expr {
        Expr::Literal {
            string: s.into(),
            case_sensitive: true,
        }
    }

    pub fn literal_ci(s: impl Into<String>) -> Expr {
        Expr::Literal {
            string: s.into(),
            case_sensitive: false,
        }
    }

    pub fn any_string(n: usize) -> Expr {
        Expr::AnyString(n)
    }

    pub fn char_ranges(items: impl IntoIterator<Item = CharRange>) -> Expr {
        Expr::CharRanges(items.into_iter().collect())
    }

    pub fn range(lo: char, hi: char) -> Expr {
        Expr::CharRanges(vec![CharRange::Closed(lo, hi)])
    }

    pub fn any_of(chars: &str) -> Expr {
        Expr::CharRanges(chars.chars().map(CharRange::Single).collect())
    }

    pub fn rule(name: &str) -> Expr {
        Expr::Rule(Rc::from(name))
    }

    pub fn sequence(subs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Sequence(subs.into_iter().collect())
    }

    pub fn choice(subs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Choice(subs.into_iter().collect())
    }

    pub fn optional(sub: Expr) -> Expr {
        Expr::Optional(Box::new(sub))
    }

    pub fn star(sub: Expr) -> Expr {
        Expr::Repeat(Box::new(sub), BoundedRepeat::None)
    }

    pub fn plus(sub: Expr) -> Expr {
        Expr::Repeat(Box::new(sub), BoundedRepeat::Plus)
    }

    pub fn followed_by(sub: Expr) -> Expr {
        Expr::PosAssert(Box::new(sub))
    }

    pub fn not_followed_by(sub: Expr) -> Expr {
        Expr::NegAssert(Box::new(sub))
    }

    pub fn not(sub: Expr) -> Expr {
        Expr::Not(Box::new(sub))
    }

    pub fn predicate(name: &str, sub: Expr) -> Expr {
        Expr::Predicate(Rc::from(name), Box::new(sub))
    }

    pub fn terminal(name: &str) -> Expr {
        Expr::Terminal(Rc::from(name))
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Expr {
        Expr::literal(s)
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Expr {
        Expr::Literal {
            string: s,
            case_sensitive: true,
        }
    }
}

impl From<char> for Expr {
    fn from(c: char) -> Expr {
        Expr::literal(c.to_string())
    }
}

pub(crate) fn rule_ref(sym: &Symbol) -> Rc<Expr> {
    Rc::new(Expr::Rule(sym.clone()))
}

/// Checks that an expression is well formed.
///
/// Shape constraints the type system already guarantees (combinator arity,
/// variant tags) need no checking here; what remains is emptiness, range
/// ordering, and the reserved-name restriction on symbols.
pub fn validate(expr: &Expr) -> Result<(), InvalidExpressionError> {
    match expr {
        Expr::AnyChar | Expr::AnyString(_) | Expr::Literal { .. } => Ok(()),
        Expr::CharRanges(items) => {
            if items.is_empty() {
                return Err(invalid(expr, "empty character-range set"));
            }
            for item in items {
                if let CharRange::Closed(lo, hi) = item {
                    if lo > hi {
                        return Err(invalid(
                            expr,
                            &format!("inverted character range {:?}-{:?}", lo, hi),
                        ));
                    }
                }
            }
            Ok(())
        }
        Expr::Rule(name) => check_name(expr, name, "rule"),
        Expr::Terminal(name) => check_name(expr, name, "terminal function"),
        Expr::Predicate(name, sub) => {
            check_name(expr, name, "predicate")?;
            validate(sub)
        }
        Expr::Sequence(subs) => subs.iter().try_for_each(validate),
        Expr::Choice(subs) => {
            if subs.is_empty() {
                return Err(invalid(expr, "ordered choice must not be empty"));
            }
            subs.iter().try_for_each(validate)
        }
        Expr::Optional(sub)
        | Expr::Repeat(sub, _)
        | Expr::PosAssert(sub)
        | Expr::NegAssert(sub)
        | Expr::Not(sub) => validate(sub),
    }
}

fn check_name(expr: &Expr, name: &str, what: &str) -> Result<(), InvalidExpressionError> {
    if name.is_empty() {
        Err(invalid(expr, &format!("empty {} name", what)))
    } else if RESERVED_NAMES.contains(&name) {
        Err(invalid(
            expr,
            &format!("{} name `{}` is a reserved combinator name", what, name),
        ))
    } else {
        Ok(())
    }
}

fn invalid(expr: &Expr, reason: &str) -> InvalidExpressionError {
    InvalidExpressionError {
        expression: expr.to_string(),
        reason: reason.to_string(),
    }
}

const PREC_CHOICE: u8 = 0;
const PREC_SEQ: u8 = 1;
const PREC_PREFIX: u8 = 2;
const PREC_POSTFIX: u8 = 3;

impl Expr {
    fn prec(&self) -> u8 {
        match self {
            Expr::Choice(_) => PREC_CHOICE,
            Expr::Sequence(_) => PREC_SEQ,
            Expr::PosAssert(_) | Expr::NegAssert(_) | Expr::Not(_) => PREC_PREFIX,
            Expr::Optional(_) | Expr::Repeat(..) => PREC_POSTFIX,
            _ => 4,
        }
    }

    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.prec() < min {
            write!(f, "(")?;
            self.fmt_inner(f)?;
            write!(f, ")")
        } else {
            self.fmt_inner(f)
        }
    }

    fn fmt_inner(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::AnyChar => write!(f, "."),
            Expr::Literal {
                string,
                case_sensitive,
            } => {
                write!(f, "{:?}", string)?;
                if !case_sensitive {
                    write!(f, "i")?;
                }
                Ok(())
            }
            Expr::AnyString(1) => write!(f, "<1 char>"),
            Expr::AnyString(n) => write!(f, "<{} chars>", n),
            Expr::CharRanges(items) => {
                write!(f, "[")?;
                for item in items {
                    match item {
                        CharRange::Single(c) => write_set_char(f, *c)?,
                        CharRange::Closed(lo, hi) => {
                            write_set_char(f, *lo)?;
                            write!(f, "-")?;
                            write_set_char(f, *hi)?;
                        }
                    }
                }
                write!(f, "]")
            }
            Expr::Rule(name) => write!(f, "{}", name),
            Expr::Terminal(name) => write!(f, "<{}>", name),
            Expr::Predicate(name, sub) => {
                write!(f, "<{}: ", name)?;
                sub.fmt_prec(f, PREC_CHOICE)?;
                write!(f, ">")
            }
            Expr::Sequence(subs) => {
                if subs.is_empty() {
                    return write!(f, "()");
                }
                for (i, sub) in subs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    sub.fmt_prec(f, PREC_PREFIX)?;
                }
                Ok(())
            }
            Expr::Choice(subs) => {
                for (i, sub) in subs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " / ")?;
                    }
                    sub.fmt_prec(f, PREC_SEQ)?;
                }
                Ok(())
            }
            Expr::Optional(sub) => {
                sub.fmt_prec(f, PREC_POSTFIX)?;
                write!(f, "?")
            }
            Expr::Repeat(sub, BoundedRepeat::None) => {
                sub.fmt_prec(f, PREC_POSTFIX)?;
                write!(f, "*")
            }
            Expr::Repeat(sub, BoundedRepeat::Plus) => {
                sub.fmt_prec(f, PREC_POSTFIX)?;
                write!(f, "+")
            }
            Expr::PosAssert(sub) => {
                write!(f, "&")?;
                sub.fmt_prec(f, PREC_PREFIX)
            }
            Expr::NegAssert(sub) => {
                write!(f, "!")?;
                sub.fmt_prec(f, PREC_PREFIX)
            }
            Expr::Not(sub) => {
                write!(f, "~")?;
                sub.fmt_prec(f, PREC_PREFIX)
            }
        }
    }
}

fn write_set_char(f: &mut fmt::Formatter<'_>, c: char) -> fmt::Result {
    match c {
        ']' | '-' | '\\' => write!(f, "\\{}", c),
        _ => write!(f, "{}", c),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_prec(f, PREC_CHOICE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_peg_notation() {
        let expr = Expr::choice([
            Expr::sequence([Expr::rule("expr"), "+".into(), Expr::rule("num")]),
            Expr::rule("num"),
        ]);
        assert_eq!(expr.to_string(), "expr \"+\" num / num");
    }

    #[test]
    fn display_parenthesizes_by_precedence() {
        let expr = Expr::star(Expr::not_followed_by("x".into()));
        assert_eq!(expr.to_string(), "(!\"x\")*");

        let expr = Expr::not_followed_by(Expr::star("x".into()));
        assert_eq!(expr.to_string(), "!\"x\"*");

        let expr = Expr::sequence([
            Expr::choice(["a".into(), "b".into()]),
            Expr::range('0', '9'),
        ]);
        assert_eq!(expr.to_string(), "(\"a\" / \"b\") [0-9]");
    }

    #[test]
    fn display_marks_case_insensitive_literals() {
        assert_eq!(Expr::literal_ci("foo").to_string(), "\"foo\"i");
    }

    #[test]
    fn validate_rejects_empty_choice() {
        let err = validate(&Expr::Choice(vec![])).unwrap_err();
        assert!(err.reason.contains("choice"));
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let err = validate(&Expr::range('9', '0')).unwrap_err();
        assert!(err.reason.contains("inverted"));
    }

    #[test]
    fn validate_rejects_reserved_names() {
        assert!(validate(&Expr::rule("or")).is_err());
        assert!(validate(&Expr::predicate("not", Expr::AnyChar)).is_err());
        assert!(validate(&Expr::rule("expr")).is_ok());
    }

    #[test]
    fn validate_recurses_into_children() {
        let expr = Expr::sequence([Expr::star(Expr::Choice(vec![]))]);
        assert!(validate(&expr).is_err());
    }
}
