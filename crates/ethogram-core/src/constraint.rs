//! Constraint expressions over a field's own normalised value.
//!
//! ```text
//! expr        := conjunction ( "|" conjunction )*
//! conjunction := comparison ( "&" comparison )*
//! comparison  := (">=" | "<=" | "==" | ">" | "<") number
//! number      := ["+" | "-"] digits [ ("." | ",") digits ]
//! ```
//!
//! `&` binds tighter than `|`, so `"< 30 | > 45 & < 50"` reads as
//! `(< 30) | (> 45 & < 50)`. The operand is implicit: every comparison is
//! against the value of the field the constraint is attached to.

use std::fmt;
use std::str::FromStr;

use nom::{
    IResult,
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, multispace0, one_of},
    combinator::{all_consuming, map_opt, opt, recognize, value},
    multi::separated_list1,
    sequence::{pair, preceded, terminated, tuple},
};

use crate::value::parse_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "==",
        }
    }

    fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Ge => lhs >= rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Lt => lhs < rhs,
            Self::Eq => lhs == rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub op: Comparator,
    pub bound: f64,
}

impl Comparison {
    pub fn holds(&self, value: f64) -> bool {
        self.op.holds(value, self.bound)
    }
}

/// A compiled constraint: a disjunction of conjunctions.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    source: String,
    any_of: Vec<Vec<Comparison>>,
}

impl Constraint {
    /// Parse a constraint expression. The error string points at the first
    /// byte that could not be parsed.
    pub fn parse(source: &str) -> Result<Self, String> {
        match all_consuming(terminated(disjunction, multispace0))(source) {
            Ok((_, any_of)) => Ok(Self {
                source: source.trim().to_string(),
                any_of,
            }),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let offset = source.len() - e.input.len();
                if e.input.trim().is_empty() {
                    Err(format!("unexpected end of expression at byte {offset}"))
                } else {
                    Err(format!("unexpected input at byte {offset}: '{}'", e.input))
                }
            }
            Err(nom::Err::Incomplete(_)) => Err("incomplete expression".to_string()),
        }
    }

    /// Evaluate against a value, left to right. NaN satisfies nothing.
    pub fn evaluate(&self, value: f64) -> bool {
        self.any_of
            .iter()
            .any(|conjunction| conjunction.iter().all(|c| c.holds(value)))
    }

    /// The expression as written in the configuration (trimmed).
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn clauses(&self) -> &[Vec<Comparison>] {
        &self.any_of
    }
}

impl FromStr for Constraint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// ── Parsers ──

fn disjunction(input: &str) -> IResult<&str, Vec<Vec<Comparison>>> {
    separated_list1(preceded(multispace0, char('|')), conjunction)(input)
}

fn conjunction(input: &str) -> IResult<&str, Vec<Comparison>> {
    separated_list1(preceded(multispace0, char('&')), comparison)(input)
}

fn comparison(input: &str) -> IResult<&str, Comparison> {
    let (input, op) = preceded(multispace0, comparator)(input)?;
    let (input, bound) = preceded(multispace0, number)(input)?;
    Ok((input, Comparison { op, bound }))
}

fn comparator(input: &str) -> IResult<&str, Comparator> {
    // Two-character operators first so ">=" is not read as ">".
    alt((
        value(Comparator::Ge, tag(">=")),
        value(Comparator::Le, tag("<=")),
        value(Comparator::Eq, tag("==")),
        value(Comparator::Gt, tag(">")),
        value(Comparator::Lt, tag("<")),
    ))(input)
}

fn number(input: &str) -> IResult<&str, f64> {
    map_opt(
        recognize(tuple((
            opt(one_of("+-")),
            digit1,
            opt(pair(one_of(".,"), digit1)),
        ))),
        parse_number,
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_range() {
        let c = Constraint::parse(">= 30 & <= 45").unwrap();
        assert_eq!(c.clauses().len(), 1);
        assert_eq!(c.clauses()[0].len(), 2);
        assert_eq!(c.clauses()[0][0].op, Comparator::Ge);
        assert_eq!(c.clauses()[0][1].bound, 45.0);
        assert_eq!(c.source(), ">= 30 & <= 45");
    }

    #[test]
    fn range_evaluation() {
        let c = Constraint::parse(">= 30 & <= 45").unwrap();
        assert!(c.evaluate(37.8));
        assert!(c.evaluate(30.0));
        assert!(c.evaluate(45.0));
        assert!(!c.evaluate(29.9));
        assert!(!c.evaluate(45.1));
        assert!(!c.evaluate(f64::NAN));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        // (< 30) | (> 45 & < 50)
        let c = Constraint::parse("< 30 | > 45 & < 50").unwrap();
        assert_eq!(c.clauses().len(), 2);
        assert!(c.evaluate(10.0));
        assert!(c.evaluate(47.0));
        assert!(!c.evaluate(40.0));
        assert!(!c.evaluate(60.0));
    }

    #[test]
    fn whitespace_and_signs() {
        let c = Constraint::parse("  >-5&<+5  ").unwrap();
        assert!(c.evaluate(0.0));
        assert!(!c.evaluate(-5.0));
        assert!(!c.evaluate(5.0));
    }

    #[test]
    fn decimal_comma_in_bounds() {
        let c = Constraint::parse(">= 0,1 & <= 10000").unwrap();
        assert!(c.evaluate(0.1));
        assert!(!c.evaluate(0.05));
    }

    #[test]
    fn equality() {
        let c = Constraint::parse("== 1").unwrap();
        assert!(c.evaluate(1.0));
        assert!(!c.evaluate(1.5));
    }

    #[test]
    fn rejects_malformed() {
        assert!(Constraint::parse("").is_err());
        assert!(Constraint::parse(">=").is_err());
        assert!(Constraint::parse("30").is_err());
        assert!(Constraint::parse(">= 30 &").is_err());
        assert!(Constraint::parse(">= 30 && <= 45").is_err());
        assert!(Constraint::parse("=> 30").is_err());
        assert!(Constraint::parse(">= abc").is_err());
        assert!(Constraint::parse(">= 30 <= 45").is_err());
    }

    #[test]
    fn error_points_at_offending_input() {
        let err = Constraint::parse(">= 30 & ~ 45").unwrap_err();
        assert!(err.contains("byte"), "{err}");
    }

    #[test]
    fn from_str_round_trips_source() {
        let c: Constraint = "> 0".parse().unwrap();
        assert_eq!(c.to_string(), "> 0");
    }

    fn arb_comparator() -> impl Strategy<Value = Comparator> {
        prop::sample::select(vec![
            Comparator::Ge,
            Comparator::Le,
            Comparator::Gt,
            Comparator::Lt,
            Comparator::Eq,
        ])
    }

    proptest! {
        #[test]
        fn and_or_match_boolean_connectives(
            op_a in arb_comparator(),
            a in -100i32..100,
            op_b in arb_comparator(),
            b in -100i32..100,
            value in -120i32..120,
        ) {
            let (a, b, value) = (f64::from(a), f64::from(b), f64::from(value));
            let lhs = Comparison { op: op_a, bound: a }.holds(value);
            let rhs = Comparison { op: op_b, bound: b }.holds(value);

            let both = Constraint::parse(&format!("{} {a} & {} {b}", op_a.as_str(), op_b.as_str())).unwrap();
            prop_assert_eq!(both.evaluate(value), lhs && rhs);

            let either = Constraint::parse(&format!("{} {a} | {} {b}", op_a.as_str(), op_b.as_str())).unwrap();
            prop_assert_eq!(either.evaluate(value), lhs || rhs);
        }
    }
}
