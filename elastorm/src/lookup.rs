//! Lookup operators and their translation into engine filter operands
//!
//! Two tables drive the translation: the positive table, covering every
//! operator, and the negated table, covering the operators whose negation has
//! a direct form. A negated lookup without a direct form keeps its positive
//! operand and stays negated; the builder then files it under `must_not`.

use crate::error::{Error, Result};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// ORM lookup operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    Exact,
    IExact,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    Contains,
    IContains,
    Regex,
    IRegex,
    Gt,
    Gte,
    Lt,
    Lte,
    Range,
    Year,
    In,
    IsNull,
}

impl Lookup {
    pub const ALL: [Lookup; 18] = [
        Self::Exact,
        Self::IExact,
        Self::StartsWith,
        Self::IStartsWith,
        Self::EndsWith,
        Self::IEndsWith,
        Self::Contains,
        Self::IContains,
        Self::Regex,
        Self::IRegex,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Range,
        Self::Year,
        Self::In,
        Self::IsNull,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::IExact => "iexact",
            Self::StartsWith => "startswith",
            Self::IStartsWith => "istartswith",
            Self::EndsWith => "endswith",
            Self::IEndsWith => "iendswith",
            Self::Contains => "contains",
            Self::IContains => "icontains",
            Self::Regex => "regex",
            Self::IRegex => "iregex",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Range => "range",
            Self::Year => "year",
            Self::In => "in",
            Self::IsNull => "isnull",
        }
    }

    pub fn is_case_insensitive(&self) -> bool {
        matches!(
            self,
            Self::IExact | Self::IStartsWith | Self::IEndsWith | Self::IContains | Self::IRegex
        )
    }

    /// Pattern lookups only translate for text fields.
    pub fn is_pattern(&self) -> bool {
        matches!(
            self,
            Self::StartsWith
                | Self::IStartsWith
                | Self::EndsWith
                | Self::IEndsWith
                | Self::Contains
                | Self::IContains
                | Self::Regex
                | Self::IRegex
        )
    }

    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Self::Gt | Self::Gte | Self::Lt | Self::Lte | Self::Range | Self::Year
        )
    }

    /// The lookup whose positive form equals this lookup's negation, for the
    /// single-bound comparisons.
    pub fn complement(&self) -> Option<Lookup> {
        match self {
            Self::Gt => Some(Self::Lte),
            Self::Gte => Some(Self::Lt),
            Self::Lt => Some(Self::Gte),
            Self::Lte => Some(Self::Gt),
            _ => None,
        }
    }
}

impl FromStr for Lookup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| Error::unsupported_lookup(s, "any"))
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interval with per-bound inclusivity. A missing bound is open.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSpec {
    pub from: Option<Value>,
    pub to: Option<Value>,
    pub include_lower: bool,
    pub include_upper: bool,
}

impl RangeSpec {
    pub fn above(from: Value, inclusive: bool) -> Self {
        Self {
            from: Some(from),
            to: None,
            include_lower: inclusive,
            include_upper: false,
        }
    }

    pub fn below(to: Value, inclusive: bool) -> Self {
        Self {
            from: None,
            to: Some(to),
            include_lower: false,
            include_upper: inclusive,
        }
    }

    pub fn between(from: Value, to: Value, include_lower: bool, include_upper: bool) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            include_lower,
            include_upper,
        }
    }
}

/// Engine filter value descriptor produced by the translation tables.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Term(Value),
    NotTerm(Value),
    Terms(Vec<Value>),
    NotTerms(Vec<Value>),
    /// Wildcard pattern (`*` and `?` metacharacters, others escaped).
    Pattern(String),
    Regex(String),
    Range(RangeSpec),
    Missing,
    Present,
}

/// An operand with the negation still owed by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub operand: Operand,
    pub negated: bool,
}

/// Translate a lookup and its coerced value into an operand.
///
/// The negated table is consulted first; when it has an entry the returned
/// `negated` flag is cleared.
pub fn translate(lookup: Lookup, negated: bool, value: Value) -> Result<Resolved> {
    if negated {
        if let Some(operand) = negated_operand(lookup, &value)? {
            return Ok(Resolved {
                operand,
                negated: false,
            });
        }
    }
    Ok(Resolved {
        operand: positive_operand(lookup, value)?,
        negated,
    })
}

fn negated_operand(lookup: Lookup, value: &Value) -> Result<Option<Operand>> {
    let operand = match lookup {
        Lookup::Exact => Operand::NotTerm(value.clone()),
        Lookup::Gt => Operand::Range(RangeSpec::below(value.clone(), true)),
        Lookup::Gte => Operand::Range(RangeSpec::below(value.clone(), false)),
        Lookup::Lt => Operand::Range(RangeSpec::above(value.clone(), true)),
        Lookup::Lte => Operand::Range(RangeSpec::above(value.clone(), false)),
        Lookup::IsNull => {
            if is_true(value) {
                Operand::Present
            } else {
                Operand::Missing
            }
        }
        Lookup::In => Operand::NotTerms(as_list(value.clone())),
        _ => return Ok(None),
    };
    Ok(Some(operand))
}

fn positive_operand(lookup: Lookup, value: Value) -> Result<Operand> {
    let operand = match lookup {
        // iexact does no case folding
        Lookup::Exact | Lookup::IExact => Operand::Term(value),
        Lookup::StartsWith | Lookup::IStartsWith => {
            Operand::Pattern(format!("{}*", escape_wildcard(&pattern_text(lookup, &value))))
        }
        Lookup::EndsWith | Lookup::IEndsWith => {
            Operand::Pattern(format!("*{}", escape_wildcard(&pattern_text(lookup, &value))))
        }
        Lookup::Contains | Lookup::IContains => {
            Operand::Pattern(format!("*{}*", escape_wildcard(&pattern_text(lookup, &value))))
        }
        Lookup::Regex | Lookup::IRegex => Operand::Regex(pattern_text(lookup, &value)),
        Lookup::Gt => Operand::Range(RangeSpec::above(value, false)),
        Lookup::Gte => Operand::Range(RangeSpec::above(value, true)),
        Lookup::Lt => Operand::Range(RangeSpec::below(value, false)),
        Lookup::Lte => Operand::Range(RangeSpec::below(value, true)),
        Lookup::Range => {
            let (from, to) = bounds(lookup, value)?;
            Operand::Range(RangeSpec::between(from, to, true, true))
        }
        Lookup::Year => {
            let (from, to) = match value {
                Value::Number(n) => {
                    let year = n
                        .as_i64()
                        .ok_or_else(|| Error::InvalidValue(format!("year {n} is not an integer")))?;
                    year_bounds(year)
                }
                other => bounds(lookup, other)?,
            };
            Operand::Range(RangeSpec::between(from, to, true, false))
        }
        Lookup::In => Operand::Terms(as_list(value)),
        Lookup::IsNull => {
            if is_true(&value) {
                Operand::Missing
            } else {
                Operand::Present
            }
        }
    };
    Ok(operand)
}

fn is_true(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn as_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

fn bounds(lookup: Lookup, value: Value) -> Result<(Value, Value)> {
    match value {
        Value::Array(items) if items.len() == 2 => {
            let mut items = items.into_iter();
            match (items.next(), items.next()) {
                (Some(from), Some(to)) => Ok((from, to)),
                _ => Err(Error::InvalidValue(format!("{lookup} needs two bounds"))),
            }
        }
        other => Err(Error::InvalidValue(format!(
            "{lookup} needs a two element list, got {other}"
        ))),
    }
}

fn year_bounds(year: i64) -> (Value, Value) {
    (
        Value::String(format!("{year:04}-01-01T00:00:00")),
        Value::String(format!("{:04}-01-01T00:00:00", year + 1)),
    )
}

/// Pattern source text; case-insensitive lookups lower-case it. The match
/// itself keeps the field's own case sensitivity.
fn pattern_text(lookup: Lookup, value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if lookup.is_case_insensitive() {
        text.to_lowercase()
    } else {
        text
    }
}

fn escape_wildcard(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
