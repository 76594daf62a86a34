//! Type coercion between host values and wire (JSON) values
//!
//! Coercion is keyed by a [`FieldType`] tag. Absent values never reach a
//! conversion, lists are converted element by element, and unknown tags pass
//! values through unchanged.

use crate::error::{Error, Result};
use crate::value::{FieldValue, TIMESTAMP_FORMAT};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use std::str::FromStr;

const LIST_PREFIX: &str = "ListField:";

/// Logical field type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Unicode,
    Int,
    Float,
    Bool,
    Date,
    DateTime,
    Time,
    /// `ListField:<subtype>`
    List(Box<FieldType>),
    /// Any tag without a conversion; coerced as identity.
    Other(String),
}

impl FieldType {
    pub fn parse(tag: &str) -> Self {
        if let Some(sub) = tag.strip_prefix(LIST_PREFIX) {
            return Self::List(Box::new(Self::parse(sub)));
        }
        match tag {
            "unicode" => Self::Unicode,
            "int" => Self::Int,
            "float" => Self::Float,
            "bool" => Self::Bool,
            "date" => Self::Date,
            "datetime" => Self::DateTime,
            "time" => Self::Time,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Unicode)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::DateTime | Self::Time)
    }

    /// Element type for list fields, the type itself otherwise.
    pub fn element(&self) -> &FieldType {
        match self {
            Self::List(sub) => sub.element(),
            other => other,
        }
    }
}

impl FromStr for FieldType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<FieldType> for String {
    fn from(ft: FieldType) -> Self {
        ft.to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unicode => write!(f, "unicode"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Bool => write!(f, "bool"),
            Self::Date => write!(f, "date"),
            Self::DateTime => write!(f, "datetime"),
            Self::Time => write!(f, "time"),
            Self::List(sub) => write!(f, "{LIST_PREFIX}{sub}"),
            Self::Other(tag) => write!(f, "{tag}"),
        }
    }
}

/// Date that anchors stored times; only the time of day is meaningful.
fn time_anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default()
}

fn timestamp(dt: NaiveDateTime) -> Value {
    Value::String(dt.format(TIMESTAMP_FORMAT).to_string())
}

fn float(f: f64) -> std::result::Result<Value, String> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| format!("{f} is not representable"))
}

fn truthy(value: &FieldValue) -> bool {
    match value {
        FieldValue::NotProvided | FieldValue::Null => false,
        FieldValue::Bool(b) => *b,
        FieldValue::Int(i) => *i != 0,
        FieldValue::Float(f) => *f != 0.0,
        FieldValue::Text(s) => !s.is_empty(),
        FieldValue::List(items) => !items.is_empty(),
        FieldValue::Date(_) | FieldValue::DateTime(_) | FieldValue::Time(_) => true,
        FieldValue::Json(v) => json_truthy(v),
    }
}

fn json_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Parse any of the timestamp shapes we write or Elasticsearch returns.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    parse_timestamp(s)
        .map(|dt| dt.time())
        .or_else(|| NaiveTime::parse_from_str(s, "%H:%M:%S%.f").ok())
}

/// Convert a host value into its wire representation for `field_type`.
pub fn to_wire(field_type: &FieldType, value: &FieldValue) -> Result<Value> {
    match value {
        FieldValue::NotProvided | FieldValue::Null => Ok(Value::Null),
        FieldValue::List(items) => {
            let element = match field_type {
                FieldType::List(sub) => sub.as_ref(),
                other => other,
            };
            items
                .iter()
                .map(|item| to_wire(element, item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        scalar => scalar_to_wire(field_type, scalar).map_err(|reason| {
            Error::backend("coerce", format!("cannot convert {scalar:?} to {field_type}: {reason}"))
        }),
    }
}

fn scalar_to_wire(field_type: &FieldType, value: &FieldValue) -> std::result::Result<Value, String> {
    match field_type {
        FieldType::Unicode => Ok(Value::String(match value {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Json(Value::String(s)) => s.clone(),
            FieldValue::Json(v) => v.to_string(),
            other => match other.to_json() {
                Value::String(s) => s,
                v => v.to_string(),
            },
        })),
        FieldType::Int => match value {
            FieldValue::Int(i) => Ok(Value::from(*i)),
            FieldValue::Float(f) if f.is_finite() => Ok(Value::from(f.trunc() as i64)),
            FieldValue::Bool(b) => Ok(Value::from(i64::from(*b))),
            FieldValue::Text(s) => s.trim().parse::<i64>().map(Value::from).map_err(|e| e.to_string()),
            FieldValue::Json(Value::Number(n)) if n.is_i64() => Ok(Value::Number(n.clone())),
            other => Err(format!("{other:?} is not an integer")),
        },
        FieldType::Float => match value {
            FieldValue::Float(f) => float(*f),
            FieldValue::Int(i) => float(*i as f64),
            FieldValue::Bool(b) => float(if *b { 1.0 } else { 0.0 }),
            FieldValue::Text(s) => s.trim().parse::<f64>().map_err(|e| e.to_string()).and_then(float),
            FieldValue::Json(Value::Number(n)) => Ok(Value::Number(n.clone())),
            other => Err(format!("{other:?} is not a number")),
        },
        FieldType::Bool => Ok(Value::Bool(truthy(value))),
        FieldType::Date => match value {
            FieldValue::Date(d) => Ok(timestamp(d.and_time(NaiveTime::MIN))),
            FieldValue::DateTime(dt) => Ok(timestamp(dt.date().and_time(NaiveTime::MIN))),
            FieldValue::Text(s) => parse_timestamp(s)
                .map(|dt| timestamp(dt.date().and_time(NaiveTime::MIN)))
                .ok_or_else(|| format!("'{s}' is not a date")),
            other => Err(format!("{other:?} is not a date")),
        },
        FieldType::DateTime => match value {
            FieldValue::DateTime(dt) => Ok(timestamp(*dt)),
            FieldValue::Date(d) => Ok(timestamp(d.and_time(NaiveTime::MIN))),
            FieldValue::Text(s) => parse_timestamp(s)
                .map(timestamp)
                .ok_or_else(|| format!("'{s}' is not a datetime")),
            other => Err(format!("{other:?} is not a datetime")),
        },
        FieldType::Time => match value {
            FieldValue::Time(t) => Ok(timestamp(time_anchor().and_time(*t))),
            FieldValue::DateTime(dt) => Ok(timestamp(time_anchor().and_time(dt.time()))),
            FieldValue::Text(s) => parse_time(s)
                .map(|t| timestamp(time_anchor().and_time(t)))
                .ok_or_else(|| format!("'{s}' is not a time")),
            other => Err(format!("{other:?} is not a time")),
        },
        FieldType::List(sub) => scalar_to_wire(sub, value),
        FieldType::Other(_) => Ok(value.to_json()),
    }
}

/// Convert a wire value back into a host value for `field_type`.
pub fn from_wire(field_type: &FieldType, value: &Value) -> Result<FieldValue> {
    match value {
        Value::Null => Ok(FieldValue::Null),
        Value::Array(items) => {
            let element = match field_type {
                FieldType::List(sub) => sub.as_ref(),
                other => other,
            };
            items
                .iter()
                .map(|item| from_wire(element, item))
                .collect::<Result<Vec<_>>>()
                .map(FieldValue::List)
        }
        scalar => scalar_from_wire(field_type, scalar).map_err(|reason| {
            Error::backend("coerce", format!("cannot read {scalar} as {field_type}: {reason}"))
        }),
    }
}

fn scalar_from_wire(field_type: &FieldType, value: &Value) -> std::result::Result<FieldValue, String> {
    match field_type {
        FieldType::Unicode => Ok(FieldValue::Text(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        FieldType::Int => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                .map(FieldValue::Int)
                .ok_or_else(|| format!("{n} does not fit an integer")),
            Value::Bool(b) => Ok(FieldValue::Int(i64::from(*b))),
            Value::String(s) => s.trim().parse().map(FieldValue::Int).map_err(|e| e.to_string()),
            other => Err(format!("{other} is not an integer")),
        },
        FieldType::Float => match value {
            Value::Number(n) => n
                .as_f64()
                .map(FieldValue::Float)
                .ok_or_else(|| format!("{n} is not a float")),
            Value::Bool(b) => Ok(FieldValue::Float(if *b { 1.0 } else { 0.0 })),
            Value::String(s) => s.trim().parse().map(FieldValue::Float).map_err(|e| e.to_string()),
            other => Err(format!("{other} is not a float")),
        },
        FieldType::Bool => Ok(FieldValue::Bool(json_truthy(value))),
        FieldType::Date => match value {
            Value::String(s) => parse_timestamp(s)
                .map(|dt| FieldValue::Date(dt.date()))
                .ok_or_else(|| format!("'{s}' is not a date")),
            other => Err(format!("{other} is not a date")),
        },
        FieldType::DateTime => match value {
            Value::String(s) => parse_timestamp(s)
                .map(FieldValue::DateTime)
                .ok_or_else(|| format!("'{s}' is not a datetime")),
            other => Err(format!("{other} is not a datetime")),
        },
        FieldType::Time => match value {
            Value::String(s) => parse_time(s)
                .map(FieldValue::Time)
                .ok_or_else(|| format!("'{s}' is not a time")),
            other => Err(format!("{other} is not a time")),
        },
        FieldType::List(sub) => scalar_from_wire(sub, value),
        FieldType::Other(_) => Ok(FieldValue::from_json(value.clone())),
    }
}
