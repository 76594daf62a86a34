//! Elasticsearch Query DSL request types
//!
//! The subset of the DSL the query builder emits.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Root search request body
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct EsSearchRequest {
    /// The query to execute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<EsQuery>,

    /// Starting offset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<usize>,

    /// Maximum number of results (engine default 10)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,

    /// Sort order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<SortClause>>,
}

/// Body of `_count` and `_delete_by_query`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EsQueryBody {
    pub query: EsQuery,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum SortClause {
    Field(String),
    Object(HashMap<String, SortOrder>),
}

impl SortClause {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        let mut spec = HashMap::new();
        spec.insert(field.into(), SortOrder::Object { order: direction });
        Self::Object(spec)
    }

    /// (field, direction) pairs; a bare field name sorts ascending.
    pub fn fields(&self) -> Vec<(&str, SortDirection)> {
        match self {
            Self::Field(f) => vec![(f.as_str(), SortDirection::Asc)],
            Self::Object(spec) => spec
                .iter()
                .map(|(f, order)| (f.as_str(), order.direction()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum SortOrder {
    Simple(SortDirection),
    Object { order: SortDirection },
}

impl SortOrder {
    pub fn direction(&self) -> SortDirection {
        match self {
            Self::Simple(d) | Self::Object { order: d } => *d,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// ES Query types
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum EsQuery {
    /// Match all documents
    MatchAll(MatchAllQuery),

    /// Term query (exact match, not analyzed)
    Term(HashMap<String, TermValue>),

    /// Terms query (multiple exact matches)
    Terms(HashMap<String, Vec<Value>>),

    /// Range query
    Range(HashMap<String, RangeParams>),

    /// Bool query (must, should, must_not, filter)
    Bool(BoolQuery),

    /// Exists query
    Exists(ExistsQuery),

    /// Wildcard query
    Wildcard(HashMap<String, WildcardParams>),

    /// Regexp query
    Regexp(HashMap<String, RegexpParams>),

    /// IDs query
    Ids(IdsQuery),
}

impl EsQuery {
    pub fn match_all() -> Self {
        Self::MatchAll(MatchAllQuery::default())
    }

    pub fn term(field: impl Into<String>, value: Value) -> Self {
        Self::Term(single(field, TermValue::Simple(value)))
    }

    pub fn terms(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::Terms(single(field, values))
    }

    pub fn range(field: impl Into<String>, params: RangeParams) -> Self {
        Self::Range(single(field, params))
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists(ExistsQuery {
            field: field.into(),
        })
    }

    pub fn wildcard(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Wildcard(single(field, WildcardParams::Simple(pattern.into())))
    }

    pub fn regexp(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Regexp(single(field, RegexpParams::Simple(pattern.into())))
    }

    pub fn ids(values: Vec<String>) -> Self {
        Self::Ids(IdsQuery { values })
    }

    /// `bool` with a single `must_not` clause
    pub fn not(query: EsQuery) -> Self {
        Self::Bool(BoolQuery {
            must_not: Some(QueryList::Multiple(vec![query])),
            ..Default::default()
        })
    }
}

fn single<V>(field: impl Into<String>, value: V) -> HashMap<String, V> {
    let mut map = HashMap::with_capacity(1);
    map.insert(field.into(), value);
    map
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct MatchAllQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost: Option<f32>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum TermValue {
    Object { value: Value, boost: Option<f32> },
    Simple(Value),
}

impl TermValue {
    pub fn value(&self) -> &Value {
        match self {
            Self::Simple(v) | Self::Object { value: v, .. } => v,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RangeParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct BoolQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must: Option<QueryList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should: Option<QueryList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_not: Option<QueryList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<QueryList>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum QueryList {
    Single(Box<EsQuery>),
    Multiple(Vec<EsQuery>),
}

impl QueryList {
    pub fn as_slice(&self) -> &[EsQuery] {
        match self {
            QueryList::Single(q) => std::slice::from_ref(q.as_ref()),
            QueryList::Multiple(v) => v,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ExistsQuery {
    pub field: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum WildcardParams {
    Simple(String),
    Object {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        case_insensitive: Option<bool>,
    },
}

impl WildcardParams {
    pub fn pattern(&self) -> &str {
        match self {
            Self::Simple(s) | Self::Object { value: s, .. } => s,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RegexpParams {
    Simple(String),
    Object {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        case_insensitive: Option<bool>,
    },
}

impl RegexpParams {
    pub fn pattern(&self) -> &str {
        match self {
            Self::Simple(s) | Self::Object { value: s, .. } => s,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct IdsQuery {
    pub values: Vec<String>,
}
