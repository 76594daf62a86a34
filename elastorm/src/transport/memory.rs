//! In-process engine evaluating the query DSL over stored documents
//!
//! Mirrors the engine behaviours the ORM layer depends on: near-real-time
//! visibility (writes show up after a refresh), the default search window of
//! ten hits, engine-assigned ids and type-level mapping deletion.

use super::{Transport, TransportError, TransportResult};
use crate::dsl::{EsQuery, EsSearchRequest, Hit, RangeParams, SortClause, SortDirection};
use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Hits returned when a search names no size.
pub const DEFAULT_WINDOW: usize = 10;

#[derive(Debug, Clone)]
struct StoredDoc {
    id: String,
    /// Version visible to searches
    visible: Option<Map<String, Value>>,
    /// Written but not yet refreshed
    pending: Option<Map<String, Value>>,
}

#[derive(Debug, Default)]
struct DocType {
    docs: Vec<StoredDoc>,
    mapping: Option<Value>,
}

#[derive(Debug, Default)]
struct State {
    indices: HashMap<String, HashMap<String, DocType>>,
    searches: Vec<EsSearchRequest>,
}

/// In-memory [`Transport`].
#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: RwLock<State>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search requests received so far, oldest first.
    pub fn searches(&self) -> Vec<EsSearchRequest> {
        self.state.read().searches.clone()
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.state.read().indices.contains_key(index)
    }

    pub fn mapping(&self, index: &str, doc_type: &str) -> Option<Value> {
        self.state
            .read()
            .indices
            .get(index)
            .and_then(|types| types.get(doc_type))
            .and_then(|t| t.mapping.clone())
    }

    fn matching(&self, index: &str, doc_type: &str, query: &EsQuery) -> TransportResult<Vec<Hit>> {
        let state = self.state.read();
        let types = state
            .indices
            .get(index)
            .ok_or_else(|| TransportError::NotFound(format!("index {index}")))?;
        let Some(docs) = types.get(doc_type) else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        for doc in &docs.docs {
            let Some(source) = &doc.visible else {
                continue;
            };
            if matches(query, &doc.id, source)? {
                hits.push(Hit {
                    index: index.to_string(),
                    id: doc.id.clone(),
                    score: Some(1.0),
                    source: source.clone(),
                });
            }
        }
        Ok(hits)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn search(
        &self,
        index: &str,
        doc_type: &str,
        request: &EsSearchRequest,
    ) -> TransportResult<Vec<Hit>> {
        self.state.write().searches.push(request.clone());

        let query = request.query.clone().unwrap_or_else(EsQuery::match_all);
        let mut hits = self.matching(index, doc_type, &query)?;
        if let Some(sort) = &request.sort {
            sort_hits(&mut hits, sort);
        }

        let from = request.from.unwrap_or(0);
        let size = request.size.unwrap_or(DEFAULT_WINDOW);
        Ok(hits.into_iter().skip(from).take(size).collect())
    }

    async fn count(&self, index: &str, doc_type: &str, query: &EsQuery) -> TransportResult<u64> {
        Ok(self.matching(index, doc_type, query)?.len() as u64)
    }

    async fn index(
        &self,
        index: &str,
        doc_type: &str,
        id: Option<&str>,
        document: &Map<String, Value>,
    ) -> TransportResult<String> {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        let mut state = self.state.write();
        let docs = &mut state
            .indices
            .entry(index.to_string())
            .or_default()
            .entry(doc_type.to_string())
            .or_default()
            .docs;
        match docs.iter_mut().find(|d| d.id == id) {
            Some(existing) => existing.pending = Some(document.clone()),
            None => docs.push(StoredDoc {
                id: id.clone(),
                visible: None,
                pending: Some(document.clone()),
            }),
        }
        Ok(id)
    }

    async fn delete(&self, index: &str, doc_type: &str, id: &str) -> TransportResult<()> {
        let mut state = self.state.write();
        let docs = state
            .indices
            .get_mut(index)
            .and_then(|types| types.get_mut(doc_type))
            .map(|t| &mut t.docs)
            .ok_or_else(|| TransportError::NotFound(format!("{index}/{doc_type}")))?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        if docs.len() == before {
            return Err(TransportError::NotFound(format!("{index}/{doc_type}/{id}")));
        }
        Ok(())
    }

    async fn delete_by_query(
        &self,
        index: &str,
        doc_type: &str,
        query: &EsQuery,
    ) -> TransportResult<u64> {
        let doomed: Vec<String> = self
            .matching(index, doc_type, query)?
            .into_iter()
            .map(|hit| hit.id)
            .collect();

        let mut state = self.state.write();
        if let Some(t) = state
            .indices
            .get_mut(index)
            .and_then(|types| types.get_mut(doc_type))
        {
            t.docs.retain(|d| !doomed.contains(&d.id));
        }
        Ok(doomed.len() as u64)
    }

    async fn put_mapping(&self, index: &str, doc_type: &str, mapping: &Value) -> TransportResult<()> {
        let mut state = self.state.write();
        state
            .indices
            .entry(index.to_string())
            .or_default()
            .entry(doc_type.to_string())
            .or_default()
            .mapping = Some(mapping.clone());
        Ok(())
    }

    async fn delete_mapping(&self, index: &str, doc_type: &str) -> TransportResult<()> {
        let mut state = self.state.write();
        state
            .indices
            .get_mut(index)
            .and_then(|types| types.remove(doc_type))
            .map(|_| ())
            .ok_or_else(|| TransportError::NotFound(format!("{index}/{doc_type}")))
    }

    async fn create_index(&self, index: &str) -> TransportResult<()> {
        let mut state = self.state.write();
        if state.indices.contains_key(index) {
            return Err(TransportError::Status {
                method: "PUT".to_string(),
                path: format!("/{index}"),
                status: 400,
                body: "resource_already_exists_exception".to_string(),
            });
        }
        state.indices.insert(index.to_string(), HashMap::new());
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> TransportResult<()> {
        self.state
            .write()
            .indices
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| TransportError::NotFound(format!("index {index}")))
    }

    async fn refresh(&self, index: &str, doc_type: Option<&str>) -> TransportResult<()> {
        let mut state = self.state.write();
        let types = state
            .indices
            .get_mut(index)
            .ok_or_else(|| TransportError::NotFound(format!("index {index}")))?;
        for (name, t) in types.iter_mut() {
            if doc_type.is_some_and(|wanted| wanted != name) {
                continue;
            }
            for doc in &mut t.docs {
                if let Some(pending) = doc.pending.take() {
                    doc.visible = Some(pending);
                }
            }
        }
        Ok(())
    }

    async fn wait_for_status(&self, _status: &str) -> TransportResult<()> {
        Ok(())
    }
}

/// Values of `field` in a document; arrays are flattened and nulls dropped.
fn field_values(field: &str, id: &str, source: &Map<String, Value>) -> Vec<Value> {
    if field == "_id" {
        return vec![Value::String(id.to_string())];
    }
    match source.get(field) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).cloned().collect(),
        Some(v) => vec![v.clone()],
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn equal(a: &Value, b: &Value) -> bool {
    compare(a, b).map_or(a == b, |o| o == Ordering::Equal)
}

fn in_range(value: &Value, params: &RangeParams) -> bool {
    let check = |bound: &Option<Value>, ok: fn(Ordering) -> bool| {
        bound
            .as_ref()
            .map_or(true, |b| compare(value, b).is_some_and(ok))
    };
    check(&params.gt, |o| o == Ordering::Greater)
        && check(&params.gte, |o| o != Ordering::Less)
        && check(&params.lt, |o| o == Ordering::Less)
        && check(&params.lte, |o| o != Ordering::Greater)
}

/// Anchored regex equivalent of a wildcard pattern.
fn wildcard_regex(pattern: &str) -> TransportResult<Regex> {
    let mut re = String::from("^(?s)");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '\\' => {
                if let Some(next) = chars.next() {
                    re.push_str(&regex::escape(&next.to_string()));
                }
            }
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| TransportError::Other(e.to_string()))
}

fn any_string_matches(values: &[Value], re: &Regex) -> bool {
    values.iter().any(|v| match v {
        Value::String(s) => re.is_match(s),
        other => re.is_match(&other.to_string()),
    })
}

fn matches(query: &EsQuery, id: &str, source: &Map<String, Value>) -> TransportResult<bool> {
    let result = match query {
        EsQuery::MatchAll(_) => true,
        EsQuery::Term(fields) => fields.iter().all(|(field, term)| {
            field_values(field, id, source)
                .iter()
                .any(|v| equal(v, term.value()))
        }),
        EsQuery::Terms(fields) => fields.iter().all(|(field, wanted)| {
            field_values(field, id, source)
                .iter()
                .any(|v| wanted.iter().any(|w| equal(v, w)))
        }),
        EsQuery::Range(fields) => fields.iter().all(|(field, params)| {
            field_values(field, id, source)
                .iter()
                .any(|v| in_range(v, params))
        }),
        EsQuery::Exists(exists) => !field_values(&exists.field, id, source).is_empty(),
        EsQuery::Ids(ids) => ids.values.iter().any(|v| v == id),
        EsQuery::Wildcard(fields) => {
            for (field, params) in fields {
                let re = wildcard_regex(params.pattern())?;
                if !any_string_matches(&field_values(field, id, source), &re) {
                    return Ok(false);
                }
            }
            true
        }
        EsQuery::Regexp(fields) => {
            for (field, params) in fields {
                let re = Regex::new(&format!("^(?:{})$", params.pattern()))
                    .map_err(|e| TransportError::Other(e.to_string()))?;
                if !any_string_matches(&field_values(field, id, source), &re) {
                    return Ok(false);
                }
            }
            true
        }
        EsQuery::Bool(b) => {
            let all = |list: &Option<crate::dsl::QueryList>| -> TransportResult<bool> {
                match list {
                    Some(list) => {
                        for q in list.as_slice() {
                            if !matches(q, id, source)? {
                                return Ok(false);
                            }
                        }
                        Ok(true)
                    }
                    None => Ok(true),
                }
            };
            if !all(&b.must)? || !all(&b.filter)? {
                return Ok(false);
            }
            if let Some(must_not) = &b.must_not {
                for q in must_not.as_slice() {
                    if matches(q, id, source)? {
                        return Ok(false);
                    }
                }
            }
            match &b.should {
                Some(should) if b.must.is_none() && b.filter.is_none() => {
                    let mut any = false;
                    for q in should.as_slice() {
                        if matches(q, id, source)? {
                            any = true;
                            break;
                        }
                    }
                    any
                }
                _ => true,
            }
        }
    };
    Ok(result)
}

/// Stable multi-key sort; documents missing a key sort last either way.
fn sort_hits(hits: &mut [Hit], sort: &[SortClause]) {
    let keys: Vec<(String, SortDirection)> = sort
        .iter()
        .flat_map(|clause| {
            clause
                .fields()
                .into_iter()
                .map(|(f, d)| (f.to_string(), d))
                .collect::<Vec<_>>()
        })
        .collect();

    hits.sort_by(|a, b| {
        for (field, direction) in &keys {
            let av = field_values(field, &a.id, &a.source).into_iter().next();
            let bv = field_values(field, &b.id, &b.source).into_iter().next();
            let ordering = match (av, bv) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(x), Some(y)) => {
                    let o = compare(&x, &y).unwrap_or(Ordering::Equal);
                    match direction {
                        SortDirection::Asc => o,
                        SortDirection::Desc => o.reverse(),
                    }
                }
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}
