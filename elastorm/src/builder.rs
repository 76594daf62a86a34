//! Filter accumulator: builds the boolean query for one ORM query plan

use crate::coerce::{to_wire, FieldType};
use crate::dsl::{BoolQuery, EsQuery, QueryList, RangeParams, SortClause, SortDirection};
use crate::error::{Error, Result};
use crate::lookup::{translate, Lookup, Operand, RangeSpec};
use crate::safety::guard_build;
use crate::value::FieldValue;
use serde_json::Value;
use tracing::{debug, warn};

/// Engine-native document identifier field.
pub const ID_FIELD: &str = "_id";

/// One filter clause as handed over by the host query plan.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupSpec {
    pub column: String,
    pub lookup: Lookup,
    pub negated: bool,
    pub field_type: FieldType,
    pub value: FieldValue,
}

impl LookupSpec {
    pub fn new(
        column: impl Into<String>,
        lookup: Lookup,
        field_type: FieldType,
        value: impl Into<FieldValue>,
    ) -> Self {
        Self {
            column: column.into(),
            lookup,
            negated: false,
            field_type,
            value: value.into(),
        }
    }

    /// Build from the raw tuple shape: operator name and field-type tag as
    /// strings. An unknown operator name is an unsupported lookup.
    pub fn from_parts(
        column: &str,
        lookup: &str,
        negated: bool,
        field_type: &str,
        value: FieldValue,
    ) -> Result<Self> {
        let lookup = guard_build("add_filter", column, None, lookup.parse())?;
        Ok(Self {
            column: column.to_string(),
            lookup,
            negated,
            field_type: FieldType::parse(field_type),
            value,
        })
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }
}

/// Accumulated query state.
///
/// Owned by exactly one query; not `Clone`, consumed by execution. With no
/// clauses it means "match everything".
#[derive(Debug)]
pub struct QueryBuilder {
    pk_column: String,
    must: Vec<EsQuery>,
    must_not: Vec<EsQuery>,
    sort: Vec<SortClause>,
}

impl QueryBuilder {
    pub fn new(pk_column: impl Into<String>) -> Self {
        Self {
            pk_column: pk_column.into(),
            must: Vec::new(),
            must_not: Vec::new(),
            sort: Vec::new(),
        }
    }

    /// Add one filter clause. A rejected clause leaves the state untouched.
    pub fn add_filter(&mut self, spec: LookupSpec) -> Result<()> {
        let column = spec.column.clone();
        let lookup = spec.lookup;
        guard_build("add_filter", &column, Some(lookup), self.push_filter(spec))
    }

    fn push_filter(&mut self, spec: LookupSpec) -> Result<()> {
        let LookupSpec {
            column,
            lookup,
            negated,
            field_type,
            value,
        } = spec;

        let column = if column == self.pk_column {
            ID_FIELD.to_string()
        } else {
            column
        };

        let wire = wire_value(lookup, &field_type, &value)?;
        let resolved = translate(lookup, negated, wire)?;
        let fragment = fragment(&column, lookup, &field_type, resolved.operand)?;

        debug!(column = %column, %lookup, negated = resolved.negated, "adding filter");
        if resolved.negated {
            self.must_not.push(fragment);
        } else {
            self.must.push(fragment);
        }
        Ok(())
    }

    /// Append sort descriptors. `-field` sorts descending, `field` or `+field`
    /// ascending, `pk` names the primary key.
    pub fn order_by<S: AsRef<str>>(&mut self, ordering: &[S]) -> Result<()> {
        for order in ordering {
            let order = order.as_ref();
            guard_build("order_by", order, None, self.push_order(order))?;
        }
        Ok(())
    }

    fn push_order(&mut self, order: &str) -> Result<()> {
        let order = order.trim_start_matches('+');
        if order == "?" {
            return Err(Error::Unsupported(
                "randomized ordering isn't supported by the backend".to_string(),
            ));
        }
        let (name, direction) = match order.strip_prefix('-') {
            Some(name) => (name, SortDirection::Desc),
            None => (order, SortDirection::Asc),
        };
        if name.is_empty() {
            return Ok(());
        }
        if name.contains("__") {
            warn!("ordering can't span tables on non-relational backends ({order}), skipping");
            return Ok(());
        }
        let field = if name == "pk" || name == self.pk_column {
            ID_FIELD
        } else {
            name
        };
        self.sort.push(SortClause::new(field, direction));
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.must_not.is_empty()
    }

    pub fn must(&self) -> &[EsQuery] {
        &self.must
    }

    pub fn must_not(&self) -> &[EsQuery] {
        &self.must_not
    }

    /// Effective query: `match_all` when no clause was added.
    pub fn to_query(&self) -> EsQuery {
        if self.is_empty() {
            return EsQuery::match_all();
        }
        EsQuery::Bool(BoolQuery {
            must: non_empty(&self.must),
            must_not: non_empty(&self.must_not),
            ..Default::default()
        })
    }

    pub fn sort(&self) -> Option<Vec<SortClause>> {
        if self.sort.is_empty() {
            None
        } else {
            Some(self.sort.clone())
        }
    }
}

fn non_empty(clauses: &[EsQuery]) -> Option<QueryList> {
    if clauses.is_empty() {
        None
    } else {
        Some(QueryList::Multiple(clauses.to_vec()))
    }
}

/// Coerce the raw value for the lookup. `isnull` takes a flag, and `year`
/// may take a bare year number; neither is a value of the field's type.
fn wire_value(lookup: Lookup, field_type: &FieldType, value: &FieldValue) -> Result<Value> {
    match (lookup, value) {
        (Lookup::IsNull, v) => Ok(v.to_json()),
        (Lookup::Year, FieldValue::Int(year)) => Ok(Value::from(*year)),
        (_, v) => to_wire(field_type, v),
    }
}

fn fragment(column: &str, lookup: Lookup, field_type: &FieldType, operand: Operand) -> Result<EsQuery> {
    let query = match operand {
        Operand::Term(v) => EsQuery::term(column, v),
        Operand::NotTerm(v) => EsQuery::not(EsQuery::term(column, v)),
        Operand::Terms(vs) => terms(column, vs),
        Operand::NotTerms(vs) => EsQuery::not(terms(column, vs)),
        Operand::Pattern(p) => {
            require_text(lookup, field_type)?;
            EsQuery::wildcard(column, p)
        }
        Operand::Regex(p) => {
            require_text(lookup, field_type)?;
            EsQuery::regexp(column, p)
        }
        Operand::Range(spec) => EsQuery::range(column, range_params(spec)),
        Operand::Missing => EsQuery::not(EsQuery::exists(column)),
        Operand::Present => EsQuery::exists(column),
    };
    Ok(query)
}

fn require_text(lookup: Lookup, field_type: &FieldType) -> Result<()> {
    if field_type.element().is_text() {
        Ok(())
    } else {
        Err(Error::unsupported_lookup(lookup.as_str(), field_type))
    }
}

fn terms(column: &str, values: Vec<Value>) -> EsQuery {
    if column == ID_FIELD {
        let ids = values
            .into_iter()
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();
        EsQuery::ids(ids)
    } else {
        EsQuery::terms(column, values)
    }
}

fn range_params(spec: RangeSpec) -> RangeParams {
    let mut params = RangeParams::default();
    match (spec.from, spec.include_lower) {
        (Some(v), true) => params.gte = Some(v),
        (Some(v), false) => params.gt = Some(v),
        (None, _) => {}
    }
    match (spec.to, spec.include_upper) {
        (Some(v), true) => params.lte = Some(v),
        (Some(v), false) => params.lt = Some(v),
        (None, _) => {}
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder() -> QueryBuilder {
        QueryBuilder::new("id")
    }

    fn to_json(b: &QueryBuilder) -> Value {
        serde_json::to_value(b.to_query()).unwrap()
    }

    #[test]
    fn test_empty_is_match_all() {
        let b = builder();
        assert!(b.is_empty());
        assert_eq!(to_json(&b), json!({"match_all": {}}));
    }

    #[test]
    fn test_text_exact_is_term() {
        let mut b = builder();
        b.add_filter(LookupSpec::new("name", Lookup::Exact, FieldType::Unicode, "Pippo"))
            .unwrap();
        assert_eq!(
            to_json(&b),
            json!({"bool": {"must": [{"term": {"name": "Pippo"}}]}})
        );
    }

    #[test]
    fn test_int_exact_is_coerced_term() {
        let mut b = builder();
        b.add_filter(LookupSpec::new("age", Lookup::Exact, FieldType::Int, "10"))
            .unwrap();
        assert_eq!(b.must(), &[EsQuery::term("age", json!(10))]);
    }

    #[test]
    fn test_pk_column_becomes_id() {
        let mut b = builder();
        b.add_filter(LookupSpec::new("id", Lookup::Exact, FieldType::Unicode, "abc"))
            .unwrap();
        b.add_filter(LookupSpec::new(
            "id",
            Lookup::In,
            FieldType::Unicode,
            vec!["a", "b"],
        ))
        .unwrap();
        assert_eq!(
            b.must(),
            &[
                EsQuery::term("_id", json!("abc")),
                EsQuery::ids(vec!["a".into(), "b".into()])
            ]
        );
    }

    #[test]
    fn test_pattern_lookups() {
        let mut b = builder();
        b.add_filter(LookupSpec::new("name", Lookup::IStartsWith, FieldType::Unicode, "PI"))
            .unwrap();
        b.add_filter(LookupSpec::new("name", Lookup::Regex, FieldType::Unicode, "P.*"))
            .unwrap();
        assert_eq!(
            b.must(),
            &[EsQuery::wildcard("name", "pi*"), EsQuery::regexp("name", "P.*")]
        );
    }

    #[test]
    fn test_pattern_on_int_is_unsupported() {
        let mut b = builder();
        let err = b
            .add_filter(LookupSpec::new("age", Lookup::Contains, FieldType::Int, 1))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedLookup { .. }));
        assert!(b.is_empty());
    }

    #[test]
    fn test_date_range() {
        let mut b = builder();
        let d = chrono::NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        b.add_filter(LookupSpec::new("born", Lookup::Gte, FieldType::Date, d))
            .unwrap();
        assert_eq!(
            to_json(&b),
            json!({"bool": {"must": [{"range": {"born": {"gte": "2020-01-02T00:00:00"}}}]}})
        );
    }

    #[test]
    fn test_negated_without_direct_form_goes_to_must_not() {
        let mut b = builder();
        b.add_filter(LookupSpec::new("name", Lookup::Contains, FieldType::Unicode, "x").negate())
            .unwrap();
        assert!(b.must().is_empty());
        assert_eq!(b.must_not(), &[EsQuery::wildcard("name", "*x*")]);
    }

    #[test]
    fn test_negated_gt_is_lte() {
        let mut a = builder();
        a.add_filter(LookupSpec::new("age", Lookup::Gt, FieldType::Int, 5).negate())
            .unwrap();
        let mut b = builder();
        b.add_filter(LookupSpec::new("age", Lookup::Lte, FieldType::Int, 5))
            .unwrap();
        assert_eq!(a.to_query(), b.to_query());
    }

    #[test]
    fn test_isnull_flag_is_not_coerced() {
        let mut b = builder();
        b.add_filter(LookupSpec::new("born", Lookup::IsNull, FieldType::Date, true))
            .unwrap();
        assert_eq!(b.must(), &[EsQuery::not(EsQuery::exists("born"))]);
    }

    #[test]
    fn test_year_from_number() {
        let mut b = builder();
        b.add_filter(LookupSpec::new("born", Lookup::Year, FieldType::Date, 1999))
            .unwrap();
        assert_eq!(
            to_json(&b),
            json!({"bool": {"must": [{"range": {"born": {
                "gte": "1999-01-01T00:00:00",
                "lt": "2000-01-01T00:00:00"
            }}}]}})
        );
    }

    #[test]
    fn test_order_by() {
        let mut b = builder();
        b.order_by(&["-age", "+name", "pk", "author__name"]).unwrap();
        assert_eq!(
            b.sort().unwrap(),
            vec![
                SortClause::new("age", SortDirection::Desc),
                SortClause::new("name", SortDirection::Asc),
                SortClause::new("_id", SortDirection::Asc),
            ]
        );
    }

    #[test]
    fn test_random_order_rejected() {
        let mut b = builder();
        assert!(matches!(b.order_by(&["?"]), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_from_parts() {
        let spec = LookupSpec::from_parts("age", "gt", false, "int", FieldValue::Int(1)).unwrap();
        assert_eq!(spec.lookup, Lookup::Gt);
        assert_eq!(spec.field_type, FieldType::Int);
        assert!(LookupSpec::from_parts("age", "near", false, "int", FieldValue::Int(1)).is_err());
    }
}
