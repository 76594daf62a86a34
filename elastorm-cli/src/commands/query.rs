use anyhow::{anyhow, Context, Result};
use elastorm::mutation::insert;
use elastorm::{Connection, FieldValue, Lookup, ModelMeta, Query, Record};
use serde_json::Value;

/// A `column__lookup=value` argument. A bare `column=value` is an exact
/// match; the value is read as JSON when it parses, as text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterArg {
    pub column: String,
    pub lookup: Lookup,
    pub value: FieldValue,
}

impl std::str::FromStr for FilterArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (key, raw) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected column__lookup=value, got '{s}'"))?;
        let (column, lookup) = match key.rsplit_once("__") {
            Some((column, name)) => (column, name.parse::<Lookup>()?),
            None => (key, Lookup::Exact),
        };
        Ok(Self {
            column: column.to_string(),
            lookup,
            value: parse_value(raw),
        })
    }
}

/// A `column=value` assignment for inserts.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: FieldValue,
}

impl std::str::FromStr for Assignment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (column, raw) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected column=value, got '{s}'"))?;
        Ok(Self {
            column: column.to_string(),
            value: parse_value(raw),
        })
    }
}

fn parse_value(raw: &str) -> FieldValue {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => FieldValue::from_json(value),
        Err(_) => FieldValue::Text(raw.to_string()),
    }
}

fn build_query<'a>(
    conn: &'a Connection,
    model: &'a ModelMeta,
    filters: &[FilterArg],
    excludes: &[FilterArg],
) -> Result<Query<'a>> {
    let mut query = Query::new(conn, model);
    for f in filters {
        query = query.filter(&f.column, f.lookup, f.value.clone())?;
    }
    for f in excludes {
        query = query.exclude(&f.column, f.lookup, f.value.clone())?;
    }
    Ok(query)
}

/// Print the number of matching documents
pub async fn run_count(
    conn: &Connection,
    model: &ModelMeta,
    filters: &[FilterArg],
    excludes: &[FilterArg],
) -> Result<()> {
    let count = build_query(conn, model, filters, excludes)?
        .count(None)
        .await?;
    println!("{count}");
    Ok(())
}

/// Print matching rows as JSON lines
pub async fn run_search(
    conn: &Connection,
    model: &ModelMeta,
    filters: &[FilterArg],
    excludes: &[FilterArg],
    order: &[String],
    low: usize,
    high: Option<usize>,
) -> Result<()> {
    let mut query = build_query(conn, model, filters, excludes)?;
    query.order_by(order)?;
    for row in query.fetch(low, high).await? {
        println!("{}", Value::Object(row.into_fields()));
    }
    Ok(())
}

/// Insert one row and print its id
pub async fn run_insert(conn: &Connection, model: &ModelMeta, values: &[Assignment]) -> Result<()> {
    let record: Record = values
        .iter()
        .map(|a| (a.column.clone(), a.value.clone()))
        .collect();
    let id = insert(conn, model, &record)
        .await
        .with_context(|| format!("inserting into '{}'", model.db_table))?;
    println!("{id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter() {
        let f: FilterArg = "age__gte=10".parse().unwrap();
        assert_eq!(f.column, "age");
        assert_eq!(f.lookup, Lookup::Gte);
        assert_eq!(f.value, FieldValue::Int(10));

        let f: FilterArg = "name=Pippo".parse().unwrap();
        assert_eq!(f.lookup, Lookup::Exact);
        assert_eq!(f.value, FieldValue::from("Pippo"));

        let f: FilterArg = "owner__name__in=[\"a\",\"b\"]".parse().unwrap();
        assert_eq!(f.column, "owner__name");
        assert_eq!(f.lookup, Lookup::In);
        assert_eq!(f.value, FieldValue::from(vec!["a", "b"]));
    }

    #[test]
    fn test_parse_filter_errors() {
        assert!("age".parse::<FilterArg>().is_err());
        assert!("age__near=1".parse::<FilterArg>().is_err());
    }

    #[test]
    fn test_parse_assignment() {
        let a: Assignment = "born=1990-05-17".parse().unwrap();
        assert_eq!(a.column, "born");
        assert_eq!(a.value, FieldValue::from("1990-05-17"));
    }
}
