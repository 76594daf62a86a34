//! Query execution: fetch, count and delete over one document type

use crate::builder::{LookupSpec, QueryBuilder};
use crate::coerce::{from_wire, FieldType};
use crate::connection::Connection;
use crate::dsl::{EsSearchRequest, Hit};
use crate::error::{Error, Result};
use crate::lookup::Lookup;
use crate::model::ModelMeta;
use crate::safety::{guard, guard_build, Target};
use crate::value::FieldValue;
use serde_json::{Map, Value};
use tracing::debug;

/// One result document.
///
/// Holds the stored source plus the primary key, taken from the document id.
/// Values stay in wire form until read with [`Row::get`].
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    id: String,
    fields: Map<String, Value>,
}

impl Row {
    fn from_hit(hit: Hit, pk_column: &str) -> Self {
        let mut fields = hit.source;
        fields.insert(pk_column.to_string(), Value::String(hit.id.clone()));
        Self { id: hit.id, fields }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Read `column` converted from the wire as `field_type`. A column the
    /// document doesn't carry reads as null.
    pub fn get(&self, column: &str, field_type: &FieldType) -> Result<FieldValue> {
        match self.fields.get(column) {
            Some(value) => from_wire(field_type, value),
            None => Ok(FieldValue::Null),
        }
    }

    pub fn raw(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

/// A query over one model, built up with filters and ordering and then run
/// by one of the terminal operations.
#[derive(Debug)]
pub struct Query<'a> {
    conn: &'a Connection,
    model: &'a ModelMeta,
    builder: QueryBuilder,
}

impl<'a> Query<'a> {
    pub fn new(conn: &'a Connection, model: &'a ModelMeta) -> Self {
        Self {
            conn,
            model,
            builder: QueryBuilder::new(model.pk_column.clone()),
        }
    }

    pub fn add_filter(&mut self, spec: LookupSpec) -> Result<()> {
        self.builder.add_filter(spec)
    }

    /// Add `column <lookup> value`, typed from the model.
    pub fn filter(
        mut self,
        column: &str,
        lookup: Lookup,
        value: impl Into<FieldValue>,
    ) -> Result<Self> {
        let spec = LookupSpec::new(column, lookup, self.column_type(column), value);
        self.builder.add_filter(spec)?;
        Ok(self)
    }

    /// Add `NOT (column <lookup> value)`, typed from the model.
    pub fn exclude(
        mut self,
        column: &str,
        lookup: Lookup,
        value: impl Into<FieldValue>,
    ) -> Result<Self> {
        let spec = LookupSpec::new(column, lookup, self.column_type(column), value).negate();
        self.builder.add_filter(spec)?;
        Ok(self)
    }

    pub fn order_by<S: AsRef<str>>(&mut self, ordering: &[S]) -> Result<()> {
        self.builder.order_by(ordering)
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    fn column_type(&self, column: &str) -> FieldType {
        if column == self.model.pk_column {
            FieldType::Unicode
        } else {
            self.model.field_type(column)
        }
    }

    fn target(&self) -> Target<'a> {
        Target::new(self.conn.index(), &self.model.db_table)
    }

    /// Run the search and yield rows `low_mark..high_mark` of the hit window
    /// the engine returned.
    ///
    /// Only the window size from the settings is sent to the engine; slicing
    /// happens here, so rows past the window are never seen.
    pub async fn fetch(
        self,
        low_mark: usize,
        high_mark: Option<usize>,
    ) -> Result<impl Iterator<Item = Row>> {
        if let Some(high) = high_mark.filter(|&high| high < low_mark) {
            let rejected = Err(Error::InvalidPagination {
                low: low_mark,
                high,
            });
            guard_build::<()>("fetch", &self.model.db_table, None, rejected)?;
        }

        let request = EsSearchRequest {
            query: Some(self.builder.to_query()),
            from: None,
            size: self.conn.settings().database.window_size,
            sort: self.builder.sort(),
        };
        debug!(
            "search {}/{}: {}",
            self.conn.index(),
            self.model.db_table,
            serde_json::to_string(&request).unwrap_or_default()
        );

        let hits = guard(
            "search",
            self.target(),
            self.conn
                .transport()
                .search(self.conn.index(), &self.model.db_table, &request)
                .await,
        )?;

        let pk_column = self.model.pk_column.clone();
        let take = high_mark.map_or(usize::MAX, |high| high - low_mark);
        Ok(hits
            .into_iter()
            .skip(low_mark)
            .take(take)
            .map(move |hit| Row::from_hit(hit, &pk_column)))
    }

    /// Number of matching documents, capped at `limit` when given.
    pub async fn count(self, limit: Option<u64>) -> Result<u64> {
        let query = self.builder.to_query();
        let count = guard(
            "count",
            self.target(),
            self.conn
                .transport()
                .count(self.conn.index(), &self.model.db_table, &query)
                .await,
        )?;
        Ok(limit.map_or(count, |limit| count.min(limit)))
    }

    /// Delete every matching document; returns how many were removed.
    pub async fn delete(self) -> Result<u64> {
        let query = self.builder.to_query();
        let transport = self.conn.transport();
        let deleted = guard(
            "delete_by_query",
            self.target(),
            transport
                .delete_by_query(self.conn.index(), &self.model.db_table, &query)
                .await,
        )?;
        if self.conn.settings().database.refresh_after_write {
            guard(
                "refresh",
                self.target(),
                transport
                    .refresh(self.conn.index(), Some(&self.model.db_table))
                    .await,
            )?;
        }
        debug!("deleted {} documents from {}", deleted, self.model.db_table);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::transport::{MemoryTransport, Transport};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_row_injects_pk() {
        let hit = Hit {
            index: "db".to_string(),
            id: "abc".to_string(),
            score: None,
            source: json!({"age": 10}).as_object().cloned().unwrap(),
        };
        let row = Row::from_hit(hit, "id");
        assert_eq!(row.id(), "abc");
        assert_eq!(row.raw("id"), Some(&json!("abc")));
        assert_eq!(row.get("age", &FieldType::Int).unwrap(), FieldValue::Int(10));
        assert_eq!(row.get("missing", &FieldType::Int).unwrap(), FieldValue::Null);
    }

    #[tokio::test]
    async fn test_invalid_pagination() {
        let conn = Connection::with_transport(Settings::default(), Arc::new(MemoryTransport::new()));
        let model = ModelMeta::new("person");
        let err = Query::new(&conn, &model).fetch(5, Some(2)).await.err().unwrap();
        assert!(matches!(err, Error::InvalidPagination { low: 5, high: 2 }));
    }

    #[tokio::test]
    async fn test_window_size_is_sent() {
        let transport = Arc::new(MemoryTransport::new());
        transport.create_index("default").await.unwrap();
        let mut settings = Settings::default();
        settings.database.window_size = Some(50);
        let conn = Connection::with_transport(settings, transport.clone());
        let model = ModelMeta::new("person");

        let rows: Vec<Row> = Query::new(&conn, &model).fetch(0, None).await.unwrap().collect();
        assert!(rows.is_empty());
        let sent = transport.searches();
        assert_eq!(sent[0].size, Some(50));
        assert_eq!(sent[0].from, None);
    }

    #[tokio::test]
    async fn test_backend_failure_is_wrapped() {
        let conn = Connection::with_transport(Settings::default(), Arc::new(MemoryTransport::new()));
        let model = ModelMeta::new("person");
        let err = Query::new(&conn, &model).count(None).await.unwrap_err();
        assert!(matches!(err, Error::Backend { ref operation, .. } if operation == "count"));
    }
}
