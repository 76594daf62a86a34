//! Write path: insert, full-document update, delete by id and type flush

use crate::builder::LookupSpec;
use crate::coerce::to_wire;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::lookup::Lookup;
use crate::model::ModelMeta;
use crate::safety::{guard, guard_build, guard_missing_ok, Target};
use crate::value::FieldValue;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Column values of one row as handed over by the host.
pub type Record = BTreeMap<String, FieldValue>;

/// Index a new document. The primary key, when the record carries one,
/// becomes the document id; otherwise the engine assigns one. Returns the id.
pub async fn insert(conn: &Connection, model: &ModelMeta, record: &Record) -> Result<String> {
    let (pk, document) = to_document(model, record)?;
    write(conn, model, pk.as_deref(), &document).await
}

/// Replace the document stored under `pk` with `record`. Columns missing from
/// the record are gone afterwards; there is no partial update.
pub async fn update(
    conn: &Connection,
    model: &ModelMeta,
    pk: &str,
    record: &Record,
) -> Result<String> {
    let (_, document) = to_document(model, record)?;
    write(conn, model, Some(pk), &document).await
}

/// Delete the rows named by `filters`. Only `pk IN (...)` is understood;
/// returns the number of ids deleted.
pub async fn delete_where(
    conn: &Connection,
    model: &ModelMeta,
    filters: &[LookupSpec],
) -> Result<usize> {
    let ids = match filters {
        [LookupSpec {
            column,
            lookup: Lookup::In,
            negated: false,
            value: FieldValue::List(ids),
            ..
        }] if *column == model.pk_column => ids,
        _ => {
            let column = filters.first().map_or("-", |f| f.column.as_str());
            let rejected = Err(Error::Unsupported(
                "delete only supports a single 'pk in [...]' filter".to_string(),
            ));
            return guard_build("delete", column, filters.first().map(|f| f.lookup), rejected);
        }
    };

    let target = Target::new(conn.index(), &model.db_table);
    for id in ids {
        let id = id_string(id)?;
        debug!("deleting {}/{}", model.db_table, id);
        guard(
            "delete",
            target,
            conn.transport()
                .delete(conn.index(), &model.db_table, &id)
                .await,
        )?;
    }
    refresh_if_configured(conn, model).await?;
    Ok(ids.len())
}

/// Remove the document type definition, and every document with it. A type
/// that was never created is not an error.
pub async fn flush_table(conn: &Connection, model: &ModelMeta) -> Result<()> {
    info!("flushing {}/{}", conn.index(), model.db_table);
    guard_missing_ok(
        "delete_mapping",
        Target::new(conn.index(), &model.db_table),
        conn.transport()
            .delete_mapping(conn.index(), &model.db_table)
            .await,
    )
}

async fn write(
    conn: &Connection,
    model: &ModelMeta,
    id: Option<&str>,
    document: &Map<String, Value>,
) -> Result<String> {
    let id = guard(
        "index",
        Target::new(conn.index(), &model.db_table),
        conn.transport()
            .index(conn.index(), &model.db_table, id, document)
            .await,
    )?;
    refresh_if_configured(conn, model).await?;
    Ok(id)
}

async fn refresh_if_configured(conn: &Connection, model: &ModelMeta) -> Result<()> {
    if !conn.settings().database.refresh_after_write {
        return Ok(());
    }
    guard(
        "refresh",
        Target::new(conn.index(), &model.db_table),
        conn.transport()
            .refresh(conn.index(), Some(&model.db_table))
            .await,
    )
}

/// Split off the primary key and coerce the remaining columns for the wire.
fn to_document(model: &ModelMeta, record: &Record) -> Result<(Option<String>, Map<String, Value>)> {
    let mut pk = None;
    let mut document = Map::new();
    for (column, value) in record {
        if *column == model.pk_column {
            if !value.is_absent() {
                pk = Some(id_string(value)?);
            }
            continue;
        }
        let wire = to_wire(&model.field_type(column), value)?;
        document.insert(column.clone(), wire);
    }
    Ok((pk, document))
}

fn id_string(value: &FieldValue) -> Result<String> {
    match value {
        FieldValue::Text(s) => Ok(s.clone()),
        FieldValue::Int(i) => Ok(i.to_string()),
        other => Err(Error::InvalidValue(format!(
            "{other:?} can't be used as a document id"
        ))),
    }
}
