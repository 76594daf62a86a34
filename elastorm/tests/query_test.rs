//! End-to-end query tests against the in-memory engine.

use chrono::NaiveDate;
use elastorm::mutation::{delete_where, flush_table, insert, update};
use elastorm::{
    Connection, Error, FieldKind, FieldType, FieldValue, Lookup, LookupSpec, MemoryTransport,
    ModelMeta, Query, Record, Settings, Transport,
};
use std::collections::BTreeSet;
use std::sync::Arc;

// ── Helpers ─────────────────────────────────────────────────────────────────

fn person() -> ModelMeta {
    ModelMeta::new("person")
        .with_field("name", FieldKind::CharField)
        .with_field("surname", FieldKind::CharField)
        .with_field("age", FieldKind::IntegerField)
        .with_field("born", FieldKind::DateField)
}

fn record(values: &[(&str, FieldValue)]) -> Record {
    values
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn date(y: i32, m: u32, d: u32) -> FieldValue {
    FieldValue::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

async fn connection() -> (Arc<MemoryTransport>, Connection) {
    let transport = Arc::new(MemoryTransport::new());
    let conn = Connection::with_transport(Settings::default(), transport.clone());
    transport.create_index(conn.index()).await.unwrap();
    (transport, conn)
}

/// Three people, one of them without an age. Returns their ids in insertion
/// order.
async fn seed(conn: &Connection, model: &ModelMeta) -> Vec<String> {
    let rows = [
        record(&[
            ("name", "Pippo".into()),
            ("surname", "Pluto".into()),
            ("age", 10.into()),
            ("born", date(1990, 5, 17)),
        ]),
        record(&[
            ("name", "Pluto".into()),
            ("age", 30.into()),
            ("born", date(1985, 1, 1)),
        ]),
        record(&[("name", "paperino".into()), ("born", date(2001, 12, 31))]),
    ];
    let mut ids = Vec::new();
    for row in &rows {
        ids.push(insert(conn, model, row).await.unwrap());
    }
    ids
}

fn set<S: AsRef<str>>(items: &[S]) -> BTreeSet<String> {
    items.iter().map(|s| s.as_ref().to_string()).collect()
}

async fn ids(query: Query<'_>) -> BTreeSet<String> {
    query
        .fetch(0, None)
        .await
        .unwrap()
        .map(|row| row.id().to_string())
        .collect()
}

// ── Filtering ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_insert_then_filter_by_age() {
    let (_, conn) = connection().await;
    let model = person();
    let ids = seed(&conn, &model).await;

    let rows: Vec<_> = Query::new(&conn, &model)
        .filter("age", Lookup::Exact, 10)
        .unwrap()
        .fetch(0, None)
        .await
        .unwrap()
        .collect();

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.id(), ids[0]);
    assert_eq!(row.get("id", &FieldType::Unicode).unwrap(), FieldValue::from(ids[0].as_str()));
    assert_eq!(row.get("name", &FieldType::Unicode).unwrap(), FieldValue::from("Pippo"));
    assert_eq!(row.get("surname", &FieldType::Unicode).unwrap(), FieldValue::from("Pluto"));
    assert_eq!(row.get("age", &FieldType::Int).unwrap(), FieldValue::Int(10));
    assert_eq!(row.get("born", &FieldType::Date).unwrap(), date(1990, 5, 17));
}

#[tokio::test]
async fn test_no_filters_matches_everything() {
    let (_, conn) = connection().await;
    let model = person();
    let all: BTreeSet<String> = seed(&conn, &model).await.into_iter().collect();

    assert_eq!(Query::new(&conn, &model).count(None).await.unwrap(), 3);
    assert_eq!(Query::new(&conn, &model).count(Some(2)).await.unwrap(), 2);
    assert_eq!(ids(Query::new(&conn, &model)).await, all);
}

#[tokio::test]
async fn test_text_patterns() {
    let (_, conn) = connection().await;
    let model = person();
    let seeded = seed(&conn, &model).await;

    let starts = Query::new(&conn, &model)
        .filter("name", Lookup::StartsWith, "P")
        .unwrap();
    assert_eq!(ids(starts).await, set(&[&seeded[0], &seeded[1]]));

    let contains = Query::new(&conn, &model)
        .filter("name", Lookup::Contains, "per")
        .unwrap();
    assert_eq!(ids(contains).await, set(&[&seeded[2]]));

    // case-insensitive lookups only lower-case the pattern
    let istarts = Query::new(&conn, &model)
        .filter("name", Lookup::IStartsWith, "PAP")
        .unwrap();
    assert_eq!(ids(istarts).await, set(&[&seeded[2]]));

    let regex = Query::new(&conn, &model)
        .filter("name", Lookup::Regex, "Pl.*")
        .unwrap();
    assert_eq!(ids(regex).await, set(&[&seeded[1]]));
}

#[tokio::test]
async fn test_pattern_on_int_field_is_rejected() {
    let (_, conn) = connection().await;
    let model = person();
    let err = Query::new(&conn, &model)
        .filter("age", Lookup::Contains, 1)
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedLookup { .. }));
}

#[tokio::test]
async fn test_unknown_lookup_name() {
    let err = LookupSpec::from_parts("name", "search", false, "unicode", "x".into()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedLookup { .. }));
}

#[tokio::test]
async fn test_date_range_and_year() {
    let (_, conn) = connection().await;
    let model = person();
    let seeded = seed(&conn, &model).await;

    let range = Query::new(&conn, &model)
        .filter(
            "born",
            Lookup::Range,
            FieldValue::List(vec![date(1985, 1, 1), date(1990, 12, 31)]),
        )
        .unwrap();
    assert_eq!(ids(range).await, set(&[&seeded[0], &seeded[1]]));

    let year = Query::new(&conn, &model)
        .filter("born", Lookup::Year, 2001)
        .unwrap();
    assert_eq!(ids(year).await, set(&[&seeded[2]]));
}

#[tokio::test]
async fn test_pk_in_uses_ids() {
    let (_, conn) = connection().await;
    let model = person();
    let seeded = seed(&conn, &model).await;

    let wanted = vec![seeded[0].clone(), seeded[2].clone()];
    let q = Query::new(&conn, &model)
        .filter("id", Lookup::In, wanted.clone())
        .unwrap();
    assert_eq!(ids(q).await, set(&wanted));
}

// ── Negation ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_negated_comparisons_match_their_complements() {
    let (_, conn) = connection().await;
    let model = person();
    seed(&conn, &model).await;

    let pairs = [
        (Lookup::Gt, Lookup::Lte),
        (Lookup::Gte, Lookup::Lt),
        (Lookup::Lt, Lookup::Gte),
        (Lookup::Lte, Lookup::Gt),
    ];
    for value in [5, 10, 20, 30, 40] {
        for (lookup, complement) in pairs {
            let negated = Query::new(&conn, &model)
                .exclude("age", lookup, value)
                .unwrap();
            let positive = Query::new(&conn, &model)
                .filter("age", complement, value)
                .unwrap();
            assert_eq!(ids(negated).await, ids(positive).await, "{lookup} {value}");
        }
    }
}

#[tokio::test]
async fn test_negated_exact_and_in() {
    let (_, conn) = connection().await;
    let model = person();
    let seeded = seed(&conn, &model).await;

    let not_ten = Query::new(&conn, &model)
        .exclude("age", Lookup::Exact, 10)
        .unwrap();
    assert_eq!(ids(not_ten).await, set(&[&seeded[1], &seeded[2]]));

    let not_in = Query::new(&conn, &model)
        .exclude("name", Lookup::In, vec!["Pippo", "Pluto"])
        .unwrap();
    assert_eq!(ids(not_in).await, set(&[&seeded[2]]));

    // no direct complement: the pattern lands in must_not
    let not_p = Query::new(&conn, &model)
        .exclude("name", Lookup::StartsWith, "P")
        .unwrap();
    assert_eq!(not_p.builder().must_not().len(), 1);
    assert_eq!(ids(not_p).await, set(&[&seeded[2]]));
}

#[tokio::test]
async fn test_isnull_true_and_false_partition_documents() {
    let (_, conn) = connection().await;
    let model = person();
    let all: BTreeSet<String> = seed(&conn, &model).await.into_iter().collect();

    let null = ids(Query::new(&conn, &model).filter("age", Lookup::IsNull, true).unwrap()).await;
    let not_null = ids(Query::new(&conn, &model).filter("age", Lookup::IsNull, false).unwrap()).await;
    assert_eq!(null.len(), 1);
    assert!(null.is_disjoint(&not_null));
    assert_eq!(null.union(&not_null).cloned().collect::<BTreeSet<_>>(), all);

    let excluded = ids(Query::new(&conn, &model).exclude("age", Lookup::IsNull, true).unwrap()).await;
    assert_eq!(excluded, not_null);
}

// ── Ordering and pagination ─────────────────────────────────────────────────

#[tokio::test]
async fn test_order_by_and_pagination_window() {
    let (transport, conn) = connection().await;
    let model = person();
    for age in 0..8 {
        insert(&conn, &model, &record(&[("age", age.into())])).await.unwrap();
    }

    let mut q = Query::new(&conn, &model);
    q.order_by(&["-age"]).unwrap();
    let window: Vec<i64> = q
        .fetch(0, None)
        .await
        .unwrap()
        .map(|r| r.raw("age").and_then(|v| v.as_i64()).unwrap())
        .collect();
    assert_eq!(window, vec![7, 6, 5, 4, 3, 2, 1, 0]);

    let mut q = Query::new(&conn, &model);
    q.order_by(&["-age"]).unwrap();
    let page: Vec<i64> = q
        .fetch(2, Some(5))
        .await
        .unwrap()
        .map(|r| r.raw("age").and_then(|v| v.as_i64()).unwrap())
        .collect();
    assert_eq!(page, window[2..5].to_vec());

    // pagination stays client-side
    let last = transport.searches().pop().unwrap();
    assert_eq!(last.from, None);
    assert_eq!(last.size, None);
}

#[tokio::test]
async fn test_results_limited_to_engine_window() {
    let (_, conn) = connection().await;
    let model = person();
    for age in 0..15 {
        insert(&conn, &model, &record(&[("age", age.into())])).await.unwrap();
    }
    assert_eq!(Query::new(&conn, &model).count(None).await.unwrap(), 15);
    let rows = Query::new(&conn, &model).fetch(0, None).await.unwrap();
    assert_eq!(rows.count(), 10);
}

#[tokio::test]
async fn test_random_ordering_is_unsupported() {
    let (_, conn) = connection().await;
    let model = person();
    let mut q = Query::new(&conn, &model);
    assert!(matches!(q.order_by(&["?"]), Err(Error::Unsupported(_))));
}

// ── Mutations ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_insert_with_explicit_pk_and_update() {
    let (_, conn) = connection().await;
    let model = person();

    let id = insert(
        &conn,
        &model,
        &record(&[("id", "p-1".into()), ("name", "Pippo".into()), ("age", 10.into())]),
    )
    .await
    .unwrap();
    assert_eq!(id, "p-1");

    update(&conn, &model, "p-1", &record(&[("name", "Pippo II".into())]))
        .await
        .unwrap();

    let rows: Vec<_> = Query::new(&conn, &model)
        .filter("id", Lookup::Exact, "p-1")
        .unwrap()
        .fetch(0, None)
        .await
        .unwrap()
        .collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name", &FieldType::Unicode).unwrap(), FieldValue::from("Pippo II"));
    // full replacement: age is gone
    assert_eq!(rows[0].raw("age"), None);
}

#[tokio::test]
async fn test_delete_by_id_set() {
    let (_, conn) = connection().await;
    let model = person();
    let seeded = seed(&conn, &model).await;

    let spec = LookupSpec::new(
        "id",
        Lookup::In,
        FieldType::Unicode,
        vec![seeded[0].clone(), seeded[2].clone()],
    );
    assert_eq!(delete_where(&conn, &model, &[spec]).await.unwrap(), 2);
    assert_eq!(ids(Query::new(&conn, &model)).await, set(&[&seeded[1]]));
}

#[tokio::test]
async fn test_delete_missing_id_is_backend_error() {
    let (_, conn) = connection().await;
    let model = person();
    seed(&conn, &model).await;

    let spec = LookupSpec::new("id", Lookup::In, FieldType::Unicode, vec!["nope"]);
    let err = delete_where(&conn, &model, &[spec]).await.unwrap_err();
    assert!(matches!(err, Error::Backend { ref operation, .. } if operation == "delete"));
}

#[tokio::test]
async fn test_query_delete() {
    let (_, conn) = connection().await;
    let model = person();
    let seeded = seed(&conn, &model).await;

    let deleted = Query::new(&conn, &model)
        .filter("age", Lookup::Gte, 10)
        .unwrap()
        .delete()
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(ids(Query::new(&conn, &model)).await, set(&[&seeded[2]]));
}

#[tokio::test]
async fn test_unfiltered_delete_removes_everything() {
    let (_, conn) = connection().await;
    let model = person();
    seed(&conn, &model).await;

    let deleted = Query::new(&conn, &model).delete().await.unwrap();
    assert_eq!(deleted, 3);
    assert_eq!(Query::new(&conn, &model).count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_writes_invisible_without_refresh() {
    let transport = Arc::new(MemoryTransport::new());
    let mut settings = Settings::default();
    settings.database.refresh_after_write = false;
    let conn = Connection::with_transport(settings, transport.clone());
    let model = person();

    insert(&conn, &model, &record(&[("name", "Pippo".into())])).await.unwrap();
    assert_eq!(Query::new(&conn, &model).count(None).await.unwrap(), 0);

    transport.refresh(conn.index(), None).await.unwrap();
    assert_eq!(Query::new(&conn, &model).count(None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_flush_table_drops_type() {
    let (_, conn) = connection().await;
    let model = person();
    seed(&conn, &model).await;

    flush_table(&conn, &model).await.unwrap();
    assert_eq!(Query::new(&conn, &model).count(None).await.unwrap(), 0);
    // flushing again is not an error
    flush_table(&conn, &model).await.unwrap();
}
