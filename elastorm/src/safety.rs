//! Uniform conversion of backend failures into [`Error::Backend`], and
//! logging of rejected query construction

use crate::error::{Error, Result};
use crate::lookup::Lookup;
use crate::transport::TransportError;
use std::fmt::Display;

/// Where a backend call was aimed, for log context.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub index: &'a str,
    pub doc_type: Option<&'a str>,
}

impl<'a> Target<'a> {
    pub fn new(index: &'a str, doc_type: &'a str) -> Self {
        Self {
            index,
            doc_type: Some(doc_type),
        }
    }

    pub fn index(index: &'a str) -> Self {
        Self {
            index,
            doc_type: None,
        }
    }
}

/// Log a failed backend call and re-raise it as [`Error::Backend`].
///
/// The underlying error type does not cross this boundary; only its message
/// is carried.
pub fn guard<T, E: Display>(
    operation: &str,
    target: Target<'_>,
    result: std::result::Result<T, E>,
) -> Result<T> {
    result.map_err(|e| {
        let message = e.to_string();
        tracing::error!(
            operation,
            index = target.index,
            doc_type = target.doc_type.unwrap_or("-"),
            error = %message,
            "backend operation failed"
        );
        Error::backend(operation, message)
    })
}

/// Like [`guard`], but a not-found failure counts as success.
pub fn guard_missing_ok(
    operation: &str,
    target: Target<'_>,
    result: std::result::Result<(), TransportError>,
) -> Result<()> {
    match result {
        Err(e) if e.is_not_found() => {
            tracing::debug!(operation, index = target.index, "nothing to remove: {}", e);
            Ok(())
        }
        other => guard(operation, target, other),
    }
}

/// Like [`guard`], but creating something that already exists counts as
/// success. Returns whether this call created it.
pub fn guard_existing_ok(
    operation: &str,
    target: Target<'_>,
    result: std::result::Result<(), TransportError>,
) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_already_exists() => {
            tracing::debug!(operation, index = target.index, "already there: {}", e);
            Ok(false)
        }
        Err(e) => guard::<bool, _>(operation, target, Err(e)),
    }
}

/// Log a rejected filter, ordering or pagination request with the column
/// and lookup it named.
///
/// Unlike [`guard`] the error keeps its kind: callers tell an unsupported
/// lookup from a malformed value by matching on it.
pub fn guard_build<T>(
    operation: &str,
    column: &str,
    lookup: Option<Lookup>,
    result: Result<T>,
) -> Result<T> {
    result.map_err(|e| {
        tracing::error!(
            operation,
            column,
            lookup = lookup.map_or("-", |l| l.as_str()),
            error = %e,
            "query construction failed"
        );
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Counts ERROR events.
    struct ErrorCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for ErrorCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Run `f` and return how many errors it logged.
    fn errors_logged<R>(f: impl FnOnce() -> R) -> (R, usize) {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(count.clone()));
        let out = tracing::subscriber::with_default(subscriber, f);
        (out, count.load(Ordering::SeqCst))
    }

    #[test]
    fn test_guard_passes_ok_through() {
        let r: std::result::Result<u32, String> = Ok(7);
        assert_eq!(guard("count", Target::index("db"), r).unwrap(), 7);
    }

    #[test]
    fn test_guard_wraps_message() {
        let r: std::result::Result<(), String> = Err("connection refused".to_string());
        let err = guard("search", Target::new("db", "person"), r).unwrap_err();
        match err {
            Error::Backend { operation, message } => {
                assert_eq!(operation, "search");
                assert_eq!(message, "connection refused");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_guard_missing_ok() {
        let missing = Err(TransportError::NotFound("/db".to_string()));
        assert!(guard_missing_ok("delete_index", Target::index("db"), missing).is_ok());
        let failed = Err(TransportError::Other("boom".to_string()));
        assert!(guard_missing_ok("delete_index", Target::index("db"), failed).is_err());
    }

    #[test]
    fn test_guard_existing_ok() {
        let target = Target::index("db");
        assert!(guard_existing_ok("create_index", target, Ok(())).unwrap());

        let exists = Err(TransportError::Status {
            method: "PUT".to_string(),
            path: "/db".to_string(),
            status: 400,
            body: r#"{"error":{"type":"resource_already_exists_exception"}}"#.to_string(),
        });
        assert!(!guard_existing_ok("create_index", target, exists).unwrap());

        let bad_request = Err(TransportError::Status {
            method: "PUT".to_string(),
            path: "/db".to_string(),
            status: 400,
            body: "invalid_index_name_exception".to_string(),
        });
        let err = guard_existing_ok("create_index", target, bad_request).unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));
    }

    #[test]
    fn test_guard_build_logs_and_keeps_kind() {
        let rejected: Result<()> = Err(Error::InvalidValue("range needs two values".to_string()));
        let (result, logged) =
            errors_logged(|| guard_build("add_filter", "age", Some(Lookup::Range), rejected));
        assert!(matches!(result, Err(Error::InvalidValue(_))));
        assert_eq!(logged, 1);

        let (result, logged) = errors_logged(|| guard_build("add_filter", "age", None, Ok(3)));
        assert_eq!(result.unwrap(), 3);
        assert_eq!(logged, 0);
    }

    #[test]
    fn test_rejected_filters_are_logged() {
        use crate::builder::{LookupSpec, QueryBuilder};
        use crate::coerce::FieldType;
        use crate::value::FieldValue;

        let mut builder = QueryBuilder::new("id");
        let short_range = LookupSpec::new(
            "age",
            Lookup::Range,
            FieldType::Int,
            FieldValue::List(vec![FieldValue::Int(1)]),
        );
        let (result, logged) = errors_logged(|| builder.add_filter(short_range));
        assert!(matches!(result, Err(Error::InvalidValue(_))));
        assert_eq!(logged, 1);

        let pattern_on_int = LookupSpec::new("age", Lookup::Contains, FieldType::Int, 1);
        let (result, logged) = errors_logged(|| builder.add_filter(pattern_on_int));
        assert!(matches!(result, Err(Error::UnsupportedLookup { .. })));
        assert_eq!(logged, 1);

        let (result, logged) = errors_logged(|| builder.order_by(&["?"]));
        assert!(matches!(result, Err(Error::Unsupported(_))));
        assert_eq!(logged, 1);

        assert!(builder.is_empty());
    }
}
