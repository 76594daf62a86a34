//! elastorm - relational query plans over an Elasticsearch cluster
//!
//! Filters expressed as `(column, lookup, negated, field type, value)`
//! clauses are translated into the Elasticsearch query DSL and executed
//! against one document type per model:
//!
//! ```no_run
//! # async fn demo() -> elastorm::Result<()> {
//! use elastorm::{Connection, FieldKind, Lookup, ModelMeta, Query, Settings};
//!
//! let conn = Connection::connect(Settings::default()).await?;
//! let person = ModelMeta::new("person")
//!     .with_field("name", FieldKind::CharField)
//!     .with_field("age", FieldKind::IntegerField);
//!
//! let rows = Query::new(&conn, &person)
//!     .filter("name", Lookup::StartsWith, "Pi")?
//!     .exclude("age", Lookup::Lt, 18)?
//!     .fetch(0, None)
//!     .await?;
//! for row in rows {
//!     println!("{} {:?}", row.id(), row.raw("name"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod coerce;
pub mod config;
pub mod connection;
pub mod creation;
pub mod dsl;
pub mod error;
pub mod executor;
pub mod lookup;
pub mod mapping;
pub mod model;
pub mod mutation;
pub mod safety;
pub mod transport;
pub mod value;

pub use builder::{LookupSpec, QueryBuilder};
pub use coerce::{from_wire, to_wire, FieldType};
pub use config::{DatabaseSettings, LoggingConfig, Settings};
pub use connection::Connection;
pub use error::{Error, Result};
pub use executor::{Query, Row};
pub use lookup::Lookup;
pub use mapping::{model_to_mapping, Mapping};
pub use model::{FieldKind, FieldMeta, ModelMeta};
pub use mutation::Record;
pub use transport::{Addressing, HttpTransport, MemoryTransport, Transport};
pub use value::FieldValue;
