//! Database lifecycle: type mappings and test database setup/teardown

use crate::connection::Connection;
use crate::error::Result;
use crate::mapping::model_to_mapping;
use crate::model::ModelMeta;
use crate::safety::{guard, guard_missing_ok, Target};
use tracing::{debug, info};

/// Cluster status waited for after creating or dropping an index.
pub const READY_STATUS: &str = "green";

/// Put the mapping derived from `model` on its document type.
pub async fn sync_model(conn: &Connection, model: &ModelMeta) -> Result<()> {
    let mapping = model_to_mapping(model).to_value();
    debug!("putting mapping for '{}': {}", model.db_table, mapping);
    guard(
        "put_mapping",
        Target::new(conn.index(), &model.db_table),
        conn.transport()
            .put_mapping(conn.index(), &model.db_table, &mapping)
            .await,
    )
}

/// Create the test database and return a connection pointed at it. A
/// leftover test database from an earlier run is dropped first.
pub async fn create_test_database(conn: &Connection) -> Result<Connection> {
    let name = conn.settings().database.test_database_name();
    info!("creating test database '{}'", name);

    drop_database(conn, &name).await?;
    guard(
        "create_index",
        Target::index(&name),
        conn.transport().create_index(&name).await,
    )?;
    guard(
        "cluster_health",
        Target::index(&name),
        conn.transport().wait_for_status(READY_STATUS).await,
    )?;
    Ok(conn.with_index(name))
}

/// Drop the test database `conn` points at and return a connection to
/// `original_name`.
pub async fn destroy_test_database(conn: &Connection, original_name: &str) -> Result<Connection> {
    info!("destroying test database '{}'", conn.index());
    drop_database(conn, conn.index()).await?;
    Ok(conn.with_index(original_name))
}

/// Delete the index `name`; a missing index is not an error.
pub async fn drop_database(conn: &Connection, name: &str) -> Result<()> {
    guard_missing_ok(
        "delete_index",
        Target::index(name),
        conn.transport().delete_index(name).await,
    )?;
    guard(
        "cluster_health",
        Target::index(name),
        conn.transport().wait_for_status(READY_STATUS).await,
    )
}
