use anyhow::Result;
use elastorm::creation::{drop_database, sync_model};
use elastorm::mutation::flush_table;
use elastorm::safety::{guard_existing_ok, Target};
use elastorm::{Connection, ModelMeta};

/// Create the configured database index. An index that is already there,
/// e.g. because connecting created it, is fine.
pub async fn run_create_index(conn: &Connection) -> Result<()> {
    let created = guard_existing_ok(
        "create_index",
        Target::index(conn.index()),
        conn.transport().create_index(conn.index()).await,
    )?;
    if created {
        println!("Created index '{}'", conn.index());
    } else {
        println!("Index '{}' already exists", conn.index());
    }
    Ok(())
}

/// Drop the configured database index, if it exists
pub async fn run_drop_index(conn: &Connection) -> Result<()> {
    drop_database(conn, conn.index()).await?;
    println!("Dropped index '{}'", conn.index());
    Ok(())
}

/// Put the mapping derived from a model file
pub async fn run_sync(conn: &Connection, model: &ModelMeta) -> Result<()> {
    sync_model(conn, model).await?;
    println!("Synced mapping for '{}'", model.db_table);
    Ok(())
}

/// Drop a model's document type together with its documents
pub async fn run_flush(conn: &Connection, model: &ModelMeta) -> Result<()> {
    flush_table(conn, model).await?;
    println!("Flushed '{}'", model.db_table);
    Ok(())
}
