use anyhow::{Context, Result};
use sqlx::Connection;

use crate::config::SqlQueryConfig;
use crate::query::db_read::fetch_table;
use crate::table::render::print_table;
use crate::utils::identifier::ensure_single_select;
use crate::utils::setting::open_connection;

/// Reads the whole configured table from the database and prints it.
pub async fn perform_query(query_config: &SqlQueryConfig) -> Result<()> {
    let query = query_config.query();
    ensure_single_select(&query)?;
    tracing::info!(%query, url = %query_config.database.masked_connection_url(), "database query");

    println!("Connecting to database...");
    let mut conn = open_connection(&query_config.database)
        .await
        .context("Failed to connect to database")?;

    println!("Performing query...");
    let table = fetch_table(&mut conn, &query)
        .await
        .with_context(|| format!("Query failed: {}", query))?;

    conn.close().await.context("Failed to close database connection")?;

    print_table(&table);
    Ok(())
}
