use anyhow::{Context, Result};

use crate::config::WarehouseConfig;
use crate::table::render::print_table;
use crate::warehouse::{auth, bigquery::BigQueryClient};

/// Queries the whole configured warehouse table and prints it.
pub async fn perform_warehouse_query(warehouse_config: &WarehouseConfig) -> Result<()> {
    let query = warehouse_config.query();
    tracing::info!(%query, project = %warehouse_config.project_id, "warehouse query");

    let token = auth::access_token().context("Failed to obtain a warehouse access token")?;
    let client = BigQueryClient::new(token);

    println!("Performing query...");
    let table = client
        .query_to_table(&warehouse_config.project_id, &query)
        .await
        .with_context(|| format!("Warehouse query failed: {}", query))?;

    print_table(&table);
    Ok(())
}
