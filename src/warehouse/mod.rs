// tabletransfer/src/warehouse/mod.rs
pub(crate) mod auth;
pub(crate) mod bigquery;
mod logic;

use anyhow::Result;
use crate::config::AppConfig;

/// Public entry point for the warehouse query flow.
pub async fn run_warehouse_flow(app_config: &AppConfig) -> Result<()> {
    let warehouse_config = match &app_config.operation {
        Some(crate::config::OperationConfig::Warehouse(cfg)) => cfg,
        _ => anyhow::bail!("Warehouse query selected but no warehouse configuration found."),
    };

    logic::perform_warehouse_query(warehouse_config).await
}
