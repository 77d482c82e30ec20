// tabletransfer/src/query/mod.rs
pub(crate) mod db_read;
mod logic;

use anyhow::Result;
use crate::config::AppConfig;

/// Public entry point for the database query flow.
pub async fn run_query_flow(app_config: &AppConfig) -> Result<()> {
    let query_config = match &app_config.operation {
        Some(crate::config::OperationConfig::SqlQuery(cfg)) => cfg,
        _ => anyhow::bail!("Database query selected but no query configuration found."),
    };

    logic::perform_query(query_config).await
}
