// tabletransfer/src/upload/mod.rs
pub(crate) mod csv_reader;
pub(crate) mod db_write;
mod logic;
pub(crate) mod verification;

use anyhow::Result;
use crate::config::AppConfig;

/// Public entry point for the CSV upload flow.
pub async fn run_upload_flow(app_config: &AppConfig) -> Result<()> {
    let upload_config = match &app_config.operation {
        Some(crate::config::OperationConfig::Upload(cfg)) => cfg,
        _ => anyhow::bail!("CSV upload selected but no upload configuration found."),
    };

    logic::perform_upload(upload_config).await
}
