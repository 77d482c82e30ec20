//! Table Transfer Tool
//!
//! Moves a table between a warehouse, a PostgreSQL database, a CSV file and the console

// tabletransfer/src/main.rs
mod config;
mod errors;
mod query;
mod table;
mod upload;
mod utils;
mod warehouse;

use anyhow::{Context, Result};
use config::{
    AppConfig, OperationConfig, SETTINGS_FILE, load_sql_query_config, load_upload_config,
    load_warehouse_config,
};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt};

/// Main entry point for the transfer tool
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run_app().await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    // settings.json is read from the working directory
    let settings_path = PathBuf::from(SETTINGS_FILE);
    println!("Loading settings...");
    let mut app_config = AppConfig::load_from_json(&settings_path)
        .context(format!("Failed to load settings from {}", settings_path.display()))?;

    let args: Vec<String> = env::args().collect();
    let choice = if args.len() > 1 {
        args[1].trim().to_string()
    } else {
        prompt_choice()?
    };

    match choice.as_str() {
        "1" | "query-bq" => {
            let warehouse_config = load_warehouse_config(&app_config.settings)
                .context("Failed to load warehouse settings")?;
            app_config.operation = Some(OperationConfig::Warehouse(warehouse_config));
            warehouse::run_warehouse_flow(&app_config).await
                .context("Warehouse query failed")?;
        }
        "2" | "query-sql" => {
            let query_config = load_sql_query_config(&app_config.settings)
                .context("Failed to load database query settings")?;
            app_config.operation = Some(OperationConfig::SqlQuery(query_config));
            query::run_query_flow(&app_config).await
                .context("Database query failed")?;
        }
        "3" | "upload-csv" => {
            let upload_config = load_upload_config(&app_config.settings)
                .context("Failed to load upload settings")?;
            app_config.operation = Some(OperationConfig::Upload(upload_config));
            upload::run_upload_flow(&app_config).await
                .context("CSV upload failed")?;
        }
        _ => {
            println!("❌ Invalid choice. Please enter '1' (query-bq), '2' (query-sql), or '3' (upload-csv).");
            anyhow::bail!("Invalid operation choice");
        }
    }
    Ok(())
}

/// Prompts user to select the transfer to run
///
/// Returns the user's choice as String
fn prompt_choice() -> Result<String> {
    use std::io::{Write, stdin, stdout};

    println!("Select an operation:");
    println!("1. Query warehouse table and print it (or type 'query-bq')");
    println!("2. Query database table and print it (or type 'query-sql')");
    println!("3. Upload CSV into database table (or type 'upload-csv')");
    print!("Enter your choice: ");
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin().read_line(&mut input).context("Failed to read user input")?;
    Ok(input.trim().to_string())
}
