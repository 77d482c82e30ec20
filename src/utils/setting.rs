// Database connection helpers
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;

use crate::config::DatabaseConfig;
use crate::errors::{Result, TransferError};

/// Builds connect options component-wise so credentials never go through URL parsing.
pub fn connect_options(database: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&database.host)
        .port(database.port)
        .username(&database.user)
        .password(&database.pass)
        .database(&database.db)
}

/// Opens the single connection a run uses. The caller owns it and closes it at the end of the flow.
pub async fn open_connection(database: &DatabaseConfig) -> Result<PgConnection> {
    tracing::debug!(url = %database.masked_connection_url(), "connecting");
    match PgConnection::connect_with(&connect_options(database)).await {
        Ok(conn) => {
            println!("✅ Connected to {}:{}/{}", database.host, database.port, database.db);
            Ok(conn)
        }
        Err(e) => {
            eprintln!("❌ Failed to connect to {}: {}", database.masked_connection_url(), e);
            Err(TransferError::Connection(e))
        }
    }
}
