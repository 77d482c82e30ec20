use anyhow::{Context, Result};
use sqlx::Connection;

use crate::config::UploadConfig;
use crate::upload::csv_reader::read_csv_table;
use crate::upload::db_write::replace_table;
use crate::utils::setting::open_connection;

/// Loads the configured CSV and replaces the destination table with it.
///
/// 1. Connects to the database.
/// 2. Parses the CSV into a typed table.
/// 3. Drops, recreates and fills the destination in one transaction, committing
///    only once the stored columns and row count match the file.
pub async fn perform_upload(upload_config: &UploadConfig) -> Result<()> {
    tracing::info!(
        csv = %upload_config.csv_path.display(),
        table = %upload_config.table,
        url = %upload_config.database.masked_connection_url(),
        "csv upload"
    );

    println!("Connecting to database...");
    let mut conn = open_connection(&upload_config.database)
        .await
        .context("Failed to connect to database")?;

    println!("Reading CSV...");
    let table = read_csv_table(&upload_config.csv_path).with_context(|| {
        format!("Failed to read CSV file {}", upload_config.csv_path.display())
    })?;
    println!(
        "Read {} rows x {} columns from {}",
        table.num_rows(),
        table.num_columns(),
        upload_config.csv_path.display()
    );

    println!("Storing results...");
    let inserted = replace_table(&mut conn, &upload_config.table, &table)
        .await
        .with_context(|| format!("Failed to store results in table '{}'", upload_config.table))?;
    tracing::info!(inserted, table = %upload_config.table, "table replaced");

    conn.close().await.context("Failed to close database connection")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::verification::stored_shape;
    use sqlx::PgConnection;
    use std::fs;

    /// Needs a scratch PostgreSQL database:
    /// `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn test_replace_is_idempotent_against_preexisting_table() -> anyhow::Result<()> {
        let url = std::env::var("TEST_DATABASE_URL").context("TEST_DATABASE_URL must be set")?;
        let mut conn = PgConnection::connect(&url).await?;

        sqlx::query("DROP TABLE IF EXISTS tabletransfer_dest").execute(&mut conn).await?;
        sqlx::query("CREATE TABLE tabletransfer_dest (legacy TEXT, other_col INT)")
            .execute(&mut conn)
            .await?;
        sqlx::query("INSERT INTO tabletransfer_dest VALUES ('a', 1), ('b', 2), ('c', 3), ('d', 4)")
            .execute(&mut conn)
            .await?;

        let dir = tempfile::tempdir()?;
        let csv_path = dir.path().join("in.csv");
        fs::write(&csv_path, "id,price,label\n1,2.5,x\n2,,y\n")?;
        let table = read_csv_table(&csv_path)?;

        for _ in 0..2 {
            let inserted = replace_table(&mut conn, "tabletransfer_dest", &table).await?;
            assert_eq!(inserted, 2);
            let shape = stored_shape(&mut conn, "tabletransfer_dest").await?;
            assert_eq!(shape.columns, vec!["id", "price", "label"]);
            assert_eq!(shape.rows, 2);
        }

        sqlx::query("DROP TABLE tabletransfer_dest").execute(&mut conn).await?;
        conn.close().await?;
        Ok(())
    }

    /// Needs a scratch PostgreSQL database:
    /// `TEST_DATABASE_URL=postgres://... cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn test_overlong_header_leaves_existing_table_intact() -> anyhow::Result<()> {
        let url = std::env::var("TEST_DATABASE_URL").context("TEST_DATABASE_URL must be set")?;
        let mut conn = PgConnection::connect(&url).await?;

        sqlx::query("DROP TABLE IF EXISTS tabletransfer_keep").execute(&mut conn).await?;
        sqlx::query("CREATE TABLE tabletransfer_keep (legacy TEXT)").execute(&mut conn).await?;
        sqlx::query("INSERT INTO tabletransfer_keep VALUES ('a'), ('b')")
            .execute(&mut conn)
            .await?;

        let dir = tempfile::tempdir()?;
        let csv_path = dir.path().join("wide.csv");
        fs::write(&csv_path, format!("id,{}\n1,x\n", "h".repeat(70)))?;
        let table = read_csv_table(&csv_path)?;

        let err = replace_table(&mut conn, "tabletransfer_keep", &table)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::errors::TransferError::InvalidIdentifier { .. }));

        let shape = stored_shape(&mut conn, "tabletransfer_keep").await?;
        assert_eq!(shape.columns, vec!["legacy"]);
        assert_eq!(shape.rows, 2);

        sqlx::query("DROP TABLE tabletransfer_keep").execute(&mut conn).await?;
        conn.close().await?;
        Ok(())
    }
}
