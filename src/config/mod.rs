// tabletransfer/src/config/mod.rs
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::{Result, TransferError};
use crate::utils::identifier::{validate_sql_identifier, validate_warehouse_identifier};

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_PG_PORT: u16 = 5432;
/// Driver tag kept in the logged connection string so it reads like the scripts it replaces.
pub const CONNECTION_SCHEME: &str = "postgresql+psycopg2";

/// Flat key/value view of settings.json. Scalars are stringified; nested values are rejected.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    pub fn load_from_json(settings_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(settings_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TransferError::SettingsNotFound(settings_path.to_path_buf()),
            _ => TransferError::Io(e),
        })?;
        Self::from_json_str(&content).map_err(|e| match e {
            TransferError::SettingsParse { reason, .. } => TransferError::SettingsParse {
                path: settings_path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let parse_error = |reason: String| TransferError::SettingsParse {
            path: PathBuf::from(SETTINGS_FILE),
            reason,
        };

        let raw: Value = serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?;
        let object = match raw {
            Value::Object(map) => map,
            other => {
                return Err(parse_error(format!(
                    "expected a JSON object at the top level, found {}",
                    json_kind(&other)
                )));
            }
        };

        let mut values = HashMap::with_capacity(object.len());
        for (key, value) in object {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                // null keys behave like absent ones
                Value::Null => continue,
                other => {
                    return Err(parse_error(format!(
                        "value for '{}' must be a string, found {}",
                        key,
                        json_kind(&other)
                    )));
                }
            };
            values.insert(key, text);
        }

        Ok(Settings { values })
    }

    /// Looks up a required key.
    pub fn get(&self, key: &str) -> Result<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| TransferError::MissingSetting(key.to_string()))
    }

    pub fn get_optional(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseConfig {
    pub project_id: String,
    pub dataset: String,
    pub table: String,
}

impl WarehouseConfig {
    /// Legacy-SQL table reference form `project:dataset.table`.
    pub fn query(&self) -> String {
        format!("SELECT * FROM {}:{}.{}", self.project_id, self.dataset, self.table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub user: String,
    pub pass: String,
    pub host: String,
    pub port: u16,
    pub db: String,
}

impl DatabaseConfig {
    pub fn connection_url(&self) -> String {
        format!(
            "{}://{}:{}@{}:{}/{}",
            CONNECTION_SCHEME, self.user, self.pass, self.host, self.port, self.db
        )
    }

    /// Same as `connection_url` with the password blanked, for logs.
    pub fn masked_connection_url(&self) -> String {
        DatabaseConfig {
            pass: "***".to_string(),
            ..self.clone()
        }
        .connection_url()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlQueryConfig {
    pub database: DatabaseConfig,
    pub table: String,
}

impl SqlQueryConfig {
    pub fn query(&self) -> String {
        format!("SELECT * FROM {}", self.table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub database: DatabaseConfig,
    pub csv_path: PathBuf,
    pub table: String,
}

#[derive(Debug, Clone)]
pub enum OperationConfig {
    Warehouse(WarehouseConfig),
    SqlQuery(SqlQueryConfig),
    Upload(UploadConfig),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub operation: Option<OperationConfig>,
    pub settings: Settings,
}

impl AppConfig {
    pub fn load_from_json(settings_path: &Path) -> Result<Self> {
        Ok(AppConfig {
            operation: None, // filled in by main once the operation is known
            settings: Settings::load_from_json(settings_path)?,
        })
    }
}

pub fn load_warehouse_config(settings: &Settings) -> Result<WarehouseConfig> {
    let project_id = settings.get("project_id")?;
    let dataset = settings.get("dataset")?;
    let table = settings.get("table")?;

    validate_warehouse_identifier("project_id", project_id)?;
    validate_warehouse_identifier("dataset", dataset)?;
    validate_warehouse_identifier("table", table)?;

    Ok(WarehouseConfig {
        project_id: project_id.to_string(),
        dataset: dataset.to_string(),
        table: table.to_string(),
    })
}

pub fn load_database_config(settings: &Settings) -> Result<DatabaseConfig> {
    let user = settings.get("user")?;
    let pass = settings.get("pass")?;
    let host = settings.get("host")?;
    let db = settings.get("db")?;

    let port = match settings.get_optional("port") {
        Some(raw) => raw.trim().parse::<u16>().map_err(|_| TransferError::SettingsParse {
            path: PathBuf::from(SETTINGS_FILE),
            reason: format!("port must be a number between 0 and 65535, got {:?}", raw),
        })?,
        None => DEFAULT_PG_PORT,
    };

    if host.trim().is_empty() {
        return Err(TransferError::InvalidIdentifier {
            key: "host".to_string(),
            value: host.to_string(),
        });
    }

    Ok(DatabaseConfig {
        user: user.to_string(),
        pass: pass.to_string(),
        host: host.to_string(),
        port,
        db: db.to_string(),
    })
}

pub fn load_sql_query_config(settings: &Settings) -> Result<SqlQueryConfig> {
    let database = load_database_config(settings)?;
    let table = settings.get("table")?;
    validate_sql_identifier("table", table)?;

    Ok(SqlQueryConfig {
        database,
        table: table.to_string(),
    })
}

pub fn load_upload_config(settings: &Settings) -> Result<UploadConfig> {
    let database = load_database_config(settings)?;
    let csv_path = settings.get("csv")?;
    let table = settings.get("table")?;
    validate_sql_identifier("table", table)?;

    if csv_path.trim().is_empty() {
        return Err(TransferError::SettingsParse {
            path: PathBuf::from(SETTINGS_FILE),
            reason: "csv cannot be empty".to_string(),
        });
    }

    Ok(UploadConfig {
        database,
        csv_path: PathBuf::from(csv_path),
        table: table.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn settings(value: serde_json::Value) -> Settings {
        Settings::from_json_str(&value.to_string()).expect("valid settings")
    }

    #[test]
    fn test_warehouse_query_substitutes_every_placeholder() -> anyhow::Result<()> {
        let s = settings(json!({"project_id": "p", "dataset": "d", "table": "t"}));
        let config = load_warehouse_config(&s)?;
        assert_eq!(config.query(), "SELECT * FROM p:d.t");
        Ok(())
    }

    #[test]
    fn test_database_connection_string_and_query() -> anyhow::Result<()> {
        let s = settings(json!({
            "user": "u", "pass": "x", "host": "h", "db": "db1", "table": "t"
        }));
        let config = load_sql_query_config(&s)?;
        assert_eq!(
            config.database.connection_url(),
            "postgresql+psycopg2://u:x@h:5432/db1"
        );
        assert_eq!(
            config.database.masked_connection_url(),
            "postgresql+psycopg2://u:***@h:5432/db1"
        );
        assert_eq!(config.query(), "SELECT * FROM t");
        Ok(())
    }

    #[test]
    fn test_port_override_and_numeric_values() -> anyhow::Result<()> {
        let s = settings(json!({
            "user": "u", "pass": 1234, "host": "h", "db": "db1", "port": 6543
        }));
        let config = load_database_config(&s)?;
        assert_eq!(config.port, 6543);
        assert_eq!(config.pass, "1234");
        Ok(())
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let s = settings(json!({
            "user": "u", "pass": "x", "host": "h", "db": "db1", "port": "not-a-port"
        }));
        let err = load_database_config(&s).unwrap_err();
        assert!(matches!(err, TransferError::SettingsParse { .. }));
    }

    #[test]
    fn test_missing_key_names_the_key() {
        let s = settings(json!({"project_id": "p", "table": "t"}));
        match load_warehouse_config(&s) {
            Err(TransferError::MissingSetting(key)) => assert_eq!(key, "dataset"),
            other => panic!("expected MissingSetting, got {:?}", other),
        }
    }

    #[test]
    fn test_null_value_counts_as_missing() {
        let s = settings(json!({"user": "u", "pass": null, "host": "h", "db": "d"}));
        assert!(matches!(
            load_database_config(&s),
            Err(TransferError::MissingSetting(key)) if key == "pass"
        ));
    }

    #[test]
    fn test_upload_config_requires_csv_and_table() -> anyhow::Result<()> {
        let s = settings(json!({
            "user": "u", "pass": "x", "host": "h", "db": "db1",
            "csv": "in.csv", "table": "dest"
        }));
        let config = load_upload_config(&s)?;
        assert_eq!(config.csv_path, PathBuf::from("in.csv"));
        assert_eq!(config.table, "dest");

        let without_csv = settings(json!({
            "user": "u", "pass": "x", "host": "h", "db": "db1", "table": "dest"
        }));
        assert!(matches!(
            load_upload_config(&without_csv),
            Err(TransferError::MissingSetting(key)) if key == "csv"
        ));
        Ok(())
    }

    #[test]
    fn test_injection_in_table_name_is_rejected() {
        let s = settings(json!({
            "user": "u", "pass": "x", "host": "h", "db": "db1",
            "table": "t; DROP TABLE users"
        }));
        assert!(matches!(
            load_sql_query_config(&s),
            Err(TransferError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_non_object_settings_are_rejected() {
        assert!(matches!(
            Settings::from_json_str("[1, 2, 3]"),
            Err(TransferError::SettingsParse { .. })
        ));
        assert!(matches!(
            Settings::from_json_str(r#"{"table": {"nested": true}}"#),
            Err(TransferError::SettingsParse { .. })
        ));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        assert!(matches!(
            Settings::load_from_json(&path),
            Err(TransferError::SettingsNotFound(p)) if p == path
        ));
    }

    #[test]
    fn test_load_from_malformed_file_reports_its_path() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(SETTINGS_FILE);
        let mut file = fs::File::create(&path)?;
        file.write_all(b"{ \"table\": ")?;

        match Settings::load_from_json(&path) {
            Err(TransferError::SettingsParse { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected SettingsParse, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_load_from_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"project_id": "p", "dataset": "d", "table": "t"}"#)?;

        let app_config = AppConfig::load_from_json(&path)?;
        assert!(app_config.operation.is_none());
        assert_eq!(app_config.settings.get("project_id")?, "p");
        assert_eq!(app_config.settings.get("dataset")?, "d");
        Ok(())
    }
}
