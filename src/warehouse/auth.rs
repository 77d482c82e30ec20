// tabletransfer/src/warehouse/auth.rs
use std::env;
use std::process::Command;

use crate::errors::{Result, TransferError};
use crate::utils::find_gcloud_executable;

pub const TOKEN_ENV_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Resolves a bearer token for the warehouse API.
///
/// An explicit token in the environment wins; otherwise the active gcloud
/// account is asked for one.
pub fn access_token() -> Result<String> {
    if let Ok(token) = env::var(TOKEN_ENV_VAR) {
        let token = token.trim();
        if !token.is_empty() {
            tracing::debug!("using access token from {}", TOKEN_ENV_VAR);
            return Ok(token.to_string());
        }
    }

    let gcloud_path =
        find_gcloud_executable().map_err(|e| TransferError::WarehouseAuth(format!("{:#}", e)))?;
    tracing::debug!(gcloud = %gcloud_path.display(), "requesting access token");

    let output = Command::new(&gcloud_path)
        .arg("auth")
        .arg("print-access-token")
        .output()
        .map_err(|e| TransferError::WarehouseAuth(format!("failed to execute gcloud: {}", e)))?;

    if !output.status.success() {
        return Err(TransferError::WarehouseAuth(format!(
            "gcloud auth print-access-token failed with status: {}\nStderr: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(TransferError::WarehouseAuth(
            "gcloud returned an empty access token".to_string(),
        ));
    }
    Ok(token)
}
