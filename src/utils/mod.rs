pub mod identifier;
pub mod setting;

use anyhow::{Context, Result};
use std::path::PathBuf;
use which::which;

/// Finds the gcloud executable in the system PATH.
pub fn find_gcloud_executable() -> Result<PathBuf> {
    which("gcloud").context("gcloud executable not found in PATH. Please install the Google Cloud SDK or set GOOGLE_OAUTH_ACCESS_TOKEN.")
}
