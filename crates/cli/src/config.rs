//! CLI configuration utilities

use anyhow::Result;
use sigma_core::{FileStorage, SigmaConfig, TokenStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// File name of the configuration inside the data directory
pub const CONFIG_FILE: &str = "sigma.toml";

/// `--data-dir`, then `SIGMA_STATE_DIR`, then the platform data directory
pub fn resolve_data_dir(data_dir: Option<PathBuf>) -> PathBuf {
    data_dir.unwrap_or_else(|| {
        if let Ok(state_dir) = std::env::var("SIGMA_STATE_DIR") {
            PathBuf::from(state_dir)
        } else {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sigma")
        }
    })
}

/// Load the explicit file, else DATA_DIR/sigma.toml, else defaults and
/// environment
pub fn load_config(explicit: Option<&Path>, data_dir: &Path) -> Result<SigmaConfig> {
    if let Some(path) = explicit {
        info!("Loading configuration from: {}", path.display());
        return Ok(SigmaConfig::load_from_file(path)?);
    }

    let default_path = data_dir.join(CONFIG_FILE);
    if default_path.exists() {
        info!("Loading configuration from: {}", default_path.display());
        Ok(SigmaConfig::load_from_file(&default_path)?)
    } else {
        info!("Using default configuration with environment overrides");
        Ok(SigmaConfig::load()?)
    }
}

/// Token store for the CLI.
///
/// The persistent scope lives in the data directory. The session scope lives
/// in the temp directory, so it is lost on reboot.
pub fn token_store(config: &SigmaConfig, data_dir: &Path) -> TokenStore {
    let persistent = FileStorage::new(data_dir.join("storage.json"));
    let session = FileStorage::new(session_storage_path());
    TokenStore::new(
        Arc::new(persistent),
        Arc::new(session),
        config.auth.storage_keys(),
    )
}

fn session_storage_path() -> PathBuf {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "default".to_string());
    std::env::temp_dir()
        .join("sigma")
        .join(format!("session-{user}.json"))
}

/// Write a default configuration file
pub fn generate_default_config(path: &Path) -> Result<()> {
    SigmaConfig::default().save(path)?;
    Ok(())
}
