// File system locations and hashing helpers
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

const APP_DIR_NAME: &str = "seispick";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to get app data directory")]
    NoAppDataDir,
    #[error("Failed to get config directory")]
    NoConfigDir,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Get the app data directory, creating it if needed
pub fn get_app_data_dir() -> StorageResult<PathBuf> {
    let data_dir = dirs::data_dir().ok_or(StorageError::NoAppDataDir)?;
    let app_dir = data_dir.join(APP_DIR_NAME);
    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

/// Get the config directory, creating it if needed
pub fn get_config_dir() -> StorageResult<PathBuf> {
    let config_dir = dirs::config_dir().ok_or(StorageError::NoConfigDir)?;
    let app_dir = config_dir.join(APP_DIR_NAME);
    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

/// Default location of the event database
pub fn default_db_path() -> StorageResult<PathBuf> {
    Ok(get_app_data_dir()?.join("seispick.db"))
}

/// Default location of the settings file
pub fn default_settings_path() -> StorageResult<PathBuf> {
    Ok(get_config_dir()?.join("settings.json"))
}

/// Calculate SHA256 hash of data
pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
