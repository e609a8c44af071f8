use std::path::PathBuf;

use crate::config;

pub fn home_dir() -> anyhow::Result<PathBuf> {
    home_from(std::env::var("HOME").ok(), std::env::var("USERPROFILE").ok())
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))
}

// Windows fallback to USERPROFILE.
fn home_from(home: Option<String>, user_profile: Option<String>) -> Option<PathBuf> {
    home.into_iter()
        .chain(user_profile)
        .find(|v| !v.is_empty())
        .map(PathBuf::from)
}

pub fn default_data_dir() -> anyhow::Result<PathBuf> {
    Ok(home_dir()?.join(config::storage::DATA_DIR_REL))
}

pub fn default_download_dir() -> anyhow::Result<PathBuf> {
    Ok(home_dir()?.join(config::delivery::DOWNLOAD_DIR_REL))
}

pub fn log_dir() -> anyhow::Result<PathBuf> {
    Ok(home_dir()?.join(config::logging::LOG_DIR_REL))
}
