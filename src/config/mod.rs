pub mod schema;

pub use schema::{AgentConfig, DEFAULT_SYSTEM_PROMPT};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Default home directory (~/.math-agent).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".math-agent"))
        .unwrap_or_else(|| PathBuf::from(".math-agent"))
}

/// Default config file location.
pub fn default_config_path() -> PathBuf {
    default_home_dir().join("config.toml")
}

/// Expand `~` and environment variables in a user-supplied path.
pub fn resolve_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).into_owned()),
    }
}

/// Load config from the given path, or return defaults.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AgentConfig =
            toml::from_str(&contents).context("Failed to parse agent config (TOML)")?;
        Ok(config)
    } else {
        Ok(AgentConfig::default())
    }
}

/// Save config to the given path (TOML format).
pub fn save_config(config: &AgentConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents).context("Failed to write config file")?;
    Ok(())
}
