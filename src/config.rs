use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::repository::DEFAULT_PAGE_SIZE;
use crate::query::geo::{DEFAULT_MAX_DISTANCE_METERS, DEFAULT_NEARBY_LIMIT};
use crate::query::rating::DEFAULT_TOP_LIMIT;
use crate::query::search::DEFAULT_SEARCH_LIMIT;

/// Settings read from `storemap.toml`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoremapConfig {
    pub database: Option<String>,
    pub port: u16,
    pub page_size: usize,
    pub search_limit: usize,
    pub nearby_max_distance_m: f64,
    pub nearby_limit: usize,
    pub top_limit: usize,
    pub busy_timeout_ms: u64,
}

impl Default for StoremapConfig {
    fn default() -> Self {
        Self {
            database: None,
            port: 3000,
            page_size: DEFAULT_PAGE_SIZE,
            search_limit: DEFAULT_SEARCH_LIMIT,
            nearby_max_distance_m: DEFAULT_MAX_DISTANCE_METERS,
            nearby_limit: DEFAULT_NEARBY_LIMIT,
            top_limit: DEFAULT_TOP_LIMIT,
            busy_timeout_ms: 5000,
        }
    }
}

impl StoremapConfig {
    /// Database path from the config, falling back to the default location
    pub fn database_path(&self) -> PathBuf {
        self.database
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("storemap.toml")
}

pub fn default_database_path() -> PathBuf {
    default_database_path_in(Path::new("."))
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".storemap").join("storemap.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<StoremapConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: StoremapConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &StoremapConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(load_config(Some(&dir.path().join("storemap.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storemap.toml");
        std::fs::write(&path, "port = 8080\nsearch_limit = 7\n").unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.search_limit, 7);
        assert_eq!(config.page_size, 4);
        assert_eq!(config.nearby_max_distance_m, 10_000.0);
        assert_eq!(config.database_path(), default_database_path());
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storemap.toml");
        let config = StoremapConfig {
            database: Some("data/stores.db".into()),
            top_limit: 3,
            ..Default::default()
        };

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();

        assert_eq!(load_config(Some(&path)).unwrap(), Some(config));
    }

    #[test]
    fn test_ensure_db_dir() {
        let dir = TempDir::new().unwrap();
        let db = default_database_path_in(dir.path());
        ensure_db_dir(&db).unwrap();
        assert!(dir.path().join(".storemap").is_dir());
    }
}
