use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DB_PATH_ENV: &str = "IPLM_DB_PATH";
pub const LOG_ENV: &str = "IPLM_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IplmConfig {
    pub database: Option<String>,
    pub log_level: Option<String>,
}

impl IplmConfig {
    /// Values written by `db init`
    pub fn initial() -> Self {
        Self {
            database: Some(default_database_path().to_string_lossy().into_owned()),
            log_level: Some("info".to_string()),
        }
    }

    /// Overlay `IPLM_DB_PATH` / `IPLM_LOG` from `lookup` (normally the process environment)
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(db) = lookup(DB_PATH_ENV).filter(|v| !v.is_empty()) {
            self.database = Some(db);
        }
        if let Some(level) = lookup(LOG_ENV).filter(|v| !v.is_empty()) {
            self.log_level = Some(level);
        }
        self
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("iplm.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from(".iplm").join("iplm.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<IplmConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: IplmConfig = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
    Ok(Some(config))
}

/// Load the config file (if any) and apply environment overrides
pub fn load_effective(path: Option<&Path>) -> anyhow::Result<IplmConfig> {
    let config = load_config(path)?.unwrap_or_default();
    Ok(config.with_overrides(|key| std::env::var(key).ok()))
}

/// `--database` flag, then environment/config, then `.iplm/iplm.db`
pub fn resolve_database_path(flag: Option<&Path>, config: &IplmConfig) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| config.database.as_ref().map(PathBuf::from))
        .unwrap_or_else(default_database_path)
}

pub fn write_config(path: &Path, config: &IplmConfig, force: bool) -> anyhow::Result<()> {
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
        assert!(load_config(Some(&dir.path().join("iplm.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("iplm.toml");
        let config = IplmConfig {
            database: Some("data/ip.db".into()),
            log_level: Some("debug".into()),
        };

        write_config(&path, &config, false).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), Some(config.clone()));

        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &IplmConfig::initial(), true).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), Some(IplmConfig::initial()));
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("iplm.toml");
        std::fs::write(&path, "database = [").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_env_overrides_config() {
        let config = IplmConfig {
            database: Some("from-file.db".into()),
            log_level: None,
        };
        let env = |key: &str| match key {
            DB_PATH_ENV => Some("from-env.db".to_string()),
            LOG_ENV => Some("warn".to_string()),
            _ => None,
        };

        let config = config.with_overrides(env);
        assert_eq!(config.database.as_deref(), Some("from-env.db"));
        assert_eq!(config.log_level.as_deref(), Some("warn"));
    }

    #[test]
    fn test_database_resolution_order() {
        let config = IplmConfig {
            database: Some("configured.db".into()),
            log_level: None,
        };
        let flag = PathBuf::from("flag.db");

        assert_eq!(resolve_database_path(Some(&flag), &config), flag);
        assert_eq!(resolve_database_path(None, &config), PathBuf::from("configured.db"));
        assert_eq!(resolve_database_path(None, &IplmConfig::default()), default_database_path());
    }

    #[test]
    fn test_ensure_db_dir_creates_parent() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("nested").join("iplm.db");
        ensure_db_dir(&db).unwrap();
        assert!(db.parent().unwrap().is_dir());
    }
}
