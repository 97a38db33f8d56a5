// 設定ファイル読み込みサービス
//
// core::config の純粋性を保つため、ファイルI/Oはこのサービスに集約する。

use crate::core::config::Config;
use anyhow::{Context, Result};
use std::path::Path;

/// 設定ファイル読み込みサービス
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// YAMLファイルから設定を読み込み、検証する
    pub fn from_file(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = content
            .parse()
            .with_context(|| format!("Invalid config file: {:?}", path))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".cairn.yaml");
        fs::write(
            &path,
            r#"version: "1.0"
migrations_dir: db/migrations
environments:
  development:
    dsn: sqlite://dev.db
    timeout_seconds: 15
  production:
    dsn: postgres://app:secret@db:5432/app
    log_queries: true
"#,
        )
        .unwrap();

        let config = ConfigLoader::from_file(&path).unwrap();
        assert_eq!(config.migrations_dir, Path::new("db/migrations"));
        assert_eq!(config.fixtures_dir, Path::new("fixtures"));

        let dev = config.get_database_config("development").unwrap();
        assert_eq!(dev.timeout_seconds, Some(15));
        assert!(!dev.log_queries);

        let prod = config.get_database_config("production").unwrap();
        assert!(prod.log_queries);
    }

    #[test]
    fn test_from_file_missing() {
        let temp_dir = TempDir::new().unwrap();
        let err = ConfigLoader::from_file(&temp_dir.path().join("none.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_from_file_rejects_invalid_dsn() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".cairn.yaml");
        fs::write(
            &path,
            "version: \"1.0\"\nenvironments:\n  development:\n    dsn: oracle://db\n",
        )
        .unwrap();

        let err = ConfigLoader::from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("oracle"));
    }
}
