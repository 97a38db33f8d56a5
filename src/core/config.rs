// 設定ファイル管理
//
// プロジェクトの設定ファイル（YAML形式）の構造、検証、
// 環境別のデータベース接続設定の管理を行います。

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// データベース方言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(rename = "postgresql")]
    PostgreSQL,
    #[serde(rename = "mysql")]
    MySQL,
    #[serde(rename = "sqlite")]
    SQLite,
}

impl Dialect {
    /// 接続文字列のスキームから方言を判定
    pub fn from_connection_string(dsn: &str) -> Result<Self> {
        let scheme = dsn
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| anyhow!("Connection string has no scheme: {}", dsn))?;

        match scheme.as_str() {
            "postgres" | "postgresql" => Ok(Dialect::PostgreSQL),
            "mysql" | "mariadb" => Ok(Dialect::MySQL),
            "sqlite" => Ok(Dialect::SQLite),
            other => Err(anyhow!(
                "Unsupported database scheme: {}. Please use one of: postgres, mysql, sqlite.",
                other
            )),
        }
    }

    /// sqlx の `backend_name()` から方言を判定
    pub fn from_backend_name(name: &str) -> Option<Self> {
        match name {
            "PostgreSQL" => Some(Dialect::PostgreSQL),
            "MySQL" => Some(Dialect::MySQL),
            "SQLite" => Some(Dialect::SQLite),
            _ => None,
        }
    }

    /// セッションスコープのロック機構を持つかどうか
    pub fn has_session_lock(&self) -> bool {
        matches!(self, Dialect::PostgreSQL | Dialect::MySQL)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::PostgreSQL => write!(f, "postgresql"),
            Dialect::MySQL => write!(f, "mysql"),
            Dialect::SQLite => write!(f, "sqlite"),
        }
    }
}

/// プロジェクト設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 設定ファイルのバージョン
    pub version: String,

    /// SQLマイグレーションとスタブの出力先
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,

    /// fixtures ディレクトリ
    #[serde(default = "default_fixtures_dir")]
    pub fixtures_dir: PathBuf,

    /// 環境別のデータベース設定
    pub environments: HashMap<String, DatabaseConfig>,
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_fixtures_dir() -> PathBuf {
    PathBuf::from("fixtures")
}

impl Config {
    /// デフォルトの設定ファイルパス
    pub const DEFAULT_CONFIG_PATH: &'static str = crate::core::naming::CONFIG_FILE;

    /// 指定された環境のデータベース設定を取得
    pub fn get_database_config(&self, environment: &str) -> Result<DatabaseConfig> {
        self.environments.get(environment).cloned().ok_or_else(|| {
            let mut available: Vec<_> = self.environments.keys().collect();
            available.sort();
            anyhow!(
                "Environment '{}' not found. Available environments: {:?}",
                environment,
                available
            )
        })
    }

    /// 設定の妥当性を検証
    pub fn validate(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(anyhow!("Config file version is not specified"));
        }

        if self.environments.is_empty() {
            return Err(anyhow!(
                "At least one environment configuration is required"
            ));
        }

        for (env_name, db_config) in &self.environments {
            db_config
                .validate()
                .with_context(|| format!("Invalid config for environment '{}'", env_name))?;
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(yaml: &str) -> Result<Self, Self::Err> {
        serde_saphyr::from_str(yaml).with_context(|| "Failed to parse config file")
    }
}

/// データベース接続設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// 接続文字列（postgres://, mysql://, sqlite://）
    pub dsn: String,

    /// クエリタイムアウト（秒）
    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    /// 実行SQLをログ出力するか
    #[serde(default)]
    pub log_queries: bool,
}

impl DatabaseConfig {
    /// 接続文字列から設定を作成
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            timeout_seconds: None,
            log_queries: false,
        }
    }

    /// Validate database configuration
    pub fn validate(&self) -> Result<()> {
        if self.dsn.trim().is_empty() {
            return Err(anyhow!("Connection string (dsn) is not specified"));
        }
        if self.timeout_seconds == Some(0) {
            return Err(anyhow!("timeout_seconds must be greater than 0"));
        }
        self.dialect()?;

        Ok(())
    }

    /// 接続文字列から方言を取得
    pub fn dialect(&self) -> Result<Dialect> {
        Dialect::from_connection_string(&self.dsn)
    }

    /// タイムアウトを Duration として取得
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}
