// コマンド共通コンテキスト
//
// 設定ファイル読み込みやパス解決、接続とマイグレーターの組み立ての重複をCLI層で集約する。

use crate::adapters::database::DatabaseConnectionService;
use crate::core::config::{Config, DatabaseConfig};
use crate::core::naming::{FIXTURES_FILE, RUST_MIGRATIONS_DIR};
use crate::migrations;
use crate::services::config_loader::ConfigLoader;
use crate::services::database_config_resolver::DatabaseConfigResolver;
use crate::services::migrator::Migrator;
use anyhow::{anyhow, Context, Result};
use sqlx::AnyPool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// CLIコマンド共通の実行コンテキスト
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub project_path: PathBuf,
    pub config_path: PathBuf,
    pub config: Config,
}

impl CommandContext {
    /// プロジェクトルートから設定を読み込んでコンテキストを作成
    pub fn load(project_path: PathBuf) -> Result<Self> {
        Self::load_with_config(project_path, None)
    }

    /// カスタム設定ファイルパスを指定してコンテキストを作成
    pub fn load_with_config(
        project_path: PathBuf,
        custom_config_path: Option<PathBuf>,
    ) -> Result<Self> {
        let config_path = custom_config_path
            .unwrap_or_else(|| project_path.join(Config::DEFAULT_CONFIG_PATH));

        if !config_path.exists() {
            return Err(anyhow!(
                "Config file not found: {:?}. Create {} with at least one environment.",
                config_path,
                Config::DEFAULT_CONFIG_PATH
            ));
        }

        let config =
            ConfigLoader::from_file(&config_path).with_context(|| "Failed to read config file")?;

        Ok(Self {
            project_path,
            config_path,
            config,
        })
    }

    /// マイグレーションディレクトリの絶対パス
    pub fn migrations_dir(&self) -> PathBuf {
        self.project_path.join(&self.config.migrations_dir)
    }

    /// fixtures ディレクトリの絶対パス
    pub fn fixtures_dir(&self) -> PathBuf {
        self.project_path.join(&self.config.fixtures_dir)
    }

    /// fixtures ファイルを解決（指定があれば優先）
    pub fn fixtures_file(&self, custom_file: Option<&PathBuf>) -> PathBuf {
        match custom_file {
            Some(file) if file.is_absolute() => file.clone(),
            Some(file) => self.project_path.join(file),
            None => self.fixtures_dir().join(FIXTURES_FILE),
        }
    }

    /// 環境に応じたデータベース設定を取得（環境変数上書き込み）
    pub fn database_config(&self, env: &str) -> Result<DatabaseConfig> {
        let config = self
            .config
            .get_database_config(env)
            .with_context(|| format!("Config for environment '{}' not found", env))?;
        let resolved = DatabaseConfigResolver::apply_env_overrides(&config);
        resolved
            .validate()
            .with_context(|| format!("Invalid database config for environment '{}'", env))?;
        Ok(resolved)
    }

    /// 接続プールを作成
    pub async fn connect_pool(&self, env: &str) -> Result<(AnyPool, DatabaseConfig)> {
        let db_config = self.database_config(env)?;
        let db_service = DatabaseConnectionService::new();
        let pool = db_service
            .create_pool(&db_config)
            .await
            .with_context(|| "Failed to connect to database")?;
        db_service.test_connection(&pool).await?;
        Ok((pool, db_config))
    }

    /// 接続を確立し、レジストリを組み立ててマイグレーターを作成
    pub async fn migrator(
        &self,
        env: &str,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<Migrator> {
        let migrations_dir = self.migrations_dir();
        let registry = migrations::registry(&migrations_dir)
            .with_context(|| format!("Failed to build migration registry from {:?}", migrations_dir))?;
        debug!(count = registry.len(), "Registered migrations");

        let (pool, db_config) = self.connect_pool(env).await?;
        let dialect = db_config.dialect()?;

        let migrator = Migrator::new(pool, dialect, Arc::new(registry))
            .with_timeout(db_config.timeout())
            .with_stub_dir(migrations_dir)
            .with_rust_stub_dir(self.project_path.join(RUST_MIGRATIONS_DIR));

        Ok(match cancel {
            Some(cancel) => migrator.with_cancel_signal(cancel),
            None => migrator,
        })
    }
}
