// データベース接続アダプター
//
// SQLxを使用したデータベース接続の管理を行います。
// PostgreSQL、MySQL、SQLiteに対応した統一されたインターフェースを提供します。

use crate::adapters::connection_string::{normalize_connection_string, redact_connection_string};
use crate::core::config::{DatabaseConfig, Dialect};
use crate::core::error::DatabaseError;
use log::LevelFilter;
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::{AnyPool, ConnectOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// 接続取得タイムアウトの既定値（秒）
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// データベース接続サービス
///
/// データベース接続プールの初期化と管理を行います。
#[derive(Debug, Clone, Default)]
pub struct DatabaseConnectionService {}

impl DatabaseConnectionService {
    /// 新しいDatabaseConnectionServiceを作成
    pub fn new() -> Self {
        Self {}
    }

    /// 接続オプションを構築
    ///
    /// `log_queries` が有効な場合は実行SQLを INFO レベルで記録し、
    /// 無効な場合は sqlx のステートメントログを止める。
    pub fn build_connect_options(
        &self,
        config: &DatabaseConfig,
    ) -> Result<AnyConnectOptions, DatabaseError> {
        let dialect = self.dialect_of(config)?;
        let dsn = normalize_connection_string(dialect, &config.dsn);

        let options =
            AnyConnectOptions::from_str(&dsn).map_err(|e| DatabaseError::Connection {
                message: format!(
                    "Failed to parse connection string: {}",
                    redact_connection_string(&config.dsn)
                ),
                cause: e.to_string(),
            })?;

        Ok(if config.log_queries {
            options.log_statements(LevelFilter::Info)
        } else {
            options.disable_statement_logging()
        })
    }

    /// データベース接続プールを作成
    pub async fn create_pool(&self, config: &DatabaseConfig) -> Result<AnyPool, DatabaseError> {
        let dialect = self.dialect_of(config)?;
        let options = self.build_connect_options(config)?;

        debug!(
            dsn = %redact_connection_string(&config.dsn),
            dialect = %dialect,
            "Connecting to database"
        );

        self.create_pool_options(config.timeout_seconds)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::Connection {
                message: format!("Failed to create connection pool: {}", dialect),
                cause: e.to_string(),
            })
    }

    /// 接続テストを実行
    pub async fn test_connection(&self, pool: &AnyPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1")
            .execute(pool)
            .await
            .map(|_| ())
            .map_err(|e| DatabaseError::Connection {
                message: "Database connection test failed".to_string(),
                cause: e.to_string(),
            })
    }

    /// プールオプションを作成
    ///
    /// タイムアウト未指定の場合は30秒。
    pub fn create_pool_options(&self, timeout_secs: Option<u64>) -> AnyPoolOptions {
        let timeout = timeout_secs.unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS);
        AnyPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(timeout))
    }

    /// 接続プールを閉じる
    pub async fn close_pool(&self, pool: AnyPool) {
        pool.close().await;
    }

    /// 接続設定から方言を取得
    pub fn dialect_of(&self, config: &DatabaseConfig) -> Result<Dialect, DatabaseError> {
        config.dialect().map_err(|e| DatabaseError::Connection {
            message: "Invalid connection string".to_string(),
            cause: e.to_string(),
        })
    }
}
