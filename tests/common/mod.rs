// 結合テスト共通ヘルパー
//
// 一時ディレクトリ上の SQLite ファイルに接続したプールを用意します。

#![allow(dead_code)]

use async_trait::async_trait;
use cairn::adapters::database::DatabaseConnectionService;
use cairn::adapters::sql_script::SqlAction;
use cairn::core::config::{DatabaseConfig, Dialect};
use cairn::core::migration::{Migration, MigrationAction};
use cairn::services::migrator::Migrator;
use cairn::services::registry::MigrationRegistry;
use sqlx::{AnyConnection, AnyPool};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// テスト用データベース
pub struct TestDb {
    pub dir: TempDir,
    pub pool: AnyPool,
}

impl TestDb {
    /// 一時ディレクトリに SQLite データベースを作成
    pub async fn sqlite() -> Self {
        sqlx::any::install_default_drivers();

        let dir = TempDir::new().unwrap();
        let dsn = format!("sqlite://{}", dir.path().join("cairn_test.db").display());
        let pool = DatabaseConnectionService::new()
            .create_pool(&DatabaseConfig::new(dsn))
            .await
            .unwrap();

        Self { dir, pool }
    }

    /// レジストリを指定してマイグレーターを作成
    pub fn migrator(&self, migrations: Vec<Migration>) -> Migrator {
        let mut registry = MigrationRegistry::new();
        registry.register_all(migrations).unwrap();
        Migrator::new(self.pool.clone(), Dialect::SQLite, Arc::new(registry))
            .with_stub_dir(self.dir.path().join("migrations"))
    }

    /// テーブルが存在するか
    pub async fn table_exists(&self, table: &str) -> bool {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_optional(&self.pool)
                .await
                .unwrap();
        row.is_some()
    }
}

/// テーブルを作成・削除する可逆マイグレーション
pub fn create_table(name: &str, table: &str) -> Migration {
    Migration::reversible(
        name,
        SqlAction::new(format!("CREATE TABLE {} (id INTEGER PRIMARY KEY)", table)),
        SqlAction::new(format!("DROP TABLE {}", table)),
    )
}

/// 必ず失敗するマイグレーション
pub fn failing(name: &str) -> Migration {
    Migration::reversible(
        name,
        SqlAction::new("INSERT INTO no_such_table (id) VALUES (1)"),
        SqlAction::new("SELECT 1"),
    )
}

/// 指定時間待ってからテーブルを作成するアクション
pub struct SlowAction {
    pub delay: Duration,
    pub table: String,
}

#[async_trait]
impl MigrationAction for SlowAction {
    async fn run(&self, conn: &mut AnyConnection) -> anyhow::Result<()> {
        sqlx::query(&format!("CREATE TABLE {} (id INTEGER)", self.table))
            .execute(&mut *conn)
            .await?;
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}
