// 適用状態ストア
//
// 対象データベース内のマイグレーション履歴テーブルを管理します。
// どのマイグレーションがどのグループで適用されたかを記録し、
// 最新グループの取得と削除（ロールバック）を提供します。
// 書き込み系の操作は呼び出し側のトランザクション上の接続で実行します。

use crate::adapters::sql_quote::{placeholder, placeholders};
use crate::core::config::Dialect;
use crate::core::error::{DatabaseError, MigrateError};
use crate::core::migration::{AppliedMigration, MigrationGroup};
use crate::core::naming::{HISTORY_TABLE, LOCK_TABLE};
use chrono::{DateTime, Utc};
use sqlx::{AnyConnection, Row};
use std::collections::HashSet;
use tracing::{debug, warn};

/// 適用状態ストア
#[derive(Debug, Clone, Copy)]
pub struct AppliedStateStore {
    dialect: Dialect,
}

impl AppliedStateStore {
    /// 新しいAppliedStateStoreを作成
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// 対象の方言
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// 履歴テーブル作成SQLを生成
    pub fn generate_create_history_table_sql(&self) -> String {
        match self.dialect {
            Dialect::PostgreSQL | Dialect::MySQL => format!(
                r#"CREATE TABLE IF NOT EXISTS {} (
    name VARCHAR(255) PRIMARY KEY,
    group_id BIGINT NOT NULL,
    applied_at VARCHAR(64) NOT NULL
)"#,
                HISTORY_TABLE
            ),
            Dialect::SQLite => format!(
                r#"CREATE TABLE IF NOT EXISTS {} (
    name TEXT PRIMARY KEY,
    group_id INTEGER NOT NULL,
    applied_at TEXT NOT NULL
)"#,
                HISTORY_TABLE
            ),
        }
    }

    /// ロックテーブル作成SQLを生成
    pub fn generate_create_lock_table_sql(&self) -> String {
        match self.dialect {
            Dialect::PostgreSQL | Dialect::MySQL => format!(
                r#"CREATE TABLE IF NOT EXISTS {} (
    id BIGINT PRIMARY KEY,
    locked BIGINT NOT NULL DEFAULT 0,
    locked_at VARCHAR(64),
    locked_by VARCHAR(255)
)"#,
                LOCK_TABLE
            ),
            Dialect::SQLite => format!(
                r#"CREATE TABLE IF NOT EXISTS {} (
    id INTEGER PRIMARY KEY,
    locked INTEGER NOT NULL DEFAULT 0,
    locked_at TEXT,
    locked_by TEXT
)"#,
                LOCK_TABLE
            ),
        }
    }

    /// ロック行の初期化SQLを生成（既存行は変更しない）
    pub fn generate_seed_lock_row_sql(&self) -> String {
        match self.dialect {
            Dialect::PostgreSQL => format!(
                "INSERT INTO {} (id, locked) VALUES (1, 0) ON CONFLICT (id) DO NOTHING",
                LOCK_TABLE
            ),
            Dialect::MySQL => format!(
                "INSERT IGNORE INTO {} (id, locked) VALUES (1, 0)",
                LOCK_TABLE
            ),
            Dialect::SQLite => format!(
                "INSERT OR IGNORE INTO {} (id, locked) VALUES (1, 0)",
                LOCK_TABLE
            ),
        }
    }

    /// テーブル存在確認SQLを生成
    pub fn generate_table_exists_sql(&self) -> String {
        match self.dialect {
            Dialect::PostgreSQL => format!(
                "SELECT table_name FROM information_schema.tables WHERE table_schema = current_schema() AND table_name = {}",
                placeholder(self.dialect, 1)
            ),
            Dialect::MySQL => format!(
                "SELECT table_name FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = {}",
                placeholder(self.dialect, 1)
            ),
            Dialect::SQLite => format!(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = {}",
                placeholder(self.dialect, 1)
            ),
        }
    }

    /// 履歴挿入SQLを生成
    pub fn generate_record_applied_sql(&self) -> String {
        format!(
            "INSERT INTO {} (name, group_id, applied_at) VALUES ({})",
            HISTORY_TABLE,
            placeholders(self.dialect, 3)
        )
    }

    /// 適用済み一覧取得SQLを生成
    pub fn generate_get_applied_sql(&self) -> String {
        format!(
            "SELECT name, group_id, applied_at FROM {} ORDER BY group_id, name",
            HISTORY_TABLE
        )
    }

    /// 最新グループID取得SQLを生成
    pub fn generate_last_group_id_sql(&self) -> String {
        format!("SELECT MAX(group_id) FROM {}", HISTORY_TABLE)
    }

    /// グループのメンバー取得SQLを生成
    pub fn generate_group_members_sql(&self) -> String {
        format!(
            "SELECT name FROM {} WHERE group_id = {} ORDER BY name",
            HISTORY_TABLE,
            placeholder(self.dialect, 1)
        )
    }

    /// グループ削除SQLを生成
    pub fn generate_remove_group_sql(&self) -> String {
        format!(
            "DELETE FROM {} WHERE group_id = {}",
            HISTORY_TABLE,
            placeholder(self.dialect, 1)
        )
    }

    /// 管理テーブルを作成（冪等、既存行は破棄しない）
    pub async fn ensure_schema(&self, conn: &mut AnyConnection) -> Result<(), MigrateError> {
        for sql in [
            self.generate_create_history_table_sql(),
            self.generate_create_lock_table_sql(),
            self.generate_seed_lock_row_sql(),
        ] {
            sqlx::query(&sql)
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    DatabaseError::query("Failed to provision migration tables", &sql, e)
                })?;
        }

        debug!(
            history_table = HISTORY_TABLE,
            lock_table = LOCK_TABLE,
            "Migration tables are provisioned"
        );
        Ok(())
    }

    /// 指定テーブルが存在するか確認
    pub async fn table_exists(
        &self,
        conn: &mut AnyConnection,
        table: &str,
    ) -> Result<bool, MigrateError> {
        let sql = self.generate_table_exists_sql();
        let row = sqlx::query(&sql)
            .bind(table)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| DatabaseError::query("Failed to check table existence", &sql, e))?;
        Ok(row.is_some())
    }

    /// 履歴・ロックの両テーブルが作成済みか確認
    pub async fn is_provisioned(&self, conn: &mut AnyConnection) -> Result<bool, MigrateError> {
        Ok(self.table_exists(conn, HISTORY_TABLE).await?
            && self.table_exists(conn, LOCK_TABLE).await?)
    }

    /// 適用済みマイグレーション名の集合
    pub async fn applied_names(
        &self,
        conn: &mut AnyConnection,
    ) -> Result<HashSet<String>, MigrateError> {
        Ok(self
            .applied(conn)
            .await?
            .into_iter()
            .map(|record| record.name)
            .collect())
    }

    /// 適用済みマイグレーションの全レコード（グループ順）
    pub async fn applied(
        &self,
        conn: &mut AnyConnection,
    ) -> Result<Vec<AppliedMigration>, MigrateError> {
        let sql = self.generate_get_applied_sql();
        let rows = sqlx::query(&sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| DatabaseError::query("Failed to read migration history", &sql, e))?;

        rows.iter()
            .map(|row| {
                let name: String = row.try_get(0).map_err(|e| {
                    DatabaseError::query("Failed to decode migration name", &sql, e)
                })?;
                let group_id: i64 = row.try_get(1).map_err(|e| {
                    DatabaseError::query("Failed to decode group id", &sql, e)
                })?;
                let applied_at_str: String = row.try_get(2).map_err(|e| {
                    DatabaseError::query("Failed to decode applied_at", &sql, e)
                })?;

                Ok(AppliedMigration {
                    applied_at: parse_timestamp(&name, &applied_at_str),
                    name,
                    group_id,
                })
            })
            .collect()
    }

    /// グループの適用を記録
    ///
    /// 呼び出し側のトランザクション内で1件ずつ挿入する。
    /// 主キー違反（同名の重複）はレジストリと履歴のずれを意味し、Persistence エラーになる。
    pub async fn record_applied(
        &self,
        conn: &mut AnyConnection,
        group_id: i64,
        names: &[String],
    ) -> Result<(), MigrateError> {
        let sql = self.generate_record_applied_sql();
        let applied_at = Utc::now().to_rfc3339();

        for name in names {
            sqlx::query(&sql)
                .bind(name.as_str())
                .bind(group_id)
                .bind(applied_at.as_str())
                .execute(&mut *conn)
                .await
                .map_err(|e| MigrateError::Persistence {
                    message: format!(
                        "Failed to record migration {} in group {}: {}",
                        name, group_id, e
                    ),
                    sql: Some(sql.clone()),
                })?;
        }

        debug!(group_id, count = names.len(), "Recorded migration group");
        Ok(())
    }

    /// 最新グループを取得（空の場合は None）
    pub async fn last_group(
        &self,
        conn: &mut AnyConnection,
    ) -> Result<Option<MigrationGroup>, MigrateError> {
        let sql = self.generate_last_group_id_sql();
        let row = sqlx::query(&sql)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| DatabaseError::query("Failed to read last migration group", &sql, e))?;
        let last_id: Option<i64> = row
            .try_get(0)
            .map_err(|e| DatabaseError::query("Failed to decode last group id", &sql, e))?;

        let Some(group_id) = last_id else {
            return Ok(None);
        };

        let members_sql = self.generate_group_members_sql();
        let rows = sqlx::query(&members_sql)
            .bind(group_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| {
                DatabaseError::query("Failed to read migration group members", &members_sql, e)
            })?;

        let migrations = rows
            .iter()
            .map(|row| row.try_get::<String, _>(0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                DatabaseError::query("Failed to decode migration name", &members_sql, e)
            })?;

        Ok(Some(MigrationGroup::new(group_id, migrations)))
    }

    /// グループの履歴を削除（ロールバック用、呼び出し側のトランザクション内）
    pub async fn remove_group(
        &self,
        conn: &mut AnyConnection,
        group_id: i64,
    ) -> Result<u64, MigrateError> {
        let sql = self.generate_remove_group_sql();
        let result = sqlx::query(&sql)
            .bind(group_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| MigrateError::Persistence {
                message: format!("Failed to remove migration group {}: {}", group_id, e),
                sql: Some(sql.clone()),
            })?;

        debug!(
            group_id,
            removed = result.rows_affected(),
            "Removed migration group"
        );
        Ok(result.rows_affected())
    }
}

/// RFC 3339 の適用日時をパース
///
/// 手作業で書き換えられた行などでパースできない場合は UNIX エポックとして扱う。
fn parse_timestamp(name: &str, value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!(migration = %name, applied_at = %value, error = %e, "Unparseable applied_at");
            DateTime::<Utc>::UNIX_EPOCH
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_create_history_table_sql() {
        for dialect in [Dialect::PostgreSQL, Dialect::MySQL, Dialect::SQLite] {
            let store = AppliedStateStore::new(dialect);
            let sql = store.generate_create_history_table_sql();

            assert!(sql.contains("CREATE TABLE IF NOT EXISTS cairn_migrations"));
            assert!(sql.contains("name"));
            assert!(sql.contains("group_id"));
            assert!(sql.contains("applied_at"));
        }
    }

    #[test]
    fn test_generate_seed_lock_row_sql_is_idempotent_per_dialect() {
        assert!(AppliedStateStore::new(Dialect::PostgreSQL)
            .generate_seed_lock_row_sql()
            .contains("ON CONFLICT (id) DO NOTHING"));
        assert!(AppliedStateStore::new(Dialect::MySQL)
            .generate_seed_lock_row_sql()
            .starts_with("INSERT IGNORE"));
        assert!(AppliedStateStore::new(Dialect::SQLite)
            .generate_seed_lock_row_sql()
            .starts_with("INSERT OR IGNORE"));
    }

    #[test]
    fn test_generate_record_applied_sql_placeholders() {
        let pg = AppliedStateStore::new(Dialect::PostgreSQL).generate_record_applied_sql();
        assert!(pg.contains("VALUES ($1, $2, $3)"));

        let sqlite = AppliedStateStore::new(Dialect::SQLite).generate_record_applied_sql();
        assert!(sqlite.contains("VALUES (?, ?, ?)"));
    }

    #[test]
    fn test_generate_remove_group_sql() {
        let sql = AppliedStateStore::new(Dialect::MySQL).generate_remove_group_sql();
        assert_eq!(sql, "DELETE FROM cairn_migrations WHERE group_id = ?");
    }

    #[test]
    fn test_generate_table_exists_sql() {
        let sql = AppliedStateStore::new(Dialect::SQLite).generate_table_exists_sql();
        assert!(sql.contains("sqlite_master"));

        let sql = AppliedStateStore::new(Dialect::PostgreSQL).generate_table_exists_sql();
        assert!(sql.contains("information_schema.tables"));
        assert!(sql.contains("$1"));
    }

    #[test]
    fn test_parse_timestamp_fallback() {
        let parsed = parse_timestamp("a", "2026-01-21T12:00:00+00:00");
        assert_eq!(parsed.to_rfc3339(), "2026-01-21T12:00:00+00:00");

        let fallback = parse_timestamp("a", "yesterday");
        assert_eq!(fallback, DateTime::<Utc>::UNIX_EPOCH);
    }
}
