// マイグレーションロック
//
// 同一データベースに対する migrate / rollback の同時実行を防ぎます。
// ロック行（cairn_migration_locks の id = 1）を比較交換で更新し、
// PostgreSQL / MySQL ではさらにセッションスコープのロックを併用します。
// セッションロックはプロセスが落ちると接続ごと解放されるため、
// 取り残されたロック行を次の実行が引き継げます。
// SQLite では書き込み待ちをしないよう、比較交換の間だけ busy_timeout を 0 にし、
// SQLITE_BUSY は別の実行が保持中として扱います。

use crate::adapters::sql_quote::placeholder;
use crate::core::config::Dialect;
use crate::core::error::{DatabaseError, MigrateError};
use crate::core::migration::LockState;
use crate::core::naming::{advisory_lock_key, HISTORY_TABLE, LOCK_TABLE, MANUAL_LOCK_OWNER};
use chrono::Utc;
use sqlx::{AnyConnection, AnyPool, Connection, Row};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

static OWNER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// SQLite の SQLITE_BUSY（拡張コードの下位8ビット）
const SQLITE_BUSY: i32 = 5;

/// 保持者を特定できない場合の表示名
const UNKNOWN_HOLDER: &str = "another session";

/// 実行ごとに一意なロック所有者タグを生成
pub fn owner_tag() -> String {
    let millis = Utc::now().timestamp_millis();
    let counter = OWNER_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("run-{}-{}-{}", std::process::id(), millis, counter)
}

/// ロック行とセッションロックのSQL
#[derive(Debug, Clone, Copy)]
struct LockSql {
    dialect: Dialect,
}

impl LockSql {
    fn state(&self) -> String {
        format!(
            "SELECT locked, locked_at, locked_by FROM {} WHERE id = 1",
            LOCK_TABLE
        )
    }

    fn try_lock(&self) -> String {
        format!(
            "UPDATE {} SET locked = 1, locked_at = {}, locked_by = {} WHERE id = 1 AND locked = 0",
            LOCK_TABLE,
            placeholder(self.dialect, 1),
            placeholder(self.dialect, 2)
        )
    }

    fn take_over(&self) -> String {
        format!(
            "UPDATE {} SET locked_at = {}, locked_by = {} WHERE id = 1 AND locked = 1 AND locked_by = {}",
            LOCK_TABLE,
            placeholder(self.dialect, 1),
            placeholder(self.dialect, 2),
            placeholder(self.dialect, 3)
        )
    }

    fn release(&self) -> String {
        format!(
            "UPDATE {} SET locked = 0, locked_at = NULL, locked_by = NULL WHERE id = 1 AND locked_by = {}",
            LOCK_TABLE,
            placeholder(self.dialect, 1)
        )
    }

    fn force_release(&self) -> String {
        format!(
            "UPDATE {} SET locked = 0, locked_at = NULL, locked_by = NULL WHERE id = 1",
            LOCK_TABLE
        )
    }

    fn session_lock(&self) -> Option<&'static str> {
        match self.dialect {
            Dialect::PostgreSQL => Some("SELECT pg_try_advisory_lock($1)"),
            Dialect::MySQL => Some("SELECT CAST(GET_LOCK(?, 0) AS SIGNED)"),
            Dialect::SQLite => None,
        }
    }

    fn session_unlock(&self) -> Option<&'static str> {
        match self.dialect {
            Dialect::PostgreSQL => Some("SELECT pg_advisory_unlock($1)"),
            Dialect::MySQL => Some("SELECT RELEASE_LOCK(?)"),
            Dialect::SQLite => None,
        }
    }
}

/// ロックマネージャー
#[derive(Debug, Clone)]
pub struct LockManager {
    pool: AnyPool,
    dialect: Dialect,
    sql: LockSql,
}

impl LockManager {
    /// 新しいLockManagerを作成
    pub fn new(pool: AnyPool, dialect: Dialect) -> Self {
        Self {
            pool,
            dialect,
            sql: LockSql { dialect },
        }
    }

    /// ロックを取得
    ///
    /// 待機はしない。別の実行が保持している場合は即座に `LockHeld` を返す。
    /// 取得したロックはプールから切り離した専用接続に保持され、
    /// `LockGuard::release` で解放する。
    pub async fn acquire(&self, owner: &str) -> Result<LockGuard, MigrateError> {
        let mut conn = self.open_detached("Failed to open lock connection").await?;

        let session_locked = match self.try_session_lock(&mut conn).await {
            Ok(locked) => locked,
            Err(e) => {
                close_quietly(conn).await;
                return Err(e);
            }
        };
        if self.dialect.has_session_lock() && !session_locked {
            let err = self.lock_held(&mut conn).await;
            close_quietly(conn).await;
            return Err(err);
        }

        let claimed = match self.disable_busy_wait(&mut conn).await {
            Ok(previous_timeout) => {
                let claimed = self.claim_row(&mut conn, owner, session_locked).await;
                if let (Ok(()), Some(timeout)) = (&claimed, previous_timeout) {
                    if let Err(e) = restore_busy_timeout(&mut conn, timeout).await {
                        warn!(error = %e, "Failed to restore busy timeout on lock connection");
                    }
                }
                claimed
            }
            Err(e) => Err(e),
        };

        match claimed {
            Ok(()) => {
                debug!(owner = %owner, dialect = %self.dialect, "Acquired migration lock");
                Ok(LockGuard {
                    conn: Some(conn),
                    sql: self.sql,
                    owner: owner.to_string(),
                    session_locked,
                    released: false,
                })
            }
            Err(e) => {
                if session_locked {
                    if let Err(unlock_err) = session_unlock(&self.sql, &mut conn).await {
                        warn!(error = %unlock_err, "Failed to release session lock");
                    }
                }
                close_quietly(conn).await;
                Err(e)
            }
        }
    }

    /// プールから切り離した専用接続を開く
    async fn open_detached(&self, message: &str) -> Result<AnyConnection, MigrateError> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DatabaseError::Connection {
                message: message.to_string(),
                cause: e.to_string(),
            })?;
        Ok(conn.detach())
    }

    /// SQLite の書き込み待ちを止め、元の busy_timeout（ミリ秒）を返す
    async fn disable_busy_wait(
        &self,
        conn: &mut AnyConnection,
    ) -> Result<Option<i64>, MigrateError> {
        if self.dialect != Dialect::SQLite {
            return Ok(None);
        }

        let sql = "PRAGMA busy_timeout";
        let row = sqlx::query(sql)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| DatabaseError::query("Failed to read busy timeout", sql, e))?;
        let previous: i64 = row
            .try_get(0)
            .map_err(|e| DatabaseError::query("Failed to decode busy timeout", sql, e))?;

        let sql = "PRAGMA busy_timeout = 0";
        sqlx::query(sql)
            .execute(&mut *conn)
            .await
            .map_err(|e| DatabaseError::query("Failed to disable busy timeout", sql, e))?;
        Ok(Some(previous))
    }

    /// 書き込みが競合したか（SQLite の SQLITE_BUSY 系）
    fn is_contended(&self, error: &sqlx::Error) -> bool {
        if self.dialect != Dialect::SQLite {
            return false;
        }
        match error {
            sqlx::Error::Database(db_error) => db_error
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .is_some_and(|code| code & 0xff == SQLITE_BUSY),
            _ => false,
        }
    }

    /// 現在の保持者を読み取り `LockHeld` を作る
    ///
    /// 読み取れない場合も保持者不明の `LockHeld` とする。
    async fn lock_held(&self, conn: &mut AnyConnection) -> MigrateError {
        match read_state(&self.sql, conn).await {
            Ok(state) => MigrateError::LockHeld {
                holder: state
                    .locked_by
                    .unwrap_or_else(|| UNKNOWN_HOLDER.to_string()),
                locked_at: state.locked_at,
            },
            Err(e) => {
                debug!(error = %e, "Could not read migration lock holder");
                MigrateError::LockHeld {
                    holder: UNKNOWN_HOLDER.to_string(),
                    locked_at: None,
                }
            }
        }
    }

    /// ロック行を比較交換で確保する
    async fn claim_row(
        &self,
        conn: &mut AnyConnection,
        owner: &str,
        session_locked: bool,
    ) -> Result<(), MigrateError> {
        let now = Utc::now().to_rfc3339();
        let sql = self.sql.try_lock();
        let result = match sqlx::query(&sql)
            .bind(now.as_str())
            .bind(owner)
            .execute(&mut *conn)
            .await
        {
            Ok(result) => result,
            Err(e) if self.is_contended(&e) => return Err(self.lock_held(conn).await),
            Err(e) => {
                return Err(DatabaseError::query("Failed to acquire migration lock", &sql, e).into())
            }
        };

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let state = read_state(&self.sql, conn).await?;
        let holder = state.locked_by.clone().unwrap_or_default();

        // セッションロックを持てた以上、手動ロック以外の保持者は既に存在しない
        if session_locked && state.locked && holder != MANUAL_LOCK_OWNER {
            let sql = self.sql.take_over();
            let result = sqlx::query(&sql)
                .bind(now.as_str())
                .bind(owner)
                .bind(holder.as_str())
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    DatabaseError::query("Failed to take over stale migration lock", &sql, e)
                })?;

            if result.rows_affected() == 1 {
                warn!(
                    previous_owner = %holder,
                    locked_at = state.locked_at.as_deref().unwrap_or("-"),
                    "Took over a stale migration lock"
                );
                return Ok(());
            }
        }

        Err(MigrateError::LockHeld {
            holder,
            locked_at: state.locked_at,
        })
    }

    async fn try_session_lock(&self, conn: &mut AnyConnection) -> Result<bool, MigrateError> {
        let Some(sql) = self.sql.session_lock() else {
            return Ok(false);
        };

        let query = sqlx::query(sql);
        let query = match self.dialect {
            Dialect::PostgreSQL => query.bind(advisory_lock_key()),
            _ => query.bind(HISTORY_TABLE),
        };
        let row = query
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| DatabaseError::query("Failed to take session lock", sql, e))?;

        let acquired = match self.dialect {
            Dialect::PostgreSQL => row.try_get::<bool, _>(0),
            _ => row
                .try_get::<Option<i64>, _>(0)
                .map(|value| value == Some(1)),
        }
        .map_err(|e| DatabaseError::query("Failed to decode session lock result", sql, e))?;

        Ok(acquired)
    }

    /// 手動でロックする（`unlock` まで保持される）
    pub async fn lock_manually(&self) -> Result<(), MigrateError> {
        let mut conn = self.open_detached("Failed to acquire connection").await?;
        let result = self.claim_manually(&mut conn).await;
        close_quietly(conn).await;
        result
    }

    async fn claim_manually(&self, conn: &mut AnyConnection) -> Result<(), MigrateError> {
        self.disable_busy_wait(conn).await?;

        let sql = self.sql.try_lock();
        let result = match sqlx::query(&sql)
            .bind(Utc::now().to_rfc3339())
            .bind(MANUAL_LOCK_OWNER)
            .execute(&mut *conn)
            .await
        {
            Ok(result) => result,
            Err(e) if self.is_contended(&e) => return Err(self.lock_held(conn).await),
            Err(e) => return Err(DatabaseError::query("Failed to lock migrations", &sql, e).into()),
        };

        if result.rows_affected() == 1 {
            info!("Migrations locked manually");
            return Ok(());
        }

        Err(self.lock_held(conn).await)
    }

    /// 保持者に関係なくロックを解除
    ///
    /// 解除前にロックされていたかどうかを返す。
    pub async fn force_unlock(&self) -> Result<bool, MigrateError> {
        let mut conn = self.pool.acquire().await.map_err(|e| DatabaseError::Connection {
            message: "Failed to acquire connection".to_string(),
            cause: e.to_string(),
        })?;

        let previous = read_state(&self.sql, &mut conn).await?;
        let sql = self.sql.force_release();
        sqlx::query(&sql)
            .execute(&mut *conn)
            .await
            .map_err(|e| DatabaseError::query("Failed to unlock migrations", &sql, e))?;

        if previous.locked {
            warn!(
                previous_owner = previous.locked_by.as_deref().unwrap_or("-"),
                "Migration lock was forcibly released"
            );
        }
        Ok(previous.locked)
    }

    /// 現在のロック状態
    pub async fn state(&self) -> Result<LockState, MigrateError> {
        let mut conn = self.pool.acquire().await.map_err(|e| DatabaseError::Connection {
            message: "Failed to acquire connection".to_string(),
            cause: e.to_string(),
        })?;
        read_state(&self.sql, &mut conn).await
    }
}

async fn read_state(sql: &LockSql, conn: &mut AnyConnection) -> Result<LockState, MigrateError> {
    let query = sql.state();
    let row = sqlx::query(&query)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| DatabaseError::query("Failed to read migration lock", &query, e))?
        .ok_or(MigrateError::NotInitialized)?;

    let decode = |e| DatabaseError::query("Failed to decode migration lock", &query, e);
    let locked: i64 = row.try_get(0).map_err(decode)?;
    let locked_at: Option<String> = row.try_get(1).map_err(decode)?;
    let locked_by: Option<String> = row.try_get(2).map_err(decode)?;

    Ok(LockState {
        locked: locked != 0,
        locked_at,
        locked_by,
    })
}

async fn session_unlock(sql: &LockSql, conn: &mut AnyConnection) -> Result<(), MigrateError> {
    let Some(unlock) = sql.session_unlock() else {
        return Ok(());
    };

    let query = sqlx::query(unlock);
    let query = match sql.dialect {
        Dialect::PostgreSQL => query.bind(advisory_lock_key()),
        _ => query.bind(HISTORY_TABLE),
    };
    query
        .execute(&mut *conn)
        .await
        .map_err(|e| DatabaseError::query("Failed to release session lock", unlock, e))?;
    Ok(())
}

async fn restore_busy_timeout(conn: &mut AnyConnection, millis: i64) -> Result<(), sqlx::Error> {
    sqlx::query(&format!("PRAGMA busy_timeout = {}", millis))
        .execute(&mut *conn)
        .await
        .map(|_| ())
}

async fn close_quietly(conn: AnyConnection) {
    if let Err(e) = conn.close().await {
        debug!(error = %e, "Failed to close lock connection");
    }
}

/// 取得済みのロック
///
/// `release` で明示的に解放する。解放せずに破棄された場合、
/// 専用接続が閉じられてセッションロックは外れるが、ロック行は残る。
#[derive(Debug)]
pub struct LockGuard {
    conn: Option<AnyConnection>,
    sql: LockSql,
    owner: String,
    session_locked: bool,
    released: bool,
}

impl LockGuard {
    /// ロック所有者タグ
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// ロックを解放
    pub async fn release(mut self) -> Result<(), MigrateError> {
        self.released = true;
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        let sql = self.sql.release();
        let row_result = sqlx::query(&sql)
            .bind(self.owner.as_str())
            .execute(&mut conn)
            .await
            .map_err(|e| DatabaseError::query("Failed to release migration lock", &sql, e));

        let session_result = if self.session_locked {
            session_unlock(&self.sql, &mut conn).await
        } else {
            Ok(())
        };
        close_quietly(conn).await;

        let released = row_result?;
        session_result?;

        if released.rows_affected() == 0 {
            warn!(owner = %self.owner, "Migration lock was no longer held by this run");
        } else {
            debug!(owner = %self.owner, "Released migration lock");
        }
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                owner = %self.owner,
                "Migration lock dropped without release; run `cairn db unlock` if it stays locked"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_tag_is_unique() {
        let first = owner_tag();
        let second = owner_tag();

        assert!(first.starts_with("run-"));
        assert_ne!(first, second);
        assert_ne!(first, MANUAL_LOCK_OWNER);
    }

    #[test]
    fn test_try_lock_sql_is_compare_and_set() {
        let sql = LockSql {
            dialect: Dialect::PostgreSQL,
        }
        .try_lock();
        assert!(sql.contains("WHERE id = 1 AND locked = 0"));
        assert!(sql.contains("$1"));
        assert!(sql.contains("$2"));
    }

    #[test]
    fn test_release_sql_is_owner_scoped() {
        let sql = LockSql {
            dialect: Dialect::SQLite,
        }
        .release();
        assert!(sql.ends_with("WHERE id = 1 AND locked_by = ?"));
    }

    #[test]
    fn test_session_lock_per_dialect() {
        let sqlite = LockSql {
            dialect: Dialect::SQLite,
        };
        assert!(sqlite.session_lock().is_none());
        assert!(sqlite.session_unlock().is_none());

        let mysql = LockSql {
            dialect: Dialect::MySQL,
        };
        assert_eq!(
            mysql.session_lock(),
            Some("SELECT CAST(GET_LOCK(?, 0) AS SIGNED)")
        );

        let pg = LockSql {
            dialect: Dialect::PostgreSQL,
        };
        assert_eq!(pg.session_unlock(), Some("SELECT pg_advisory_unlock($1)"));
    }
}
