// マイグレーター
//
// レジストリ、適用状態ストア、ロックを組み合わせて
// migrate / rollback などの操作を実行するサービス。
// 状態遷移: Idle → Locked → Applying/Reverting → Locked → Idle

use crate::adapters::history_store::AppliedStateStore;
use crate::adapters::lock_manager::{owner_tag, LockGuard, LockManager};
use crate::core::config::Dialect;
use crate::core::error::{DatabaseError, MigrateError};
use crate::core::migration::{Migration, MigrationGroup, MigrationStatus};
use crate::services::registry::MigrationRegistry;
use crate::services::stub_generator::{GeneratedStub, StubGenerator};
use sqlx::any::Any;
use sqlx::pool::PoolConnection;
use sqlx::{AnyPool, Transaction};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// マイグレーター
#[derive(Debug, Clone)]
pub struct Migrator {
    pool: AnyPool,
    dialect: Dialect,
    registry: Arc<MigrationRegistry>,
    store: AppliedStateStore,
    locks: LockManager,
    stubs: StubGenerator,
    timeout: Option<Duration>,
    cancel: Option<watch::Receiver<bool>>,
}

impl Migrator {
    /// 新しいMigratorを作成
    pub fn new(pool: AnyPool, dialect: Dialect, registry: Arc<MigrationRegistry>) -> Self {
        Self {
            locks: LockManager::new(pool.clone(), dialect),
            store: AppliedStateStore::new(dialect),
            stubs: StubGenerator::new(PathBuf::from("migrations")),
            pool,
            dialect,
            registry,
            timeout: None,
            cancel: None,
        }
    }

    /// ロック区間全体のタイムアウトを設定
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// キャンセル信号を設定（`true` が送られると実行中の区間を中断する）
    pub fn with_cancel_signal(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// スタブの出力先を設定
    pub fn with_stub_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.stubs = StubGenerator::new(dir);
        self
    }

    /// Rust スタブの出力先を設定（`with_stub_dir` の後に呼ぶ）
    pub fn with_rust_stub_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.stubs = self.stubs.with_rust_dir(dir);
        self
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// 管理テーブルを作成（冪等）
    pub async fn init(&self) -> Result<(), MigrateError> {
        let mut conn = self.connection().await?;
        self.store.ensure_schema(&mut conn).await?;
        drop(conn);

        match self.locks.acquire(&owner_tag()).await {
            Ok(guard) => guard.release().await?,
            // 保持中でもロック行が使えることは確認できている
            Err(MigrateError::LockHeld { holder, .. }) => {
                info!(holder = %holder, "Migration lock is currently held");
            }
            Err(e) => return Err(e),
        }

        info!(dialect = %self.dialect, "Migration tables are ready");
        Ok(())
    }

    /// 未適用のマイグレーションを1グループとして適用
    ///
    /// 未適用が無い場合は ID 0 の空グループを返す。
    pub async fn migrate(&self) -> Result<MigrationGroup, MigrateError> {
        let group = self.locked("migrate", self.apply_pending()).await?;

        if group.is_empty() {
            info!("No pending migrations");
        } else {
            info!(group_id = group.id, count = group.len(), "Migrated group");
        }
        Ok(group)
    }

    /// 最新グループをロールバック
    ///
    /// 履歴が空の場合は何もせず `None` を返す。
    pub async fn rollback(&self) -> Result<Option<MigrationGroup>, MigrateError> {
        let group = self.locked("rollback", self.revert_last_group()).await?;

        match &group {
            Some(group) => {
                info!(group_id = group.id, count = group.len(), "Rolled back group")
            }
            None => info!("Nothing to rollback"),
        }
        Ok(group)
    }

    /// 手動でロック
    pub async fn lock(&self) -> Result<(), MigrateError> {
        self.ensure_provisioned().await?;
        self.locks.lock_manually().await
    }

    /// ロックを強制解除（解除前にロックされていたかを返す）
    pub async fn unlock(&self) -> Result<bool, MigrateError> {
        self.ensure_provisioned().await?;
        self.locks.force_unlock().await
    }

    /// 適用状況を取得
    pub async fn status(&self) -> Result<MigrationStatus, MigrateError> {
        let mut conn = self.connection().await?;
        if !self.store.is_provisioned(&mut conn).await? {
            return Err(MigrateError::NotInitialized);
        }

        let applied = self.store.applied(&mut conn).await?;
        drop(conn);

        let applied_names: HashSet<String> =
            applied.iter().map(|record| record.name.clone()).collect();
        let pending = self
            .registry
            .pending(&applied_names)
            .into_iter()
            .map(|migration| migration.name().to_string())
            .collect();
        let last_group_id = applied.iter().map(|record| record.group_id).max();
        let lock = self.locks.state().await?;

        Ok(MigrationStatus {
            applied,
            pending,
            last_group_id,
            lock,
        })
    }

    /// Rust マイグレーションのスタブを生成
    pub fn create_rust(&self, label: &str) -> Result<GeneratedStub, MigrateError> {
        let name = self.new_stub_name(label)?;
        self.stubs.write_rust(&name)
    }

    /// SQL マイグレーションのスタブを生成
    pub fn create_sql(&self, label: &str) -> Result<GeneratedStub, MigrateError> {
        let name = self.new_stub_name(label)?;
        self.stubs.write_sql(&name)
    }

    fn new_stub_name(&self, label: &str) -> Result<String, MigrateError> {
        let name = self.stubs.canonical_name(label)?;
        if self.registry.contains(&name) {
            return Err(MigrateError::DuplicateName { name });
        }
        Ok(name)
    }

    async fn connection(&self) -> Result<PoolConnection<Any>, MigrateError> {
        self.pool.acquire().await.map_err(|e| {
            DatabaseError::Connection {
                message: "Failed to acquire connection".to_string(),
                cause: e.to_string(),
            }
            .into()
        })
    }

    async fn begin(&self) -> Result<Transaction<'static, Any>, MigrateError> {
        self.pool
            .begin()
            .await
            .map_err(|e| DatabaseError::transaction("Failed to begin transaction", e).into())
    }

    async fn ensure_provisioned(&self) -> Result<(), MigrateError> {
        let mut conn = self.connection().await?;
        if self.store.is_provisioned(&mut conn).await? {
            Ok(())
        } else {
            Err(MigrateError::NotInitialized)
        }
    }

    /// ロックを取得して本体を実行し、結果に関係なくロックを解放する
    async fn locked<T>(
        &self,
        operation: &str,
        body: impl Future<Output = Result<T, MigrateError>>,
    ) -> Result<T, MigrateError> {
        self.ensure_provisioned().await?;
        let guard = self.locks.acquire(&owner_tag()).await?;
        debug!(operation, owner = %guard.owner(), "Entered locked section");

        let outcome = self.guarded(body).await;
        self.finish(guard, operation, outcome).await
    }

    /// タイムアウトとキャンセルで本体を打ち切る
    ///
    /// 打ち切られた本体のトランザクションは破棄されロールバックされる。
    async fn guarded<T>(
        &self,
        body: impl Future<Output = Result<T, MigrateError>>,
    ) -> Result<T, MigrateError> {
        let bounded = async {
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, body).await {
                    Ok(result) => result,
                    Err(_) => Err(MigrateError::Timeout {
                        seconds: limit.as_secs(),
                    }),
                },
                None => body.await,
            }
        };

        match self.cancel.clone() {
            Some(cancel) => tokio::select! {
                result = bounded => result,
                _ = cancelled(cancel) => Err(MigrateError::Cancelled),
            },
            None => bounded.await,
        }
    }

    async fn finish<T>(
        &self,
        guard: LockGuard,
        operation: &str,
        outcome: Result<T, MigrateError>,
    ) -> Result<T, MigrateError> {
        let owner = guard.owner().to_string();

        match (outcome, guard.release().await) {
            (outcome, Ok(())) => outcome,
            (Ok(value), Err(release_err)) => {
                warn!(
                    operation,
                    owner = %owner,
                    error = %release_err,
                    "Completed, but failed to release migration lock; run `cairn db unlock`"
                );
                Ok(value)
            }
            (Err(e), Err(release_err)) => {
                warn!(
                    operation,
                    owner = %owner,
                    error = %release_err,
                    "Failed to release migration lock after an error"
                );
                Err(e)
            }
        }
    }

    async fn apply_pending(&self) -> Result<MigrationGroup, MigrateError> {
        let mut tx = self.begin().await?;

        let applied = self.store.applied_names(&mut *tx).await?;
        self.registry.verify_applied(&applied)?;

        let pending = self.registry.pending(&applied);
        if pending.is_empty() {
            return Ok(MigrationGroup::empty());
        }

        let group_id = self
            .store
            .last_group(&mut *tx)
            .await?
            .map_or(1, |group| group.id + 1);

        for migration in &pending {
            info!(migration = %migration.name(), group_id, "Applying migration");
            if let Err(cause) = migration.up().run(&mut *tx).await {
                rollback_quietly(tx).await;
                return Err(MigrateError::MigrationFailed {
                    name: migration.name().to_string(),
                    cause,
                });
            }
        }

        let names: Vec<String> = pending
            .iter()
            .map(|migration| migration.name().to_string())
            .collect();
        self.store.record_applied(&mut *tx, group_id, &names).await?;

        tx.commit().await.map_err(|e| {
            DatabaseError::transaction("Failed to commit migration group", e)
        })?;

        Ok(MigrationGroup::new(group_id, names))
    }

    async fn revert_last_group(&self) -> Result<Option<MigrationGroup>, MigrateError> {
        let mut tx = self.begin().await?;

        let Some(group) = self.store.last_group(&mut *tx).await? else {
            return Ok(None);
        };

        let mut members: Vec<&Migration> = group
            .migrations
            .iter()
            .map(|name| {
                self.registry
                    .get(name)
                    .ok_or_else(|| MigrateError::UnknownMigration { name: name.clone() })
            })
            .collect::<Result<_, _>>()?;
        members.sort_by_key(|migration| Reverse(self.registry.position(migration.name())));

        // 書き込み前に全メンバーが可逆か確認する
        if let Some(migration) = members.iter().find(|migration| !migration.is_reversible()) {
            return Err(MigrateError::IrreversibleMigration {
                name: migration.name().to_string(),
            });
        }

        for migration in &members {
            let Some(down) = migration.down() else {
                continue;
            };
            info!(migration = %migration.name(), group_id = group.id, "Reverting migration");
            if let Err(cause) = down.run(&mut *tx).await {
                rollback_quietly(tx).await;
                return Err(MigrateError::MigrationFailed {
                    name: migration.name().to_string(),
                    cause,
                });
            }
        }

        self.store.remove_group(&mut *tx, group.id).await?;
        tx.commit().await.map_err(|e| {
            DatabaseError::transaction("Failed to commit rollback", e)
        })?;

        let reverted = members
            .iter()
            .map(|migration| migration.name().to_string())
            .collect();
        Ok(Some(MigrationGroup::new(group.id, reverted)))
    }
}

async fn rollback_quietly(tx: Transaction<'static, Any>) {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "Failed to roll back transaction");
    }
}

/// キャンセルが要求されるまで待つ（送信側が無くなった場合は永久に待つ）
async fn cancelled(mut cancel: watch::Receiver<bool>) {
    if cancel.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}
