// マイグレーションドメインモデル
//
// マイグレーションの定義（名前 + up/down アクション）と、
// 適用履歴・グループ・ステータスを表現する型を提供します。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::AnyConnection;
use std::fmt;
use std::sync::Arc;

/// マイグレーションのアクション（up または down）
///
/// 呼び出し側が開始したトランザクション上の接続が渡されます。
/// アクション内でコミットやロールバックを行ってはいけません。
#[async_trait]
pub trait MigrationAction: Send + Sync {
    /// アクションを実行
    async fn run(&self, conn: &mut AnyConnection) -> anyhow::Result<()>;
}

/// マイグレーション
///
/// 作成時刻ベースの一意な名前と、up アクション、省略可能な down アクションを持ちます。
/// 登録後に変更されることはありません。
#[derive(Clone)]
pub struct Migration {
    name: String,
    up: Arc<dyn MigrationAction>,
    down: Option<Arc<dyn MigrationAction>>,
}

impl Migration {
    /// 新しいマイグレーションを作成
    pub fn new(
        name: impl Into<String>,
        up: Arc<dyn MigrationAction>,
        down: Option<Arc<dyn MigrationAction>>,
    ) -> Self {
        Self {
            name: name.into(),
            up,
            down,
        }
    }

    /// up と down を持つマイグレーションを作成
    pub fn reversible<U, D>(name: impl Into<String>, up: U, down: D) -> Self
    where
        U: MigrationAction + 'static,
        D: MigrationAction + 'static,
    {
        Self::new(name, Arc::new(up), Some(Arc::new(down)))
    }

    /// down を持たない（ロールバック不可の）マイグレーションを作成
    pub fn irreversible<U>(name: impl Into<String>, up: U) -> Self
    where
        U: MigrationAction + 'static,
    {
        Self::new(name, Arc::new(up), None)
    }

    /// マイグレーション名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// up アクション
    pub fn up(&self) -> &dyn MigrationAction {
        self.up.as_ref()
    }

    /// down アクション（不可逆の場合は None）
    pub fn down(&self) -> Option<&dyn MigrationAction> {
        self.down.as_deref()
    }

    /// ロールバック可能かどうか
    pub fn is_reversible(&self) -> bool {
        self.down.is_some()
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("name", &self.name)
            .field("reversible", &self.is_reversible())
            .finish()
    }
}

/// マイグレーショングループ
///
/// 1回の migrate で適用されたマイグレーションの集合。ロールバックの単位です。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationGroup {
    /// グループID（1始まり、0 は「何も適用しなかった」を表す）
    pub id: i64,
    /// 適用順のマイグレーション名
    pub migrations: Vec<String>,
}

impl MigrationGroup {
    /// 新しいグループを作成
    pub fn new(id: i64, migrations: Vec<String>) -> Self {
        Self { id, migrations }
    }

    /// 何も適用しなかったことを表す空グループ
    pub fn empty() -> Self {
        Self {
            id: 0,
            migrations: Vec::new(),
        }
    }

    /// 空グループかどうか
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// 含まれるマイグレーション数
    pub fn len(&self) -> usize {
        self.migrations.len()
    }
}

/// 適用済みマイグレーションの履歴レコード
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedMigration {
    /// マイグレーション名
    pub name: String,
    /// 所属グループID
    pub group_id: i64,
    /// 適用日時
    pub applied_at: DateTime<Utc>,
}

/// ロックの状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockState {
    /// ロック中かどうか
    pub locked: bool,
    /// ロック取得日時（RFC 3339）
    pub locked_at: Option<String>,
    /// ロック所有者タグ
    pub locked_by: Option<String>,
}

impl LockState {
    /// ロックされていない状態
    pub fn unlocked() -> Self {
        Self {
            locked: false,
            locked_at: None,
            locked_by: None,
        }
    }
}

/// マイグレーションの状態サマリー
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    /// 適用済みマイグレーション（グループ順）
    pub applied: Vec<AppliedMigration>,
    /// 未適用マイグレーション名（登録順）
    pub pending: Vec<String>,
    /// 最新グループID
    pub last_group_id: Option<i64>,
    /// ロック状態
    pub lock: LockState,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl MigrationAction for Noop {
        async fn run(&self, _conn: &mut AnyConnection) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_reversible_and_irreversible() {
        let reversible = Migration::reversible("20210522010101_initial", Noop, Noop);
        assert!(reversible.is_reversible());
        assert!(reversible.down().is_some());

        let irreversible = Migration::irreversible("20210523010101_backfill", Noop);
        assert!(!irreversible.is_reversible());
        assert!(irreversible.down().is_none());
    }

    #[test]
    fn test_debug_omits_actions() {
        let migration = Migration::reversible("20210522010101_initial", Noop, Noop);
        let debug = format!("{:?}", migration);
        assert!(debug.contains("20210522010101_initial"));
        assert!(debug.contains("reversible: true"));
    }

    #[test]
    fn test_empty_group() {
        let group = MigrationGroup::empty();
        assert_eq!(group.id, 0);
        assert!(group.is_empty());
        assert_eq!(group.len(), 0);
    }
}
