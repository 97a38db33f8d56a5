// lock / unlock コマンドハンドラー
//
// マイグレーションロックを手動で取得・解除します。
// 手動ロックは unlock するまでプロセス終了後も残ります。

use crate::cli::commands::{render_output, CommandOutput, DbCommand};
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tracing::warn;

/// lock / unlock コマンドの出力構造体
#[derive(Debug, Clone, Serialize)]
pub struct LockOutput {
    /// 実行後にロックされているか
    pub locked: bool,
    /// 実行前にロックされていたか（unlock のみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub was_locked: Option<bool>,
}

impl CommandOutput for LockOutput {
    fn to_text(&self) -> String {
        match (self.locked, self.was_locked) {
            (true, _) => format!("{} Migrations locked", "🔒".yellow()),
            (false, Some(false)) => "Migrations were not locked".to_string(),
            (false, _) => format!("{} Migrations unlocked", "✓".green()),
        }
    }
}

/// lockコマンドハンドラー
#[derive(Debug, Clone, Default)]
pub struct LockCommandHandler {}

impl LockCommandHandler {
    /// 新しいLockCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// lockコマンドを実行
    pub async fn execute(&self, command: &DbCommand) -> Result<String> {
        let migrator = command.migrator().await?;
        migrator.lock().await?;

        let output = LockOutput {
            locked: true,
            was_locked: None,
        };
        render_output(&output, &command.format)
    }
}

/// unlockコマンドハンドラー
#[derive(Debug, Clone, Default)]
pub struct UnlockCommandHandler {}

impl UnlockCommandHandler {
    /// 新しいUnlockCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// unlockコマンドを実行
    pub async fn execute(&self, command: &DbCommand) -> Result<String> {
        let migrator = command.migrator().await?;
        warn!("Unlocking migrations regardless of the current holder");
        let was_locked = migrator.unlock().await?;

        let output = LockOutput {
            locked: false,
            was_locked: Some(was_locked),
        };
        render_output(&output, &command.format)
    }
}
