// rollbackコマンドハンドラー
//
// 最後に適用したグループを down アクションで元に戻します。
// 履歴が空の場合は何もせず成功します。

use crate::cli::commands::{render_output, CommandOutput, DbCommand};
use crate::core::migration::MigrationGroup;
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

/// rollbackコマンドの出力構造体
#[derive(Debug, Clone, Serialize)]
pub struct RollbackOutput {
    /// ロールバックしたグループ（down の実行順）
    pub group: Option<MigrationGroup>,
}

impl CommandOutput for RollbackOutput {
    fn to_text(&self) -> String {
        let Some(group) = &self.group else {
            return "Nothing to rollback".to_string();
        };

        let mut output = String::new();
        output.push_str(&format!(
            "{}\n",
            format!(
                "Rolled back group {} ({} migration(s))",
                group.id,
                group.len()
            )
            .yellow()
        ));
        for name in &group.migrations {
            output.push_str(&format!("  {} {}\n", "↩".yellow(), name));
        }
        output.trim_end().to_string()
    }
}

/// rollbackコマンドハンドラー
#[derive(Debug, Clone, Default)]
pub struct RollbackCommandHandler {}

impl RollbackCommandHandler {
    /// 新しいRollbackCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// rollbackコマンドを実行
    pub async fn execute(&self, command: &DbCommand) -> Result<String> {
        let migrator = command.migrator().await?;
        let group = migrator.rollback().await?;

        render_output(&RollbackOutput { group }, &command.format)
    }
}
