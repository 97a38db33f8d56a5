// migrateコマンドハンドラー
//
// 未適用のマイグレーションを1グループとして適用します。
// 失敗した場合はトランザクションごとロールバックされ、何も記録されません。

use crate::cli::commands::{render_output, CommandOutput, DbCommand};
use crate::core::migration::MigrationGroup;
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

/// migrateコマンドの出力構造体
#[derive(Debug, Clone, Serialize)]
pub struct MigrateOutput {
    /// 適用したグループ（何も適用しなかった場合は ID 0）
    pub group: MigrationGroup,
}

impl CommandOutput for MigrateOutput {
    fn to_text(&self) -> String {
        if self.group.is_empty() {
            return "No new migrations to run (database is up to date)".to_string();
        }

        let mut output = String::new();
        output.push_str(&format!(
            "{}\n",
            format!(
                "Migrated to group {} ({} migration(s))",
                self.group.id,
                self.group.len()
            )
            .green()
        ));
        for name in &self.group.migrations {
            output.push_str(&format!("  {} {}\n", "✓".green(), name));
        }
        output.trim_end().to_string()
    }
}

/// migrateコマンドハンドラー
#[derive(Debug, Clone, Default)]
pub struct MigrateCommandHandler {}

impl MigrateCommandHandler {
    /// 新しいMigrateCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// migrateコマンドを実行
    pub async fn execute(&self, command: &DbCommand) -> Result<String> {
        let migrator = command.migrator().await?;
        let group = migrator.migrate().await?;

        render_output(&MigrateOutput { group }, &command.format)
    }
}
