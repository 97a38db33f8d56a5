// initコマンドハンドラー
//
// マイグレーション管理テーブル（履歴とロック）を作成します。
// 何度実行しても既存の行は変更されません。

use crate::cli::commands::{render_output, CommandOutput, DbCommand};
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tracing::debug;

/// initコマンドの出力構造体
#[derive(Debug, Clone, Serialize)]
pub struct InitOutput {
    /// データベース方言
    pub dialect: String,
    /// 環境名
    pub env: String,
}

impl CommandOutput for InitOutput {
    fn to_text(&self) -> String {
        format!(
            "{} Migration tables are ready ({}, {})",
            "✓".green(),
            self.env,
            self.dialect
        )
    }
}

/// initコマンドハンドラー
#[derive(Debug, Clone, Default)]
pub struct InitCommandHandler {}

impl InitCommandHandler {
    /// 新しいInitCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// initコマンドを実行
    pub async fn execute(&self, command: &DbCommand) -> Result<String> {
        let migrator = command.migrator().await?;
        debug!(env = %command.env, "Provisioning migration tables");
        migrator.init().await?;

        let output = InitOutput {
            dialect: migrator.dialect().to_string(),
            env: command.env.clone(),
        };
        render_output(&output, &command.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_handler() {
        let handler = InitCommandHandler::new();
        assert!(format!("{:?}", handler).contains("InitCommandHandler"));
    }

    #[test]
    fn test_init_output_text() {
        colored::control::set_override(false);
        let output = InitOutput {
            dialect: "sqlite".to_string(),
            env: "development".to_string(),
        };
        assert_eq!(
            output.to_text(),
            "✓ Migration tables are ready (development, sqlite)"
        );
    }
}
