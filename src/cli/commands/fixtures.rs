// fixturesコマンドハンドラー
//
// fixtures ファイルの行をモデルのテーブルへ投入します。
// マイグレーションが適用済みかどうかは確認しません。

use crate::adapters::database::DatabaseConnectionService;
use crate::cli::commands::{render_output, CommandOutput, DbCommand};
use crate::models;
use crate::services::fixture_loader::{FixtureLoader, FixtureReport};
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

/// fixturesコマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct FixturesCommand {
    /// 共通パラメータ
    pub db: DbCommand,
    /// fixtures ファイル（未指定なら <fixtures_dir>/fixtures.yaml）
    pub file: Option<PathBuf>,
}

/// fixturesコマンドの出力構造体
#[derive(Debug, Clone, Serialize)]
pub struct FixturesOutput {
    /// 読み込んだファイル
    pub file: PathBuf,
    /// 投入結果
    #[serde(flatten)]
    pub report: FixtureReport,
}

impl CommandOutput for FixturesOutput {
    fn to_text(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "{} Loaded {} row(s) from {}\n",
            "✓".green(),
            self.report.total_rows(),
            self.file.display()
        ));
        for (table, rows) in &self.report.tables {
            output.push_str(&format!("  {:<20} {}\n", table, rows));
        }
        output.trim_end().to_string()
    }
}

/// fixturesコマンドハンドラー
#[derive(Debug, Clone, Default)]
pub struct FixturesCommandHandler {}

impl FixturesCommandHandler {
    /// 新しいFixturesCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// fixturesコマンドを実行
    pub async fn execute(&self, command: &FixturesCommand) -> Result<String> {
        let context = command.db.context()?;
        let file = context.fixtures_file(command.file.as_ref());
        debug!(file = %file.display(), "Loading fixtures");

        let (pool, db_config) = context.connect_pool(&command.db.env).await?;
        let loader = FixtureLoader::new(db_config.dialect()?, models::all());
        let result = loader.load_file(&pool, &file).await;
        DatabaseConnectionService::new().close_pool(pool).await;

        let output = FixturesOutput {
            file,
            report: result?,
        };
        render_output(&output, &command.db.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_output_text() {
        colored::control::set_override(false);

        let output = FixturesOutput {
            file: PathBuf::from("fixtures/fixtures.yaml"),
            report: FixtureReport {
                tables: vec![("users".to_string(), 2), ("user_groups".to_string(), 1)],
            },
        };

        let text = output.to_text();
        assert!(text.starts_with("✓ Loaded 3 row(s) from fixtures/fixtures.yaml"));
        assert!(text.contains("user_groups"));
    }
}
