// コマンドハンドラー層
// 各CLIコマンドの実装

pub mod create;
pub mod fixtures;
pub mod init;
pub mod lock;
pub mod migrate;
pub mod rollback;
pub mod status;

use crate::cli::command_context::CommandContext;
use crate::cli::OutputFormat;
use crate::services::migrator::Migrator;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::watch;

/// コマンド出力（text / json の両方で表示できる）
pub trait CommandOutput: Serialize {
    /// テキスト表示
    fn to_text(&self) -> String;
}

/// 出力フォーマットに応じて表示用の文字列を生成
pub fn render_output<T: CommandOutput>(output: &T, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(output.to_text()),
        OutputFormat::Json => {
            serde_json::to_string_pretty(output).with_context(|| "Failed to serialize output")
        }
    }
}

/// db / fixtures コマンド共通の入力パラメータ
#[derive(Debug, Clone)]
pub struct DbCommand {
    /// プロジェクトのルートパス
    pub project_path: PathBuf,
    /// カスタム設定ファイルパス
    pub config_path: Option<PathBuf>,
    /// 対象環境
    pub env: String,
    /// 出力フォーマット
    pub format: OutputFormat,
    /// キャンセル信号（Ctrl-C）
    pub cancel: Option<watch::Receiver<bool>>,
}

impl DbCommand {
    /// 既定値（development, text）でコマンドを作成
    pub fn new(project_path: PathBuf) -> Self {
        Self {
            project_path,
            config_path: None,
            env: "development".to_string(),
            format: OutputFormat::Text,
            cancel: None,
        }
    }

    /// 設定を読み込む
    pub fn context(&self) -> Result<CommandContext> {
        CommandContext::load_with_config(self.project_path.clone(), self.config_path.clone())
    }

    /// 設定を読み込み、接続済みのマイグレーターを作成
    pub async fn migrator(&self) -> Result<Migrator> {
        self.context()?
            .migrator(&self.env, self.cancel.clone())
            .await
    }
}
