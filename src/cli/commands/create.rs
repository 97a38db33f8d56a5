// create_rust / create_sql コマンドハンドラー
//
// マイグレーションディレクトリに新しいマイグレーションの雛形を書き出します。

use crate::cli::commands::{render_output, CommandOutput, DbCommand};
use crate::services::stub_generator::{GeneratedStub, StubGenerator};
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

/// 生成するスタブの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StubKind {
    Rust,
    Sql,
}

/// create コマンドの入力パラメータ
#[derive(Debug, Clone)]
pub struct CreateCommand {
    /// 共通パラメータ
    pub db: DbCommand,
    /// スタブの種類
    pub kind: StubKind,
    /// マイグレーションのラベル
    pub label: String,
}

/// create コマンドの出力構造体
#[derive(Debug, Clone, Serialize)]
pub struct CreateOutput {
    pub kind: StubKind,
    #[serde(flatten)]
    pub stub: GeneratedStub,
}

impl CommandOutput for CreateOutput {
    fn to_text(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "{} Created migration {}\n",
            "✓".green(),
            self.stub.name.bold()
        ));
        for file in &self.stub.files {
            output.push_str(&format!("  {}\n", file.display()));
        }
        if self.kind == StubKind::Rust {
            let module = StubGenerator::rust_module_name(&self.stub.name);
            output.push_str(&format!(
                "Declare `mod {};` in src/migrations/mod.rs and add `{}::migration()` to code_migrations.\n",
                module, module
            ));
        }
        output.trim_end().to_string()
    }
}

/// create コマンドハンドラー
#[derive(Debug, Clone, Default)]
pub struct CreateCommandHandler {}

impl CreateCommandHandler {
    /// 新しいCreateCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// create コマンドを実行
    pub async fn execute(&self, command: &CreateCommand) -> Result<String> {
        let migrator = command.db.migrator().await?;
        let stub = match command.kind {
            StubKind::Rust => migrator.create_rust(&command.label)?,
            StubKind::Sql => migrator.create_sql(&command.label)?,
        };

        let output = CreateOutput {
            kind: command.kind,
            stub,
        };
        render_output(&output, &command.db.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_create_output_text() {
        colored::control::set_override(false);

        let output = CreateOutput {
            kind: StubKind::Sql,
            stub: GeneratedStub {
                name: "20260122120000_add_index".to_string(),
                files: vec![
                    PathBuf::from("migrations/20260122120000_add_index.up.sql"),
                    PathBuf::from("migrations/20260122120000_add_index.down.sql"),
                ],
            },
        };

        let text = output.to_text();
        assert!(text.starts_with("✓ Created migration 20260122120000_add_index"));
        assert!(text.contains("add_index.down.sql"));
        assert!(!text.contains("code_migrations"));
    }

    #[test]
    fn test_create_output_text_rust_registration_hint() {
        colored::control::set_override(false);

        let output = CreateOutput {
            kind: StubKind::Rust,
            stub: GeneratedStub {
                name: "20260122120000_seed".to_string(),
                files: vec![PathBuf::from("src/migrations/m20260122120000_seed.rs")],
            },
        };

        let text = output.to_text();
        assert!(text.contains("`mod m20260122120000_seed;`"));
        assert!(text.contains("`m20260122120000_seed::migration()`"));
    }

    #[test]
    fn test_create_output_json() {
        let output = CreateOutput {
            kind: StubKind::Rust,
            stub: GeneratedStub {
                name: "20260122120000_seed".to_string(),
                files: vec![PathBuf::from("src/migrations/m20260122120000_seed.rs")],
            },
        };

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["kind"], "rust");
        assert_eq!(json["name"], "20260122120000_seed");
    }
}
