// マイグレーションスタブ生成サービス
//
// 作成時刻ベースの名前を決め、Rust または SQL のマイグレーション雛形を書き出すサービス。

use crate::core::error::{IoError, MigrateError};
use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const RUST_TEMPLATE: &str = r#"// __NAME__
//
// src/migrations/mod.rs に `mod __MODULE__;` を宣言し、
// `code_migrations` に `__MODULE__::migration()` を追加して登録する。

use crate::core::migration::{Migration, MigrationAction};
use async_trait::async_trait;
use sqlx::AnyConnection;

struct Up;

#[async_trait]
impl MigrationAction for Up {
    async fn run(&self, conn: &mut AnyConnection) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }
}

struct Down;

#[async_trait]
impl MigrationAction for Down {
    async fn run(&self, conn: &mut AnyConnection) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }
}

pub fn migration() -> Migration {
    Migration::reversible("__NAME__", Up, Down)
}
"#;

/// 生成されたスタブ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedStub {
    /// マイグレーション名
    pub name: String,
    /// 書き出したファイル
    pub files: Vec<PathBuf>,
}

/// スタブ生成サービス
#[derive(Debug, Clone)]
pub struct StubGenerator {
    dir: PathBuf,
    rust_dir: PathBuf,
}

impl StubGenerator {
    /// 出力先ディレクトリを指定して作成（Rust スタブも同じ場所）
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            rust_dir: dir.clone(),
            dir,
        }
    }

    /// Rust スタブの出力先を設定
    pub fn with_rust_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.rust_dir = dir.into();
        self
    }

    /// マイグレーション名に対応する Rust モジュール名
    ///
    /// 名前は数字で始まるため `m` を前置する。
    pub fn rust_module_name(name: &str) -> String {
        format!("m{}", name)
    }

    /// YYYYMMDDHHmmss形式のタイムスタンプを生成（UTC）
    pub fn generate_timestamp(&self) -> String {
        Utc::now().format("%Y%m%d%H%M%S").to_string()
    }

    /// ラベルを名前用に正規化
    ///
    /// 小文字化し、英数字以外の連続を1つの `_` にまとめ、前後の `_` を除く。
    pub fn sanitize_label(&self, label: &str) -> Result<String, MigrateError> {
        let sanitized = label
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect::<String>()
            .split('_')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("_");

        if sanitized.is_empty() {
            return Err(MigrateError::InvalidLabel {
                label: label.to_string(),
            });
        }
        Ok(sanitized)
    }

    /// タイムスタンプとラベルからマイグレーション名を生成
    pub fn migration_name(&self, timestamp: &str, label: &str) -> Result<String, MigrateError> {
        Ok(format!("{}_{}", timestamp, self.sanitize_label(label)?))
    }

    /// 現在時刻でマイグレーション名を生成
    pub fn canonical_name(&self, label: &str) -> Result<String, MigrateError> {
        self.migration_name(&self.generate_timestamp(), label)
    }

    /// Rust マイグレーションの雛形
    pub fn rust_template(&self, name: &str) -> String {
        RUST_TEMPLATE
            .replace("__MODULE__", &Self::rust_module_name(name))
            .replace("__NAME__", name)
    }

    /// SQL マイグレーションの雛形（up, down）
    pub fn sql_templates(&self, name: &str) -> (String, String) {
        (
            format!("-- {}: up\n-- cairn: write the forward migration here\n", name),
            format!("-- {}: down\n-- cairn: write the reverse migration here\n", name),
        )
    }

    /// ラベルから Rust スタブを生成
    pub fn create_rust(&self, label: &str) -> Result<GeneratedStub, MigrateError> {
        let name = self.canonical_name(label)?;
        self.write_rust(&name)
    }

    /// ラベルから SQL スタブを生成
    pub fn create_sql(&self, label: &str) -> Result<GeneratedStub, MigrateError> {
        let name = self.canonical_name(label)?;
        self.write_sql(&name)
    }

    /// 名前を指定して Rust スタブを書き出す
    pub fn write_rust(&self, name: &str) -> Result<GeneratedStub, MigrateError> {
        let path = self
            .rust_dir
            .join(format!("{}.rs", Self::rust_module_name(name)));
        self.ensure_absent(&[&path])?;
        ensure_dir(&self.rust_dir)?;
        write_new_file(&path, &self.rust_template(name))?;

        info!(migration = %name, path = %path.display(), "Created Rust migration stub");
        Ok(GeneratedStub {
            name: name.to_string(),
            files: vec![path],
        })
    }

    /// 名前を指定して SQL スタブを書き出す
    pub fn write_sql(&self, name: &str) -> Result<GeneratedStub, MigrateError> {
        let up_path = self.dir.join(format!("{}.up.sql", name));
        let down_path = self.dir.join(format!("{}.down.sql", name));
        self.ensure_absent(&[&up_path, &down_path])?;
        ensure_dir(&self.dir)?;

        let (up, down) = self.sql_templates(name);
        write_new_file(&up_path, &up)?;
        write_new_file(&down_path, &down)?;

        info!(migration = %name, dir = %self.dir.display(), "Created SQL migration stubs");
        Ok(GeneratedStub {
            name: name.to_string(),
            files: vec![up_path, down_path],
        })
    }

    fn ensure_absent(&self, paths: &[&PathBuf]) -> Result<(), MigrateError> {
        match paths.iter().find(|path| path.exists()) {
            Some(path) => Err(IoError::FileExists {
                path: path.display().to_string(),
            }
            .into()),
            None => Ok(()),
        }
    }
}

fn ensure_dir(dir: &Path) -> Result<(), MigrateError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        IoError::DirectoryCreate {
            path: dir.display().to_string(),
            cause: e.to_string(),
        }
        .into()
    })
}

/// 既存ファイルを上書きせずに書き込む
fn write_new_file(path: &Path, content: &str) -> Result<(), MigrateError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => IoError::FileExists {
                path: path.display().to_string(),
            },
            _ => IoError::FileWrite {
                path: path.display().to_string(),
                cause: e.to_string(),
            },
        })?;

    file.write_all(content.as_bytes())
        .map_err(|e| IoError::FileWrite {
            path: path.display().to_string(),
            cause: e.to_string(),
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_timestamp() {
        let generator = StubGenerator::new("migrations");
        let timestamp = generator.generate_timestamp();

        assert_eq!(timestamp.len(), 14);
        assert!(timestamp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_sanitize_label() {
        let generator = StubGenerator::new("migrations");

        assert_eq!(
            generator.sanitize_label("Add Users Table").unwrap(),
            "add_users_table"
        );
        assert_eq!(
            generator.sanitize_label("--add--index!!").unwrap(),
            "add_index"
        );
        assert_eq!(generator.sanitize_label("v2_backfill").unwrap(), "v2_backfill");
    }

    #[test]
    fn test_sanitize_label_rejects_empty() {
        let generator = StubGenerator::new("migrations");

        for label in ["", "   ", "!!!", "日本語"] {
            let err = generator.sanitize_label(label).unwrap_err();
            assert!(matches!(err, MigrateError::InvalidLabel { .. }));
        }
    }

    #[test]
    fn test_migration_name() {
        let generator = StubGenerator::new("migrations");
        assert_eq!(
            generator
                .migration_name("20260122120000", "Create Users")
                .unwrap(),
            "20260122120000_create_users"
        );
    }

    #[test]
    fn test_rust_template_names_migration() {
        let generator = StubGenerator::new("migrations");
        let template = generator.rust_template("20260122120000_create_users");

        assert!(template.contains("Migration::reversible(\"20260122120000_create_users\""));
        assert!(template.contains("`mod m20260122120000_create_users;`"));
        assert!(template.contains("impl MigrationAction for Up"));
        assert!(template.contains("impl MigrationAction for Down"));
        assert!(!template.contains("__NAME__"));
    }

    #[test]
    fn test_write_sql_creates_directory_and_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("nested").join("migrations");
        let generator = StubGenerator::new(&dir);

        let stub = generator.write_sql("20260122120000_add_index").unwrap();
        assert_eq!(stub.files.len(), 2);
        assert!(dir.join("20260122120000_add_index.up.sql").exists());
        assert!(dir.join("20260122120000_add_index.down.sql").exists());

        let err = generator.write_sql("20260122120000_add_index").unwrap_err();
        match err {
            MigrateError::Io(io) => assert!(io.is_file_exists()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_write_rust_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let generator = StubGenerator::new(temp_dir.path());
        let path = temp_dir.path().join("m20260122120000_seed.rs");
        std::fs::write(&path, "// keep me").unwrap();

        assert!(generator.write_rust("20260122120000_seed").is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "// keep me");
    }

    #[test]
    fn test_write_rust_goes_to_rust_dir_as_module() {
        let temp_dir = TempDir::new().unwrap();
        let sql_dir = temp_dir.path().join("migrations");
        let rust_dir = temp_dir.path().join("src").join("migrations");
        let generator = StubGenerator::new(&sql_dir).with_rust_dir(&rust_dir);

        let stub = generator.write_rust("20260122120000_seed").unwrap();
        assert_eq!(stub.files, vec![rust_dir.join("m20260122120000_seed.rs")]);
        assert!(!sql_dir.exists());

        let stub = generator.write_sql("20260122120000_index").unwrap();
        assert!(stub.files.iter().all(|file| file.starts_with(&sql_dir)));
    }
}
