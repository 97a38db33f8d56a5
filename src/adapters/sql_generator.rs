// SQL生成アダプター
//
// スキーマ記述（Table）から各データベース方言用のDDL文を生成し、
// それをマイグレーションアクションとして実行する SchemaAction を提供します。

use crate::adapters::sql_quote::quote_identifier;
use crate::core::config::Dialect;
use crate::core::migration::MigrationAction;
use crate::core::schema::{create_order, drop_order, Column, ColumnDefault, ColumnType, Table};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::AnyConnection;
use tracing::debug;

/// カラム型を方言ごとのSQL型に変換
pub fn column_type_sql(dialect: Dialect, column_type: &ColumnType) -> String {
    match (dialect, column_type) {
        (_, ColumnType::BigInt) => "BIGINT".to_string(),
        (_, ColumnType::Text) => "TEXT".to_string(),
        (Dialect::SQLite, ColumnType::Varchar(_)) => "TEXT".to_string(),
        (_, ColumnType::Varchar(len)) => format!("VARCHAR({})", len),
        (Dialect::SQLite, ColumnType::Boolean) => "INTEGER".to_string(),
        (_, ColumnType::Boolean) => "BOOLEAN".to_string(),
        (Dialect::PostgreSQL, ColumnType::Timestamp) => "TIMESTAMPTZ".to_string(),
        (Dialect::MySQL, ColumnType::Timestamp) => "DATETIME".to_string(),
        (Dialect::SQLite, ColumnType::Timestamp) => "TEXT".to_string(),
        (Dialect::PostgreSQL, ColumnType::Uuid) => "UUID".to_string(),
        (Dialect::MySQL, ColumnType::Uuid) => "CHAR(36)".to_string(),
        (Dialect::SQLite, ColumnType::Uuid) => "TEXT".to_string(),
    }
}

/// デフォルト値を方言ごとのSQL式に変換
pub fn default_sql(dialect: Dialect, default: &ColumnDefault) -> String {
    match (dialect, default) {
        (Dialect::PostgreSQL, ColumnDefault::CurrentTimestamp) => "now()".to_string(),
        (Dialect::MySQL, ColumnDefault::CurrentTimestamp) => "CURRENT_TIMESTAMP".to_string(),
        (Dialect::SQLite, ColumnDefault::CurrentTimestamp) => "CURRENT_TIMESTAMP".to_string(),
        (Dialect::SQLite, ColumnDefault::Bool(value)) => {
            (if *value { "1" } else { "0" }).to_string()
        }
        (_, ColumnDefault::Bool(value)) => {
            (if *value { "TRUE" } else { "FALSE" }).to_string()
        }
        (_, ColumnDefault::Integer(value)) => value.to_string(),
        (_, ColumnDefault::Text(value)) => format!("'{}'", value.replace('\'', "''")),
    }
}

/// カラム定義を組み立てる
fn build_column_definition(dialect: Dialect, column: &Column) -> String {
    let mut parts = vec![
        quote_identifier(dialect, &column.name),
        column_type_sql(dialect, &column.column_type),
    ];

    if column.primary_key {
        parts.push("PRIMARY KEY".to_string());
    } else if column.not_null {
        parts.push("NOT NULL".to_string());
    }

    if column.unique && !column.primary_key {
        parts.push("UNIQUE".to_string());
    }

    if let Some(default) = &column.default {
        parts.push(format!("DEFAULT {}", default_sql(dialect, default)));
    }

    parts.join(" ")
}

/// CREATE TABLE 文を生成
pub fn generate_create_table(dialect: Dialect, table: &Table) -> String {
    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|column| format!("    {}", build_column_definition(dialect, column)))
        .collect();

    for fk in &table.foreign_keys {
        lines.push(format!(
            "    FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_identifier(dialect, &fk.column),
            quote_identifier(dialect, &fk.referenced_table),
            quote_identifier(dialect, &fk.referenced_column)
        ));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        quote_identifier(dialect, &table.name),
        lines.join(",\n")
    )
}

/// DROP TABLE 文を生成
pub fn generate_drop_table(dialect: Dialect, table: &Table) -> String {
    format!(
        "DROP TABLE IF EXISTS {}",
        quote_identifier(dialect, &table.name)
    )
}

/// スキーマ操作の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaOperation {
    /// 参照先から順にテーブルを作成
    Create,
    /// 参照元から順にテーブルを削除
    Drop,
}

/// スキーマ記述からDDLを実行するマイグレーションアクション
#[derive(Debug, Clone)]
pub struct SchemaAction {
    operation: SchemaOperation,
    tables: Vec<Table>,
}

impl SchemaAction {
    /// テーブル作成アクション
    pub fn create(tables: Vec<Table>) -> Self {
        Self {
            operation: SchemaOperation::Create,
            tables,
        }
    }

    /// テーブル削除アクション
    pub fn drop(tables: Vec<Table>) -> Self {
        Self {
            operation: SchemaOperation::Drop,
            tables,
        }
    }

    /// 実行するDDL文を生成
    pub fn statements(&self, dialect: Dialect) -> Result<Vec<String>> {
        Ok(match self.operation {
            SchemaOperation::Create => create_order(&self.tables)?
                .into_iter()
                .map(|table| generate_create_table(dialect, table))
                .collect(),
            SchemaOperation::Drop => drop_order(&self.tables)?
                .into_iter()
                .map(|table| generate_drop_table(dialect, table))
                .collect(),
        })
    }
}

#[async_trait]
impl MigrationAction for SchemaAction {
    async fn run(&self, conn: &mut AnyConnection) -> Result<()> {
        let backend = conn.backend_name().to_string();
        let dialect = Dialect::from_backend_name(&backend)
            .ok_or_else(|| anyhow!("Unsupported database backend: {}", backend))?;

        for statement in self.statements(dialect)? {
            debug!(sql = %statement, "Executing schema statement");
            sqlx::query(&statement)
                .execute(&mut *conn)
                .await
                .with_context(|| format!("Failed to execute schema statement:\n{}", statement))?;
        }

        Ok(())
    }
}
