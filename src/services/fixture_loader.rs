// fixtures 読み込みサービス
//
// YAML で記述された初期データをモデルのテーブルへ投入します。
// 対象テーブルを（逆順に）空にしてから、記述順に行を挿入します。
// マイグレーションの適用状況は確認しません。

use crate::adapters::sql_generator::column_type_sql;
use crate::adapters::sql_quote::{placeholder, quote_columns, quote_identifier};
use crate::core::config::Dialect;
use crate::core::schema::Table;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::any::AnyArguments;
use sqlx::query::Query;
use sqlx::{Any, AnyPool};
use std::path::Path;
use tracing::{debug, info};

/// 1テーブル分の fixtures
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FixtureSet {
    /// テーブル名
    pub model: String,
    /// 挿入する行（カラム名 → 値）
    #[serde(default)]
    pub rows: Vec<Map<String, Value>>,
}

/// 投入結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixtureReport {
    /// テーブルごとの挿入行数（投入順）
    pub tables: Vec<(String, usize)>,
}

impl FixtureReport {
    /// 挿入した行の合計
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|(_, rows)| rows).sum()
    }
}

/// fixtures 読み込みサービス
#[derive(Debug, Clone)]
pub struct FixtureLoader {
    dialect: Dialect,
    models: Vec<Table>,
}

impl FixtureLoader {
    /// 新しいFixtureLoaderを作成
    pub fn new(dialect: Dialect, models: Vec<Table>) -> Self {
        Self { dialect, models }
    }

    /// YAML を解析
    pub fn parse(content: &str) -> Result<Vec<FixtureSet>> {
        serde_saphyr::from_str(content).with_context(|| "Failed to parse fixtures file")
    }

    /// ファイルから読み込んで投入
    pub async fn load_file(&self, pool: &AnyPool, path: &Path) -> Result<FixtureReport> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixtures file: {:?}", path))?;
        let fixtures = Self::parse(&content)?;
        self.load(pool, &fixtures)
            .await
            .with_context(|| format!("Failed to load fixtures from {:?}", path))
    }

    /// fixtures を1トランザクションで投入
    pub async fn load(&self, pool: &AnyPool, fixtures: &[FixtureSet]) -> Result<FixtureReport> {
        let tables = fixtures
            .iter()
            .map(|set| self.model(&set.model))
            .collect::<Result<Vec<_>>>()?;

        let mut tx = pool.begin().await.context("Failed to begin transaction")?;

        for table in tables.iter().rev() {
            let sql = format!("DELETE FROM {}", quote_identifier(self.dialect, &table.name));
            debug!(table = %table.name, "Clearing fixture table");
            sqlx::query(&sql)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to clear table {}", table.name))?;
        }

        let mut report = FixtureReport { tables: Vec::new() };
        for (set, table) in fixtures.iter().zip(&tables) {
            for (index, row) in set.rows.iter().enumerate() {
                let (sql, values) = self.insert_statement(table, row)?;
                let query = values
                    .iter()
                    .fold(sqlx::query(&sql), |query, value| bind_value(query, value));
                query.execute(&mut *tx).await.with_context(|| {
                    format!("Failed to insert row {} into {}", index + 1, table.name)
                })?;
            }
            report.tables.push((table.name.clone(), set.rows.len()));
        }

        tx.commit().await.context("Failed to commit fixtures")?;

        info!(rows = report.total_rows(), "Loaded fixtures");
        Ok(report)
    }

    fn model(&self, name: &str) -> Result<&Table> {
        self.models
            .iter()
            .find(|table| table.name == name)
            .ok_or_else(|| anyhow!("Unknown model in fixtures: {}", name))
    }

    /// INSERT 文と束縛する値を生成
    ///
    /// PostgreSQL では文字列をカラム型へ変換するため CAST を付ける。
    pub fn insert_statement<'a>(
        &self,
        table: &Table,
        row: &'a Map<String, Value>,
    ) -> Result<(String, Vec<&'a Value>)> {
        let mut columns = Vec::with_capacity(row.len());
        let mut params = Vec::with_capacity(row.len());
        let mut values = Vec::with_capacity(row.len());

        for (index, (name, value)) in row.iter().enumerate() {
            let column = table
                .get_column(name)
                .ok_or_else(|| anyhow!("Unknown column {}.{}", table.name, name))?;

            let param = placeholder(self.dialect, index + 1);
            params.push(match self.dialect {
                Dialect::PostgreSQL => format!(
                    "CAST({} AS {})",
                    param,
                    column_type_sql(self.dialect, &column.column_type)
                ),
                Dialect::MySQL | Dialect::SQLite => param,
            });
            columns.push(name.clone());
            values.push(value);
        }

        if columns.is_empty() {
            return Err(anyhow!("Empty fixture row for {}", table.name));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(self.dialect, &table.name),
            quote_columns(self.dialect, &columns),
            params.join(", ")
        );
        Ok((sql, values))
    }
}

fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &Value,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(flag) => query.bind(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => query.bind(integer),
            None => query.bind(number.as_f64().unwrap_or_default()),
        },
        Value::String(text) => query.bind(text.clone()),
        other => query.bind(other.to_string()),
    }
}
