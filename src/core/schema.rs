// スキーマ記述モデル
//
// エンティティ（モデル）側から渡されるテーブル・カラムのメタデータ。
// マイグレーションエンジンはこれを使ってテーブルを作成・削除します。
// リレーションはテーブル作成・削除の順序決定にのみ使用します。

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// テーブル定義
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    /// テーブル名
    pub name: String,

    /// カラム定義のリスト
    pub columns: Vec<Column>,

    /// 外部キーのリスト
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// 新しいテーブルを作成
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// カラムを追加（ビルダー形式）
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// 外部キーを追加（ビルダー形式）
    pub fn foreign_key(
        mut self,
        column: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.into(),
            referenced_table: referenced_table.into(),
            referenced_column: referenced_column.into(),
        });
        self
    }

    /// 指定されたカラムを取得
    pub fn get_column(&self, column_name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == column_name)
    }

    /// このテーブルが参照するテーブル名（自己参照を除く）
    pub fn referenced_tables(&self) -> impl Iterator<Item = &str> {
        self.foreign_keys
            .iter()
            .map(|fk| fk.referenced_table.as_str())
            .filter(move |table| *table != self.name)
    }
}

/// カラム定義
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    /// カラム名
    pub name: String,

    /// カラムの型
    pub column_type: ColumnType,

    /// プライマリキーかどうか
    pub primary_key: bool,

    /// NOT NULL 制約
    pub not_null: bool,

    /// UNIQUE 制約
    pub unique: bool,

    /// デフォルト値
    pub default: Option<ColumnDefault>,
}

impl Column {
    /// NULL許容のカラムを作成
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            primary_key: false,
            not_null: false,
            unique: false,
            default: None,
        }
    }

    /// プライマリキーにする
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    /// NOT NULL にする
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// UNIQUE にする
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// デフォルト値を設定
    pub fn default_value(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }
}

/// 方言に依存しないカラム型
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ColumnType {
    BigInt,
    Text,
    Varchar(u32),
    Boolean,
    Timestamp,
    Uuid,
}

/// カラムのデフォルト値
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ColumnDefault {
    /// 現在時刻
    CurrentTimestamp,
    /// 真偽値
    Bool(bool),
    /// 整数
    Integer(i64),
    /// 文字列リテラル
    Text(String),
}

/// 外部キー
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    /// 参照元カラム
    pub column: String,
    /// 参照先テーブル
    pub referenced_table: String,
    /// 参照先カラム
    pub referenced_column: String,
}

/// テーブル作成順を決定する
///
/// 参照先テーブルを参照元より先に並べる。依存関係のないテーブル同士は入力順を保つ。
/// 定義に含まれないテーブルへの参照は無視する。循環参照はエラー。
pub fn create_order(tables: &[Table]) -> Result<Vec<&Table>> {
    let known: HashSet<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    let mut remaining: HashMap<&str, HashSet<&str>> = tables
        .iter()
        .map(|t| {
            let deps = t
                .referenced_tables()
                .filter(|dep| known.contains(dep))
                .collect();
            (t.name.as_str(), deps)
        })
        .collect();

    let mut ordered: Vec<&Table> = Vec::with_capacity(tables.len());
    while ordered.len() < tables.len() {
        let ready = tables.iter().find(|t| {
            remaining
                .get(t.name.as_str())
                .is_some_and(|deps| deps.is_empty())
        });

        let Some(table) = ready else {
            let mut cyclic: Vec<&str> = remaining.keys().copied().collect();
            cyclic.sort_unstable();
            return Err(anyhow!(
                "Circular foreign key references between tables: {}",
                cyclic.join(", ")
            ));
        };

        remaining.remove(table.name.as_str());
        for deps in remaining.values_mut() {
            deps.remove(table.name.as_str());
        }
        ordered.push(table);
    }

    Ok(ordered)
}

/// テーブル削除順を決定する（作成順の逆）
pub fn drop_order(tables: &[Table]) -> Result<Vec<&Table>> {
    let mut ordered = create_order(tables)?;
    ordered.reverse();
    Ok(ordered)
}
