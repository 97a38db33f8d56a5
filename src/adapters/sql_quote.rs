// SQL識別子クォート・プレースホルダーユーティリティ
//
// 各データベース方言用の識別子クォートとバインドパラメータ記法を提供します。
// sql_generator、history_store、lock_manager、fixture_loader から使用される共有モジュールです。

use crate::core::config::Dialect;

/// 方言に応じて識別子をクォート
///
/// PostgreSQL/SQLite はダブルクォート、MySQL はバッククォート。
/// 識別子内のクォート文字は二重にエスケープします。
///
/// # Examples
/// ```
/// use cairn::adapters::sql_quote::quote_identifier;
/// use cairn::core::config::Dialect;
/// assert_eq!(quote_identifier(Dialect::PostgreSQL, "users"), r#""users""#);
/// assert_eq!(quote_identifier(Dialect::MySQL, "table`name"), "`table``name`");
/// ```
pub fn quote_identifier(dialect: Dialect, name: &str) -> String {
    match dialect {
        Dialect::MySQL => format!("`{}`", name.replace('`', "``")),
        Dialect::PostgreSQL | Dialect::SQLite => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

/// カラム名リストをクォートしてカンマ区切りで結合
pub fn quote_columns(dialect: Dialect, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(dialect, c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// n番目（1始まり）のバインドパラメータ
///
/// PostgreSQL は `$n`、MySQL/SQLite は `?`。
pub fn placeholder(dialect: Dialect, index: usize) -> String {
    match dialect {
        Dialect::PostgreSQL => format!("${}", index),
        Dialect::MySQL | Dialect::SQLite => "?".to_string(),
    }
}

/// 1..=count のバインドパラメータをカンマ区切りで結合
pub fn placeholders(dialect: Dialect, count: usize) -> String {
    (1..=count)
        .map(|i| placeholder(dialect, i))
        .collect::<Vec<_>>()
        .join(", ")
}
