// SQLスクリプトアダプター
//
// SQLファイルの内容を文単位に分割し、マイグレーションアクションとして実行します。
// 文字列リテラル、引用識別子、ドル引用（$tag$...$tag$）、コメント内のセミコロンでは分割しません。

use crate::core::migration::MigrationAction;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::AnyConnection;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanState {
    Normal,
    SingleQuote,
    DoubleQuote,
    LineComment,
    BlockComment,
    Dollar(String),
}

/// SQLスクリプトを文単位に分割する
///
/// 空文やコメントだけの文は含まれません。
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_code = false;
    let mut state = ScanState::Normal;
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match &state {
            ScanState::SingleQuote | ScanState::DoubleQuote => {
                let quote = if state == ScanState::SingleQuote { '\'' } else { '"' };
                current.push(c);
                if c == quote {
                    // 二重化されたクォートはエスケープ
                    if chars.peek().map(|(_, next)| *next) == Some(quote) {
                        current.push(quote);
                        chars.next();
                    } else {
                        state = ScanState::Normal;
                    }
                }
            }
            ScanState::LineComment => {
                current.push(c);
                if c == '\n' {
                    state = ScanState::Normal;
                }
            }
            ScanState::BlockComment => {
                current.push(c);
                if c == '*' && chars.peek().map(|(_, next)| *next) == Some('/') {
                    current.push('/');
                    chars.next();
                    state = ScanState::Normal;
                }
            }
            ScanState::Dollar(tag) => {
                if c == '$' && sql[i..].starts_with(tag.as_str()) {
                    let tag_len = tag.len();
                    current.push_str(&sql[i..i + tag_len]);
                    // 先頭の '$' は消費済み
                    for _ in 1..tag_len {
                        chars.next();
                    }
                    state = ScanState::Normal;
                } else {
                    current.push(c);
                }
            }
            ScanState::Normal => match c {
                '\'' => {
                    has_code = true;
                    current.push(c);
                    state = ScanState::SingleQuote;
                }
                '"' => {
                    has_code = true;
                    current.push(c);
                    state = ScanState::DoubleQuote;
                }
                '-' if chars.peek().map(|(_, next)| *next) == Some('-') => {
                    current.push(c);
                    state = ScanState::LineComment;
                }
                '/' if chars.peek().map(|(_, next)| *next) == Some('*') => {
                    current.push(c);
                    state = ScanState::BlockComment;
                }
                '$' => {
                    has_code = true;
                    match dollar_tag_at(&sql[i..]) {
                        Some(tag) => {
                            current.push_str(tag);
                            for _ in 1..tag.len() {
                                chars.next();
                            }
                            state = ScanState::Dollar(tag.to_string());
                        }
                        None => current.push(c),
                    }
                }
                ';' => {
                    if has_code {
                        statements.push(current.trim().to_string());
                    }
                    current.clear();
                    has_code = false;
                }
                _ => {
                    if !c.is_whitespace() {
                        has_code = true;
                    }
                    current.push(c);
                }
            },
        }
    }

    if has_code {
        statements.push(current.trim().to_string());
    }

    statements
}

/// `$tag$` 形式のドル引用開始タグを検出
fn dollar_tag_at(rest: &str) -> Option<&str> {
    let end = rest[1..].find('$')? + 1;
    let inner = &rest[1..end];
    inner
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        .then(|| &rest[..=end])
}

/// SQLスクリプトを実行するマイグレーションアクション
#[derive(Debug, Clone)]
pub struct SqlAction {
    sql: String,
}

impl SqlAction {
    /// SQLスクリプトからアクションを作成
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    /// 分割済みの文
    pub fn statements(&self) -> Vec<String> {
        split_sql_statements(&self.sql)
    }
}

#[async_trait]
impl MigrationAction for SqlAction {
    async fn run(&self, conn: &mut AnyConnection) -> Result<()> {
        for statement in self.statements() {
            debug!(sql = %statement, "Executing migration statement");
            sqlx::query(&statement)
                .execute(&mut *conn)
                .await
                .with_context(|| format!("Failed to execute SQL:\n{}", statement))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple_statements() {
        let statements = split_sql_statements("CREATE TABLE a (id INT);\nCREATE TABLE b (id INT);");
        assert_eq!(
            statements,
            vec!["CREATE TABLE a (id INT)", "CREATE TABLE b (id INT)"]
        );
    }

    #[test]
    fn test_split_ignores_semicolons_in_literals() {
        let statements =
            split_sql_statements("INSERT INTO t VALUES ('a;b', 'it''s');\nSELECT \"x;y\" FROM t");
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "INSERT INTO t VALUES ('a;b', 'it''s')");
        assert_eq!(statements[1], "SELECT \"x;y\" FROM t");
    }

    #[test]
    fn test_split_respects_dollar_quoting() {
        let sql = "CREATE FUNCTION f() RETURNS void AS $body$ BEGIN PERFORM 1; END; $body$ LANGUAGE plpgsql;\nSELECT 1;";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("PERFORM 1; END;"));
        assert!(statements[0].ends_with("LANGUAGE plpgsql"));
    }

    #[test]
    fn test_split_skips_comment_only_statements() {
        let sql = "-- cairn: write your up migration here;\n/* nothing; */\n";
        assert!(split_sql_statements(sql).is_empty());

        let with_code = "-- create users\nCREATE TABLE users (id INT); -- trailing";
        let statements = split_sql_statements(with_code);
        assert_eq!(statements.len(), 1);
        assert!(statements[0].contains("CREATE TABLE users"));
    }

    #[test]
    fn test_empty_script() {
        assert!(split_sql_statements("").is_empty());
        assert!(split_sql_statements(" ;\n ; ").is_empty());
        assert!(SqlAction::new("").statements().is_empty());
    }
}
