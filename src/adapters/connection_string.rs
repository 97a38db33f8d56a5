// 接続文字列ユーティリティ
//
// 設定ファイルの接続文字列を sqlx に渡せる形へ正規化し、
// ログ出力用にパスワードを伏せた表現を生成する。

use crate::core::config::Dialect;

/// 接続文字列を正規化
///
/// SQLite のファイルDBはモード未指定の場合 `mode=rwc` を付与し、
/// 初回接続時にファイルを作成できるようにする。
/// `mariadb://` は sqlx が解釈できる `mysql://` に置き換える。
pub fn normalize_connection_string(dialect: Dialect, dsn: &str) -> String {
    match dialect {
        Dialect::SQLite => {
            if dsn.contains(":memory:") || dsn.contains("mode=") {
                dsn.to_string()
            } else if dsn.contains('?') {
                format!("{}&mode=rwc", dsn)
            } else {
                format!("{}?mode=rwc", dsn)
            }
        }
        Dialect::MySQL => match dsn.strip_prefix("mariadb://") {
            Some(rest) => format!("mysql://{}", rest),
            None => dsn.to_string(),
        },
        Dialect::PostgreSQL => dsn.to_string(),
    }
}

/// パスワード部分を伏せた接続文字列
pub fn redact_connection_string(dsn: &str) -> String {
    let Some((scheme, rest)) = dsn.split_once("://") else {
        return dsn.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let (authority, path) = rest.split_at(authority_end);

    match authority.rsplit_once('@') {
        Some((credentials, host)) => match credentials.split_once(':') {
            Some((user, _password)) => format!("{}://{}:***@{}{}", scheme, user, host, path),
            None => dsn.to_string(),
        },
        None => dsn.to_string(),
    }
}
