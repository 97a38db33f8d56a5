// データベース設定の解決サービス
//
// 環境変数による上書きをCLI/サービス層で扱い、coreは純粋な構造体に保つ。

use crate::core::config::DatabaseConfig;
use tracing::{debug, warn};

/// 接続文字列を上書きする環境変数
pub const DATABASE_URL_ENV: &str = "CAIRN_DATABASE_URL";

/// タイムアウトを上書きする環境変数
pub const TIMEOUT_SECONDS_ENV: &str = "CAIRN_TIMEOUT_SECONDS";

/// データベース設定の解決ユーティリティ
#[derive(Debug, Clone, Default)]
pub struct DatabaseConfigResolver;

impl DatabaseConfigResolver {
    /// 環境変数による上書きを適用
    pub fn apply_env_overrides(base: &DatabaseConfig) -> DatabaseConfig {
        Self::apply_overrides(
            base,
            std::env::var(DATABASE_URL_ENV).ok(),
            std::env::var(TIMEOUT_SECONDS_ENV).ok(),
        )
    }

    /// 上書き値を適用（環境変数の読み取りとは分離）
    pub fn apply_overrides(
        base: &DatabaseConfig,
        dsn: Option<String>,
        timeout_seconds: Option<String>,
    ) -> DatabaseConfig {
        let mut config = base.clone();

        if let Some(dsn) = dsn.filter(|value| !value.trim().is_empty()) {
            debug!(variable = DATABASE_URL_ENV, "Connection string overridden");
            config.dsn = dsn;
        }
        if let Some(timeout) = timeout_seconds {
            match timeout.parse::<u64>() {
                Ok(seconds) if seconds > 0 => config.timeout_seconds = Some(seconds),
                _ => warn!(
                    variable = TIMEOUT_SECONDS_ENV,
                    value = %timeout,
                    "Ignoring invalid timeout override"
                ),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let base = DatabaseConfig::new("sqlite://dev.db");
        let config = DatabaseConfigResolver::apply_overrides(
            &base,
            Some("postgres://localhost/app".to_string()),
            Some("20".to_string()),
        );

        assert_eq!(config.dsn, "postgres://localhost/app");
        assert_eq!(config.timeout_seconds, Some(20));
    }

    #[test]
    fn test_apply_overrides_ignores_invalid_values() {
        let mut base = DatabaseConfig::new("sqlite://dev.db");
        base.timeout_seconds = Some(10);

        let config = DatabaseConfigResolver::apply_overrides(
            &base,
            Some("  ".to_string()),
            Some("soon".to_string()),
        );
        assert_eq!(config, base);

        let config = DatabaseConfigResolver::apply_overrides(&base, None, Some("0".to_string()));
        assert_eq!(config.timeout_seconds, Some(10));
    }
}
