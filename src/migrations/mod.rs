// アプリケーションのマイグレーション
//
// コードで定義したマイグレーションと、マイグレーションディレクトリの
// SQL マイグレーションからレジストリを組み立てる。

pub mod initial;

use crate::core::error::MigrateError;
use crate::core::migration::Migration;
use crate::services::registry::MigrationRegistry;
use crate::services::sql_migration_loader::discover_sql_migrations;
use std::path::Path;

/// コードで定義したマイグレーション
pub fn code_migrations() -> Vec<Migration> {
    vec![initial::migration()]
}

/// レジストリを構築
///
/// コードと SQL のマイグレーションを名前順に登録する。同名があれば `DuplicateName`。
pub fn registry(dir: &Path) -> Result<MigrationRegistry, MigrateError> {
    let mut migrations = code_migrations();
    migrations.extend(discover_sql_migrations(dir)?);
    migrations.sort_by(|a, b| a.name().cmp(b.name()));

    let mut registry = MigrationRegistry::new();
    registry.register_all(migrations)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_registry_without_sql_directory() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry(&temp_dir.path().join("migrations")).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(initial::NAME));
        assert!(registry.get(initial::NAME).unwrap().is_reversible());
    }

    #[test]
    fn test_registry_merges_sql_migrations_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("20200101000000_before.up.sql"), "SELECT 1;").unwrap();
        fs::write(dir.join("20260101000000_after.up.sql"), "SELECT 1;").unwrap();

        let registry = registry(dir).unwrap();
        let names: Vec<_> = registry.all().iter().map(|m| m.name()).collect();
        assert_eq!(
            names,
            vec![
                "20200101000000_before",
                initial::NAME,
                "20260101000000_after"
            ]
        );
    }

    #[test]
    fn test_registry_rejects_sql_duplicate_of_code_migration() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("20210522010101_initial.up.sql"),
            "SELECT 1;",
        )
        .unwrap();

        let err = registry(temp_dir.path()).unwrap_err();
        assert!(err.is_duplicate_name());
    }
}
