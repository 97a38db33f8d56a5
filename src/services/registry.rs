// マイグレーションレジストリ
//
// 既知のマイグレーションを登録順（= 名前のタイムスタンプ順）に保持します。
// 適用済み集合との差分から未適用のマイグレーションを求めます。

use crate::core::error::MigrateError;
use crate::core::migration::Migration;
use std::collections::{HashMap, HashSet};

/// マイグレーションレジストリ
///
/// 名前は一意で、登録順は名前の昇順と一致しなければならない。
#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    migrations: Vec<Migration>,
    index: HashMap<String, usize>,
}

impl MigrationRegistry {
    /// 空のレジストリを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// マイグレーションを登録
    ///
    /// # Errors
    ///
    /// - 同名が登録済みの場合は `DuplicateName`
    /// - 直前の登録名より大きくない場合は `OutOfOrderRegistration`
    pub fn register(&mut self, migration: Migration) -> Result<(), MigrateError> {
        let name = migration.name().to_string();

        if self.index.contains_key(&name) {
            return Err(MigrateError::DuplicateName { name });
        }

        if let Some(last) = self.migrations.last() {
            if name.as_str() <= last.name() {
                return Err(MigrateError::OutOfOrderRegistration {
                    name,
                    previous: last.name().to_string(),
                });
            }
        }

        self.index.insert(name, self.migrations.len());
        self.migrations.push(migration);
        Ok(())
    }

    /// 複数のマイグレーションを順に登録
    pub fn register_all(
        &mut self,
        migrations: impl IntoIterator<Item = Migration>,
    ) -> Result<(), MigrateError> {
        for migration in migrations {
            self.register(migration)?;
        }
        Ok(())
    }

    /// 未適用のマイグレーション（登録順）
    pub fn pending(&self, applied: &HashSet<String>) -> Vec<&Migration> {
        self.migrations
            .iter()
            .filter(|migration| !applied.contains(migration.name()))
            .collect()
    }

    /// 登録済みの全マイグレーション（登録順）
    pub fn all(&self) -> &[Migration] {
        &self.migrations
    }

    /// 名前からマイグレーションを取得
    pub fn get(&self, name: &str) -> Option<&Migration> {
        self.index.get(name).map(|&i| &self.migrations[i])
    }

    /// 登録済みかどうか
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 登録順の位置
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// 適用済みの名前がすべて登録済みか検証
    ///
    /// 未登録の名前がある場合、名前順で最初のものを `UnknownMigration` として返す。
    pub fn verify_applied(&self, applied: &HashSet<String>) -> Result<(), MigrateError> {
        let mut unknown: Vec<&String> = applied
            .iter()
            .filter(|name| !self.contains(name))
            .collect();
        unknown.sort();

        match unknown.first() {
            Some(name) => Err(MigrateError::UnknownMigration {
                name: (*name).clone(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sql_script::SqlAction;

    fn migration(name: &str) -> Migration {
        Migration::reversible(name, SqlAction::new("SELECT 1"), SqlAction::new("SELECT 1"))
    }

    fn registry(names: &[&str]) -> MigrationRegistry {
        let mut registry = MigrationRegistry::new();
        registry
            .register_all(names.iter().map(|name| migration(name)))
            .unwrap();
        registry
    }

    #[test]
    fn test_register_keeps_order() {
        let registry = registry(&["20210101000000_a", "20210102000000_b", "20210103000000_c"]);

        let names: Vec<_> = registry.all().iter().map(|m| m.name()).collect();
        assert_eq!(
            names,
            vec!["20210101000000_a", "20210102000000_b", "20210103000000_c"]
        );
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.position("20210102000000_b"), Some(1));
    }

    #[test]
    fn test_register_duplicate_name() {
        let mut registry = registry(&["20210101000000_a"]);
        let err = registry.register(migration("20210101000000_a")).unwrap_err();

        assert!(err.is_duplicate_name());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_out_of_order() {
        let mut registry = registry(&["20210102000000_b"]);
        let err = registry.register(migration("20210101000000_a")).unwrap_err();

        assert!(err.is_out_of_order());
        assert!(err.to_string().contains("20210102000000_b"));
        assert!(!registry.contains("20210101000000_a"));
    }

    #[test]
    fn test_pending_filters_applied_in_order() {
        let registry = registry(&["20210101000000_a", "20210102000000_b", "20210103000000_c"]);
        let applied = HashSet::from(["20210102000000_b".to_string()]);

        let pending: Vec<_> = registry.pending(&applied).iter().map(|m| m.name()).collect();
        assert_eq!(pending, vec!["20210101000000_a", "20210103000000_c"]);

        let all_applied: HashSet<String> =
            registry.all().iter().map(|m| m.name().to_string()).collect();
        assert!(registry.pending(&all_applied).is_empty());
    }

    #[test]
    fn test_verify_applied_reports_first_unknown() {
        let registry = registry(&["20210101000000_a"]);
        assert!(registry
            .verify_applied(&HashSet::from(["20210101000000_a".to_string()]))
            .is_ok());

        let applied = HashSet::from([
            "20210101000000_a".to_string(),
            "20210305000000_z".to_string(),
            "20210201000000_y".to_string(),
        ]);
        let err = registry.verify_applied(&applied).unwrap_err();
        assert!(err.is_unknown_migration());
        assert_eq!(err.migration_name(), Some("20210201000000_y"));
    }

    #[test]
    fn test_empty_registry() {
        let registry = MigrationRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("anything").is_none());
        assert!(registry.pending(&HashSet::new()).is_empty());
    }
}
