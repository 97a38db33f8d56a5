/// レジストリ構築の結合テスト
///
/// コードで定義したマイグレーションとディレクトリの SQL マイグレーションを
/// まとめて登録し、適用できることを確認します。
mod common;

#[cfg(test)]
mod registry_tests {
    use super::common::TestDb;
    use cairn::core::config::Dialect;
    use cairn::migrations::{self, initial};
    use cairn::services::migrator::Migrator;
    use std::fs;
    use std::sync::Arc;

    /// SQL マイグレーションは初期マイグレーションの後に並ぶ
    #[test]
    fn test_registry_merges_sql_migrations() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(
            dir.join("20240101000000_add_posts.up.sql"),
            "CREATE TABLE posts (id INTEGER PRIMARY KEY);",
        )
        .unwrap();
        fs::write(
            dir.join("20240101000000_add_posts.down.sql"),
            "DROP TABLE posts;",
        )
        .unwrap();
        fs::write(
            dir.join("20240102000000_seed_posts.up.sql"),
            "INSERT INTO posts (id) VALUES (1);",
        )
        .unwrap();

        let registry = migrations::registry(dir).unwrap();

        let names: Vec<&str> = registry.all().iter().map(|m| m.name()).collect();
        assert_eq!(
            names,
            vec![
                initial::NAME,
                "20240101000000_add_posts",
                "20240102000000_seed_posts"
            ]
        );
        assert!(registry.get("20240101000000_add_posts").unwrap().is_reversible());
        assert!(!registry.get("20240102000000_seed_posts").unwrap().is_reversible());
    }

    /// SQL マイグレーションを含むレジストリで migrate / rollback する
    #[tokio::test]
    async fn test_apply_sql_migrations() {
        let db = TestDb::sqlite().await;
        let dir = db.dir.path().join("migrations");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("20240101000000_add_posts.up.sql"),
            "CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT);\nCREATE INDEX posts_title ON posts (title);",
        )
        .unwrap();
        fs::write(
            dir.join("20240101000000_add_posts.down.sql"),
            "DROP INDEX posts_title;\nDROP TABLE posts;",
        )
        .unwrap();

        let registry = migrations::registry(&dir).unwrap();
        let migrator = Migrator::new(db.pool.clone(), Dialect::SQLite, Arc::new(registry));
        migrator.init().await.unwrap();

        let group = migrator.migrate().await.unwrap();
        assert_eq!(group.len(), 2);
        assert!(db.table_exists("users").await);
        assert!(db.table_exists("posts").await);

        migrator.rollback().await.unwrap();
        assert!(!db.table_exists("posts").await);
        assert!(!db.table_exists("user_groups").await);
    }
}
