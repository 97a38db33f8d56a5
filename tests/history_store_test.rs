/// 適用状態ストアの結合テスト
///
/// 履歴テーブルへの記録、最新グループの取得と削除を確認します。
mod common;

#[cfg(test)]
mod history_store_tests {
    use super::common::TestDb;
    use cairn::adapters::history_store::AppliedStateStore;
    use cairn::core::config::Dialect;

    /// 管理テーブルの作成は冪等で、既存の履歴を残す
    #[tokio::test]
    async fn test_ensure_schema_keeps_history() {
        let db = TestDb::sqlite().await;
        let store = AppliedStateStore::new(Dialect::SQLite);
        let mut conn = db.pool.acquire().await.unwrap();

        assert!(!store.is_provisioned(&mut conn).await.unwrap());
        store.ensure_schema(&mut conn).await.unwrap();
        assert!(store.is_provisioned(&mut conn).await.unwrap());

        store
            .record_applied(&mut conn, 1, &["20240101000001_a".to_string()])
            .await
            .unwrap();
        store.ensure_schema(&mut conn).await.unwrap();

        assert_eq!(store.applied(&mut conn).await.unwrap().len(), 1);
    }

    /// 最新グループの取得と削除
    #[tokio::test]
    async fn test_last_group_and_remove() {
        let db = TestDb::sqlite().await;
        let store = AppliedStateStore::new(Dialect::SQLite);
        let mut conn = db.pool.acquire().await.unwrap();
        store.ensure_schema(&mut conn).await.unwrap();

        assert_eq!(store.last_group(&mut conn).await.unwrap(), None);

        store
            .record_applied(&mut conn, 1, &["20240101000001_a".to_string()])
            .await
            .unwrap();
        store
            .record_applied(
                &mut conn,
                2,
                &[
                    "20240101000002_b".to_string(),
                    "20240101000003_c".to_string(),
                ],
            )
            .await
            .unwrap();

        let last = store.last_group(&mut conn).await.unwrap().unwrap();
        assert_eq!(last.id, 2);
        assert_eq!(last.migrations, vec!["20240101000002_b", "20240101000003_c"]);

        assert_eq!(store.remove_group(&mut conn, 2).await.unwrap(), 2);
        let last = store.last_group(&mut conn).await.unwrap().unwrap();
        assert_eq!(last.id, 1);

        let names = store.applied_names(&mut conn).await.unwrap();
        assert!(names.contains("20240101000001_a"));
        assert_eq!(names.len(), 1);
    }

    /// 同名の二重記録は Persistence エラー
    #[tokio::test]
    async fn test_duplicate_record_is_persistence_error() {
        let db = TestDb::sqlite().await;
        let store = AppliedStateStore::new(Dialect::SQLite);
        let mut conn = db.pool.acquire().await.unwrap();
        store.ensure_schema(&mut conn).await.unwrap();

        let names = vec!["20240101000001_a".to_string()];
        store.record_applied(&mut conn, 1, &names).await.unwrap();
        let err = store.record_applied(&mut conn, 2, &names).await.unwrap_err();

        assert!(err.is_persistence());
    }

    /// 適用日時は記録時刻として読み戻せる
    #[tokio::test]
    async fn test_applied_at_round_trip() {
        let db = TestDb::sqlite().await;
        let store = AppliedStateStore::new(Dialect::SQLite);
        let mut conn = db.pool.acquire().await.unwrap();
        store.ensure_schema(&mut conn).await.unwrap();

        let before = chrono::Utc::now() - chrono::Duration::seconds(1);
        store
            .record_applied(&mut conn, 1, &["20240101000001_a".to_string()])
            .await
            .unwrap();

        let applied = store.applied(&mut conn).await.unwrap();
        assert!(applied[0].applied_at >= before);
        assert_eq!(applied[0].group_id, 1);
    }
}
