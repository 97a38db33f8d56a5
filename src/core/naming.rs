// 命名ポリシー
//
// 設定ファイル名と管理テーブル名の単一ソースを提供します。

/// 既定の設定ファイル名
pub const CONFIG_FILE: &str = ".cairn.yaml";

/// マイグレーション履歴テーブル
pub const HISTORY_TABLE: &str = "cairn_migrations";

/// マイグレーションロックテーブル
pub const LOCK_TABLE: &str = "cairn_migration_locks";

/// 手動ロック（`db lock`）の所有者タグ
pub const MANUAL_LOCK_OWNER: &str = "manual";

/// 既定の fixtures ファイル名
pub const FIXTURES_FILE: &str = "fixtures.yaml";

/// Rust マイグレーションを置くディレクトリ（プロジェクトルートから）
pub const RUST_MIGRATIONS_DIR: &str = "src/migrations";

/// アドバイザリロックのキー
///
/// 履歴テーブル名の FNV-1a ハッシュ。プロセス間で同じ値になる必要がある。
pub fn advisory_lock_key() -> i64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in HISTORY_TABLE.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash as i64
}
