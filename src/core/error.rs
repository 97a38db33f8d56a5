// エラー型定義
//
// マイグレーションエンジン全体で使用されるカスタムエラー型を提供します。
// thiserrorを使用して、MigrateError, DatabaseError, IoError を定義します。

use thiserror::Error;

/// マイグレーションエンジンのエラー
///
/// レジストリ登録、ロック取得、適用・ロールバックの各段階で発生するエラーを表現します。
/// いずれも内部で自動リトライされることはありません。
#[derive(Debug, Error)]
pub enum MigrateError {
    /// 同名のマイグレーションが既に登録されている
    #[error("Migration '{name}' is already registered")]
    DuplicateName {
        /// マイグレーション名
        name: String,
    },

    /// 登録順序がタイムスタンプ順になっていない
    #[error("Migration '{name}' is registered out of order (must sort after '{previous}')")]
    OutOfOrderRegistration {
        /// 登録しようとしたマイグレーション名
        name: String,
        /// 直前に登録されたマイグレーション名
        previous: String,
    },

    /// 別の実行がロックを保持している
    #[error("Migrations are locked by '{holder}'{}", format_since(.locked_at))]
    LockHeld {
        /// ロック所有者タグ
        holder: String,
        /// ロック取得日時（RFC 3339）
        locked_at: Option<String>,
    },

    /// up/down アクションが失敗した（トランザクションはロールバック済み）
    #[error("Migration {name} failed: {cause:#}")]
    MigrationFailed {
        /// 失敗したマイグレーション名
        name: String,
        /// アクションが返したエラー
        cause: anyhow::Error,
    },

    /// down を持たないマイグレーションのロールバック要求
    #[error("Migration {name} is irreversible: it has no down action")]
    IrreversibleMigration {
        /// マイグレーション名
        name: String,
    },

    /// 適用済みだがレジストリに存在しない（レジストリのずれ）
    #[error("Applied migration '{name}' is not registered; the registry and the database have drifted apart")]
    UnknownMigration {
        /// マイグレーション名
        name: String,
    },

    /// 履歴テーブルへの書き込み失敗
    #[error("Failed to persist migration state: {message}")]
    Persistence {
        /// エラーメッセージ
        message: String,
        /// 失敗したSQL
        sql: Option<String>,
    },

    /// 管理テーブルが未作成
    #[error("Migration tables are missing. Run `cairn db init` first.")]
    NotInitialized,

    /// タイムアウト
    #[error("Migration run timed out after {seconds}s; the transaction was rolled back")]
    Timeout {
        /// タイムアウト秒数
        seconds: u64,
    },

    /// 外部からのキャンセル
    #[error("Migration run was cancelled; the transaction was rolled back")]
    Cancelled,

    /// スタブのラベルが不正
    #[error("Invalid migration label '{label}': use letters, digits and underscores")]
    InvalidLabel {
        /// 入力されたラベル
        label: String,
    },

    /// データベースエラー
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// ファイル操作エラー
    #[error(transparent)]
    Io(#[from] IoError),
}

impl MigrateError {
    /// 重複名エラーかどうか
    pub fn is_duplicate_name(&self) -> bool {
        matches!(self, MigrateError::DuplicateName { .. })
    }

    /// 登録順序エラーかどうか
    pub fn is_out_of_order(&self) -> bool {
        matches!(self, MigrateError::OutOfOrderRegistration { .. })
    }

    /// ロック競合エラーかどうか
    pub fn is_lock_held(&self) -> bool {
        matches!(self, MigrateError::LockHeld { .. })
    }

    /// マイグレーション失敗エラーかどうか
    pub fn is_migration_failed(&self) -> bool {
        matches!(self, MigrateError::MigrationFailed { .. })
    }

    /// 不可逆マイグレーションエラーかどうか
    pub fn is_irreversible(&self) -> bool {
        matches!(self, MigrateError::IrreversibleMigration { .. })
    }

    /// レジストリずれエラーかどうか
    pub fn is_unknown_migration(&self) -> bool {
        matches!(self, MigrateError::UnknownMigration { .. })
    }

    /// 永続化エラーかどうか
    pub fn is_persistence(&self) -> bool {
        matches!(self, MigrateError::Persistence { .. })
    }

    /// 関連するマイグレーション名を取得
    pub fn migration_name(&self) -> Option<&str> {
        match self {
            MigrateError::DuplicateName { name }
            | MigrateError::OutOfOrderRegistration { name, .. }
            | MigrateError::MigrationFailed { name, .. }
            | MigrateError::IrreversibleMigration { name }
            | MigrateError::UnknownMigration { name } => Some(name),
            _ => None,
        }
    }
}

fn format_since(locked_at: &Option<String>) -> String {
    locked_at
        .as_ref()
        .map_or(String::new(), |at| format!(" since {}", at))
}

/// データベースエラー
///
/// データベース操作時に発生するエラーを表現します。
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Connection error
    #[error("Database connection error: {message} (cause: {cause})")]
    Connection {
        /// エラーメッセージ
        message: String,
        /// エラー原因
        cause: String,
    },

    /// Query execution error
    #[error("Query execution error: {message}")]
    Query {
        /// エラーメッセージ
        message: String,
        /// 失敗したSQL
        sql: Option<String>,
    },

    /// Transaction error
    #[error("Transaction error: {message}")]
    Transaction {
        /// エラーメッセージ
        message: String,
    },
}

impl DatabaseError {
    /// クエリエラーを作成
    pub fn query(message: impl Into<String>, sql: &str, cause: sqlx::Error) -> Self {
        DatabaseError::Query {
            message: format!("{}: {}", message.into(), cause),
            sql: Some(sql.to_string()),
        }
    }

    /// トランザクションエラーを作成
    pub fn transaction(message: impl Into<String>, cause: sqlx::Error) -> Self {
        DatabaseError::Transaction {
            message: format!("{}: {}", message.into(), cause),
        }
    }

    /// 接続エラーかどうか
    pub fn is_connection(&self) -> bool {
        matches!(self, DatabaseError::Connection { .. })
    }

    /// クエリエラーかどうか
    pub fn is_query(&self) -> bool {
        matches!(self, DatabaseError::Query { .. })
    }

    /// トランザクションエラーかどうか
    pub fn is_transaction(&self) -> bool {
        matches!(self, DatabaseError::Transaction { .. })
    }
}

/// I/Oエラー
///
/// スタブ生成やSQLマイグレーション読み込み時のファイル操作エラーを表現します。
#[derive(Debug, Error)]
pub enum IoError {
    /// File already exists
    #[error("Refusing to overwrite existing file: {path}")]
    FileExists {
        /// ファイルパス
        path: String,
    },

    /// File read error
    #[error("Failed to read file: {path} (cause: {cause})")]
    FileRead {
        /// ファイルパス
        path: String,
        /// エラー原因
        cause: String,
    },

    /// File write error
    #[error("Failed to write file: {path} (cause: {cause})")]
    FileWrite {
        /// ファイルパス
        path: String,
        /// エラー原因
        cause: String,
    },

    /// Directory creation error
    #[error("Failed to create directory: {path} (cause: {cause})")]
    DirectoryCreate {
        /// ディレクトリパス
        path: String,
        /// エラー原因
        cause: String,
    },
}

impl IoError {
    /// 既存ファイルエラーかどうか
    pub fn is_file_exists(&self) -> bool {
        matches!(self, IoError::FileExists { .. })
    }

    /// ファイル読み込みエラーかどうか
    pub fn is_file_read(&self) -> bool {
        matches!(self, IoError::FileRead { .. })
    }

    /// ファイル書き込みエラーかどうか
    pub fn is_file_write(&self) -> bool {
        matches!(self, IoError::FileWrite { .. })
    }

    /// ディレクトリ作成エラーかどうか
    pub fn is_directory_create(&self) -> bool {
        matches!(self, IoError::DirectoryCreate { .. })
    }
}
