// Adapters
// データベースとファイルシステムへのアクセスを抽象化

pub mod connection_string;
pub mod database;
pub mod history_store;
pub mod lock_manager;
pub mod sql_generator;
pub mod sql_quote;
pub mod sql_script;
