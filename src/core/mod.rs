// Core Domain
// マイグレーション定義、設定、エラー、スキーマ記述の純粋なドメインモデル

pub mod config;
pub mod error;
pub mod migration;
pub mod naming;
pub mod schema;
