// Services Layer
// ドメインロジックを実行するサービス層

pub mod config_loader;
pub mod database_config_resolver;
pub mod fixture_loader;
pub mod migrator;
pub mod registry;
pub mod sql_migration_loader;
pub mod stub_generator;
