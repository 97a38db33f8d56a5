// 初期マイグレーション: モデルのテーブルを作成する

use crate::adapters::sql_generator::SchemaAction;
use crate::core::migration::Migration;
use crate::models;

pub const NAME: &str = "20210522010101_initial";

pub fn migration() -> Migration {
    Migration::reversible(
        NAME,
        SchemaAction::create(models::all()),
        SchemaAction::drop(models::all()),
    )
}
