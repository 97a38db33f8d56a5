// アプリケーションのモデル定義
//
// マイグレーションと fixtures が参照するテーブル記述。

use crate::core::schema::{Column, ColumnDefault, ColumnType, Table};

/// users テーブル
pub fn users() -> Table {
    Table::new("users")
        .column(Column::new("id", ColumnType::Uuid).primary_key())
        .column(
            Column::new("created_at", ColumnType::Timestamp)
                .not_null()
                .default_value(ColumnDefault::CurrentTimestamp),
        )
        .column(Column::new("updated_at", ColumnType::Timestamp))
        .column(
            Column::new("username", ColumnType::Varchar(255))
                .not_null()
                .unique(),
        )
        .column(Column::new("full_name", ColumnType::Varchar(255)).not_null())
        .column(
            Column::new("email", ColumnType::Varchar(255))
                .not_null()
                .unique(),
        )
        .column(Column::new("display_name", ColumnType::Varchar(200)))
}

/// user_groups テーブル（owner_id は users.id を参照）
pub fn user_groups() -> Table {
    Table::new("user_groups")
        .column(Column::new("id", ColumnType::Uuid).primary_key())
        .column(
            Column::new("created_at", ColumnType::Timestamp)
                .not_null()
                .default_value(ColumnDefault::CurrentTimestamp),
        )
        .column(Column::new("updated_at", ColumnType::Timestamp))
        .column(
            Column::new("display_name", ColumnType::Varchar(255))
                .not_null()
                .unique(),
        )
        .column(Column::new("description", ColumnType::Text))
        .column(Column::new("owner_id", ColumnType::Uuid))
        .column(
            Column::new("active", ColumnType::Boolean)
                .not_null()
                .default_value(ColumnDefault::Bool(false)),
        )
        .foreign_key("owner_id", "users", "id")
}

/// すべてのモデル
pub fn all() -> Vec<Table> {
    vec![user_groups(), users()]
}
