// Cairnライブラリのエントリーポイント
//
// モジュール構造:
// - cli: CLIレイヤー（ユーザー入力の受付とコマンドルーティング）
// - core: コアドメインロジック（マイグレーション定義、設定、エラー、スキーマ記述）
// - adapters: データベースとファイルシステムへのアクセスを抽象化
// - services: レジストリ、マイグレーター、スタブ生成、fixtures 読み込み
// - migrations / models: アプリケーションに組み込まれたマイグレーションとモデル

pub mod adapters;
pub mod cli;
pub mod core;
pub mod migrations;
pub mod models;
pub mod services;
