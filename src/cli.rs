// CLI Layer
// ユーザー入力の受付とコマンドルーティング

pub mod command_context;
pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// 出力フォーマット
#[derive(Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output (default)
    #[default]
    Text,
    /// Structured JSON output
    Json,
}

/// Cairn - Database Migration CLI
///
/// Versioned schema migrations with group rollback and a database-held lock.
#[derive(Parser, Debug)]
#[command(name = "cairn")]
#[command(author = "Cairn Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Database schema migration CLI tool")]
#[command(long_about = "Cairn - Database Migration CLI

Tracks which migrations have been applied to a database, applies pending
migrations as one atomic group, rolls back the last group, and prevents
concurrent runs with a lock held inside the database.

Supported databases: PostgreSQL, MySQL, SQLite")]
#[command(propagate_version = true)]
#[command(after_help = "GETTING STARTED:
  1. Create the bookkeeping tables:  cairn db init
  2. Apply pending migrations:       cairn db migrate
  3. Check migration status:         cairn db status
  4. Undo the last group:            cairn db rollback

For detailed help on each command, use: cairn <command> --help")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Target environment (development, staging, production)
    #[arg(short, long, global = true, value_name = "ENV", default_value = "development")]
    pub env: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Output format (text or json)
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage database migrations
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// Load fixtures into the model tables
    ///
    /// Empties the listed tables and inserts the rows from the fixtures file.
    /// Migrations are expected to be applied already.
    ///
    /// EXAMPLES:
    ///   # Load fixtures/fixtures.yaml
    ///   cairn fixtures
    ///
    ///   # Load a specific file
    ///   cairn fixtures --file seeds/demo.yaml
    Fixtures {
        /// Fixtures file (defaults to <fixtures_dir>/fixtures.yaml)
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

/// `db` subcommands
#[derive(Subcommand, Debug)]
pub enum DbCommands {
    /// Create migration tables
    Init,

    /// Migrate database
    ///
    /// Applies every pending migration, in order, as one group inside one
    /// transaction. Fails without changes when another run holds the lock.
    Migrate,

    /// Rollback the last migration group
    Rollback,

    /// Lock migrations
    ///
    /// The lock persists until `cairn db unlock`.
    Lock,

    /// Unlock migrations
    ///
    /// Clears the lock regardless of who holds it.
    Unlock,

    /// Create Rust migration
    #[command(name = "create_rust", alias = "create_go")]
    CreateRust {
        /// Migration label, e.g. add_users_index
        label: String,
    },

    /// Create SQL migration
    #[command(name = "create_sql")]
    CreateSql {
        /// Migration label, e.g. add_users_index
        label: String,
    },

    /// Show applied and pending migrations and the lock state
    Status,
}
