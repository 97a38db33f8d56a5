use anyhow::{Context, Result};
use cairn::cli::commands::create::{CreateCommand, CreateCommandHandler, StubKind};
use cairn::cli::commands::fixtures::{FixturesCommand, FixturesCommandHandler};
use cairn::cli::commands::init::InitCommandHandler;
use cairn::cli::commands::lock::{LockCommandHandler, UnlockCommandHandler};
use cairn::cli::commands::migrate::MigrateCommandHandler;
use cairn::cli::commands::rollback::RollbackCommandHandler;
use cairn::cli::commands::status::StatusCommandHandler;
use cairn::cli::commands::DbCommand;
use cairn::cli::{Cli, Commands, DbCommands};
use clap::Parser;
use std::env;
use std::process;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

fn main() {
    // CLIをパースして実行
    let cli = Cli::parse();

    init_tracing(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }
    sqlx::any::install_default_drivers();

    let result = tokio::runtime::Runtime::new()
        .context("Failed to create Tokio runtime")
        .and_then(|runtime| runtime.block_on(run_command(cli)));

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// ログ出力を初期化（RUST_LOG が優先される）
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Ctrl-C でキャンセル信号を送る
fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (sender, receiver) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; aborting the current operation");
            let _ = sender.send(true);
        }
    });
    receiver
}

/// コマンドを実行する
async fn run_command(cli: Cli) -> Result<String> {
    // プロジェクトのルートパスを取得
    let project_path = env::current_dir()?;

    let db = DbCommand {
        project_path,
        config_path: cli.config,
        env: cli.env,
        format: cli.format,
        cancel: Some(cancel_on_ctrl_c()),
    };

    match cli.command {
        Commands::Db { command } => match command {
            DbCommands::Init => InitCommandHandler::new().execute(&db).await,
            DbCommands::Migrate => MigrateCommandHandler::new().execute(&db).await,
            DbCommands::Rollback => RollbackCommandHandler::new().execute(&db).await,
            DbCommands::Lock => LockCommandHandler::new().execute(&db).await,
            DbCommands::Unlock => UnlockCommandHandler::new().execute(&db).await,
            DbCommands::Status => StatusCommandHandler::new().execute(&db).await,
            DbCommands::CreateRust { label } => {
                let command = CreateCommand {
                    db,
                    kind: StubKind::Rust,
                    label,
                };
                CreateCommandHandler::new().execute(&command).await
            }
            DbCommands::CreateSql { label } => {
                let command = CreateCommand {
                    db,
                    kind: StubKind::Sql,
                    label,
                };
                CreateCommandHandler::new().execute(&command).await
            }
        },

        Commands::Fixtures { file } => {
            let command = FixturesCommand { db, file };
            FixturesCommandHandler::new().execute(&command).await
        }
    }
}
