// statusコマンドハンドラー
//
// 適用済み・未適用のマイグレーションとロック状態を表示します。

use crate::cli::commands::{render_output, CommandOutput, DbCommand};
use crate::core::migration::MigrationStatus;
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

/// statusコマンドの出力構造体
#[derive(Debug, Clone, Serialize)]
pub struct StatusOutput {
    #[serde(flatten)]
    pub status: MigrationStatus,
}

impl CommandOutput for StatusOutput {
    fn to_text(&self) -> String {
        let status = &self.status;
        let mut output = String::new();

        output.push_str(&format!("{}\n", "Migration Status".bold()));
        output.push_str(&format!("{}\n", "=".repeat(60)));
        output.push_str(&format!("{:<8} {:<40} {}\n", "Group", "Migration", "Applied At"));
        output.push_str(&format!("{}\n", "-".repeat(60)));

        for record in &status.applied {
            output.push_str(&format!(
                "{:<8} {:<40} {}\n",
                record.group_id,
                record.name,
                record.applied_at.format("%Y-%m-%d %H:%M:%S").to_string().green()
            ));
        }
        for name in &status.pending {
            output.push_str(&format!("{:<8} {:<40} {}\n", "-", name, "pending".yellow()));
        }

        output.push_str(&format!("{}\n", "-".repeat(60)));
        output.push_str(&format!(
            "Applied: {}, Pending: {}, Last group: {}\n",
            status.applied.len(),
            status.pending.len(),
            status
                .last_group_id
                .map_or("-".to_string(), |id| id.to_string())
        ));

        let lock = if status.lock.locked {
            format!(
                "locked by {} since {}",
                status.lock.locked_by.as_deref().unwrap_or("unknown"),
                status.lock.locked_at.as_deref().unwrap_or("unknown")
            )
            .red()
            .to_string()
        } else {
            "unlocked".green().to_string()
        };
        output.push_str(&format!("Lock: {}", lock));

        output
    }
}

/// statusコマンドハンドラー
#[derive(Debug, Clone, Default)]
pub struct StatusCommandHandler {}

impl StatusCommandHandler {
    /// 新しいStatusCommandHandlerを作成
    pub fn new() -> Self {
        Self {}
    }

    /// statusコマンドを実行
    pub async fn execute(&self, command: &DbCommand) -> Result<String> {
        let migrator = command.migrator().await?;
        let status = migrator.status().await?;

        render_output(&StatusOutput { status }, &command.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::migration::{AppliedMigration, LockState};
    use chrono::{TimeZone, Utc};

    fn sample_status(locked: bool) -> MigrationStatus {
        MigrationStatus {
            applied: vec![AppliedMigration {
                name: "20210522010101_initial".to_string(),
                group_id: 1,
                applied_at: Utc.with_ymd_and_hms(2026, 1, 21, 12, 0, 0).unwrap(),
            }],
            pending: vec!["20260101000000_add_index".to_string()],
            last_group_id: Some(1),
            lock: if locked {
                LockState {
                    locked: true,
                    locked_at: Some("2026-01-21T12:00:00+00:00".to_string()),
                    locked_by: Some("manual".to_string()),
                }
            } else {
                LockState::unlocked()
            },
        }
    }

    #[test]
    fn test_status_output_text() {
        colored::control::set_override(false);

        let text = StatusOutput {
            status: sample_status(false),
        }
        .to_text();

        assert!(text.contains("20210522010101_initial"));
        assert!(text.contains("2026-01-21 12:00:00"));
        assert!(text.contains("pending"));
        assert!(text.contains("Applied: 1, Pending: 1, Last group: 1"));
        assert!(text.ends_with("Lock: unlocked"));
    }

    #[test]
    fn test_status_output_shows_lock_holder() {
        colored::control::set_override(false);

        let text = StatusOutput {
            status: sample_status(true),
        }
        .to_text();
        assert!(text.contains("Lock: locked by manual since 2026-01-21T12:00:00+00:00"));
    }

    #[test]
    fn test_status_output_json() {
        let json = serde_json::to_value(StatusOutput {
            status: sample_status(false),
        })
        .unwrap();

        assert_eq!(json["pending"][0], "20260101000000_add_index");
        assert_eq!(json["applied"][0]["group_id"], 1);
        assert_eq!(json["lock"]["locked"], false);
    }
}
