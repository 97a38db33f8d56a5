// SQLマイグレーション読み込みサービス
//
// マイグレーションディレクトリの `<name>.up.sql` / `<name>.down.sql` を
// Migration として読み込みます。

use crate::adapters::sql_script::SqlAction;
use crate::core::error::{IoError, MigrateError};
use crate::core::migration::{Migration, MigrationAction};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct SqlPair {
    up: Option<PathBuf>,
    down: Option<PathBuf>,
}

/// ファイル名から（マイグレーション名, up かどうか）を取り出す
fn parse_file_name(file_name: &str) -> Option<(String, bool)> {
    let re = Regex::new(r"^(\d{14}_[a-z0-9_]+)\.(up|down)\.sql$").ok()?;
    let caps = re.captures(file_name)?;
    Some((caps[1].to_string(), &caps[2] == "up"))
}

fn read_sql(path: &Path) -> Result<String, MigrateError> {
    std::fs::read_to_string(path).map_err(|e| {
        IoError::FileRead {
            path: path.display().to_string(),
            cause: e.to_string(),
        }
        .into()
    })
}

/// ディレクトリから SQL マイグレーションを検出（名前順）
///
/// ディレクトリが存在しない場合は空。`.down.sql` が無いものはロールバック不可。
pub fn discover_sql_migrations(dir: &Path) -> Result<Vec<Migration>, MigrateError> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "No SQL migration directory");
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir).map_err(|e| IoError::FileRead {
        path: dir.display().to_string(),
        cause: e.to_string(),
    })?;

    let mut pairs: BTreeMap<String, SqlPair> = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| IoError::FileRead {
            path: dir.display().to_string(),
            cause: e.to_string(),
        })?;
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some((name, is_up)) = parse_file_name(file_name) else {
            continue;
        };

        let pair = pairs.entry(name).or_default();
        if is_up {
            pair.up = Some(path);
        } else {
            pair.down = Some(path);
        }
    }

    let mut migrations = Vec::with_capacity(pairs.len());
    for (name, pair) in pairs {
        let Some(up_path) = pair.up else {
            warn!(migration = %name, "Ignoring down migration without an up migration");
            continue;
        };

        let up = SqlAction::new(read_sql(&up_path)?);
        let down: Option<Arc<dyn MigrationAction>> = match &pair.down {
            Some(path) => Some(Arc::new(SqlAction::new(read_sql(path)?))),
            None => None,
        };

        debug!(migration = %name, reversible = down.is_some(), "Discovered SQL migration");
        migrations.push(Migration::new(name, Arc::new(up), down));
    }

    Ok(migrations)
}
