//! CLI command implementations.

pub mod audit;
pub mod init;
pub mod queue;
pub mod status;
pub mod trigger;
pub mod worker;

use anyhow::{Context, Result};

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::database::DatabaseConnection;

/// Load project configuration from `.redline/` plus environment overrides.
pub(crate) fn load_config() -> Result<Config> {
    ConfigLoader::load()
}

/// Open the configured database, creating parent directories and
/// applying pending migrations.
pub(crate) async fn open_database(config: &Config) -> Result<DatabaseConnection> {
    let path = std::path::Path::new(&config.database.path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let url = format!("sqlite:{}", config.database.path);
    let db = DatabaseConnection::new(&url, config.database.max_connections).await?;
    db.migrate().await?;
    Ok(db)
}
