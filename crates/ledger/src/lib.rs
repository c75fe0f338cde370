//! Ledger implementations for Pennywise.
//!
//! All backends implement `pennywise_core::Ledger`. [`open`] picks one from
//! configuration.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryLedger;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLedger;

#[cfg(feature = "postgres")]
pub use postgres::PostgresLedger;

use pennywise_config::LedgerConfig;
use pennywise_core::Ledger;
use pennywise_core::error::LedgerError;
use std::sync::Arc;

/// Open the ledger described by `config`, running migrations.
pub async fn open(config: &LedgerConfig) -> Result<Arc<dyn Ledger>, LedgerError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryLedger::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let url = config.resolved_url();
            ensure_parent_dir(&url)?;
            let ledger = SqliteLedger::new(&url, config.max_connections).await?;
            Ok(Arc::new(ledger))
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let ledger = PostgresLedger::connect(&config.url, config.max_connections).await?;
            ledger.migrate().await?;
            Ok(Arc::new(ledger))
        }
        other => Err(LedgerError::Storage(format!(
            "ledger backend '{other}' is not available in this build"
        ))),
    }
}

/// SQLite creates the database file but not the directory holding it.
#[cfg(feature = "sqlite")]
fn ensure_parent_dir(url: &str) -> Result<(), LedgerError> {
    let Some(path) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    if path.contains(":memory:") {
        return Ok(());
    }
    let path = path.split('?').next().unwrap_or(path);
    match std::path::Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|e| LedgerError::Storage(format!("Failed to create {}: {e}", parent.display()))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_memory_backend() {
        let config = LedgerConfig {
            backend: "memory".into(),
            ..LedgerConfig::default()
        };
        let ledger = open(&config).await.unwrap();
        assert_eq!(ledger.name(), "memory");
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn open_sqlite_backend_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let config = LedgerConfig {
            backend: "sqlite".into(),
            url: format!("sqlite://{}", path.display()),
            max_connections: 2,
        };
        let ledger = open(&config).await.unwrap();
        assert_eq!(ledger.name(), "sqlite");
        assert!(ledger.health_check().await.unwrap());
        assert!(path.exists());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn open_sqlite_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("ledger.db");
        let config = LedgerConfig {
            backend: "sqlite".into(),
            url: format!("sqlite://{}", path.display()),
            max_connections: 1,
        };
        open(&config).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn unknown_backend_is_storage_error() {
        let config = LedgerConfig {
            backend: "mongodb".into(),
            ..LedgerConfig::default()
        };
        assert!(matches!(open(&config).await, Err(LedgerError::Storage(_))));
    }
}
