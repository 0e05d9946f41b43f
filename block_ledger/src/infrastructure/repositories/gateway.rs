// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Persistence Gateway
//!
//! Single point of transactional access to the relational backend. Opens
//! sessions, advertises the backend dialect, and owns the pool that
//! `SqlBlockRepository` runs queries against (`spec.md` §4.4).
//!
//! Concrete pool support is SQLite only in this build — `Postgres`/`MySql`
//! configs are accepted and their dialect strings recognized, but
//! `connect` reports `LedgerError::Unsupported` for them rather than
//! opening a pool, matching the "Unsupported — unknown backend dialect"
//! error kind named in `spec.md` §7 (see `DESIGN.md`).

use crate::infrastructure::config::DatabaseConfig;
use crate::infrastructure::repositories::schema;
use block_ledger_domain::LedgerError;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

/// Owns the connection pool for one backend and hands out sessions.
pub struct PersistenceGateway {
    pool: SqlitePool,
    dialect: &'static str,
}

impl PersistenceGateway {
    /// Connects to the backend named by `config`, creating and migrating a
    /// SQLite database file (or in-memory database) if needed.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, LedgerError> {
        match config.dialect() {
            "sqlite" => {
                let pool = schema::initialize_database(&config.database_url())
                    .await
                    .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
                info!("persistence gateway connected (dialect=sqlite)");
                Ok(Self { pool, dialect: "sqlite" })
            }
            other => Err(LedgerError::Unsupported(format!(
                "backend dialect '{other}' has no concrete pool in this build"
            ))),
        }
    }

    /// Wraps an already-open pool (used by tests to share one in-memory
    /// database across assertions without re-running migrations).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool, dialect: "sqlite" }
    }

    pub fn dialect(&self) -> &'static str {
        self.dialect
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a fresh transaction. The caller owns its commit/rollback —
    /// used by `SqlBlockRepository::append_atomic` to read `last_block`
    /// and persist the new row in one unit of work (`spec.md` §4.6).
    pub async fn begin(&self) -> Result<Transaction<'_, Sqlite>, LedgerError> {
        self.pool
            .begin()
            .await
            .map_err(|e| LedgerError::backend_failure(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_rejects_unsupported_dialect() {
        let config = DatabaseConfig::Postgres {
            host: "localhost".to_string(),
            port: 5432,
            database: "ledger".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
        };
        let result = PersistenceGateway::connect(&config).await;
        assert!(matches!(result, Err(LedgerError::Unsupported(_))));
    }

    #[tokio::test]
    async fn connect_opens_in_memory_sqlite() {
        let config = DatabaseConfig::Embedded {
            mode: crate::infrastructure::config::EmbeddedMode::Memory,
            path: String::new(),
        };
        let gateway = PersistenceGateway::connect(&config).await.unwrap();
        assert_eq!(gateway.dialect(), "sqlite");
    }
}
