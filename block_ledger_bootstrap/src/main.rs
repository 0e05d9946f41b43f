// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Entry point: initializes logging, opens the configured ledger, appends
//! a genesis block if the chain is empty, and waits for a shutdown signal.

use block_ledger::{
    ChainService, DatabaseConfig, EmbeddedMode, LedgerCrypto, NewBlockParams, PersistenceGateway, PublicKeyHex,
    SqlBlockRepository,
};
use block_ledger_bootstrap::shutdown::ShutdownCoordinator;
use block_ledger_domain::BlockRepository;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    block_ledger::infrastructure::logging::init();

    let database_url = std::env::var("BLOCK_LEDGER_DATABASE_URL").unwrap_or_else(|_| "block_ledger.db".to_string());
    let config = DatabaseConfig::Embedded {
        mode: EmbeddedMode::File,
        path: database_url,
    };

    let gateway = Arc::new(PersistenceGateway::connect(&config).await?);
    let repository: Arc<dyn BlockRepository> = Arc::new(SqlBlockRepository::new(gateway));
    let crypto = Arc::new(LedgerCrypto::default());
    let chain = Arc::new(ChainService::new(repository, crypto));

    if chain.last_block().await?.is_none() {
        info!("chain is empty, appending genesis block");
        chain
            .append(PublicKeyHex::genesis(), None, NewBlockParams::new("genesis"))
            .await?;
    }

    let coordinator = ShutdownCoordinator::default();
    let token = coordinator.token();
    tokio::spawn({
        let coordinator = coordinator.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            coordinator.initiate_shutdown();
        }
    });

    info!("block ledger ready, block count = {}", chain.count().await?);
    token.cancelled().await;
    coordinator.complete_shutdown();
    info!("shutting down");

    Ok(())
}
