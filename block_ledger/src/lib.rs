// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Block Ledger
//!
//! An append-only, authenticated, relational-backed block ledger: every
//! block is hash-chained to its predecessor, signed by its author, and
//! persisted through a single global writer so the chain can never fork.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Application Layer                          │
//! │  Chain Service (the only writer) · Recovery Manager          │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Infrastructure Layer                          │
//! │  SQL Block Repository · Persistence Gateway · Crypto Adapter │
//! │  Password Registry · Logging · Metrics                      │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │              block_ledger_domain (pure)                      │
//! │  Block entity · BlockRepository / CryptoService traits       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Concepts
//!
//! ### Block
//! The ledger's single unit of record: `block_number`, `previous_hash`,
//! `data`, a signer's public key, a SHA-256 `hash` over the canonical
//! content, and a signature over that same content. Immutable once
//! written, except for an append-only encryption upgrade.
//!
//! ### Chain Service
//! The ledger's only writer. Every mutation runs under one process-wide,
//! write-preferring lock; appends, rollbacks, and encryption upgrades are
//! all funneled through a single `with_write_lock` entry point rather than
//! duplicated locked/unlocked method pairs.
//!
//! ### Recovery Manager
//! When validation finds a broken chain, tries re-authorization, then
//! rollback, then a last-resort partial export — never taking its own
//! lock, always going through the Chain Service.
//!
//! ## Error Handling
//!
//! `block_ledger_domain::LedgerError` categorizes every failure
//! (invalid argument, authentication, integrity violation, resource
//! conflict, backend failure, unsupported) so callers can branch on
//! `category()` without matching on a backend-specific error type.

pub mod application;
pub mod infrastructure;

pub use application::services::chain_service::{AppendState, ChainService};
pub use application::services::recovery_manager::{RecoveryManager, RecoveryMethod, RecoveryResult};
pub use infrastructure::adapters::crypto::{KeyDerivation, LedgerCrypto};
pub use infrastructure::adapters::password_registry::PasswordRegistry;
pub use infrastructure::config::{DatabaseConfig, EmbeddedMode};
pub use infrastructure::repositories::gateway::PersistenceGateway;
pub use infrastructure::repositories::sql_block_repository::SqlBlockRepository;

pub use block_ledger_domain::{
    Block, BlockFilter, BlockRepository, CryptoService, EncryptionEnvelope, LedgerError, NewBlockParams, OffChainData,
    PublicKeyHex, SearchLevel,
};
