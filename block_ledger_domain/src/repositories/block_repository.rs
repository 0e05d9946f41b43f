// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Block Repository Interface
//!
//! The persistence contract for blocks, implemented by the relational
//! backend adapter and called exclusively by the Chain Service under its
//! global write lock. All methods are `async` and return domain errors
//! only — no SQL, no connection types, no backend-specific dialect leaks
//! through this boundary.
//!
//! Point lookups return `Option` rather than an error on "not found";
//! `LedgerError` is reserved for genuine failures (integrity violations,
//! backend unavailability, malformed arguments).

use crate::entities::block::{Block, OffChainData};
use crate::value_objects::search_level::SearchLevel;
use crate::LedgerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Filter parameters shared by the paginated and bounded read operations.
/// Each field is one of the dimensions `spec.md` §4.5 lists for paginated
/// listing: all, by time range, with off-chain data, encrypted, after a
/// block number, by signer, by recipient, by category, and by
/// custom-metadata LIKE. Custom-metadata key=value search is a separate
/// pair of methods (`search_metadata_key_value*`), not a filter field,
/// since it needs JSON-aware matching rather than a SQL predicate.
#[derive(Debug, Clone, Default)]
pub struct BlockFilter {
    pub signer_public_key: Option<String>,
    pub recipient_public_key: Option<String>,
    pub content_category: Option<String>,
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub has_off_chain_data: Option<bool>,
    pub is_encrypted: Option<bool>,
    pub after_block_number: Option<u64>,
    /// Exclusive upper bound, used by the recovery manager's partial
    /// export to stop at a break point without scanning past it.
    pub before_block_number: Option<u64>,
    pub custom_metadata_like: Option<String>,
}

/// Repository interface for block persistence and retrieval.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the Chain Service holds a
/// single shared instance behind its write lock.
#[async_trait]
pub trait BlockRepository: Send + Sync {
    /// Appends a single block. The caller (Chain Service) guarantees the
    /// block number is exactly `count()`; a violation is a
    /// `ResourceConflict`, surfacing a transaction-isolation bug upstream.
    async fn append(&self, block: &Block) -> Result<(), LedgerError>;

    /// Runs the Chain Service's append protocol (`spec.md` §4.6 steps 2–6)
    /// as one transaction: opens a session, reads `last_block` *within*
    /// that session (so it sees this transaction's own uncommitted writes,
    /// never a stale view that would duplicate a `block_number`), invokes
    /// `build` with that last block to obtain the fully hashed and signed
    /// next block, persists it, and commits. The caller (Chain Service)
    /// is responsible for the surrounding global write lock; this method
    /// only owns the transaction.
    async fn append_atomic(
        &self,
        build: &mut (dyn for<'a> FnMut(Option<&'a Block>) -> Result<Block, LedgerError> + Send),
    ) -> Result<Block, LedgerError>;

    /// Appends a contiguous batch of blocks atomically: either all rows
    /// commit or none do.
    async fn batch_append(&self, blocks: &[Block]) -> Result<(), LedgerError>;

    /// Appends or replaces associated off-chain data for a block number.
    async fn put_off_chain_data(&self, data: &OffChainData) -> Result<(), LedgerError>;

    /// Updates a block's encryption fields only (`is_encrypted`,
    /// `encryption_metadata`) — the sole in-place mutation the ledger
    /// permits. All other fields must be unchanged by the caller.
    async fn update_encryption(
        &self,
        block_number: u64,
        is_encrypted: bool,
        encryption_metadata: Option<String>,
    ) -> Result<(), LedgerError>;

    /// The highest-numbered block, or `None` for an empty chain.
    async fn last_block(&self) -> Result<Option<Block>, LedgerError>;

    /// The highest-numbered block at or below `max_block_number`, used by
    /// rollback candidate search.
    async fn last_block_up_to(&self, max_block_number: u64) -> Result<Option<Block>, LedgerError>;

    async fn by_number(&self, block_number: u64) -> Result<Option<Block>, LedgerError>;

    async fn by_hash(&self, hash: &str) -> Result<Option<Block>, LedgerError>;

    async fn off_chain_data(&self, block_number: u64) -> Result<Option<OffChainData>, LedgerError>;

    async fn exists(&self, block_number: u64) -> Result<bool, LedgerError>;

    /// Total block count, i.e. one past the highest `block_number`.
    async fn count(&self) -> Result<u64, LedgerError>;

    /// Page of blocks ordered by ascending `block_number`.
    async fn list_paginated(
        &self,
        filter: &BlockFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Block>, LedgerError>;

    /// Up to `max_results` matching blocks, newest first. Callers must
    /// pass `max_results` in `[1, 10_000]`; the repository rejects larger
    /// requests with `InvalidArgument` rather than silently truncating.
    async fn bounded_read(
        &self,
        filter: &BlockFilter,
        max_results: u64,
    ) -> Result<Vec<Block>, LedgerError>;

    /// Streams every matching block to `consumer` in ascending order using
    /// a bounded-memory cursor or manual pagination, never materializing
    /// the full result set. `consumer` returning `Err` aborts the stream
    /// and propagates the error.
    async fn stream(
        &self,
        filter: &BlockFilter,
        consumer: &mut (dyn FnMut(Block) -> Result<(), LedgerError> + Send),
    ) -> Result<(), LedgerError>;

    async fn by_numbers(&self, block_numbers: &[u64]) -> Result<Vec<Block>, LedgerError>;

    async fn by_hashes(&self, hashes: &[String]) -> Result<Vec<Block>, LedgerError>;

    /// Free-text content search across the fields implied by `level`,
    /// ordered by descending relevance/priority (manual keyword match
    /// ranked above auto keyword, above searchable content, above raw
    /// data, above off-chain payload — see `spec.md` §9).
    async fn search_content(
        &self,
        query: &str,
        level: SearchLevel,
        max_results: u64,
    ) -> Result<Vec<Block>, LedgerError>;

    /// Blocks whose `custom_metadata` JSON object contains `key` at all.
    async fn search_metadata_key(&self, key: &str, max_results: u64) -> Result<Vec<Block>, LedgerError>;

    /// Blocks whose `custom_metadata[key]` equals `value` exactly.
    async fn search_metadata_key_value(
        &self,
        key: &str,
        value: &str,
        max_results: u64,
    ) -> Result<Vec<Block>, LedgerError>;

    /// Page of blocks whose `custom_metadata[key]` equals `value` exactly,
    /// skipping the first `offset` matches and returning at most `limit`.
    async fn search_metadata_key_value_paginated(
        &self,
        key: &str,
        value: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Block>, LedgerError>;

    /// Streams every block whose `custom_metadata[key]` equals `value` to
    /// `consumer` in ascending `block_number` order without materializing
    /// the full match set, irrespective of chain size.
    async fn stream_metadata_key_value(
        &self,
        key: &str,
        value: &str,
        consumer: &mut (dyn FnMut(Block) -> Result<(), LedgerError> + Send),
    ) -> Result<(), LedgerError>;

    /// Deletes every block with `block_number >= from_block_number`
    /// (inclusive), used by rollback. Returns the number of rows removed.
    async fn delete_from(&self, from_block_number: u64) -> Result<u64, LedgerError>;

    /// Deletes every row in both the block and off-chain tables. Used only
    /// by test fixtures and the `reset` operation in `spec.md` §4.5 — never
    /// called by the Chain Service's normal append/read/rollback paths.
    async fn reset(&self) -> Result<(), LedgerError>;
}
