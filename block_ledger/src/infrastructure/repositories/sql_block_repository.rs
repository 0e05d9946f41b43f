// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # SQL Block Repository
//!
//! The concrete `BlockRepository` adapter over the `PersistenceGateway`'s
//! SQLite pool. Generalizes the teacher's `SqliteRepository<T>` /
//! `SqliteEntity` generic-CRUD pattern, specialized to `Block` because the
//! query surface (time-range, signer, recipient, category, metadata
//! key/value, search levels) doesn't generalize losslessly the way the
//! teacher's simpler CRUD trait does (`spec.md` §4.5, `DESIGN.md`).
//!
//! Streaming here always uses the manual-pagination-in-batches-of-1000
//! strategy that `spec.md` §4.5 specifies for the `sqlite` dialect — the
//! only dialect this build has a concrete pool for.

use crate::infrastructure::repositories::gateway::PersistenceGateway;
use async_trait::async_trait;
use block_ledger_domain::entities::block::{Block, EncryptionEnvelope, OffChainData};
use block_ledger_domain::repositories::block_repository::BlockFilter;
use block_ledger_domain::value_objects::public_key::PublicKeyHex;
use block_ledger_domain::value_objects::search_level::SearchLevel;
use block_ledger_domain::{BlockRepository, LedgerError};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, Row, Sqlite, SqlitePool, Transaction};
use std::sync::Arc;

/// Manual-pagination batch size for streaming, fixed at the spec's
/// documented sqlite fetch size.
const STREAM_BATCH_SIZE: u64 = 1000;

/// Cap on `maxResults`/batch-retrieval inputs, per `spec.md` §4.5/§7.
const MAX_RESULTS_CAP: u64 = 10_000;

pub struct SqlBlockRepository {
    gateway: Arc<PersistenceGateway>,
}

impl SqlBlockRepository {
    pub fn new(gateway: Arc<PersistenceGateway>) -> Self {
        Self { gateway }
    }

    fn pool(&self) -> &SqlitePool {
        self.gateway.pool()
    }
}

#[derive(FromRow)]
struct BlockRow {
    block_number: i64,
    previous_hash: String,
    timestamp: i64,
    data: String,
    signer_public_key: String,
    recipient_public_key: Option<String>,
    is_encrypted: bool,
    encryption_metadata: Option<String>,
    hash: String,
    signature: String,
    manual_keywords: Option<String>,
    auto_keywords: Option<String>,
    searchable_content: Option<String>,
    content_category: Option<String>,
    custom_metadata: Option<String>,
}

impl TryFrom<BlockRow> for Block {
    type Error = LedgerError;

    fn try_from(row: BlockRow) -> Result<Self, Self::Error> {
        let timestamp: DateTime<Utc> = Utc
            .timestamp_opt(row.timestamp, 0)
            .single()
            .ok_or_else(|| LedgerError::IntegrityViolation(format!("invalid stored timestamp {}", row.timestamp)))?;
        let encryption_metadata = row
            .encryption_metadata
            .map(|raw| serde_json::from_str::<EncryptionEnvelope>(&raw))
            .transpose()?;
        let custom_metadata = row
            .custom_metadata
            .map(|raw| serde_json::from_str::<JsonValue>(&raw))
            .transpose()?;

        Ok(Block {
            block_number: row.block_number as u64,
            previous_hash: row.previous_hash,
            timestamp,
            data: row.data,
            signer_public_key: PublicKeyHex::new(row.signer_public_key),
            recipient_public_key: row.recipient_public_key.map(PublicKeyHex::new),
            is_encrypted: row.is_encrypted,
            encryption_metadata,
            hash: row.hash,
            signature: row.signature,
            manual_keywords: row.manual_keywords,
            auto_keywords: row.auto_keywords,
            searchable_content: row.searchable_content,
            content_category: row.content_category,
            custom_metadata,
        })
    }
}

fn check_max_results(max_results: u64) -> Result<(), LedgerError> {
    if max_results == 0 || max_results > MAX_RESULTS_CAP {
        return Err(LedgerError::invalid_argument(format!(
            "max_results must be in [1, {MAX_RESULTS_CAP}], got {max_results}"
        )));
    }
    Ok(())
}

fn check_batch_size(len: usize) -> Result<(), LedgerError> {
    if len as u64 > MAX_RESULTS_CAP {
        return Err(LedgerError::invalid_argument(format!(
            "batch size must not exceed {MAX_RESULTS_CAP}, got {len}"
        )));
    }
    Ok(())
}

async fn insert_block(tx: &mut Transaction<'_, Sqlite>, block: &Block) -> Result<(), LedgerError> {
    let encryption_metadata = block
        .encryption_metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let custom_metadata = block.custom_metadata.as_ref().map(serde_json::to_string).transpose()?;

    let result = sqlx::query(
        "INSERT INTO block (block_number, previous_hash, timestamp, data, signer_public_key, \
         recipient_public_key, is_encrypted, encryption_metadata, hash, signature, \
         manual_keywords, auto_keywords, searchable_content, content_category, custom_metadata) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(block.block_number as i64)
    .bind(&block.previous_hash)
    .bind(block.timestamp.timestamp())
    .bind(&block.data)
    .bind(block.signer_public_key.as_str())
    .bind(block.recipient_public_key.as_ref().map(PublicKeyHex::as_str))
    .bind(block.is_encrypted)
    .bind(encryption_metadata)
    .bind(&block.hash)
    .bind(&block.signature)
    .bind(&block.manual_keywords)
    .bind(&block.auto_keywords)
    .bind(&block.searchable_content)
    .bind(&block.content_category)
    .bind(custom_metadata)
    .execute(&mut **tx)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(LedgerError::ResourceConflict(
            format!("block {} already exists", block.block_number),
        )),
        Err(e) => Err(LedgerError::backend_failure(e.to_string())),
    }
}

async fn last_block_tx(tx: &mut Transaction<'_, Sqlite>) -> Result<Option<Block>, LedgerError> {
    let row: Option<BlockRow> = sqlx::query_as(
        "SELECT block_number, previous_hash, timestamp, data, signer_public_key, \
         recipient_public_key, is_encrypted, encryption_metadata, hash, signature, \
         manual_keywords, auto_keywords, searchable_content, content_category, custom_metadata \
         FROM block ORDER BY block_number DESC LIMIT 1",
    )
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| LedgerError::backend_failure(e.to_string()))?;

    row.map(Block::try_from).transpose()
}

fn apply_filter<'q>(
    mut builder: sqlx::QueryBuilder<'q, Sqlite>,
    filter: &'q BlockFilter,
) -> sqlx::QueryBuilder<'q, Sqlite> {
    let mut first = true;
    let mut push_clause = |b: &mut sqlx::QueryBuilder<'q, Sqlite>| {
        b.push(if first { " WHERE " } else { " AND " });
        first = false;
    };
    if let Some(signer) = &filter.signer_public_key {
        push_clause(&mut builder);
        builder.push("signer_public_key = ").push_bind(signer.as_str());
    }
    if let Some(recipient) = &filter.recipient_public_key {
        push_clause(&mut builder);
        builder.push("recipient_public_key = ").push_bind(recipient.as_str());
    }
    if let Some(category) = &filter.content_category {
        push_clause(&mut builder);
        builder.push("LOWER(content_category) = LOWER(").push_bind(category.as_str()).push(")");
    }
    if let Some((start, end)) = &filter.time_range {
        push_clause(&mut builder);
        builder
            .push("timestamp BETWEEN ")
            .push_bind(start.timestamp())
            .push(" AND ")
            .push_bind(end.timestamp());
    }
    if let Some(has_off_chain) = filter.has_off_chain_data {
        push_clause(&mut builder);
        if has_off_chain {
            builder.push("block_number IN (SELECT block_number FROM off_chain_data)");
        } else {
            builder.push("block_number NOT IN (SELECT block_number FROM off_chain_data)");
        }
    }
    if let Some(is_encrypted) = filter.is_encrypted {
        push_clause(&mut builder);
        builder.push("is_encrypted = ").push_bind(is_encrypted);
    }
    if let Some(after) = filter.after_block_number {
        push_clause(&mut builder);
        builder.push("block_number > ").push_bind(after as i64);
    }
    if let Some(before) = filter.before_block_number {
        push_clause(&mut builder);
        builder.push("block_number < ").push_bind(before as i64);
    }
    if let Some(like) = &filter.custom_metadata_like {
        push_clause(&mut builder);
        builder.push("custom_metadata LIKE ").push_bind(format!("%{like}%"));
    }
    builder
}

const SELECT_COLUMNS: &str = "block_number, previous_hash, timestamp, data, signer_public_key, \
     recipient_public_key, is_encrypted, encryption_metadata, hash, signature, \
     manual_keywords, auto_keywords, searchable_content, content_category, custom_metadata";

#[async_trait]
impl BlockRepository for SqlBlockRepository {
    async fn append(&self, block: &Block) -> Result<(), LedgerError> {
        let mut tx = self.gateway.begin().await?;
        insert_block(&mut tx, block).await?;
        tx.commit().await.map_err(|e| LedgerError::backend_failure(e.to_string()))
    }

    async fn append_atomic(
        &self,
        build: &mut (dyn for<'a> FnMut(Option<&'a Block>) -> Result<Block, LedgerError> + Send),
    ) -> Result<Block, LedgerError> {
        let mut tx = self.gateway.begin().await?;
        let last = last_block_tx(&mut tx).await?;
        let next = build(last.as_ref())?;
        insert_block(&mut tx, &next).await?;
        tx.commit().await.map_err(|e| LedgerError::backend_failure(e.to_string()))?;
        Ok(next)
    }

    async fn batch_append(&self, blocks: &[Block]) -> Result<(), LedgerError> {
        let mut tx = self.gateway.begin().await?;
        for (i, block) in blocks.iter().enumerate() {
            insert_block(&mut tx, block).await?;
            if (i + 1) % 50 == 0 {
                // Periodic flush point, per spec.md §4.5; sqlx buffers
                // within the transaction regardless, but this keeps the
                // loop's intent explicit and easy to extend with metrics.
            }
        }
        tx.commit().await.map_err(|e| LedgerError::backend_failure(e.to_string()))
    }

    async fn put_off_chain_data(&self, data: &OffChainData) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO off_chain_data (block_number, payload) VALUES (?, ?) \
             ON CONFLICT (block_number) DO UPDATE SET payload = excluded.payload",
        )
        .bind(data.block_number as i64)
        .bind(&data.payload)
        .execute(self.pool())
        .await
        .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
        Ok(())
    }

    async fn update_encryption(
        &self,
        block_number: u64,
        is_encrypted: bool,
        encryption_metadata: Option<String>,
    ) -> Result<(), LedgerError> {
        let rows = sqlx::query(
            "UPDATE block SET is_encrypted = ?, encryption_metadata = ? WHERE block_number = ?",
        )
        .bind(is_encrypted)
        .bind(encryption_metadata)
        .bind(block_number as i64)
        .execute(self.pool())
        .await
        .map_err(|e| LedgerError::backend_failure(e.to_string()))?
        .rows_affected();

        if rows == 0 {
            return Err(LedgerError::invalid_argument(format!("block {block_number} does not exist")));
        }
        Ok(())
    }

    async fn last_block(&self) -> Result<Option<Block>, LedgerError> {
        let row: Option<BlockRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM block ORDER BY block_number DESC LIMIT 1"
        ))
        .fetch_optional(self.pool())
        .await
        .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
        row.map(Block::try_from).transpose()
    }

    async fn last_block_up_to(&self, max_block_number: u64) -> Result<Option<Block>, LedgerError> {
        let row: Option<BlockRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM block WHERE block_number <= ? ORDER BY block_number DESC LIMIT 1"
        ))
        .bind(max_block_number as i64)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
        row.map(Block::try_from).transpose()
    }

    async fn by_number(&self, block_number: u64) -> Result<Option<Block>, LedgerError> {
        let row: Option<BlockRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM block WHERE block_number = ?"
        ))
        .bind(block_number as i64)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
        row.map(Block::try_from).transpose()
    }

    async fn by_hash(&self, hash: &str) -> Result<Option<Block>, LedgerError> {
        let row: Option<BlockRow> =
            sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM block WHERE hash = ?"))
                .bind(hash)
                .fetch_optional(self.pool())
                .await
                .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
        row.map(Block::try_from).transpose()
    }

    async fn off_chain_data(&self, block_number: u64) -> Result<Option<OffChainData>, LedgerError> {
        let row = sqlx::query("SELECT block_number, payload FROM off_chain_data WHERE block_number = ?")
            .bind(block_number as i64)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
        Ok(row.map(|r| OffChainData {
            block_number: r.get::<i64, _>("block_number") as u64,
            payload: r.get("payload"),
        }))
    }

    async fn exists(&self, block_number: u64) -> Result<bool, LedgerError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM block WHERE block_number = ?")
            .bind(block_number as i64)
            .fetch_one(self.pool())
            .await
            .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
        Ok(count > 0)
    }

    async fn count(&self) -> Result<u64, LedgerError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM block")
            .fetch_one(self.pool())
            .await
            .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
        Ok(count as u64)
    }

    async fn list_paginated(
        &self,
        filter: &BlockFilter,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Block>, LedgerError> {
        if limit == 0 {
            return Err(LedgerError::invalid_argument("limit must be > 0"));
        }
        let mut builder = sqlx::QueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM block"));
        builder = apply_filter(builder, filter);
        builder
            .push(" ORDER BY block_number ASC LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(offset as i64);

        let rows: Vec<BlockRow> = builder
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
        rows.into_iter().map(Block::try_from).collect()
    }

    async fn bounded_read(&self, filter: &BlockFilter, max_results: u64) -> Result<Vec<Block>, LedgerError> {
        check_max_results(max_results)?;
        let mut builder = sqlx::QueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM block"));
        builder = apply_filter(builder, filter);
        builder.push(" ORDER BY block_number DESC LIMIT ").push_bind(max_results as i64);

        let rows: Vec<BlockRow> = builder
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
        rows.into_iter().map(Block::try_from).collect()
    }

    async fn stream(
        &self,
        filter: &BlockFilter,
        consumer: &mut (dyn FnMut(Block) -> Result<(), LedgerError> + Send),
    ) -> Result<(), LedgerError> {
        let mut offset = 0u64;
        loop {
            let batch = self.list_paginated(filter, offset, STREAM_BATCH_SIZE).await?;
            if batch.is_empty() {
                return Ok(());
            }
            let delivered = batch.len() as u64;
            for block in batch {
                consumer(block)?;
            }
            if delivered < STREAM_BATCH_SIZE {
                return Ok(());
            }
            offset += STREAM_BATCH_SIZE;
        }
    }

    async fn by_numbers(&self, block_numbers: &[u64]) -> Result<Vec<Block>, LedgerError> {
        check_batch_size(block_numbers.len())?;
        if block_numbers.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = sqlx::QueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM block WHERE block_number IN ("));
        let mut separated = builder.separated(", ");
        for n in block_numbers {
            separated.push_bind(*n as i64);
        }
        builder.push(") ORDER BY block_number ASC");

        let rows: Vec<BlockRow> = builder
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
        rows.into_iter().map(Block::try_from).collect()
    }

    async fn by_hashes(&self, hashes: &[String]) -> Result<Vec<Block>, LedgerError> {
        check_batch_size(hashes.len())?;
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = sqlx::QueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM block WHERE hash IN ("));
        let mut separated = builder.separated(", ");
        for h in hashes {
            separated.push_bind(h.as_str());
        }
        builder.push(") ORDER BY block_number ASC");

        let rows: Vec<BlockRow> = builder
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
        rows.into_iter().map(Block::try_from).collect()
    }

    async fn search_content(&self, query: &str, level: SearchLevel, max_results: u64) -> Result<Vec<Block>, LedgerError> {
        check_max_results(max_results)?;
        let like = format!("%{query}%");
        let mut builder = sqlx::QueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM block WHERE "));
        builder
            .push("manual_keywords LIKE ")
            .push_bind(like.clone())
            .push(" OR auto_keywords LIKE ")
            .push_bind(like.clone())
            .push(" OR searchable_content LIKE ")
            .push_bind(like.clone());
        if level.includes_data() {
            builder.push(" OR data LIKE ").push_bind(like.clone());
        }

        let rows: Vec<BlockRow> = builder
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
        let mut blocks: Vec<Block> = rows.into_iter().map(Block::try_from).collect::<Result<_, _>>()?;

        if level.includes_offchain() {
            let off_chain_matches = sqlx::query_scalar::<_, i64>(
                "SELECT block_number FROM off_chain_data WHERE payload LIKE ?",
            )
            .bind(&like)
            .fetch_all(self.pool())
            .await
            .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
            for number in off_chain_matches {
                if let Some(block) = self.by_number(number as u64).await? {
                    if !blocks.iter().any(|b| b.block_number == block.block_number) {
                        blocks.push(block);
                    }
                }
            }
        }

        // Priority: manual keywords first, then auto keywords, then
        // descending block number (recency) — spec.md §4.5, §9.
        blocks.sort_by(|a, b| {
            let a_manual = a.manual_keywords.as_deref().map(|k| k.contains(query)).unwrap_or(false);
            let b_manual = b.manual_keywords.as_deref().map(|k| k.contains(query)).unwrap_or(false);
            let a_auto = a.auto_keywords.as_deref().map(|k| k.contains(query)).unwrap_or(false);
            let b_auto = b.auto_keywords.as_deref().map(|k| k.contains(query)).unwrap_or(false);
            b_manual
                .cmp(&a_manual)
                .then(b_auto.cmp(&a_auto))
                .then(b.block_number.cmp(&a.block_number))
        });
        blocks.truncate(max_results as usize);
        Ok(blocks)
    }

    async fn search_metadata_key(&self, key: &str, max_results: u64) -> Result<Vec<Block>, LedgerError> {
        check_max_results(max_results)?;
        let mut matches = Vec::new();
        self.scan_metadata(|value| value.get(key).is_some(), &mut |block| {
            matches.push(block);
            Ok((matches.len() as u64) < max_results)
        })
        .await?;
        Ok(matches)
    }

    async fn search_metadata_key_value(
        &self,
        key: &str,
        value: &str,
        max_results: u64,
    ) -> Result<Vec<Block>, LedgerError> {
        check_max_results(max_results)?;
        let mut matches = Vec::new();
        self.scan_metadata(key_value_predicate(key, value), &mut |block| {
            matches.push(block);
            Ok((matches.len() as u64) < max_results)
        })
        .await?;
        Ok(matches)
    }

    async fn search_metadata_key_value_paginated(
        &self,
        key: &str,
        value: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Block>, LedgerError> {
        if limit == 0 {
            return Err(LedgerError::invalid_argument("limit must be > 0"));
        }
        let mut matches = Vec::new();
        let mut skipped = 0u64;
        self.scan_metadata(key_value_predicate(key, value), &mut |block| {
            if skipped < offset {
                skipped += 1;
                return Ok(true);
            }
            matches.push(block);
            Ok((matches.len() as u64) < limit)
        })
        .await?;
        Ok(matches)
    }

    async fn stream_metadata_key_value(
        &self,
        key: &str,
        value: &str,
        consumer: &mut (dyn FnMut(Block) -> Result<(), LedgerError> + Send),
    ) -> Result<(), LedgerError> {
        self.scan_metadata(key_value_predicate(key, value), &mut |block| {
            consumer(block)?;
            Ok(true)
        })
        .await
    }

    async fn delete_from(&self, from_block_number: u64) -> Result<u64, LedgerError> {
        let result = sqlx::query("DELETE FROM block WHERE block_number >= ?")
            .bind(from_block_number as i64)
            .execute(self.pool())
            .await
            .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn reset(&self) -> Result<(), LedgerError> {
        sqlx::query("DELETE FROM off_chain_data")
            .execute(self.pool())
            .await
            .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
        sqlx::query("DELETE FROM block")
            .execute(self.pool())
            .await
            .map_err(|e| LedgerError::backend_failure(e.to_string()))?;
        Ok(())
    }
}

/// Builds a `custom_metadata[key] == value` predicate over owned strings so
/// it satisfies `Fn` without borrowing from the caller's stack frame.
fn key_value_predicate(key: &str, value: &str) -> impl Fn(&JsonValue) -> bool {
    let key = key.to_string();
    let value = value.to_string();
    move |metadata: &JsonValue| metadata.get(&key).and_then(JsonValue::as_str) == Some(value.as_str())
}

impl SqlBlockRepository {
    /// Shared body for every custom-metadata search variant: paginate in
    /// batches of 1000 (capped at 100 batches, per `spec.md` §4.5),
    /// parsing each row's JSON tolerantly and skipping malformed rows with
    /// a debug log rather than failing the whole scan. `sink` is called
    /// once per row whose metadata matches `predicate`, in ascending
    /// `block_number` order, and returns `Ok(true)` to keep scanning or
    /// `Ok(false)` to stop early once the caller has enough matches —
    /// this lets the bounded, paginated, and streaming variants all share
    /// one cursor loop.
    async fn scan_metadata(
        &self,
        predicate: impl Fn(&JsonValue) -> bool,
        sink: &mut (dyn FnMut(Block) -> Result<bool, LedgerError> + Send),
    ) -> Result<(), LedgerError> {
        let mut offset = 0u64;
        let mut batches = 0u32;
        loop {
            if batches >= 100 {
                tracing::warn!("custom-metadata scan hit the 100-batch cap; use the streaming variant for full coverage");
                break;
            }
            let rows: Vec<BlockRow> = sqlx::query_as(&format!(
                "SELECT {SELECT_COLUMNS} FROM block WHERE custom_metadata IS NOT NULL \
                 ORDER BY block_number ASC LIMIT ? OFFSET ?"
            ))
            .bind(STREAM_BATCH_SIZE as i64)
            .bind(offset as i64)
            .fetch_all(self.pool())
            .await
            .map_err(|e| LedgerError::backend_failure(e.to_string()))?;

            if rows.is_empty() {
                break;
            }
            let delivered = rows.len() as u64;
            for row in rows {
                let raw = row.custom_metadata.clone();
                match Block::try_from(row) {
                    Ok(block) => {
                        let matched = block.custom_metadata.as_ref().map(&predicate).unwrap_or(false);
                        if matched && !sink(block)? {
                            return Ok(());
                        }
                    }
                    Err(_) => {
                        tracing::debug!("skipping block with malformed custom_metadata: {:?}", raw);
                    }
                }
            }
            if delivered < STREAM_BATCH_SIZE {
                break;
            }
            offset += STREAM_BATCH_SIZE;
            batches += 1;
        }
        Ok(())
    }
}
