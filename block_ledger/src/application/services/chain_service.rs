// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chain Service
//!
//! The ledger's only writer. Every mutation — append, batch append,
//! rollback, encryption upgrade — runs under one process-wide,
//! write-preferring `tokio::sync::RwLock`; reads may run concurrently with
//! each other but never with a write (`spec.md` §5).
//!
//! Rather than pairing every mutating method with a "-locked" twin, a
//! single `with_write_lock` entry point takes a closure and hands it a
//! `WriteGuard` token proving the lock is held — the redesign direction
//! `spec.md` §9 asks for instead of duplicated method pairs.

use crate::infrastructure::adapters::authorized_key_registry::AuthorizedKeyRegistry;
use crate::infrastructure::adapters::crypto::LedgerCrypto;
use crate::infrastructure::metrics::metrics;
use block_ledger_domain::entities::block::{Block, NewBlockParams};
use block_ledger_domain::repositories::block_repository::BlockFilter;
use block_ledger_domain::value_objects::public_key::{PublicKeyHex, GENESIS_PREVIOUS_HASH};
use block_ledger_domain::value_objects::search_level::SearchLevel;
use block_ledger_domain::{BlockRepository, CryptoService, LedgerError};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};

/// Result of `ChainService::validate_detailed`: the structural check
/// (hash-chain linkage, hash binding, signature verification) and the
/// compliance check (every signer currently authorized) reported
/// separately, since a chain can be structurally intact yet out of
/// compliance after a signer's key is revoked without touching stored
/// blocks (`spec.md` §6, §8, §9).
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub structurally_intact: bool,
    pub fully_compliant: bool,
    pub violation: Option<String>,
}

/// Lifecycle of the current (at most one, globally) write operation,
/// logged on every transition (`spec.md` §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendState {
    Idle,
    Locked,
    Committed,
    RolledBack,
}

/// Proof that the caller holds the chain's global write lock. Cannot be
/// constructed outside this module; `with_write_lock` is the only way to
/// obtain one.
pub struct WriteGuard<'a> {
    _permit: tokio::sync::RwLockWriteGuard<'a, ()>,
}

pub struct ChainService {
    repository: Arc<dyn BlockRepository>,
    crypto: Arc<LedgerCrypto>,
    lock: RwLock<()>,
    state: Mutex<AppendState>,
    authorized_keys: AuthorizedKeyRegistry,
}

impl ChainService {
    pub fn new(repository: Arc<dyn BlockRepository>, crypto: Arc<LedgerCrypto>) -> Self {
        Self {
            repository,
            crypto,
            lock: RwLock::new(()),
            state: Mutex::new(AppendState::Idle),
            authorized_keys: AuthorizedKeyRegistry::new(),
        }
    }

    /// Authorizes `key` under `owner_label`. A freshly appended non-genesis
    /// signer is authorized implicitly the first time it successfully
    /// signs a block (see `append`); this method exists for the Recovery
    /// Manager's re-authorize strategy and for callers that want to
    /// pre-authorize a key before it ever signs anything.
    pub fn authorize_key(&self, key: PublicKeyHex, owner_label: impl Into<String>) {
        self.authorized_keys.authorize(key, owner_label);
    }

    /// Revokes `key`. Stored blocks are untouched — revocation only
    /// affects `fully_compliant` going forward (`spec.md` §8).
    pub fn revoke_key(&self, key: &PublicKeyHex) -> bool {
        self.authorized_keys.revoke(key)
    }

    pub fn is_key_authorized(&self, key: &PublicKeyHex) -> bool {
        self.authorized_keys.is_authorized(key)
    }

    fn set_state(&self, next: AppendState) {
        let previous = {
            let mut state = self.state.lock();
            let previous = *state;
            *state = next;
            previous
        };
        info!(?previous, ?next, "append state transition");
    }

    pub fn state(&self) -> AppendState {
        *self.state.lock()
    }

    /// Runs `op` with the global write lock held, threading the resulting
    /// `WriteGuard` through as proof. Sets state to `Locked` on entry and
    /// `Committed`/`RolledBack` depending on the closure's own signal via
    /// `finish_state`, defaulting to `Committed` on success and back to
    /// `Idle` on failure.
    async fn with_write_lock<F, Fut, T>(&self, op: F) -> Result<T, LedgerError>
    where
        F: FnOnce(WriteGuard<'_>) -> Fut,
        Fut: Future<Output = Result<(T, AppendState), LedgerError>>,
    {
        let permit = self.lock.write().await;
        self.set_state(AppendState::Locked);
        let guard = WriteGuard { _permit: permit };

        match op(guard).await {
            Ok((value, finish_state)) => {
                self.set_state(finish_state);
                Ok(value)
            }
            Err(err) => {
                self.set_state(AppendState::Idle);
                Err(err)
            }
        }
    }

    /// Appends one new block. `private_key_hex` is `None` only for the
    /// reserved `"GENESIS"` signer, which is exempt from signature
    /// verification by convention (`spec.md` §9).
    #[instrument(skip(self, params, private_key_hex))]
    pub async fn append(
        &self,
        signer_public_key: PublicKeyHex,
        private_key_hex: Option<&str>,
        params: NewBlockParams,
    ) -> Result<Block, LedgerError> {
        if !signer_public_key.is_genesis() && private_key_hex.is_none() {
            return Err(LedgerError::invalid_argument(
                "a non-genesis signer requires a private key to sign the block",
            ));
        }

        let repository = Arc::clone(&self.repository);
        let crypto = Arc::clone(&self.crypto);
        let private_key_hex = private_key_hex.map(str::to_string);

        self.with_write_lock(|_guard| async move {
            let block = repository
                .append_atomic(&mut |last: Option<&Block>| {
                    let block_number = last.map(|b| b.block_number + 1).unwrap_or(0);
                    let previous_hash = last
                        .map(|b| b.hash.clone())
                        .unwrap_or_else(|| GENESIS_PREVIOUS_HASH.to_string());
                    let timestamp = chrono::Utc::now();

                    let canonical =
                        Block::canonical_content(block_number, &previous_hash, &params.data, timestamp, &signer_public_key);
                    let hash = crypto.hash(&canonical);
                    let signature = if signer_public_key.is_genesis() {
                        crypto.sign(&canonical, &signer_public_key)?
                    } else {
                        let private_key = private_key_hex
                            .as_deref()
                            .ok_or_else(|| LedgerError::invalid_argument("missing private key"))?;
                        crypto.sign_with_key(&canonical, private_key)?
                    };

                    Ok(Block {
                        block_number,
                        previous_hash,
                        timestamp,
                        data: params.data.clone(),
                        signer_public_key: signer_public_key.clone(),
                        recipient_public_key: params.recipient_public_key.clone(),
                        is_encrypted: false,
                        encryption_metadata: None,
                        hash,
                        signature,
                        manual_keywords: params.manual_keywords.clone(),
                        auto_keywords: None,
                        searchable_content: params.searchable_content.clone(),
                        content_category: params.content_category.clone(),
                        custom_metadata: params.custom_metadata.clone(),
                    })
                })
                .await?;

            metrics().appends_total.inc();
            Ok((block, AppendState::Committed))
        })
        .await
        .inspect(|block| {
            // A key earns trust by successfully signing a block; it stays
            // authorized until an operator explicitly revokes it.
            if !block.signer_public_key.is_genesis() && !self.authorized_keys.is_authorized(&block.signer_public_key) {
                self.authorized_keys
                    .authorize(block.signer_public_key.clone(), format!("signer:{}", block.signer_public_key.as_str()));
            }
        })
    }

    /// Appends a contiguous batch, all-or-nothing, under one lock
    /// acquisition rather than one per block.
    pub async fn batch_append(&self, blocks: Vec<Block>) -> Result<(), LedgerError> {
        let repository = Arc::clone(&self.repository);
        self.with_write_lock(|_guard| async move {
            repository.batch_append(&blocks).await?;
            metrics().appends_total.inc_by(blocks.len() as u64);
            Ok(((), AppendState::Committed))
        })
        .await
    }

    /// Validates every invariant (contiguity, hash chain, hash binding,
    /// signature) across the whole chain, returning the first violation.
    pub async fn validate_chain(&self) -> Result<(), LedgerError> {
        let crypto = Arc::clone(&self.crypto);
        let mut previous: Option<Block> = None;
        let mut violation: Option<LedgerError> = None;

        self.repository
            .stream(&BlockFilter::default(), &mut |block| {
                if let Some(err) = &violation {
                    return Err(err.clone());
                }
                if let Some(prev) = &previous {
                    if !block.links_to(prev) {
                        let err = LedgerError::integrity_violation(format!(
                            "block {} does not link to block {}",
                            block.block_number, prev.block_number
                        ));
                        violation = Some(err.clone());
                        return Err(err);
                    }
                } else if !block.is_genesis() {
                    let err = LedgerError::integrity_violation("chain does not start with a genesis block".to_string());
                    violation = Some(err.clone());
                    return Err(err);
                }

                block.validate_hash_binding(|content| crypto.hash(content))?;

                if !crypto.verify(&block.canonical(), &block.signature, &block.signer_public_key)? {
                    let err = LedgerError::integrity_violation(format!("block {} has an invalid signature", block.block_number));
                    violation = Some(err.clone());
                    return Err(err);
                }

                previous = Some(block);
                Ok(())
            })
            .await
    }

    /// Whether the chain is currently valid end-to-end: structurally
    /// intact *and* every signer currently authorized (`spec.md` §6, §8
    /// e2e scenarios 5–6). Equivalent to `validate_detailed().fully_compliant`.
    pub async fn validate(&self) -> Result<bool, LedgerError> {
        Ok(self.validate_detailed().await?.fully_compliant)
    }

    /// Breaks `validate`'s single bool into the two conditions it
    /// combines: `structurally_intact` (hash-chain linkage, hash binding,
    /// signatures — unaffected by revocation, since revoking a key never
    /// alters stored blocks) and `fully_compliant` (additionally, every
    /// distinct signer in the chain is currently authorized) (`spec.md` §6).
    pub async fn validate_detailed(&self) -> Result<ValidationReport, LedgerError> {
        match self.validate_chain().await {
            Err(err) => Ok(ValidationReport {
                structurally_intact: false,
                fully_compliant: false,
                violation: Some(err.to_string()),
            }),
            Ok(()) => {
                let mut fully_compliant = true;
                self.repository
                    .stream(&BlockFilter::default(), &mut |block| {
                        if !self.authorized_keys.is_authorized(&block.signer_public_key) {
                            fully_compliant = false;
                        }
                        Ok(())
                    })
                    .await?;
                Ok(ValidationReport {
                    structurally_intact: true,
                    fully_compliant,
                    violation: None,
                })
            }
        }
    }

    /// Checks one block's hash binding and signature in isolation, without
    /// regard to chain linkage — the building block the Recovery Manager
    /// uses to scan for corrupted blocks and to find the longest valid
    /// prefix (`spec.md` §4.7).
    pub fn single_block_valid(&self, block: &Block) -> bool {
        if block.validate_hash_binding(|content| self.crypto.hash(content)).is_err() {
            return false;
        }
        matches!(self.crypto.verify(&block.canonical(), &block.signature, &block.signer_public_key), Ok(true))
    }

    /// Deletes every block from `from_block_number` onward. Returns the
    /// number of blocks removed.
    pub async fn rollback_to(&self, from_block_number: u64) -> Result<u64, LedgerError> {
        let repository = Arc::clone(&self.repository);
        self.with_write_lock(|_guard| async move {
            let removed = repository.delete_from(from_block_number).await?;
            metrics().rollbacks_total.inc();
            Ok((removed, AppendState::RolledBack))
        })
        .await
    }

    /// Encrypts a block's data in an accompanying envelope without
    /// mutating `data` or `hash` (invariant 5): the plaintext stays bound
    /// to the hash, the envelope is an additional access-controlled copy.
    pub async fn encrypt_existing(&self, block_number: u64, password: &str) -> Result<(), LedgerError> {
        let block = self
            .repository
            .by_number(block_number)
            .await?
            .ok_or_else(|| LedgerError::invalid_argument(format!("block {block_number} does not exist")))?;

        let envelope = self.crypto.encrypt(&block.data, password)?;
        let envelope_json = serde_json::to_string(&envelope)?;
        self.repository.update_encryption(block_number, true, Some(envelope_json)).await
    }

    /// Reads a block and, if it carries an encryption envelope, decrypts
    /// it with `password` and checks the decrypted text still matches the
    /// stored plaintext's hash binding (a corrupted envelope or wrong
    /// password both surface as `AuthenticationFailure`/`IntegrityViolation`).
    pub async fn by_number_with_password(&self, block_number: u64, password: &str) -> Result<Option<Block>, LedgerError> {
        let Some(block) = self.repository.by_number(block_number).await? else {
            return Ok(None);
        };
        if let Some(envelope) = &block.encryption_metadata {
            let decrypted = match self.crypto.decrypt(envelope, password) {
                Ok(plaintext) => plaintext,
                Err(LedgerError::AuthenticationFailure(_)) => return Ok(None),
                Err(err) => return Err(err),
            };
            if decrypted != block.data {
                return Err(LedgerError::integrity_violation(format!(
                    "block {block_number} decrypted payload does not match stored plaintext"
                )));
            }
        }
        Ok(Some(block))
    }

    /// Serializes blocks to a JSON array (`spec.md` §6 backup/export
    /// format). `before_block_number`, if given, is an exclusive upper
    /// bound — the Recovery Manager's partial-export strategy uses it to
    /// stop at a break point instead of exporting the whole chain.
    pub async fn export(&self, before_block_number: Option<u64>) -> Result<String, LedgerError> {
        let filter = BlockFilter {
            before_block_number,
            ..BlockFilter::default()
        };
        let mut blocks = Vec::new();
        self.repository
            .stream(&filter, &mut |block| {
                blocks.push(block);
                Ok(())
            })
            .await?;
        Ok(serde_json::to_string(&blocks)?)
    }

    /// Replaces the chain's contents with the blocks encoded in `json`,
    /// under the write lock. Used for restore-from-backup, not normal
    /// operation.
    pub async fn import(&self, json: &str) -> Result<u64, LedgerError> {
        let blocks: Vec<Block> = serde_json::from_str(json)?;
        let count = blocks.len() as u64;
        let repository = Arc::clone(&self.repository);
        self.with_write_lock(|_guard| async move {
            repository.reset().await?;
            repository.batch_append(&blocks).await?;
            Ok((count, AppendState::Committed))
        })
        .await
    }

    pub async fn last_block(&self) -> Result<Option<Block>, LedgerError> {
        self.repository.last_block().await
    }

    pub async fn count(&self) -> Result<u64, LedgerError> {
        self.repository.count().await
    }

    pub async fn exists(&self, block_number: u64) -> Result<bool, LedgerError> {
        self.repository.exists(block_number).await
    }

    pub async fn by_number(&self, block_number: u64) -> Result<Option<Block>, LedgerError> {
        self.repository.by_number(block_number).await
    }

    pub async fn by_hash(&self, hash: &str) -> Result<Option<Block>, LedgerError> {
        self.repository.by_hash(hash).await
    }

    pub async fn by_numbers(&self, block_numbers: &[u64]) -> Result<Vec<Block>, LedgerError> {
        self.repository.by_numbers(block_numbers).await
    }

    pub async fn by_hashes(&self, hashes: &[String]) -> Result<Vec<Block>, LedgerError> {
        self.repository.by_hashes(hashes).await
    }

    pub async fn list_paginated(&self, filter: &BlockFilter, offset: u64, limit: u64) -> Result<Vec<Block>, LedgerError> {
        self.repository.list_paginated(filter, offset, limit).await
    }

    pub async fn bounded_read(&self, filter: &BlockFilter, max_results: u64) -> Result<Vec<Block>, LedgerError> {
        self.repository.bounded_read(filter, max_results).await
    }

    pub async fn stream(
        &self,
        filter: &BlockFilter,
        consumer: &mut (dyn FnMut(Block) -> Result<(), LedgerError> + Send),
    ) -> Result<(), LedgerError> {
        self.repository.stream(filter, consumer).await
    }

    pub async fn search_content(&self, query: &str, level: SearchLevel, max_results: u64) -> Result<Vec<Block>, LedgerError> {
        self.repository.search_content(query, level, max_results).await
    }

    pub async fn search_metadata_key(&self, key: &str, max_results: u64) -> Result<Vec<Block>, LedgerError> {
        self.repository.search_metadata_key(key, max_results).await
    }

    pub async fn search_metadata_key_value(&self, key: &str, value: &str, max_results: u64) -> Result<Vec<Block>, LedgerError> {
        self.repository.search_metadata_key_value(key, value, max_results).await
    }

    pub async fn search_metadata_key_value_paginated(
        &self,
        key: &str,
        value: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Block>, LedgerError> {
        self.repository.search_metadata_key_value_paginated(key, value, offset, limit).await
    }

    pub async fn stream_metadata_key_value(
        &self,
        key: &str,
        value: &str,
        consumer: &mut (dyn FnMut(Block) -> Result<(), LedgerError> + Send),
    ) -> Result<(), LedgerError> {
        self.repository.stream_metadata_key_value(key, value, consumer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::crypto::LedgerCrypto;
    use crate::infrastructure::repositories::gateway::PersistenceGateway;
    use crate::infrastructure::repositories::sql_block_repository::SqlBlockRepository;
    use block_ledger_domain::CryptoService;
    use sqlx::SqlitePool;

    async fn test_service() -> (ChainService, Arc<LedgerCrypto>) {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::infrastructure::repositories::schema::ensure_schema(&pool).await.unwrap();
        let gateway = Arc::new(PersistenceGateway::from_pool(pool));
        let repository: Arc<dyn BlockRepository> = Arc::new(SqlBlockRepository::new(gateway));
        let crypto = Arc::new(LedgerCrypto::default());
        let service = ChainService::new(repository, crypto.clone());
        (service, crypto)
    }

    #[tokio::test]
    async fn append_genesis_then_extend_chain() {
        let (service, _crypto) = test_service().await;
        let genesis = service
            .append(PublicKeyHex::genesis(), None, NewBlockParams::new("genesis data"))
            .await
            .unwrap();
        assert_eq!(genesis.block_number, 0);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);

        let crypto = LedgerCrypto::default();
        let (signer, private_key) = crypto.generate_keypair().unwrap();
        let second = service
            .append(signer.clone(), Some(&private_key), NewBlockParams::new("second"))
            .await
            .unwrap();
        assert_eq!(second.block_number, 1);
        assert_eq!(second.previous_hash, genesis.hash);

        assert!(service.validate_chain().await.is_ok());
    }

    #[tokio::test]
    async fn rollback_removes_suffix_and_validation_still_passes() {
        let (service, _crypto) = test_service().await;
        service
            .append(PublicKeyHex::genesis(), None, NewBlockParams::new("g"))
            .await
            .unwrap();
        let crypto = LedgerCrypto::default();
        let (signer, private_key) = crypto.generate_keypair().unwrap();
        service
            .append(signer.clone(), Some(&private_key), NewBlockParams::new("a"))
            .await
            .unwrap();
        service
            .append(signer, Some(&private_key), NewBlockParams::new("b"))
            .await
            .unwrap();

        let removed = service.rollback_to(1).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(service.count().await.unwrap(), 1);
        assert!(service.validate_chain().await.is_ok());
    }

    #[tokio::test]
    async fn encrypt_existing_preserves_hash_binding() {
        let (service, _crypto) = test_service().await;
        let genesis = service
            .append(PublicKeyHex::genesis(), None, NewBlockParams::new("plaintext"))
            .await
            .unwrap();

        service.encrypt_existing(genesis.block_number, "secret").await.unwrap();
        let read_back = service
            .by_number_with_password(genesis.block_number, "secret")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read_back.data, "plaintext");
        assert!(read_back.is_encrypted);

        let wrong = service.by_number_with_password(genesis.block_number, "wrong").await.unwrap();
        assert!(wrong.is_none());
    }

    #[tokio::test]
    async fn append_authorizes_signer_and_revoke_breaks_compliance_not_structure() {
        let (service, _crypto) = test_service().await;
        service
            .append(PublicKeyHex::genesis(), None, NewBlockParams::new("g"))
            .await
            .unwrap();
        let crypto = LedgerCrypto::default();
        let (signer, private_key) = crypto.generate_keypair().unwrap();
        service
            .append(signer.clone(), Some(&private_key), NewBlockParams::new("a"))
            .await
            .unwrap();

        assert!(service.is_key_authorized(&signer));
        let report = service.validate_detailed().await.unwrap();
        assert!(report.structurally_intact);
        assert!(report.fully_compliant);

        service.revoke_key(&signer);
        let report = service.validate_detailed().await.unwrap();
        assert!(report.structurally_intact);
        assert!(!report.fully_compliant);
        assert!(!service.validate().await.unwrap());
    }

    #[tokio::test]
    async fn export_respects_exclusive_upper_bound() {
        let (service, _crypto) = test_service().await;
        service
            .append(PublicKeyHex::genesis(), None, NewBlockParams::new("g"))
            .await
            .unwrap();
        let crypto = LedgerCrypto::default();
        let (signer, private_key) = crypto.generate_keypair().unwrap();
        service
            .append(signer.clone(), Some(&private_key), NewBlockParams::new("a"))
            .await
            .unwrap();
        service.append(signer, Some(&private_key), NewBlockParams::new("b")).await.unwrap();

        let full: Vec<Block> = serde_json::from_str(&service.export(None).await.unwrap()).unwrap();
        assert_eq!(full.len(), 3);

        let prefix: Vec<Block> = serde_json::from_str(&service.export(Some(1)).await.unwrap()).unwrap();
        assert_eq!(prefix.len(), 1);
        assert_eq!(prefix[0].block_number, 0);
    }
}
