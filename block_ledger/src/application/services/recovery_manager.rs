// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Recovery Manager
//!
//! Runs a fixed three-strategy ladder against a destructive key change:
//! re-authorize the removed key, then roll back to the last known-good
//! block, then fall back to a partial export of everything before the
//! break (`spec.md` §4.7). Never acquires its own lock — every strategy
//! goes through `ChainService`'s single write-lock entry point.

use crate::application::services::chain_service::ChainService;
use crate::infrastructure::metrics::metrics;
use block_ledger_domain::entities::block::Block;
use block_ledger_domain::repositories::block_repository::BlockFilter;
use block_ledger_domain::value_objects::public_key::PublicKeyHex;
use block_ledger_domain::LedgerError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Which strategy resolved (or failed to resolve) the corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryMethod {
    ReAuthorize,
    Rollback,
    PartialExport,
}

#[derive(Debug, Clone)]
pub struct RecoveryResult {
    pub success: bool,
    pub method: RecoveryMethod,
    pub message: String,
}

pub struct RecoveryManager {
    chain: Arc<ChainService>,
    backup_dir: PathBuf,
}

impl RecoveryManager {
    pub fn new(chain: Arc<ChainService>) -> Self {
        Self::with_backup_dir(chain, PathBuf::from("recovery_backups"))
    }

    /// As `new`, but partial-export backups land under `backup_dir` rather
    /// than the default `./recovery_backups`.
    pub fn with_backup_dir(chain: Arc<ChainService>, backup_dir: PathBuf) -> Self {
        Self { chain, backup_dir }
    }

    /// Attempts recovery from a destructive change to `removed_key` —
    /// typically a revocation discovered by the caller scanning
    /// `keysInvolvedInCorruption` — trying each strategy in order and
    /// stopping at the first that succeeds. `owner_label` is the human
    /// name recorded against the key if re-authorization restores it.
    pub async fn recover(&self, removed_key: PublicKeyHex, owner_label: &str) -> Result<RecoveryResult, LedgerError> {
        match self.try_reauthorize(&removed_key, owner_label).await {
            Ok(result) if result.success => {
                self.record_outcome(&result);
                return Ok(result);
            }
            Ok(_) => {}
            Err(err) => warn!(%err, "re-authorize strategy errored, trying rollback"),
        }

        match self.try_rollback(&removed_key).await {
            Ok(result) if result.success => {
                self.record_outcome(&result);
                return Ok(result);
            }
            Ok(_) => {}
            Err(err) => warn!(%err, "rollback strategy errored, trying partial export"),
        }

        let result = self.partial_export(&removed_key).await?;
        self.record_outcome(&result);
        Ok(result)
    }

    fn record_outcome(&self, result: &RecoveryResult) {
        let strategy = match result.method {
            RecoveryMethod::ReAuthorize => "re_authorize",
            RecoveryMethod::Rollback => "rollback",
            RecoveryMethod::PartialExport => "partial_export",
        };
        let outcome = if result.success { "success" } else { "failure" };
        metrics()
            .recovery_outcomes_total
            .with_label_values(&[strategy, outcome])
            .inc();
    }

    /// Re-adds `removed_key` to the authorized-key registry under a name
    /// derived from `owner_label` and the recovery timestamp, then
    /// re-validates. If the chain is still not fully compliant (some
    /// other key is also unauthorized, or the chain is structurally
    /// broken), the key is revoked again so this strategy leaves no
    /// side effect on failure.
    async fn try_reauthorize(&self, removed_key: &PublicKeyHex, owner_label: &str) -> Result<RecoveryResult, LedgerError> {
        let recovered_owner = format!("{owner_label}-recovered-{}", chrono::Utc::now().timestamp());
        self.chain.authorize_key(removed_key.clone(), recovered_owner);

        let report = self.chain.validate_detailed().await?;
        if report.fully_compliant {
            return Ok(RecoveryResult {
                success: true,
                method: RecoveryMethod::ReAuthorize,
                message: format!("re-authorized key under owner \"{owner_label}\"; chain is fully compliant"),
            });
        }

        self.chain.revoke_key(removed_key);
        let reason = report
            .violation
            .unwrap_or_else(|| "at least one signer key is still unauthorized".to_string());
        Ok(RecoveryResult {
            success: false,
            method: RecoveryMethod::ReAuthorize,
            message: format!("re-authorize failed: {reason}"),
        })
    }

    /// Scans the chain for blocks signed by `removed_key` that fail
    /// single-block validation (hash binding and signature, independent
    /// of chain linkage), computes the conservative and intelligent
    /// rollback candidates, and takes the minimum of all candidates that
    /// pass verification before performing the rollback.
    async fn try_rollback(&self, removed_key: &PublicKeyHex) -> Result<RecoveryResult, LedgerError> {
        let corrupted = self.scan_corrupted_blocks(removed_key).await?;
        let Some(min_corrupted) = corrupted.iter().min().copied() else {
            return Ok(RecoveryResult {
                success: false,
                method: RecoveryMethod::Rollback,
                message: "no structurally invalid blocks signed by the removed key were found".to_string(),
            });
        };
        if min_corrupted == 0 {
            return Ok(RecoveryResult {
                success: false,
                method: RecoveryMethod::Rollback,
                message: "corruption at block 0 leaves no earlier block to roll back to".to_string(),
            });
        }

        // Conservative: min(corrupted) - 1. Hash-integrity candidate is
        // treated identically to conservative (`spec.md` §9 Open Question).
        let conservative = min_corrupted - 1;
        let intelligent = self.longest_valid_prefix().await?;

        let mut candidates = vec![conservative];
        if let Some(i) = intelligent {
            candidates.push(i);
        }
        let mut target = *candidates.iter().min().unwrap();

        let total = self.chain.count().await?;
        if !(target < total && target < min_corrupted) {
            target = conservative;
        }

        let removed = self.chain.rollback_to(target + 1).await?;
        match self.chain.validate_chain().await {
            Ok(()) => Ok(RecoveryResult {
                success: true,
                method: RecoveryMethod::Rollback,
                message: format!("rolled back {removed} block(s), chain now ends at block {target}"),
            }),
            Err(err) => Ok(RecoveryResult {
                success: false,
                method: RecoveryMethod::Rollback,
                message: format!("rollback to block {target} still fails validation: {err}"),
            }),
        }
    }

    /// Last-resort strategy: walks from block 0 and stops at the first
    /// block signed by `removed_key` or the first structurally invalid
    /// block, exports that prefix without mutating the stored chain, and
    /// persists it to a timestamped backup file so an operator can
    /// recover the uncorrupted prefix even when rollback isn't safe to
    /// perform automatically.
    async fn partial_export(&self, removed_key: &PublicKeyHex) -> Result<RecoveryResult, LedgerError> {
        let break_point = self.find_break_point(removed_key).await?;
        let export = self.chain.export(break_point).await?;
        let path = self.write_backup_file(&export)?;

        let message = match break_point {
            Some(bp) => format!("exported blocks 0..{bp} (stopped at the break) to {}", path.display()),
            None => format!("no break point found; exported the full chain to {}", path.display()),
        };
        Ok(RecoveryResult {
            success: true,
            method: RecoveryMethod::PartialExport,
            message,
        })
    }

    /// Blocks signed by `removed_key` that fail single-block validation.
    async fn scan_corrupted_blocks(&self, removed_key: &PublicKeyHex) -> Result<Vec<u64>, LedgerError> {
        let mut corrupted = Vec::new();
        self.chain
            .stream(&BlockFilter::default(), &mut |block: Block| {
                if &block.signer_public_key == removed_key && !self.chain.single_block_valid(&block) {
                    corrupted.push(block.block_number);
                }
                Ok(())
            })
            .await?;
        Ok(corrupted)
    }

    /// Highest block number of the longest prefix in which every block is
    /// individually valid and timestamps are monotonically non-decreasing.
    /// `None` means even block 0 fails this check.
    async fn longest_valid_prefix(&self) -> Result<Option<u64>, LedgerError> {
        let mut last_valid = None;
        let mut prev_timestamp = None;
        let mut broke = false;
        self.chain
            .stream(&BlockFilter::default(), &mut |block: Block| {
                if broke {
                    return Ok(());
                }
                let timestamp_ok = prev_timestamp.map(|prev| block.timestamp >= prev).unwrap_or(true);
                if timestamp_ok && self.chain.single_block_valid(&block) {
                    last_valid = Some(block.block_number);
                    prev_timestamp = Some(block.timestamp);
                } else {
                    broke = true;
                }
                Ok(())
            })
            .await?;
        Ok(last_valid)
    }

    /// First block number that is either signed by `removed_key` or
    /// structurally invalid; `None` if no such block exists.
    async fn find_break_point(&self, removed_key: &PublicKeyHex) -> Result<Option<u64>, LedgerError> {
        let mut break_point = None;
        self.chain
            .stream(&BlockFilter::default(), &mut |block: Block| {
                if break_point.is_none() && (&block.signer_public_key == removed_key || !self.chain.single_block_valid(&block)) {
                    break_point = Some(block.block_number);
                }
                Ok(())
            })
            .await?;
        Ok(break_point)
    }

    fn write_backup_file(&self, json: &str) -> Result<PathBuf, LedgerError> {
        std::fs::create_dir_all(&self.backup_dir)?;
        let path = self.backup_dir.join(format!("partial_export_{}.json", chrono::Utc::now().timestamp()));
        std::fs::write(&path, json)?;
        Ok(path)
    }
}
