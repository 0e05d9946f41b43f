// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Block Entity
//!
//! The ledger's single entity. A block is immutable once hashed and signed:
//! the only permitted post-creation mutations are an encryption upgrade
//! (`is_encrypted`/`encryption_metadata`, leaving `data`/`hash` untouched)
//! and suffix rollback (whole-row deletion, not a field mutation).
//!
//! ## Invariants (enforced by the Chain Service, checked here by validators)
//!
//! 1. `block_number` values form the contiguous sequence `0, 1, …, N-1`.
//! 2. For every `i > 0`, `block[i].previous_hash == block[i-1].hash`.
//! 3. `block[i].hash == sha256(canonical(block[i]))`.
//! 4. `signature` verifies against `signer_public_key` over the same
//!    canonical content (skipped for the `"GENESIS"` signer of block 0).
//! 5. `is_encrypted` implies `encryption_metadata` is a valid AES-GCM
//!    envelope; `data` is never mutated after hashing.
//! 6. Only one writer exists globally at any time — enforced by the Chain
//!    Service's write lock, not representable here.

use crate::value_objects::public_key::{PublicKeyHex, GENESIS_PREVIOUS_HASH};
use crate::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Opaque AES-GCM envelope: `{salt, iv, ciphertext_and_tag}`, base64-encoded
/// fields, stored as a single serialized string (see `spec.md` §4.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EncryptionEnvelope {
    pub salt_b64: String,
    pub iv_b64: String,
    pub ciphertext_b64: String,
}

/// Owned child record associated with a block, loaded only on demand so
/// that streaming and pagination stay bounded in memory (`spec.md` §4.5,
/// §8: "Exhaustive offchain" search level).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffChainData {
    pub block_number: u64,
    pub payload: String,
}

/// The ledger's append-only unit of record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub block_number: u64,
    pub previous_hash: String,
    pub timestamp: DateTime<Utc>,
    pub data: String,
    pub signer_public_key: PublicKeyHex,
    pub recipient_public_key: Option<PublicKeyHex>,
    pub is_encrypted: bool,
    pub encryption_metadata: Option<EncryptionEnvelope>,
    pub hash: String,
    pub signature: String,
    pub manual_keywords: Option<String>,
    pub auto_keywords: Option<String>,
    pub searchable_content: Option<String>,
    pub content_category: Option<String>,
    pub custom_metadata: Option<JsonValue>,
}

impl Block {
    /// Builds the canonical content string hashed and signed for this
    /// block: the concatenation, in this exact order and with no
    /// separators, of decimal `block_number`, `previous_hash`, plaintext
    /// `data`, decimal UTC epoch-seconds of `timestamp`, and the serialized
    /// `signer_public_key`. Any other ordering or separator breaks
    /// cross-implementation compatibility (`spec.md` §4.3).
    pub fn canonical_content(
        block_number: u64,
        previous_hash: &str,
        data: &str,
        timestamp: DateTime<Utc>,
        signer_public_key: &PublicKeyHex,
    ) -> String {
        format!(
            "{}{}{}{}{}",
            block_number,
            previous_hash,
            data,
            timestamp.timestamp(),
            signer_public_key
        )
    }

    /// The canonical content for this block as persisted. Uses the
    /// plaintext `data` regardless of `is_encrypted`, per invariant 5 —
    /// encryption is a post-hash upgrade and must never change the hash.
    pub fn canonical(&self) -> String {
        Self::canonical_content(
            self.block_number,
            &self.previous_hash,
            &self.data,
            self.timestamp,
            &self.signer_public_key,
        )
    }

    /// True if this is the chain's genesis block by convention
    /// (`block_number == 0`, `previous_hash == "0"`, signer `"GENESIS"`).
    pub fn is_genesis(&self) -> bool {
        self.block_number == 0 && self.previous_hash == GENESIS_PREVIOUS_HASH && self.signer_public_key.is_genesis()
    }

    /// Checks invariant 2 against the immediately preceding block.
    pub fn links_to(&self, previous: &Block) -> bool {
        self.block_number == previous.block_number + 1 && self.previous_hash == previous.hash
    }

    /// Parses `custom_metadata` as a JSON object and looks up `key`.
    /// Malformed or non-object metadata yields `None` rather than an
    /// error — callers doing bulk metadata search must skip rows like this
    /// silently (`spec.md` §4.5, §9).
    pub fn custom_metadata_value(&self, key: &str) -> Option<&JsonValue> {
        self.custom_metadata.as_ref()?.as_object()?.get(key)
    }

    /// Returns the parameters needed to re-derive this block's canonical
    /// content after a decrypt, i.e. with `data` known to equal the
    /// original plaintext. Used by `byNumberWithPassword` to double-check
    /// that decrypting didn't silently corrupt the hash binding.
    pub fn validate_hash_binding(&self, hasher: impl Fn(&str) -> String) -> Result<(), LedgerError> {
        let expected = hasher(&self.canonical());
        if expected != self.hash {
            return Err(LedgerError::integrity_violation(format!(
                "block {} hash mismatch: stored {} computed {}",
                self.block_number, self.hash, expected
            )));
        }
        Ok(())
    }
}

/// Builder-style construction parameters for a new block, used by the
/// Chain Service so the append path has one place that assembles
/// `canonical_content` consistently (the teacher's config-record-instead-
/// of-builder convention from `spec.md` §9's "Inheritance/builders" note).
#[derive(Debug, Clone)]
pub struct NewBlockParams {
    pub data: String,
    pub recipient_public_key: Option<PublicKeyHex>,
    pub manual_keywords: Option<String>,
    pub searchable_content: Option<String>,
    pub content_category: Option<String>,
    pub custom_metadata: Option<JsonValue>,
}

impl NewBlockParams {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            recipient_public_key: None,
            manual_keywords: None,
            searchable_content: None,
            content_category: None,
            custom_metadata: None,
        }
    }

    pub fn with_recipient(mut self, recipient: PublicKeyHex) -> Self {
        self.recipient_public_key = Some(recipient);
        self
    }

    pub fn with_manual_keywords(mut self, keywords: impl Into<String>) -> Self {
        self.manual_keywords = Some(keywords.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.content_category = Some(category.into());
        self
    }

    pub fn with_custom_metadata(mut self, metadata: JsonValue) -> Self {
        self.custom_metadata = Some(metadata);
        self
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn minimal_block() -> Block {
        Block {
            block_number: 0,
            previous_hash: "0".to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            data: "d".to_string(),
            signer_public_key: PublicKeyHex::genesis(),
            recipient_public_key: None,
            is_encrypted: false,
            encryption_metadata: None,
            hash: "h".to_string(),
            signature: "s".to_string(),
            manual_keywords: None,
            auto_keywords: None,
            searchable_content: None,
            content_category: None,
            custom_metadata: None,
        }
    }

    proptest! {
        /// Canonical content is a pure function of its five inputs: same
        /// inputs, same string, every time, regardless of sub-second
        /// timestamp precision (`canonical_content` truncates to seconds).
        #[test]
        fn canonical_content_is_deterministic(
            block_number in any::<u64>(),
            previous_hash in "[a-f0-9]{0,64}",
            data in ".{0,64}",
            epoch_seconds in 0i64..4_000_000_000,
            signer in "[a-f0-9]{0,64}",
        ) {
            let timestamp = DateTime::<Utc>::from_timestamp(epoch_seconds, 0).unwrap();
            let key = PublicKeyHex::new(signer);

            let a = Block::canonical_content(block_number, &previous_hash, &data, timestamp, &key);
            let b = Block::canonical_content(block_number, &previous_hash, &data, timestamp, &key);
            prop_assert_eq!(a, b);
        }

        /// `links_to` only accepts the immediate successor by number and by
        /// hash; any other block number, or a mismatched previous hash,
        /// must be rejected.
        #[test]
        fn links_to_rejects_any_non_immediate_successor(
            prev_number in 0u64..1_000_000,
            number_delta in 2u64..1_000,
            hash_suffix in "[a-f0-9]{1,16}",
        ) {
            let prev = Block {
                block_number: prev_number,
                previous_hash: "0".to_string(),
                timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                data: "d".to_string(),
                signer_public_key: PublicKeyHex::genesis(),
                recipient_public_key: None,
                is_encrypted: false,
                encryption_metadata: None,
                hash: format!("hash-{hash_suffix}"),
                signature: "s".to_string(),
                manual_keywords: None,
                auto_keywords: None,
                searchable_content: None,
                content_category: None,
                custom_metadata: None,
            };
            let mut next = prev.clone();
            next.block_number = prev_number + number_delta;
            next.previous_hash = prev.hash.clone();

            prop_assert!(!next.links_to(&prev), "a non-contiguous block number must never link");
        }

        /// `validate_hash_binding` accepts exactly the hash the supplied
        /// hasher produces over the block's own canonical content, and
        /// rejects any other stored hash.
        #[test]
        fn validate_hash_binding_round_trips_with_matching_hasher(
            data in ".{0,32}",
            bogus_hash in "[a-f0-9]{1,16}",
        ) {
            let hasher = |content: &str| format!("hash-of({content})");
            let mut block = minimal_block();
            block.data = data;
            block.hash = hasher(&block.canonical());

            prop_assert!(block.validate_hash_binding(hasher).is_ok());

            block.hash = format!("tampered-{bogus_hash}");
            prop_assert!(block.validate_hash_binding(hasher).is_err());
        }
    }
}
