// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Authorized Key Registry
//!
//! Process-local, in-memory record of which signer public keys are
//! currently trusted, each mapped to an owner label. A block's signature
//! still verifies against its stored key after the key is revoked here
//! (`spec.md` §8 testable properties) — revocation never touches stored
//! blocks, it only changes whether the chain is *fully compliant*
//! (`spec.md` §6, §9) and is the precondition the Recovery Manager's
//! re-authorize strategy checks and repairs (`spec.md` §4.7).
//!
//! Mirrors `PasswordRegistry`'s shape: a `parking_lot::RwLock`-guarded map,
//! process-wide, wiped on shutdown rather than persisted.

use block_ledger_domain::value_objects::public_key::PublicKeyHex;
use parking_lot::RwLock;
use std::collections::HashMap;

pub struct AuthorizedKeyRegistry {
    owners: RwLock<HashMap<PublicKeyHex, String>>,
}

impl AuthorizedKeyRegistry {
    pub fn new() -> Self {
        Self {
            owners: RwLock::new(HashMap::new()),
        }
    }

    /// Authorizes `key` under `owner_label`, replacing any prior owner.
    pub fn authorize(&self, key: PublicKeyHex, owner_label: impl Into<String>) {
        self.owners.write().insert(key, owner_label.into());
    }

    /// Revokes `key`. Returns `true` if it was previously authorized.
    pub fn revoke(&self, key: &PublicKeyHex) -> bool {
        self.owners.write().remove(key).is_some()
    }

    /// The reserved `"GENESIS"` signer is exempt and always authorized,
    /// mirroring its exemption from signature verification (`spec.md` §9).
    pub fn is_authorized(&self, key: &PublicKeyHex) -> bool {
        key.is_genesis() || self.owners.read().contains_key(key)
    }

    pub fn owner_of(&self, key: &PublicKeyHex) -> Option<String> {
        self.owners.read().get(key).cloned()
    }

    pub fn clear(&self) {
        self.owners.write().clear();
    }
}

impl Default for AuthorizedKeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_always_authorized() {
        let registry = AuthorizedKeyRegistry::new();
        assert!(registry.is_authorized(&PublicKeyHex::genesis()));
    }

    #[test]
    fn authorize_then_revoke_round_trips() {
        let registry = AuthorizedKeyRegistry::new();
        let key = PublicKeyHex::new("deadbeef");
        assert!(!registry.is_authorized(&key));

        registry.authorize(key.clone(), "alice");
        assert!(registry.is_authorized(&key));
        assert_eq!(registry.owner_of(&key).as_deref(), Some("alice"));

        assert!(registry.revoke(&key));
        assert!(!registry.is_authorized(&key));
        assert!(!registry.revoke(&key));
    }
}
