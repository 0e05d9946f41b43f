// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Password Registry
//!
//! Process-local, in-memory store mapping a caller-chosen label (e.g. a
//! signer public key) to a password envelope encrypted under a
//! process-generated master key. Never persisted: the registry exists so a
//! long-running process can decrypt on a caller's behalf without asking for
//! the password on every call, and is wiped on shutdown (`spec.md` §4.2).

use crate::infrastructure::adapters::crypto::LedgerCrypto;
use block_ledger_domain::entities::block::EncryptionEnvelope;
use block_ledger_domain::LedgerError;
use block_ledger_domain::CryptoService;
use parking_lot::RwLock;
use ring::rand::{SecureRandom, SystemRandom};
use std::collections::HashMap;
use zeroize::Zeroize;

/// A password, encrypted at rest under the registry's master key.
#[derive(Debug, Clone)]
pub struct EncryptedPasswordEntry {
    envelope: EncryptionEnvelope,
}

/// Holds the process-local master key, zeroized on drop.
struct MasterKey([u8; 32]);

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

pub struct PasswordRegistry {
    entries: RwLock<HashMap<String, EncryptedPasswordEntry>>,
    master_key: MasterKey,
    crypto: LedgerCrypto,
}

impl PasswordRegistry {
    pub fn new() -> Result<Self, LedgerError> {
        let rng = SystemRandom::new();
        let mut key = [0u8; 32];
        rng.fill(&mut key)
            .map_err(|_| LedgerError::EncryptionError("failed to seed password registry master key".to_string()))?;

        Ok(Self {
            entries: RwLock::new(HashMap::new()),
            master_key: MasterKey(key),
            crypto: LedgerCrypto::default(),
        })
    }

    fn master_key_str(&self) -> String {
        hex::encode(self.master_key.0)
    }

    /// Encrypts and stores `password` under `label`, replacing any existing
    /// entry.
    pub fn register(&self, label: impl Into<String>, password: &str) -> Result<(), LedgerError> {
        let envelope = self.crypto.encrypt(password, &self.master_key_str())?;
        self.entries
            .write()
            .insert(label.into(), EncryptedPasswordEntry { envelope });
        Ok(())
    }

    /// Decrypts and returns the password stored under `label`, if any.
    pub fn lookup(&self, label: &str) -> Result<Option<String>, LedgerError> {
        let entry = self.entries.read().get(label).cloned();
        match entry {
            Some(entry) => Ok(Some(self.crypto.decrypt(&entry.envelope, &self.master_key_str())?)),
            None => Ok(None),
        }
    }

    pub fn has(&self, label: &str) -> bool {
        self.entries.read().contains_key(label)
    }

    pub fn remove(&self, label: &str) -> bool {
        self.entries.write().remove(label).is_some()
    }

    pub fn list(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Best-effort shutdown hook: clears all entries. The master key is
    /// zeroized automatically when the registry is dropped.
    pub fn shutdown(&self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup_round_trips() {
        let registry = PasswordRegistry::new().unwrap();
        registry.register("signer-a", "hunter2").unwrap();
        assert_eq!(registry.lookup("signer-a").unwrap().as_deref(), Some("hunter2"));
    }

    #[test]
    fn missing_label_returns_none() {
        let registry = PasswordRegistry::new().unwrap();
        assert_eq!(registry.lookup("nobody").unwrap(), None);
    }

    #[test]
    fn remove_and_clear_forget_entries() {
        let registry = PasswordRegistry::new().unwrap();
        registry.register("a", "p1").unwrap();
        registry.register("b", "p2").unwrap();
        assert!(registry.remove("a"));
        assert_eq!(registry.list(), vec!["b".to_string()]);
        registry.clear();
        assert!(registry.list().is_empty());
    }
}
