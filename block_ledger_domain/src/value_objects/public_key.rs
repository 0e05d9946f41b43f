// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Stable text serialization of an Ed25519 public key, and the reserved
//! `"GENESIS"` signer identity used for block 0.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal signer identity for the genesis block (`spec.md` §3, §9).
pub const GENESIS_SIGNER: &str = "GENESIS";

/// Literal `previousHash` for the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// A public key serialized as lowercase hex, reproducible byte-for-byte
/// across any reader of the backup/export JSON.
///
/// This wraps a bare `String` rather than the raw 32 bytes because the
/// domain layer never needs to do cryptographic work with it directly —
/// only the infrastructure-layer crypto adapter parses it back into an
/// `ed25519_dalek` key. Keeping it a transparent string here means the
/// domain crate stays free of a dependency on the signature crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKeyHex(String);

impl PublicKeyHex {
    /// Wraps an already hex-encoded key string without validation beyond
    /// "non-empty". Full format validation (64 lowercase hex chars) belongs
    /// to the infrastructure crypto adapter that actually parses keys.
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The reserved genesis signer identity.
    pub fn genesis() -> Self {
        Self(GENESIS_SIGNER.to_string())
    }

    pub fn is_genesis(&self) -> bool {
        self.0 == GENESIS_SIGNER
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicKeyHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PublicKeyHex {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PublicKeyHex {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_key_is_recognized() {
        let key = PublicKeyHex::genesis();
        assert!(key.is_genesis());
        assert_eq!(key.as_str(), "GENESIS");
    }

    #[test]
    fn ordinary_key_is_not_genesis() {
        let key = PublicKeyHex::new("ab".repeat(32));
        assert!(!key.is_genesis());
    }
}
