// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Crypto Service Interface
//!
//! The cryptographic port used by the Chain Service: hashing, Ed25519
//! signing/verification, and password-based AES-GCM encryption of block
//! data. Kept in the domain layer as a trait only — no dependency on
//! `ed25519-dalek`, `aes-gcm`, or `argon2` appears here, mirroring how
//! this codebase keeps concrete crypto crates out of the domain crate and
//! behind an infrastructure adapter.

use crate::entities::block::EncryptionEnvelope;
use crate::value_objects::public_key::PublicKeyHex;
use crate::LedgerError;

/// Cryptographic operations needed by the ledger, independent of any
/// concrete algorithm implementation.
pub trait CryptoService: Send + Sync {
    /// SHA-256 of `content`, returned as lowercase hex.
    fn hash(&self, content: &str) -> String;

    /// Signs `content` with the keypair identified by `signer_public_key`,
    /// returning a signature encoded the same way `verify` expects it.
    fn sign(&self, content: &str, signer_public_key: &PublicKeyHex) -> Result<String, LedgerError>;

    /// Verifies `signature` over `content` against `signer_public_key`.
    /// Never errors on a bad signature — returns `Ok(false)`. Errors are
    /// reserved for malformed key/signature encodings.
    fn verify(&self, content: &str, signature: &str, signer_public_key: &PublicKeyHex) -> Result<bool, LedgerError>;

    /// Encrypts `plaintext` under a key derived from `password`, producing
    /// a self-contained envelope (salt, IV, ciphertext+tag).
    fn encrypt(&self, plaintext: &str, password: &str) -> Result<EncryptionEnvelope, LedgerError>;

    /// Decrypts `envelope` with `password`. A wrong password or tampered
    /// ciphertext is an `AuthenticationFailure`, never a panic.
    fn decrypt(&self, envelope: &EncryptionEnvelope, password: &str) -> Result<String, LedgerError>;

    /// Generates a new Ed25519 keypair, returning `(public_key, private_key)`
    /// both hex-encoded. The private key never appears in any domain type;
    /// callers are responsible for its custody.
    fn generate_keypair(&self) -> Result<(PublicKeyHex, String), LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::public_key::GENESIS_SIGNER;

    struct NoopCrypto;

    impl CryptoService for NoopCrypto {
        fn hash(&self, content: &str) -> String {
            format!("hash:{content}")
        }
        fn sign(&self, _content: &str, _signer_public_key: &PublicKeyHex) -> Result<String, LedgerError> {
            Ok("sig".to_string())
        }
        fn verify(&self, _content: &str, _signature: &str, signer_public_key: &PublicKeyHex) -> Result<bool, LedgerError> {
            Ok(signer_public_key.as_str() == GENESIS_SIGNER)
        }
        fn encrypt(&self, plaintext: &str, _password: &str) -> Result<EncryptionEnvelope, LedgerError> {
            Ok(EncryptionEnvelope {
                salt_b64: "s".into(),
                iv_b64: "i".into(),
                ciphertext_b64: plaintext.to_string(),
            })
        }
        fn decrypt(&self, envelope: &EncryptionEnvelope, _password: &str) -> Result<String, LedgerError> {
            Ok(envelope.ciphertext_b64.clone())
        }
        fn generate_keypair(&self) -> Result<(PublicKeyHex, String), LedgerError> {
            Ok((PublicKeyHex::new("pub"), "priv".to_string()))
        }
    }

    #[test]
    fn trait_object_is_usable_behind_dyn() {
        let crypto: Box<dyn CryptoService> = Box::new(NoopCrypto);
        assert_eq!(crypto.hash("x"), "hash:x");
        assert!(crypto.verify("x", "sig", &PublicKeyHex::genesis()).unwrap());
    }
}
