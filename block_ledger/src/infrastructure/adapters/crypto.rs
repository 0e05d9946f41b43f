// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Crypto Service Implementation
//!
//! Concrete `CryptoService`: SHA-256 content hashing, Ed25519 signing, and
//! AES-256-GCM envelope encryption with a selectable key-derivation
//! function. Generalized from the teacher's `MultiAlgoEncryption`
//! (`infrastructure/adapters/encryption.rs`), narrowed to the single
//! algorithm combination this ledger specifies and extended with
//! signatures, which the teacher never needed (`spec.md` §4.1).

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use block_ledger_domain::entities::block::EncryptionEnvelope;
use block_ledger_domain::value_objects::public_key::PublicKeyHex;
use block_ledger_domain::{CryptoService, LedgerError};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use ring::rand::{SecureRandom, SystemRandom};
use scrypt::password_hash::SaltString as ScryptSalt;
use scrypt::Scrypt;
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;
const IV_LEN: usize = 12;
const KEY_LEN: usize = 32;
const PBKDF2_ITERATIONS: u32 = 210_000;

/// Key-derivation function selectable for password-based encryption,
/// Argon2id is the default (`spec.md` §4.1); Scrypt and PBKDF2-HMAC-SHA256
/// are kept as alternates for interoperability with older envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyDerivation {
    #[default]
    Argon2id,
    Scrypt,
    Pbkdf2Sha256,
}

pub struct LedgerCrypto {
    rng: SystemRandom,
    kdf: KeyDerivation,
}

impl Default for LedgerCrypto {
    fn default() -> Self {
        Self::new(KeyDerivation::default())
    }
}

impl LedgerCrypto {
    pub fn new(kdf: KeyDerivation) -> Self {
        Self {
            rng: SystemRandom::new(),
            kdf,
        }
    }

    fn derive_key(&self, password: &str, salt: &[u8]) -> Result<[u8; KEY_LEN], LedgerError> {
        let derived = match self.kdf {
            KeyDerivation::Argon2id => {
                let salt_string = SaltString::encode_b64(salt)
                    .map_err(|e| LedgerError::EncryptionError(format!("invalid salt: {e}")))?;
                let hash = Argon2::default()
                    .hash_password(password.as_bytes(), &salt_string)
                    .map_err(|e| LedgerError::EncryptionError(format!("argon2 derivation failed: {e}")))?;
                hash.hash
                    .ok_or_else(|| LedgerError::EncryptionError("argon2 produced no hash output".to_string()))?
                    .as_bytes()
                    .to_vec()
            }
            KeyDerivation::Scrypt => {
                let salt_string = ScryptSalt::encode_b64(salt)
                    .map_err(|e| LedgerError::EncryptionError(format!("invalid salt: {e}")))?;
                let hash = Scrypt
                    .hash_password(password.as_bytes(), &salt_string)
                    .map_err(|e| LedgerError::EncryptionError(format!("scrypt derivation failed: {e}")))?;
                hash.hash
                    .ok_or_else(|| LedgerError::EncryptionError("scrypt produced no hash output".to_string()))?
                    .as_bytes()
                    .to_vec()
            }
            KeyDerivation::Pbkdf2Sha256 => {
                let mut key = vec![0u8; KEY_LEN];
                let iterations = std::num::NonZeroU32::new(PBKDF2_ITERATIONS).expect("nonzero constant");
                ring::pbkdf2::derive(
                    ring::pbkdf2::PBKDF2_HMAC_SHA256,
                    iterations,
                    salt,
                    password.as_bytes(),
                    &mut key,
                );
                key
            }
        };

        if derived.len() < KEY_LEN {
            return Err(LedgerError::EncryptionError("derived key material too short".to_string()));
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&derived[..KEY_LEN]);
        Ok(key)
    }

    fn fill_random(&self, buf: &mut [u8]) -> Result<(), LedgerError> {
        self.rng
            .fill(buf)
            .map_err(|_| LedgerError::EncryptionError("system RNG failed to fill buffer".to_string()))
    }
}

impl CryptoService for LedgerCrypto {
    fn hash(&self, content: &str) -> String {
        let digest = Sha256::digest(content.as_bytes());
        hex::encode(digest)
    }

    fn sign(&self, _content: &str, signer_public_key: &PublicKeyHex) -> Result<String, LedgerError> {
        if signer_public_key.is_genesis() {
            // Genesis block is signed by convention, never by a real key
            // (spec.md §9 Open Question, resolved in DESIGN.md).
            return Ok("GENESIS".to_string());
        }
        Err(LedgerError::Unsupported(
            "signing requires the caller's private key; use sign_with_key".to_string(),
        ))
    }

    fn verify(&self, content: &str, signature: &str, signer_public_key: &PublicKeyHex) -> Result<bool, LedgerError> {
        if signer_public_key.is_genesis() {
            return Ok(signature == "GENESIS");
        }
        let key_bytes = hex::decode(signer_public_key.as_str())
            .map_err(|e| LedgerError::integrity_violation(format!("malformed public key hex: {e}")))?;
        let key_array: [u8; 32] = key_bytes
            .try_into()
            .map_err(|_| LedgerError::integrity_violation("public key must be 32 bytes"))?;
        let verifying_key = VerifyingKey::from_bytes(&key_array)
            .map_err(|e| LedgerError::integrity_violation(format!("invalid public key: {e}")))?;

        let sig_bytes = hex::decode(signature)
            .map_err(|e| LedgerError::integrity_violation(format!("malformed signature hex: {e}")))?;
        let sig_array: [u8; 64] = sig_bytes
            .try_into()
            .map_err(|_| LedgerError::integrity_violation("signature must be 64 bytes"))?;
        let signature = ed25519_dalek::Signature::from_bytes(&sig_array);

        Ok(verifying_key.verify(content.as_bytes(), &signature).is_ok())
    }

    fn encrypt(&self, plaintext: &str, password: &str) -> Result<EncryptionEnvelope, LedgerError> {
        let mut salt = [0u8; SALT_LEN];
        self.fill_random(&mut salt)?;
        let mut iv = [0u8; IV_LEN];
        self.fill_random(&mut iv)?;

        let key = self.derive_key(password, &salt)?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| LedgerError::EncryptionError(format!("bad AES key: {e}")))?;
        let nonce = Nonce::from_slice(&iv);
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| LedgerError::EncryptionError(format!("AES-256-GCM encryption failed: {e}")))?;

        Ok(EncryptionEnvelope {
            salt_b64: BASE64.encode(salt),
            iv_b64: BASE64.encode(iv),
            ciphertext_b64: BASE64.encode(ciphertext),
        })
    }

    fn decrypt(&self, envelope: &EncryptionEnvelope, password: &str) -> Result<String, LedgerError> {
        let salt = BASE64
            .decode(&envelope.salt_b64)
            .map_err(|e| LedgerError::EncryptionError(format!("malformed salt: {e}")))?;
        let iv = BASE64
            .decode(&envelope.iv_b64)
            .map_err(|e| LedgerError::EncryptionError(format!("malformed iv: {e}")))?;
        let ciphertext = BASE64
            .decode(&envelope.ciphertext_b64)
            .map_err(|e| LedgerError::EncryptionError(format!("malformed ciphertext: {e}")))?;

        let key = self.derive_key(password, &salt)?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| LedgerError::EncryptionError(format!("bad AES key: {e}")))?;
        let nonce = Nonce::from_slice(&iv);

        // An AEAD-tag mismatch (wrong password, or tampered ciphertext) and
        // every other decrypt failure both surface through this one
        // `aead::Error` type; we fold both into `AuthenticationFailure`
        // since neither the key derivation nor the caller can distinguish
        // "wrong password" from "corrupted ciphertext" here (spec.md §4.1).
        let plaintext = cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|_| LedgerError::AuthenticationFailure("decryption failed: wrong password or tampered data".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| LedgerError::IntegrityViolation(format!("decrypted payload is not valid UTF-8: {e}")))
    }

    fn generate_keypair(&self) -> Result<(PublicKeyHex, String), LedgerError> {
        let mut seed = [0u8; 32];
        self.fill_random(&mut seed)?;
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();
        Ok((
            PublicKeyHex::new(hex::encode(verifying_key.to_bytes())),
            hex::encode(signing_key.to_bytes()),
        ))
    }
}

impl LedgerCrypto {
    /// Signs `content` with an explicit private key, bypassing the
    /// domain trait's key-less `sign`. The Chain Service calls this when a
    /// caller supplies a signing key out of band; the trait method only
    /// covers the genesis convention so the domain interface stays free of
    /// a "bring your own private key" parameter that most callers never use.
    pub fn sign_with_key(&self, content: &str, private_key_hex: &str) -> Result<String, LedgerError> {
        let key_bytes = hex::decode(private_key_hex)
            .map_err(|e| LedgerError::invalid_argument(format!("malformed private key hex: {e}")))?;
        let key_array: [u8; 32] = key_bytes
            .try_into()
            .map_err(|_| LedgerError::invalid_argument("private key must be 32 bytes"))?;
        let signing_key = SigningKey::from_bytes(&key_array);
        let signature = signing_key.sign(content.as_bytes());
        Ok(hex::encode(signature.to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_lowercase_hex() {
        let crypto = LedgerCrypto::default();
        let digest = crypto.hash("hello");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, digest.to_lowercase());
        assert_eq!(digest, crypto.hash("hello"));
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let crypto = LedgerCrypto::default();
        let (public_key, private_key) = crypto.generate_keypair().unwrap();
        let signature = crypto.sign_with_key("block content", &private_key).unwrap();
        assert!(crypto.verify("block content", &signature, &public_key).unwrap());
        assert!(!crypto.verify("tampered content", &signature, &public_key).unwrap());
    }

    #[test]
    fn genesis_signer_is_exempt_from_signature_verification() {
        let crypto = LedgerCrypto::default();
        let genesis = PublicKeyHex::genesis();
        assert_eq!(crypto.sign("anything", &genesis).unwrap(), "GENESIS");
        assert!(crypto.verify("anything", "GENESIS", &genesis).unwrap());
    }

    #[test]
    fn encrypt_decrypt_round_trip_with_correct_password() {
        let crypto = LedgerCrypto::default();
        let envelope = crypto.encrypt("top secret data", "correct horse battery staple").unwrap();
        let plaintext = crypto.decrypt(&envelope, "correct horse battery staple").unwrap();
        assert_eq!(plaintext, "top secret data");
    }

    #[test]
    fn decrypt_with_wrong_password_is_authentication_failure() {
        let crypto = LedgerCrypto::default();
        let envelope = crypto.encrypt("top secret data", "right password").unwrap();
        let err = crypto.decrypt(&envelope, "wrong password").unwrap_err();
        assert!(matches!(err, LedgerError::AuthenticationFailure(_)));
    }

    #[test]
    fn scrypt_and_pbkdf2_kdfs_also_round_trip() {
        for kdf in [KeyDerivation::Scrypt, KeyDerivation::Pbkdf2Sha256] {
            let crypto = LedgerCrypto::new(kdf);
            let envelope = crypto.encrypt("payload", "password123").unwrap();
            assert_eq!(crypto.decrypt(&envelope, "password123").unwrap(), "payload");
        }
    }
}
