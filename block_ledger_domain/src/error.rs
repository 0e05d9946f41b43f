// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Ledger Error System
//!
//! Domain-specific errors for the block ledger. Mirrors the categorized,
//! `thiserror`-derived error enum pattern used throughout this codebase:
//! each failure mode is its own variant carrying a descriptive message,
//! never a raw downstream error type, so the domain stays independent of
//! any particular storage or crypto backend.
//!
//! ## Error Categories
//!
//! - **InvalidArgument** — malformed caller input: negative offsets,
//!   `maxResults` outside `[1, 10_000]`, batch sizes over the cap.
//! - **AuthenticationFailure** — AES-GCM tag mismatch on decrypt; surfaced to
//!   callers as `None`, never as a raised error.
//! - **IntegrityViolation** — hash mismatch, bad signature, chain
//!   discontinuity.
//! - **ResourceConflict** — duplicate `block_number`, i.e. a transaction
//!   isolation bug in the caller.
//! - **BackendFailure** — transport/connection/timeout from the storage
//!   layer.
//! - **Unsupported** — unknown backend dialect, unimplemented algorithm.
//!
//! `NotFound` is deliberately not a variant here: point lookups return
//! `Option`, per the domain contract.

use thiserror::Error;

/// Domain-specific errors for the block ledger.
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("authentication failure: {0}")]
    AuthenticationFailure(String),

    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("resource conflict: {0}")]
    ResourceConflict(String),

    #[error("backend failure: {0}")]
    BackendFailure(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("encryption error: {0}")]
    EncryptionError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl LedgerError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn integrity_violation(msg: impl Into<String>) -> Self {
        Self::IntegrityViolation(msg.into())
    }

    pub fn backend_failure(msg: impl Into<String>) -> Self {
        Self::BackendFailure(msg.into())
    }

    /// Checks if the error is recoverable (worth a caller retry).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LedgerError::BackendFailure(_))
    }

    /// Checks if the error is a security-related error.
    pub fn is_security_error(&self) -> bool {
        matches!(
            self,
            LedgerError::AuthenticationFailure(_) | LedgerError::EncryptionError(_) | LedgerError::IntegrityViolation(_)
        )
    }

    /// Gets the error category, used for metrics labeling and structured
    /// logging.
    pub fn category(&self) -> &'static str {
        match self {
            LedgerError::InvalidArgument(_) => "invalid_argument",
            LedgerError::AuthenticationFailure(_) => "authentication",
            LedgerError::IntegrityViolation(_) => "integrity",
            LedgerError::ResourceConflict(_) => "resource_conflict",
            LedgerError::BackendFailure(_) => "backend",
            LedgerError::Unsupported(_) => "unsupported",
            LedgerError::SerializationError(_) => "serialization",
            LedgerError::EncryptionError(_) => "encryption",
            LedgerError::InternalError(_) => "internal",
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::BackendFailure(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_matches_variant() {
        assert_eq!(LedgerError::invalid_argument("x").category(), "invalid_argument");
        assert_eq!(LedgerError::integrity_violation("x").category(), "integrity");
    }

    #[test]
    fn authentication_is_security_but_not_recoverable() {
        let err = LedgerError::AuthenticationFailure("bad password".into());
        assert!(err.is_security_error());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn backend_failure_is_recoverable() {
        let err = LedgerError::backend_failure("connection reset");
        assert!(err.is_recoverable());
    }
}
