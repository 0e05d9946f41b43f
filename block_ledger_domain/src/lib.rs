// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Block Ledger Domain
//!
//! Pure domain types and contracts for the append-only, authenticated
//! block ledger: the `Block` entity, its value objects, the
//! `BlockRepository` persistence contract, and the `CryptoService`
//! cryptographic contract.
//!
//! This crate has no I/O. It depends on no async runtime, no database
//! driver, and no concrete crypto implementation — those live in the
//! `block_ledger` crate's infrastructure layer, which depends on this
//! crate rather than the other way around.

pub mod entities;
pub mod error;
pub mod repositories;
pub mod services;
pub mod value_objects;

pub use entities::{Block, EncryptionEnvelope, NewBlockParams, OffChainData};
pub use error::LedgerError;
pub use repositories::{BlockFilter, BlockRepository};
pub use services::CryptoService;
pub use value_objects::{PublicKeyHex, SearchLevel, GENESIS_PREVIOUS_HASH, GENESIS_SIGNER};
