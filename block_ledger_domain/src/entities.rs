// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Entities
//!
//! The ledger's one entity, `Block`, plus its associated off-chain
//! payload and encryption envelope types.

pub mod block;

pub use block::{Block, EncryptionEnvelope, NewBlockParams, OffChainData};
