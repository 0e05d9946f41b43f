// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Value Objects

pub mod public_key;
pub mod search_level;

pub use public_key::{PublicKeyHex, GENESIS_PREVIOUS_HASH, GENESIS_SIGNER};
pub use search_level::SearchLevel;
