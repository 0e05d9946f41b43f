// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Content search depth, per `spec.md` §4.5.

use serde::{Deserialize, Serialize};

/// How much of a block's content a content search is allowed to scan.
///
/// Each level is a strict superset of the previous one's scanned fields:
///
/// - `FastOnly`: `manual_keywords`, `auto_keywords`, `searchable_content`.
/// - `IncludeData`: the above, plus the raw (decrypted where possible)
///   `data` field.
/// - `ExhaustiveOffchain`: the above, plus the associated off-chain payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchLevel {
    FastOnly,
    IncludeData,
    ExhaustiveOffchain,
}

impl SearchLevel {
    pub fn includes_data(&self) -> bool {
        matches!(self, SearchLevel::IncludeData | SearchLevel::ExhaustiveOffchain)
    }

    pub fn includes_offchain(&self) -> bool {
        matches!(self, SearchLevel::ExhaustiveOffchain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_strictly_increasing() {
        assert!(!SearchLevel::FastOnly.includes_data());
        assert!(SearchLevel::IncludeData.includes_data());
        assert!(!SearchLevel::IncludeData.includes_offchain());
        assert!(SearchLevel::ExhaustiveOffchain.includes_data());
        assert!(SearchLevel::ExhaustiveOffchain.includes_offchain());
    }
}
