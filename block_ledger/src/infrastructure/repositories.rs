// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

pub mod gateway;
pub mod schema;
pub mod sql_block_repository;
