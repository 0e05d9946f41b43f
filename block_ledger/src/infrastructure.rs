// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Infrastructure layer: adapters implementing domain interfaces, plus the
//! cross-cutting ambient stack (config, logging, metrics).

pub mod adapters;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod repositories;
