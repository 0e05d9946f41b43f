// /////////////////////////////////////////////////////////////////////////////
// Block Ledger
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Process-wide `prometheus` counters for ledger operations. Registered
//! lazily on first use; `encode` renders the current registry in text
//! exposition format for a metrics endpoint to serve.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

pub struct LedgerMetrics {
    pub registry: Registry,
    pub appends_total: IntCounter,
    pub rollbacks_total: IntCounter,
    pub stream_batches_total: IntCounter,
    pub recovery_outcomes_total: IntCounterVec,
}

impl LedgerMetrics {
    fn new() -> Self {
        let registry = Registry::new();

        let appends_total = IntCounter::new("ledger_appends_total", "Total blocks appended").unwrap();
        let rollbacks_total = IntCounter::new("ledger_rollbacks_total", "Total rollback operations").unwrap();
        let stream_batches_total =
            IntCounter::new("ledger_stream_batches_total", "Total paginated stream batches fetched").unwrap();
        let recovery_outcomes_total = IntCounterVec::new(
            Opts::new("ledger_recovery_outcomes_total", "Recovery attempts by strategy and outcome"),
            &["strategy", "outcome"],
        )
        .unwrap();

        registry.register(Box::new(appends_total.clone())).unwrap();
        registry.register(Box::new(rollbacks_total.clone())).unwrap();
        registry.register(Box::new(stream_batches_total.clone())).unwrap();
        registry.register(Box::new(recovery_outcomes_total.clone())).unwrap();

        Self {
            registry,
            appends_total,
            rollbacks_total,
            stream_batches_total,
            recovery_outcomes_total,
        }
    }

    /// Renders the current registry in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer).expect("prometheus encoding is infallible for our metric types");
        String::from_utf8(buffer).expect("prometheus text encoder emits valid UTF-8")
    }
}

static METRICS: OnceLock<LedgerMetrics> = OnceLock::new();

/// Process-wide metrics instance, created on first access.
pub fn metrics() -> &'static LedgerMetrics {
    METRICS.get_or_init(LedgerMetrics::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_and_render() {
        metrics().appends_total.inc();
        let text = metrics().encode();
        assert!(text.contains("ledger_appends_total"));
    }
}
